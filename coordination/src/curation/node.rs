//! Curation nodes: the immutable, hashable records collectors finalize.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::artifact::{Artifact, CurationChild};
use super::body::CurationBody;
use super::hasher::{Blake3Hasher, ContentHasher};
use super::{CurationError, CurationFamily, CurationResult};
use crate::model::{ArtifactKey, PhaseKind};

/// A finalized curation with the rationale that selected it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CurationNode {
    #[serde(default)]
    pub key: ArtifactKey,
    #[serde(default)]
    pub source_result_id: ArtifactKey,
    pub body: CurationBody,
    #[serde(default)]
    pub selection_rationale: String,
}

impl CurationNode {
    pub fn new(body: CurationBody, selection_rationale: impl Into<String>) -> Self {
        Self {
            key: ArtifactKey::generate(),
            source_result_id: ArtifactKey::generate(),
            body,
            selection_rationale: selection_rationale.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<ArtifactKey>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_source_result(mut self, id: impl Into<ArtifactKey>) -> Self {
        self.source_result_id = id.into();
        self
    }

    pub fn family(&self) -> CurationFamily {
        self.body.family()
    }

    /// Hash with the default BLAKE3 hasher.
    pub fn compute_hash(&self) -> String {
        self.content_hash(&Blake3Hasher)
    }

    /// New node with its body slot replaced by a supplied body of the same family,
    /// and the body's own slots patched from the remaining children.
    pub fn with_children(&self, children: &[CurationChild]) -> Self {
        let family = self.family();
        let body = children
            .iter()
            .find_map(|child| match child {
                CurationChild::Body(body) if body.family() == family => Some(body.clone()),
                _ => None,
            })
            .unwrap_or_else(|| self.body.clone());
        Self {
            body: body.with_children(children),
            ..self.clone()
        }
    }

    /// Compare the body children of two nodes by content hash.
    pub fn diff(&self, other: &CurationNode, hasher: &dyn ContentHasher) -> CurationDiff {
        let mine: Vec<String> = self
            .body
            .children()
            .iter()
            .map(|c| c.content_hash(hasher))
            .collect();
        let theirs: Vec<String> = other
            .body
            .children()
            .iter()
            .map(|c| c.content_hash(hasher))
            .collect();
        CurationDiff {
            unchanged: self.content_hash(hasher) == other.content_hash(hasher),
            added: theirs.iter().filter(|h| !mine.contains(h)).cloned().collect(),
            removed: mine.iter().filter(|h| !theirs.contains(h)).cloned().collect(),
        }
    }

    /// Check that a collector produced the family it finalizes.
    pub fn validate_for(&self, kind: PhaseKind) -> CurationResult<()> {
        match kind.produces_curation() {
            Some(expected) if expected == self.family() => Ok(()),
            Some(expected) => Err(CurationError::FamilyMismatch {
                phase: kind,
                expected,
                actual: self.family(),
            }),
            None => Err(CurationError::NotACollector(kind)),
        }
    }

    pub fn pretty_print(&self) -> String {
        let mut out = self.body.pretty_print();
        if !self.selection_rationale.trim().is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str("Selection Rationale: ");
            out.push_str(self.selection_rationale.trim());
        }
        out
    }
}

impl Artifact for CurationNode {
    fn scalar_view(&self) -> String {
        self.selection_rationale.clone()
    }

    fn children(&self) -> Vec<CurationChild> {
        vec![CurationChild::Body(self.body.clone())]
    }
}

/// What changed between two curations of the same family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationDiff {
    pub unchanged: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}
