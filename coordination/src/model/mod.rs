//! Requests, results, decisions and the tags that identify them.

mod decision;
mod key;
mod phase;
mod request;
mod result;

pub use decision::RoutingDecision;
pub use key::ArtifactKey;
pub use phase::{InterruptType, PhaseKind};
pub use request::{
    InterruptChoice, InterruptFeedback, InterruptRequest, PhaseRequest, UpstreamCurations,
};
pub use result::{CollectorDecision, PhaseResult};
