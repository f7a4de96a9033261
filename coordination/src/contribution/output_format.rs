use schemars::schema_for;

use super::{ContributionContext, ContributionProvider, ContributionResult};
use crate::model::RoutingDecision;

const REQUIREMENTS: &str = "## Critical JSON Output Requirements

Your final response MUST be valid JSON matching the routing decision schema. Follow these rules strictly:

1. **Escape all special characters in string values.** Newlines must be `\\n`, tabs must be `\\t`, \
backslashes must be `\\\\`, and double quotes must be `\\\"`. Never include raw newlines, tabs or \
other control characters (ASCII 0-31) inside JSON string values.

2. **Return only the JSON object.** Do not include any text, markdown, or explanation before or \
after the JSON. Do not wrap it in markdown code fences. The response must start with `{` and end with `}`.

3. **Populate exactly one routing branch.** Set `branch` to one of `advance`, `fan_out`, \
`consolidate`, `route_back` or `interrupt` and fill only the fields of that branch. \
Never return a decision without a branch.

4. **Use compact single-line strings.** For any field containing multi-line content (like analysis \
output or findings), combine everything into a single string with `\\n` escape sequences for line breaks.
";

/// Hard formatting constraints on the decision-maker's answer.
#[derive(Debug, Clone, Default)]
pub struct OutputFormatProvider {
    include_schema: bool,
}

impl OutputFormatProvider {
    pub fn new(include_schema: bool) -> Self {
        Self { include_schema }
    }
}

impl ContributionProvider for OutputFormatProvider {
    fn name(&self) -> &str {
        "output-format"
    }

    fn priority(&self) -> i32 {
        10_001
    }

    fn contribute(&self, _ctx: &ContributionContext<'_>) -> ContributionResult<String> {
        if !self.include_schema {
            return Ok(REQUIREMENTS.to_string());
        }
        let schema = serde_json::to_string_pretty(&schema_for!(RoutingDecision))?;
        Ok(format!(
            "{}\n### Routing Decision Schema\n\n```json\n{}\n```\n",
            REQUIREMENTS, schema
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::history::ExecutionHistory;
    use crate::model::{PhaseKind, PhaseRequest};

    #[test]
    fn test_schema_is_optional() {
        let config = EngineConfig::default();
        let history = ExecutionHistory::new();
        let request = PhaseRequest::new(PhaseKind::TicketAgent, "fix it");
        let ctx = ContributionContext::new(&request, &history, &config);

        let plain = OutputFormatProvider::new(false).contribute(&ctx).unwrap();
        assert!(plain.starts_with("## Critical JSON Output Requirements"));
        assert!(!plain.contains("Routing Decision Schema"));

        let with_schema = OutputFormatProvider::new(true).contribute(&ctx).unwrap();
        assert!(with_schema.contains("### Routing Decision Schema"));
        assert!(with_schema.contains("fan_out"));
    }
}
