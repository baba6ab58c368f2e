use crate::action::StepRecord;
use serde::{Deserialize, Serialize};

pub const ERROR_PREFIX: &str = "Error: ";

/// Structured record emitted by `end` for every run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub task: String,
    pub steps: Vec<StepRecord>,
    pub result: String,
    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub run_time_ms: u64,
    pub step_count: u32,
    /// Distinct URLs successfully navigated, in visit order.
    pub sources: Vec<String>,
    pub errors: Vec<String>,
}

impl RunOutput {
    pub fn is_error(&self) -> bool {
        self.result.starts_with(ERROR_PREFIX)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use serde_json::json;

    #[test]
    fn serialises_with_nested_metadata() {
        let out = RunOutput {
            task: "find the rust homepage".into(),
            steps: vec![StepRecord {
                tool: "navigate_to_url".into(),
                action: ActionKind::Navigate,
                arguments: json!({"url": "https://rust-lang.org"}),
                result: "<html>".into(),
                format: None,
            }],
            result: "Yes, found it".into(),
            metadata: RunMetadata {
                run_id: "r1".into(),
                run_time_ms: 12,
                step_count: 1,
                sources: vec!["https://rust-lang.org/".into()],
                errors: vec![],
            },
        };
        let v: serde_json::Value = serde_json::from_str(&out.to_json_pretty().unwrap()).unwrap();
        assert_eq!(v["steps"][0]["action"], "navigate");
        assert_eq!(v["metadata"]["sources"][0], "https://rust-lang.org/");
        assert!(!out.is_error());
    }
}
