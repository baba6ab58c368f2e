//! Bounded-retry policy applied by the `errorHandling` node.

use crate::context::{AgentError, Node};
use crate::output::ERROR_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    Resume(Node),
    /// Terminal; carries the final `"Error: …"` result.
    Abort(String),
}

/// Decide what follows a failure. `attempts` already counts this failure.
pub fn recover(
    error: Option<&AgentError>,
    attempts: u32,
    max_retries: u32,
    last_node: Option<Node>,
) -> Recovery {
    let message = error
        .map(|e| e.message.clone())
        .unwrap_or_else(|| "unknown failure".to_string());

    if error.is_some_and(AgentError::is_fatal) {
        return Recovery::Abort(format!("{ERROR_PREFIX}{message}"));
    }
    if attempts >= max_retries {
        return Recovery::Abort(format!(
            "{ERROR_PREFIX}{message} (gave up after {attempts} retries)"
        ));
    }

    let target = error
        .and_then(|e| e.resume_at)
        .or(last_node)
        .unwrap_or(Node::ExtractInfo);
    Recovery::Resume(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ErrorKind;

    #[test]
    fn resumes_last_node_below_limit() {
        let err = AgentError::new(ErrorKind::Tool, "boom");
        assert_eq!(
            recover(Some(&err), 1, 3, Some(Node::TakeAction)),
            Recovery::Resume(Node::TakeAction)
        );
    }

    #[test]
    fn explicit_resume_wins() {
        let err = AgentError::new(ErrorKind::Policy, "bad args").resume_at(Node::AnalyzePage);
        assert_eq!(
            recover(Some(&err), 2, 3, Some(Node::TakeAction)),
            Recovery::Resume(Node::AnalyzePage)
        );
    }

    #[test]
    fn aborts_at_limit() {
        let err = AgentError::new(ErrorKind::Tool, "boom");
        match recover(Some(&err), 3, 3, Some(Node::ExtractInfo)) {
            Recovery::Abort(msg) => assert!(msg.starts_with("Error: boom")),
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn safety_limits_are_never_retried() {
        let err = AgentError::new(ErrorKind::SafetyLimit, "too many steps");
        assert_eq!(
            recover(Some(&err), 1, 3, Some(Node::ExtractInfo)),
            Recovery::Abort("Error: too many steps".into())
        );
    }

    #[test]
    fn missing_error_and_node_fall_back() {
        assert_eq!(recover(None, 1, 3, None), Recovery::Resume(Node::ExtractInfo));
    }
}
