use crate::action::{ActionKind, ActionRecord};
use sherpa_llm::traits::{ChatMessage, Prompt};

pub const PLAN_SYSTEM: &str = r#"You plan browser tasks.
Reply with a single JSON object: {"steps": ["..."], "refined_query": "..."}.
`refined_query` is the search query that best serves the task. No other text."#;

pub const ACTION_SYSTEM: &str = r#"You control a web browser one action at a time.
Reply with a single JSON object: {"action": "<action>", "arguments": {...}}.
Arguments per action:
- navigate: {"url": "..."}
- type: {"selector": "<css>", "text": "..."}
- click: {"selector": "<css>"}
- extract: {"selector": "<css>"}
- finish: {}
No other text."#;

pub const EXTRACT_SYSTEM: &str = r#"You gather information from web pages to complete a task.
Reply with a single JSON object: {"action": "<action>", "arguments": {...}, "format": "text"}.
Use "extract" with a CSS selector to read part of the page, "navigate", "type" or "click" to move,
and "finish" once the collected information answers the task. No other text."#;

pub const COMPLETION_SYSTEM: &str = r#"You judge whether a browser task is complete.
Start your answer with "Yes" or "No", then give the answer to the task in one short paragraph."#;

fn history(actions: &[ActionRecord]) -> String {
    if actions.is_empty() {
        return "none".to_string();
    }
    actions
        .iter()
        .map(|a| format!("- {} {}", a.action, a.arguments))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn plan(task: &str) -> Prompt {
    Prompt::from(vec![
        ChatMessage::system(PLAN_SYSTEM),
        ChatMessage::user(format!("Task: {task}")),
    ])
}

pub fn analyze_page(
    task: &str,
    url: &str,
    allowed: &[ActionKind],
    recent: &[ActionRecord],
    content_preview: &str,
) -> Prompt {
    let allowed = allowed
        .iter()
        .map(ActionKind::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    Prompt::from(vec![
        ChatMessage::system(ACTION_SYSTEM),
        ChatMessage::user(format!(
            "Task: {task}\nCurrent URL: {url}\nAllowed actions: {allowed}\nRecent actions:\n{}\nPage content:\n{content_preview}",
            history(recent)
        )),
    ])
}

pub fn extract_info(
    task: &str,
    query: &str,
    url: &str,
    recent: &[ActionRecord],
    content_preview: &str,
) -> Prompt {
    Prompt::from(vec![
        ChatMessage::system(EXTRACT_SYSTEM),
        ChatMessage::user(format!(
            "Task: {task}\nQuery: {query}\nCurrent URL: {url}\nRecent actions:\n{}\nPage content:\n{content_preview}",
            history(recent)
        )),
    ])
}

pub fn check_completion(task: &str, extracted: &[String]) -> Prompt {
    let gathered = if extracted.is_empty() {
        "nothing yet".to_string()
    } else {
        extracted.join("\n---\n")
    };
    Prompt::from(vec![
        ChatMessage::system(COMPLETION_SYSTEM),
        ChatMessage::user(format!(
            "Task: {task}\nInformation gathered:\n{gathered}\nIs the task complete?"
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analyze_prompt_lists_vocabulary_and_history() {
        let recent = vec![ActionRecord {
            action: ActionKind::Click,
            arguments: json!({"selector": "a.next"}),
        }];
        let text = analyze_page(
            "find docs",
            "https://x/",
            &[ActionKind::Type, ActionKind::Finish],
            &recent,
            "<p>hi</p>",
        )
        .flatten();
        assert!(text.contains("Allowed actions: type, finish"));
        assert!(text.contains("- click {\"selector\":\"a.next\"}"));
        assert!(text.starts_with(ACTION_SYSTEM));
    }

    #[test]
    fn completion_prompt_without_findings() {
        let text = check_completion("t", &[]).flatten();
        assert!(text.contains("nothing yet"));
    }
}
