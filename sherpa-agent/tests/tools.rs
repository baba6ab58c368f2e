mod common;

use common::FakeDriver;
use sherpa_agent::action::AgentAction;
use sherpa_agent::selector::{collect_candidates, resolve_text, Candidate, Resolution};
use sherpa_agent::tools::{ToolError, ToolRegistry, SEARCH_INPUT};
use sherpa_agent::ActionKind;
use serde_json::json;

#[tokio::test]
async fn resolution_walks_candidates_in_order_and_stops_at_first_hit() {
    let driver = FakeDriver::at("https://example.com/").with_element("li", &["first", "second"]);
    let candidates = vec![
        Candidate::new("#gone", 0),
        Candidate::new("li", 0),
        Candidate::new("li", 1),
    ];

    let found = resolve_text(driver.boxed().as_ref(), "#missing", 0, &candidates).await;

    assert_eq!(
        found,
        Resolution::Found {
            text: "first".into(),
            selector: "li".into(),
            index: 0
        }
    );
    assert_eq!(driver.count("wait #missing"), 1);
    assert_eq!(driver.count("wait #gone"), 1);
    assert_eq!(driver.count("read li#1"), 0);
}

#[tokio::test]
async fn positional_candidate_is_tried_before_the_rest() {
    let driver = FakeDriver::at("https://example.com/").with_element("li", &["first", "second"]);
    let candidates = vec![Candidate::new("li", 0), Candidate::new("li", 1)];

    let found = resolve_text(driver.boxed().as_ref(), "", 1, &candidates).await;

    assert_eq!(found.text(), Some("second"));
    assert_eq!(driver.count("read li#0"), 0);
}

#[tokio::test]
async fn exhausted_resolution_reports_last_error() {
    let driver = FakeDriver::at("https://example.com/");
    match resolve_text(driver.boxed().as_ref(), "", 0, &[]).await {
        Resolution::Exhausted { last_error } => assert_eq!(last_error, "no candidates matched"),
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn candidates_skip_empty_text_and_duplicates() {
    let driver = FakeDriver::at("https://example.com/")
        .with_element("li.b_algo", &["  ", "Rust 1.90"])
        .with_element("article", &["Blog post"]);
    let page = driver.boxed();

    let found = collect_candidates(page.as_ref(), &["li.b_algo", "article", "li.b_algo"]).await;

    let keys: Vec<_> = found.iter().map(|c| (c.selector.as_str(), c.index)).collect();
    assert_eq!(keys, vec![("li.b_algo", 1), ("article", 0)]);
    assert_eq!(found[0].text, "Rust 1.90");
}

#[tokio::test]
async fn extract_falls_back_to_search_result_containers() {
    let driver = FakeDriver::at("https://www.bing.com/search?q=rust")
        .with_element("li.b_algo", &["Rust Programming Language"]);
    let tools = ToolRegistry::with_defaults();
    let tool = tools.get(ActionKind::Extract).unwrap();
    let action = tool.validate(&json!({"selector": ".does-not-exist"})).unwrap();

    let text = tool.invoke(driver.boxed().as_ref(), &action).await.unwrap();

    assert_eq!(text, "Rust Programming Language");
}

#[tokio::test]
async fn extract_hit_on_primary_leaves_result_containers_untouched() {
    let driver = FakeDriver::at("https://www.bing.com/search?q=rust")
        .with_element("h1", &["Title"])
        .with_element("li.b_algo", &["a", "b", "c"])
        .with_element("article", &["x", "y"]);
    let tools = ToolRegistry::with_defaults();
    let tool = tools.get(ActionKind::Extract).unwrap();
    let action = tool.validate(&json!({"selector": "h1"})).unwrap();

    let text = tool.invoke(driver.boxed().as_ref(), &action).await.unwrap();

    assert_eq!(text, "Title");
    assert_eq!(driver.calls(), vec!["wait h1", "read h1#0"]);
}

#[tokio::test]
async fn click_on_missing_target_submits_the_search_box() {
    let driver = FakeDriver::at("https://www.google.com/")
        .with_element(SEARCH_INPUT, &[""])
        .with_page("https://www.google.com/", "<html>results</html>");
    let tools = ToolRegistry::with_defaults();
    let tool = tools.get(ActionKind::Click).unwrap();
    let action = AgentAction::Click {
        selector: "button.search".into(),
    };

    let content = tool.invoke(driver.boxed().as_ref(), &action).await.unwrap();

    assert_eq!(content, "<html>results</html>");
    assert_eq!(driver.count("click"), 0);
    assert_eq!(driver.count(&format!("focus {SEARCH_INPUT}")), 1);
    assert_eq!(driver.count(&format!("enter {SEARCH_INPUT}")), 1);
}

#[tokio::test]
async fn click_fails_when_fallback_has_no_search_box() {
    let driver = FakeDriver::at("https://example.com/");
    let tools = ToolRegistry::with_defaults();
    let tool = tools.get(ActionKind::Click).unwrap();
    let action = AgentAction::Click {
        selector: "#nope".into(),
    };

    let err = tool.invoke(driver.boxed().as_ref(), &action).await.unwrap_err();

    assert!(matches!(err, ToolError::Failed { tool: "click_element", .. }), "{err}");
    assert!(!err.is_policy());
}

#[tokio::test]
async fn type_and_navigate_drive_the_page() {
    let driver = FakeDriver::at("about:blank")
        .with_element("#q", &[""])
        .with_page("https://example.com/", "<p>hello</p>");
    let tools = ToolRegistry::with_defaults();
    let page = driver.boxed();

    let navigate = tools.get(ActionKind::Navigate).unwrap();
    let action = navigate.validate(&json!("https://example.com/")).unwrap();
    let content = navigate.invoke(page.as_ref(), &action).await.unwrap();
    assert_eq!(content, "<p>hello</p>");

    let typer = tools.get(ActionKind::Type).unwrap();
    let action = typer.validate(&json!({"selector": "#q", "text": "rust"})).unwrap();
    typer.invoke(page.as_ref(), &action).await.unwrap();

    assert_eq!(
        driver.calls(),
        vec!["navigate https://example.com/", "wait #q", "type #q rust"]
    );
}

#[test]
fn validation_rejects_missing_fields_as_policy_errors() {
    let tools = ToolRegistry::with_defaults();
    let err = tools
        .get(ActionKind::Type)
        .unwrap()
        .validate(&json!({"selector": "#q"}))
        .unwrap_err();
    assert_eq!(err.to_string(), "`type` needs a non-empty `text`");
    assert!(ToolError::from(err).is_policy());
}
