use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Browser launch settings translated into Chrome capabilities.
pub struct LaunchOptions {
    pub headless: bool,
    pub window: (u32, u32),
    pub lang: String,
    /// Overrides the browser's own user agent when set.
    pub user_agent: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1366, 768),
            lang: "en-US".to_string(),
            user_agent: None,
        }
    }
}

/// Construct Chrome command‑line arguments for the given launch settings.
pub fn chrome_arguments(opts: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        format!("--window-size={},{}", opts.window.0, opts.window.1),
        format!("--lang={}", opts.lang),
    ];
    if let Some(ua) = &opts.user_agent {
        args.push(format!("--user-agent={ua}"));
    }
    if opts.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

/// W3C capabilities map for a new Chrome session.
pub fn capabilities(opts: &LaunchOptions) -> Map<String, Value> {
    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("chrome"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({ "args": chrome_arguments(opts) }),
    );
    caps
}

/// Hides the most common automation markers; run after every navigation.
pub const CORE_EVASIONS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    if (!window.chrome) window.chrome = { runtime: {} };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_adds_flags() {
        let args = chrome_arguments(&LaunchOptions::default());
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1366,768".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--user-agent")));
    }

    #[test]
    fn headed_with_user_agent() {
        let opts = LaunchOptions {
            headless: false,
            user_agent: Some("Mozilla/5.0 test".into()),
            ..Default::default()
        };
        let args = chrome_arguments(&opts);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(args.contains(&"--user-agent=Mozilla/5.0 test".to_string()));
    }

    #[test]
    fn capabilities_carry_chrome_args() {
        let caps = capabilities(&LaunchOptions::default());
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--lang=en-US"));
    }
}
