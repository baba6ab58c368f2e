use anyhow::{Context as _, Result};
use sherpa_agent::platform::SearchPlatform;
use sherpa_agent::Workflow;
use sherpa_config::{BrowserSection, LlmSection, PipelineSection, SherpaConfig};
use sherpa_drivers::behavioral::{BehavioralEngine, TypingProfile};
use sherpa_drivers::launch::LaunchOptions;
use sherpa_drivers::{BrowserDriver, PageFactory, WaitPolicy, WebDriverFactory};
use sherpa_http::HttpClient;
use sherpa_llm::traits::Sampling;
use sherpa_llm::{ensure_llm_ready_with, SharedLlm};
use sherpa_pipeline::{Pipeline, SearchSettings};
use std::sync::Arc;
use tracing::warn;

pub async fn build_llm_client(cfg: &LlmSection) -> Result<SharedLlm> {
    let (temperature, max_tokens) = cfg.sampling();
    let sampling = (temperature.is_some() || max_tokens.is_some()).then_some(Sampling {
        temperature,
        max_tokens,
    });
    Ok(ensure_llm_ready_with(&cfg.to_llm_config(), sampling).await?)
}

pub fn page_factory(browser: &BrowserSection) -> WebDriverFactory {
    let launch = LaunchOptions {
        headless: browser.headless,
        ..LaunchOptions::default()
    };
    let typing = if browser.human_typing {
        TypingProfile::default()
    } else {
        TypingProfile::instant()
    };
    WebDriverFactory::new(browser.webdriver_url.clone(), launch)
        .with_behavioral(BehavioralEngine::new(typing))
}

/// Open a page and load `start_url` on it. The page is closed again when the
/// start URL fails to load.
pub async fn open_page(
    factory: &dyn PageFactory,
    start_url: Option<&str>,
) -> Result<Box<dyn BrowserDriver>> {
    let page = factory.open().await.context("opening browser page")?;
    if let Some(url) = start_url {
        if let Err(e) = page.navigate(url, WaitPolicy::Load).await {
            close_page(page.as_ref()).await;
            return Err(e).with_context(|| format!("opening {url}"));
        }
    }
    Ok(page)
}

pub async fn close_page(page: &dyn BrowserDriver) {
    if let Err(e) = page.close().await {
        warn!(error = %e, "closing browser page failed");
    }
}

pub fn workflow(cfg: &SherpaConfig, llm: SharedLlm) -> Workflow {
    let search = SearchPlatform::default().with_dump_dir(cfg.browser.dump_dir.clone());
    let workflow = Workflow::new(llm)
        .with_limits(cfg.agent.limits())
        .with_strategy(Arc::new(search));
    match &cfg.browser.target_url {
        Some(url) => workflow.with_target_url(url.clone()),
        None => workflow,
    }
}

pub fn search_settings(section: &PipelineSection) -> SearchSettings {
    SearchSettings {
        search_url: section.search_url.clone(),
        offset_param: section.offset_param.clone(),
        results_per_page: section.results_per_page as usize,
        page_cap: section.page_cap as usize,
        max_results: section.max_results,
    }
}

pub fn pipeline(cfg: &SherpaConfig, llm: SharedLlm, factory: WebDriverFactory) -> Result<Pipeline> {
    let http = HttpClient::new(&cfg.pipeline.search_url)?;
    Ok(Pipeline::new(llm, Arc::new(factory))
        .with_settings(search_settings(&cfg.pipeline))
        .with_http(http))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sherpa_drivers::{DriverError, DriverResult, ElementHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Page whose navigation always fails; counts `close` calls.
    #[derive(Clone, Default)]
    struct Unreachable {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PageFactory for Unreachable {
        async fn open(&self) -> DriverResult<Box<dyn BrowserDriver>> {
            Ok(Box::new(self.clone()))
        }
    }

    #[async_trait]
    impl BrowserDriver for Unreachable {
        async fn navigate(&self, url: &str, _wait: WaitPolicy) -> DriverResult<()> {
            Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "unreachable".to_string(),
            })
        }
        async fn click(&self, s: &str) -> DriverResult<()> {
            Err(DriverError::NotFound(s.to_string()))
        }
        async fn type_text(&self, s: &str, _text: &str) -> DriverResult<()> {
            Err(DriverError::NotFound(s.to_string()))
        }
        async fn focus(&self, s: &str) -> DriverResult<()> {
            Err(DriverError::NotFound(s.to_string()))
        }
        async fn press_enter(&self, s: &str) -> DriverResult<()> {
            Err(DriverError::NotFound(s.to_string()))
        }
        async fn wait_for_selector(&self, s: &str, _timeout: Duration) -> DriverResult<()> {
            Err(DriverError::NotFound(s.to_string()))
        }
        async fn query_all(&self, _s: &str) -> DriverResult<Vec<ElementHandle>> {
            Ok(Vec::new())
        }
        async fn read_text(&self, h: &ElementHandle) -> DriverResult<String> {
            Err(DriverError::NotFound(h.selector.clone()))
        }
        async fn current_url(&self) -> DriverResult<String> {
            Ok("about:blank".to_string())
        }
        async fn content(&self) -> DriverResult<String> {
            Ok(String::new())
        }
        async fn screenshot(&self) -> DriverResult<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn close(&self) -> DriverResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_start_url_closes_the_page() {
        let factory = Unreachable::default();
        let err = open_page(&factory, Some("https://www.google.com/"))
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("opening https://www.google.com/"));
        assert_eq!(factory.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn page_without_start_url_stays_open() {
        let factory = Unreachable::default();
        let page = open_page(&factory, None).await.unwrap();
        assert_eq!(page.current_url().await.unwrap(), "about:blank");
        assert_eq!(factory.closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pipeline_section_maps_onto_search_settings() {
        let settings = search_settings(&PipelineSection::default());
        assert_eq!(settings.search_url, "https://html.duckduckgo.com/html/");
        assert_eq!(settings.page_cap, 3);
        assert_eq!(settings.max_results, 15);
    }

    #[test]
    fn typing_profile_follows_config() {
        let mut browser = BrowserSection::default();
        browser.human_typing = false;
        let factory = page_factory(&browser);
        assert_eq!(factory.behavioral.typing(), TypingProfile::instant());
        assert_eq!(factory.launch.headless, browser.headless);
    }
}
