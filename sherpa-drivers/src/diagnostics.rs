//! Page dumps written when an expected element never shows up.

use crate::browser::BrowserDriver;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpPaths {
    pub html: PathBuf,
    pub screenshot: Option<PathBuf>,
}

/// Stable file stem for `url`: the first 16 hex chars of its blake3 hash.
pub fn dump_stem(url: &str) -> String {
    let hash = blake3::hash(url.as_bytes()).to_hex();
    hash[..16].to_string()
}

/// Write the page source (and a screenshot, when the driver can take one)
/// under `dir`. The directory is created if missing.
pub async fn dump_page(page: &dyn BrowserDriver, dir: &Path, label: &str) -> Result<DumpPaths> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating dump dir {}", dir.display()))?;

    let url = page.current_url().await.unwrap_or_default();
    let stem = format!("{label}-{}", dump_stem(&url));

    let html_path = dir.join(format!("{stem}.html"));
    let html = page.content().await.context("reading page source")?;
    tokio::fs::write(&html_path, html)
        .await
        .with_context(|| format!("writing {}", html_path.display()))?;

    let screenshot = match page.screenshot().await {
        Ok(png) => {
            let path = dir.join(format!("{stem}.png"));
            tokio::fs::write(&path, png)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            Some(path)
        }
        Err(e) => {
            info!(target: "browser.diagnostics", error = %e, "screenshot unavailable");
            None
        }
    };

    info!(
        target: "browser.diagnostics",
        %url,
        html = %html_path.display(),
        "page.dumped"
    );
    Ok(DumpPaths {
        html: html_path,
        screenshot,
    })
}
