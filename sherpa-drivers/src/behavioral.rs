use anyhow::Result;
use fantoccini::elements::Element;
use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Bounds (milliseconds) for the pause after each typed character.
pub struct TypingProfile {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl TypingProfile {
    /// No pauses at all; used for headless runs where timing is irrelevant.
    pub const fn instant() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }
}

impl Default for TypingProfile {
    fn default() -> Self {
        Self {
            min_ms: 30,
            max_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Produces human‑like delays and typing behavior for interactive pages.
pub struct BehavioralEngine {
    typing: TypingProfile,
}

impl BehavioralEngine {
    pub fn new(typing: TypingProfile) -> Self {
        Self { typing }
    }

    pub fn typing(&self) -> TypingProfile {
        self.typing
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        let ms = pick_delay(min, max);
        if ms > 0 {
            sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Type the provided text one character at a time with the profile's pauses.
    pub async fn type_text_human_like(&self, element: &Element, text: &str) -> Result<()> {
        if self.typing.max_ms == 0 {
            element.send_keys(text).await?;
            return Ok(());
        }
        for ch in text.chars() {
            element.send_keys(&ch.to_string()).await?;
            self.random_delay(self.typing.min_ms, self.typing.max_ms).await;
        }
        Ok(())
    }
}

/// Uniform pick in `min..=max`; inverted bounds collapse to `min`.
pub(crate) fn pick_delay(min: u64, max: u64) -> u64 {
    if max <= min {
        return min;
    }
    OsRng.gen_range(min..=max)
}
