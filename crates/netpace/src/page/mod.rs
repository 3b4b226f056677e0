//! Page adapter: the only surface the workflow uses to talk to a browser.
//!
//! Implementations own the transport (the `bot` binary ships a Chromium
//! one). Selectors are opaque strings passed through from configuration.

pub mod fake;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cookies::Cookie;
use crate::error::{BotError, BotResult};

pub use fake::{ClickEffect, FakeElement, FakeEvent, FakePage};

/// Opaque handle to an element, issued by the adapter that found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// Element geometry in CSS pixels, viewport-relative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Emulated window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
            scale: 1.0,
        }
    }
}

/// Browser identity applied once when the page is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub user_agent: Option<String>,
    pub viewport: Viewport,
    pub timezone: Option<String>,
}

/// A single browser tab.
#[async_trait]
pub trait PageAdapter: Send {
    async fn apply_fingerprint(&mut self, fingerprint: &Fingerprint) -> BotResult<()>;

    /// Navigate and wait for the load. Fails with [`BotError::Navigation`].
    async fn navigate(&mut self, url: &str) -> BotResult<()>;

    /// Wait up to `timeout` for a match. Fails with [`BotError::NotFound`].
    async fn find_element(&mut self, selector: &str, timeout: Duration) -> BotResult<ElementRef>;

    /// All current matches, without waiting.
    async fn find_elements(&mut self, selector: &str) -> BotResult<Vec<ElementRef>>;

    /// Single left-button click.
    async fn click(&mut self, element: &ElementRef) -> BotResult<()>;

    async fn type_char(&mut self, element: &ElementRef, ch: char) -> BotResult<()>;

    async fn press_backspace(&mut self, element: &ElementRef) -> BotResult<()>;

    async fn clear(&mut self, element: &ElementRef) -> BotResult<()>;

    async fn scroll(&mut self, dy: f64, steps: u32) -> BotResult<()>;

    async fn move_pointer(&mut self, x: f64, y: f64) -> BotResult<()>;

    async fn read_text(&mut self, element: &ElementRef) -> BotResult<String>;

    async fn read_attribute(&mut self, element: &ElementRef, name: &str) -> BotResult<Option<String>>;

    async fn bounding_box(&mut self, element: &ElementRef) -> BotResult<BoundingBox>;

    async fn viewport(&mut self) -> BotResult<Viewport>;

    async fn current_url(&mut self) -> BotResult<String>;

    async fn cookies(&mut self) -> BotResult<Vec<Cookie>>;

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> BotResult<()>;

    async fn close(&mut self) -> BotResult<()>;
}

/// [`PageAdapter::find_element`] with "absent" mapped to `None`.
pub async fn find_optional(
    page: &mut dyn PageAdapter,
    selector: &str,
    timeout: Duration,
) -> BotResult<Option<ElementRef>> {
    match page.find_element(selector, timeout).await {
        Ok(el) => Ok(Some(el)),
        Err(BotError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// True if any of `selectors` currently matches.
pub async fn any_present(page: &mut dyn PageAdapter, selectors: &[String]) -> BotResult<bool> {
    for selector in selectors {
        if !page.find_elements(selector).await?.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Trimmed text of the first match, or empty when absent.
pub async fn text_of(page: &mut dyn PageAdapter, selector: &str) -> BotResult<String> {
    let Some(el) = page.find_elements(selector).await?.into_iter().next() else {
        return Ok(String::new());
    };
    Ok(page.read_text(&el).await?.trim().to_string())
}
