//! [`PageAdapter`] over a chromiumoxide tab.
//!
//! Selectors prefixed with `xpath:` are resolved as XPath, anything else as
//! CSS. Found elements are kept in a handle table so the workflow only ever
//! sees [`ElementRef`] ids. Pointer, key and wheel input go through raw CDP
//! `Input.dispatch*` events rather than synthetic DOM events.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams, DispatchMouseEventType,
    MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use netpace::cookies::Cookie;
use netpace::page::{BoundingBox, ElementRef, Fingerprint, PageAdapter, Viewport};
use netpace::{BotError, BotResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const XPATH_PREFIX: &str = "xpath:";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

const HIDE_WEBDRIVER: &str = r#"Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = window.chrome || { runtime: {} };
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });"#;

const CLEAR_FIELD: &str = r#"function() {
    if ('value' in this) { this.value = ''; } else { this.textContent = ''; }
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

fn cdp_err(context: &str) -> impl Fn(CdpError) -> BotError + '_ {
    move |e| BotError::Browser(format!("{context}: {e}"))
}

fn build_err(e: String) -> BotError {
    BotError::Browser(format!("invalid cdp params: {e}"))
}

/// True when the protocol reports an empty match rather than a failure.
fn is_no_match(err: &CdpError) -> bool {
    match err {
        CdpError::NotFound => true,
        CdpError::Chrome(e) => {
            let message = e.message.to_ascii_lowercase();
            message.contains("no node") || message.contains("could not find node")
        }
        _ => false,
    }
}

/// Wait one poll interval before the next lookup.
///
/// `Ok(false)` once `deadline` has passed; `Cancelled` as soon as the token
/// fires.
async fn poll_pause(cancel: &CancellationToken, deadline: Instant) -> BotResult<bool> {
    if cancel.is_cancelled() {
        return Err(BotError::Cancelled);
    }
    if Instant::now() >= deadline {
        return Ok(false);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(BotError::Cancelled),
        _ = tokio::time::sleep(POLL_INTERVAL) => Ok(true),
    }
}

pub struct ChromiumPage {
    page: Page,
    cancel: CancellationToken,
    elements: HashMap<u64, Element>,
    next_id: u64,
    focused: Option<u64>,
    pointer: (f64, f64),
    viewport: Option<Viewport>,
}

impl ChromiumPage {
    pub fn new(page: Page, cancel: CancellationToken) -> Self {
        Self {
            page,
            cancel,
            elements: HashMap::new(),
            next_id: 1,
            focused: None,
            pointer: (0.0, 0.0),
            viewport: None,
        }
    }

    fn register(&mut self, element: Element) -> ElementRef {
        let id = self.next_id;
        self.next_id += 1;
        self.elements.insert(id, element);
        ElementRef(id)
    }

    fn element(&self, handle: &ElementRef) -> BotResult<&Element> {
        self.elements
            .get(&handle.0)
            .ok_or_else(|| BotError::Browser(format!("stale element handle {}", handle.0)))
    }

    async fn query_all(&self, selector: &str) -> BotResult<Vec<Element>> {
        let found = match selector.strip_prefix(XPATH_PREFIX) {
            Some(xpath) => self.page.find_xpaths(xpath).await,
            None => self.page.find_elements(selector).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            Err(e) if is_no_match(&e) => Ok(Vec::new()),
            Err(e) => Err(BotError::Browser(format!("lookup of {selector} failed: {e}"))),
        }
    }

    async fn focus(&mut self, handle: &ElementRef) -> BotResult<()> {
        if self.focused == Some(handle.0) {
            return Ok(());
        }
        self.element(handle)?
            .focus()
            .await
            .map_err(cdp_err("focus failed"))?;
        self.focused = Some(handle.0);
        Ok(())
    }

    async fn mouse(&self, kind: DispatchMouseEventType, x: f64, y: f64) -> BotResult<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind.clone()).x(x).y(y);
        if !matches!(kind, DispatchMouseEventType::MouseMoved) {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(build_err)?;
        self.page
            .execute(params)
            .await
            .map_err(cdp_err("mouse event failed"))?;
        Ok(())
    }

    async fn key(&self, kind: DispatchKeyEventType, key: &str, code: &str, vk: i64) -> BotResult<()> {
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.to_string())
            .code(code.to_string())
            .windows_virtual_key_code(vk)
            .native_virtual_key_code(vk)
            .build()
            .map_err(build_err)?;
        self.page
            .execute(params)
            .await
            .map_err(cdp_err("key event failed"))?;
        Ok(())
    }

    async fn measure_viewport(&self) -> BotResult<Viewport> {
        let value: serde_json::Value = self
            .page
            .evaluate("({ w: window.innerWidth | 0, h: window.innerHeight | 0, s: window.devicePixelRatio || 1 })")
            .await
            .map_err(cdp_err("viewport query failed"))?
            .into_value()
            .map_err(|e| BotError::Browser(format!("viewport query returned garbage: {e:?}")))?;
        Ok(Viewport {
            width: value["w"].as_u64().unwrap_or(0) as u32,
            height: value["h"].as_u64().unwrap_or(0) as u32,
            scale: value["s"].as_f64().unwrap_or(1.0),
        })
    }
}

#[async_trait]
impl PageAdapter for ChromiumPage {
    async fn apply_fingerprint(&mut self, fingerprint: &Fingerprint) -> BotResult<()> {
        if let Some(ua) = &fingerprint.user_agent {
            self.page
                .execute(SetUserAgentOverrideParams::new(ua.clone()))
                .await
                .map_err(cdp_err("user agent override failed"))?;
        }

        let vp = fingerprint.viewport;
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(vp.width))
            .height(i64::from(vp.height))
            .device_scale_factor(vp.scale)
            .mobile(false)
            .build()
            .map_err(build_err)?;
        self.page
            .execute(metrics)
            .await
            .map_err(cdp_err("viewport override failed"))?;
        self.viewport = Some(vp);

        if let Some(tz) = &fingerprint.timezone {
            self.page
                .execute(SetTimezoneOverrideParams::new(tz.clone()))
                .await
                .map_err(cdp_err("timezone override failed"))?;
        }

        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
            .await
            .map_err(cdp_err("init script failed"))?;

        tracing::debug!(
            width = vp.width,
            height = vp.height,
            timezone = fingerprint.timezone.as_deref().unwrap_or("-"),
            "fingerprint applied"
        );
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> BotResult<()> {
        self.elements.clear();
        self.focused = None;

        match tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(BotError::navigation(url, e)),
            Err(_) => {
                return Err(BotError::navigation(
                    url,
                    format!("timed out after {}s", NAVIGATION_TIMEOUT.as_secs()),
                ))
            }
        }
        if let Err(e) = self.page.wait_for_navigation().await {
            tracing::debug!(url, "wait for navigation: {e}");
        }
        Ok(())
    }

    async fn find_element(&mut self, selector: &str, timeout: Duration) -> BotResult<ElementRef> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.query_all(selector).await?.into_iter().next() {
                return Ok(self.register(element));
            }
            if !poll_pause(&self.cancel, deadline).await? {
                return Err(BotError::not_found(selector));
            }
        }
    }

    async fn find_elements(&mut self, selector: &str) -> BotResult<Vec<ElementRef>> {
        let found = self.query_all(selector).await?;
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn click(&mut self, element: &ElementRef) -> BotResult<()> {
        let bbox = self.bounding_box(element).await?;
        let (cx, cy) = self.pointer;
        let inside = cx >= bbox.x && cx <= bbox.x + bbox.width && cy >= bbox.y && cy <= bbox.y + bbox.height;
        let (x, y) = if inside { (cx, cy) } else { bbox.center() };

        self.mouse(DispatchMouseEventType::MousePressed, x, y).await?;
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.mouse(DispatchMouseEventType::MouseReleased, x, y).await?;
        self.pointer = (x, y);
        self.focused = Some(element.0);
        Ok(())
    }

    async fn type_char(&mut self, element: &ElementRef, ch: char) -> BotResult<()> {
        self.focus(element).await?;
        let params = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text(ch.to_string())
            .build()
            .map_err(build_err)?;
        self.page
            .execute(params)
            .await
            .map_err(cdp_err("typing failed"))?;
        Ok(())
    }

    async fn press_backspace(&mut self, element: &ElementRef) -> BotResult<()> {
        self.focus(element).await?;
        self.key(DispatchKeyEventType::KeyDown, "Backspace", "Backspace", 8).await?;
        self.key(DispatchKeyEventType::KeyUp, "Backspace", "Backspace", 8).await
    }

    async fn clear(&mut self, element: &ElementRef) -> BotResult<()> {
        self.element(element)?
            .call_js_fn(CLEAR_FIELD, false)
            .await
            .map_err(cdp_err("clear failed"))?;
        Ok(())
    }

    async fn scroll(&mut self, dy: f64, steps: u32) -> BotResult<()> {
        let steps = steps.max(1);
        let per_step = dy / f64::from(steps);
        let (x, y) = self.pointer;
        for _ in 0..steps {
            let params = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseWheel)
                .x(x)
                .y(y)
                .delta_x(0.0)
                .delta_y(per_step)
                .build()
                .map_err(build_err)?;
            self.page
                .execute(params)
                .await
                .map_err(cdp_err("wheel event failed"))?;
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
        Ok(())
    }

    async fn move_pointer(&mut self, x: f64, y: f64) -> BotResult<()> {
        self.mouse(DispatchMouseEventType::MouseMoved, x, y).await?;
        self.pointer = (x, y);
        Ok(())
    }

    async fn read_text(&mut self, element: &ElementRef) -> BotResult<String> {
        let text = self
            .element(element)?
            .inner_text()
            .await
            .map_err(cdp_err("read text failed"))?;
        Ok(text.unwrap_or_default())
    }

    async fn read_attribute(&mut self, element: &ElementRef, name: &str) -> BotResult<Option<String>> {
        self.element(element)?
            .attribute(name)
            .await
            .map_err(cdp_err("read attribute failed"))
    }

    async fn bounding_box(&mut self, element: &ElementRef) -> BotResult<BoundingBox> {
        let el = self.element(element)?;
        if let Err(e) = el.scroll_into_view().await {
            tracing::debug!("scroll into view: {e}");
        }
        let bbox = el.bounding_box().await.map_err(cdp_err("bounding box failed"))?;
        Ok(BoundingBox {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        })
    }

    async fn viewport(&mut self) -> BotResult<Viewport> {
        if let Some(vp) = self.viewport {
            return Ok(vp);
        }
        let vp = self.measure_viewport().await?;
        self.viewport = Some(vp);
        Ok(vp)
    }

    async fn current_url(&mut self) -> BotResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(cdp_err("failed to get URL"))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn cookies(&mut self) -> BotResult<Vec<Cookie>> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(cdp_err("cookie read failed"))?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
            })
            .collect())
    }

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> BotResult<()> {
        let params = cookies
            .iter()
            .map(|c| {
                let mut builder = CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .path(c.path.clone());
                if !c.domain.is_empty() {
                    builder = builder.domain(c.domain.clone());
                }
                builder.build().map_err(build_err)
            })
            .collect::<BotResult<Vec<_>>>()?;
        self.page
            .set_cookies(params)
            .await
            .map_err(cdp_err("cookie write failed"))?;
        Ok(())
    }

    async fn close(&mut self) -> BotResult<()> {
        self.elements.clear();
        self.page
            .clone()
            .close()
            .await
            .map_err(cdp_err("page close failed"))
    }
}
