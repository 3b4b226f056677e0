//! Scripted in-memory page.
//!
//! Elements are placed per URL (or on every URL) ahead of time; clicks can
//! reveal new elements or install cookies, which is enough to script login
//! outcomes and profile pages. Every call is appended to [`FakePage::events`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use super::{BoundingBox, ElementRef, Fingerprint, PageAdapter, Viewport};
use crate::cookies::Cookie;
use crate::error::{BotError, BotResult};

/// An element the fake can hand out.
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub selector: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub bbox: BoundingBox,
}

impl FakeElement {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text: String::new(),
            attributes: HashMap::new(),
            bbox: BoundingBox {
                x: 600.0,
                y: 320.0,
                width: 96.0,
                height: 32.0,
            },
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bbox = BoundingBox { x, y, width, height };
        self
    }
}

/// What happens after an element matching a selector is clicked.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Make the element present on every URL from now on.
    Reveal(FakeElement),
    /// Replace the page's cookie jar.
    SetCookies(Vec<Cookie>),
}

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeEvent {
    Fingerprint(Fingerprint),
    Navigate(String),
    PointerMoved(f64, f64),
    Click(String),
    Key(char),
    Backspace,
    Clear(String),
    Scroll(f64, u32),
    SetCookies(usize),
    Close,
}

#[derive(Debug, Default)]
pub struct FakePage {
    per_url: HashMap<String, Vec<FakeElement>>,
    everywhere: Vec<FakeElement>,
    on_click: HashMap<String, Vec<ClickEffect>>,
    after_cookies: Vec<FakeElement>,
    failing_urls: HashSet<String>,
    broken_scroll_urls: HashSet<String>,
    issued: HashMap<u64, FakeElement>,
    next_id: u64,
    url: String,
    jar: Vec<Cookie>,
    typed: HashMap<String, String>,
    viewport: Viewport,
    pub events: Vec<FakeEvent>,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            url: "about:blank".to_string(),
            ..Self::default()
        }
    }

    /// Place an element on one URL.
    pub fn place(&mut self, url: &str, element: FakeElement) -> &mut Self {
        self.per_url.entry(url.to_string()).or_default().push(element);
        self
    }

    /// Place an element on every URL.
    pub fn place_everywhere(&mut self, element: FakeElement) -> &mut Self {
        self.everywhere.push(element);
        self
    }

    pub fn on_click(&mut self, selector: &str, effect: ClickEffect) -> &mut Self {
        self.on_click.entry(selector.to_string()).or_default().push(effect);
        self
    }

    /// Reveal `element` everywhere once a non-empty cookie set is installed.
    pub fn reveal_after_cookies(&mut self, element: FakeElement) -> &mut Self {
        self.after_cookies.push(element);
        self
    }

    pub fn fail_navigation(&mut self, url: &str) -> &mut Self {
        self.failing_urls.insert(url.to_string());
        self
    }

    /// Scrolling on `url` fails with a transport error.
    pub fn fail_scroll(&mut self, url: &str) -> &mut Self {
        self.broken_scroll_urls.insert(url.to_string());
        self
    }

    /// Text accumulated in elements matching `selector` since the last
    /// navigation.
    pub fn typed_text(&self, selector: &str) -> String {
        self.typed.get(selector).cloned().unwrap_or_default()
    }

    pub fn navigations(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FakeEvent::Navigate(url) => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clicks_on(&self, selector: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, FakeEvent::Click(s) if s == selector))
            .count()
    }

    pub fn pointer_path(&self) -> Vec<(f64, f64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FakeEvent::PointerMoved(x, y) => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    fn matches(&self, selector: &str) -> Vec<FakeElement> {
        self.per_url
            .get(&self.url)
            .into_iter()
            .flatten()
            .chain(self.everywhere.iter())
            .filter(|el| el.selector == selector)
            .cloned()
            .collect()
    }

    fn issue(&mut self, element: FakeElement) -> ElementRef {
        self.next_id += 1;
        self.issued.insert(self.next_id, element);
        ElementRef(self.next_id)
    }

    fn resolve(&self, element: &ElementRef) -> BotResult<&FakeElement> {
        self.issued
            .get(&element.0)
            .ok_or_else(|| BotError::Browser(format!("stale element handle {}", element.0)))
    }
}

#[async_trait]
impl PageAdapter for FakePage {
    async fn apply_fingerprint(&mut self, fingerprint: &Fingerprint) -> BotResult<()> {
        self.viewport = fingerprint.viewport;
        self.events.push(FakeEvent::Fingerprint(fingerprint.clone()));
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> BotResult<()> {
        self.events.push(FakeEvent::Navigate(url.to_string()));
        if self.failing_urls.contains(url) {
            return Err(BotError::navigation(url, "scripted failure"));
        }
        self.url = url.to_string();
        self.typed.clear();
        Ok(())
    }

    async fn find_element(&mut self, selector: &str, _timeout: Duration) -> BotResult<ElementRef> {
        match self.matches(selector).into_iter().next() {
            Some(el) => Ok(self.issue(el)),
            None => Err(BotError::not_found(selector)),
        }
    }

    async fn find_elements(&mut self, selector: &str) -> BotResult<Vec<ElementRef>> {
        let found = self.matches(selector);
        Ok(found.into_iter().map(|el| self.issue(el)).collect())
    }

    async fn click(&mut self, element: &ElementRef) -> BotResult<()> {
        let selector = self.resolve(element)?.selector.clone();
        self.events.push(FakeEvent::Click(selector.clone()));
        for effect in self.on_click.get(&selector).cloned().unwrap_or_default() {
            match effect {
                ClickEffect::Reveal(el) => self.everywhere.push(el),
                ClickEffect::SetCookies(cookies) => self.jar = cookies,
            }
        }
        Ok(())
    }

    async fn type_char(&mut self, element: &ElementRef, ch: char) -> BotResult<()> {
        let selector = self.resolve(element)?.selector.clone();
        self.typed.entry(selector).or_default().push(ch);
        self.events.push(FakeEvent::Key(ch));
        Ok(())
    }

    async fn press_backspace(&mut self, element: &ElementRef) -> BotResult<()> {
        let selector = self.resolve(element)?.selector.clone();
        self.typed.entry(selector).or_default().pop();
        self.events.push(FakeEvent::Backspace);
        Ok(())
    }

    async fn clear(&mut self, element: &ElementRef) -> BotResult<()> {
        let selector = self.resolve(element)?.selector.clone();
        self.typed.remove(&selector);
        self.events.push(FakeEvent::Clear(selector));
        Ok(())
    }

    async fn scroll(&mut self, dy: f64, steps: u32) -> BotResult<()> {
        if self.broken_scroll_urls.contains(&self.url) {
            return Err(BotError::Browser("wheel event failed: scripted failure".into()));
        }
        self.events.push(FakeEvent::Scroll(dy, steps));
        Ok(())
    }

    async fn move_pointer(&mut self, x: f64, y: f64) -> BotResult<()> {
        self.events.push(FakeEvent::PointerMoved(x, y));
        Ok(())
    }

    async fn read_text(&mut self, element: &ElementRef) -> BotResult<String> {
        Ok(self.resolve(element)?.text.clone())
    }

    async fn read_attribute(&mut self, element: &ElementRef, name: &str) -> BotResult<Option<String>> {
        Ok(self.resolve(element)?.attributes.get(name).cloned())
    }

    async fn bounding_box(&mut self, element: &ElementRef) -> BotResult<BoundingBox> {
        Ok(self.resolve(element)?.bbox)
    }

    async fn viewport(&mut self) -> BotResult<Viewport> {
        Ok(self.viewport)
    }

    async fn current_url(&mut self) -> BotResult<String> {
        Ok(self.url.clone())
    }

    async fn cookies(&mut self) -> BotResult<Vec<Cookie>> {
        Ok(self.jar.clone())
    }

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> BotResult<()> {
        self.events.push(FakeEvent::SetCookies(cookies.len()));
        self.jar = cookies.to_vec();
        if !cookies.is_empty() {
            let revealed = std::mem::take(&mut self.after_cookies);
            self.everywhere.extend(revealed);
        }
        Ok(())
    }

    async fn close(&mut self) -> BotResult<()> {
        self.events.push(FakeEvent::Close);
        Ok(())
    }
}
