//! Humanized input: pointer motion, scrolling and typing.
//!
//! The submodules synthesize plans as plain data from an RNG; [`Humanizer`]
//! replays them through a [`PageAdapter`] with the planned pauses.

pub mod mouse;
pub mod scroll;
pub mod typing;

use std::sync::Arc;

use crate::error::BotResult;
use crate::page::{ElementRef, PageAdapter};
use crate::timing::Pacer;

pub use mouse::{plan_move, plan_wander, MovePlan, PointerStep};
pub use scroll::{plan_scroll, ScrollBurst};
pub use typing::{plan_typing, replay, Keystroke};

const CLICK_AIM_JITTER_PX: f64 = 3.0;

pub struct Humanizer {
    pacer: Arc<Pacer>,
    scroll_pause_ms: u64,
}

impl Humanizer {
    pub fn new(pacer: Arc<Pacer>, scroll_pause_ms: u64) -> Self {
        Self {
            pacer,
            scroll_pause_ms,
        }
    }

    pub fn pacer(&self) -> &Arc<Pacer> {
        &self.pacer
    }

    async fn emit(&self, page: &mut dyn PageAdapter, steps: &[PointerStep]) -> BotResult<()> {
        for step in steps {
            page.move_pointer(step.x, step.y).await?;
            if step.delay_ms > 0 {
                self.pacer.sleep_ms(step.delay_ms).await?;
            }
        }
        Ok(())
    }

    /// Curved move ending exactly on `(x, y)`.
    pub async fn move_to(&self, page: &mut dyn PageAdapter, x: f64, y: f64) -> BotResult<()> {
        let plan = self.pacer.with_rng(|r| plan_move(r, (x, y)));
        self.emit(page, &plan.steps).await
    }

    /// Idle drift over the current viewport.
    pub async fn wander(&self, page: &mut dyn PageAdapter) -> BotResult<()> {
        let viewport = page.viewport().await?;
        let steps = self.pacer.with_rng(|r| plan_wander(r, viewport));
        self.emit(page, &steps).await
    }

    pub async fn scroll(&self, page: &mut dyn PageAdapter) -> BotResult<()> {
        let bursts = self.pacer.with_rng(|r| plan_scroll(r, self.scroll_pause_ms));
        for burst in bursts {
            page.scroll(burst.dy, burst.steps).await?;
            self.pacer.sleep_ms(burst.pause_ms).await?;
        }
        Ok(())
    }

    /// Type `text` one character at a time, with occasional corrections.
    pub async fn type_text(&self, page: &mut dyn PageAdapter, element: &ElementRef, text: &str) -> BotResult<()> {
        let keys = self.pacer.with_rng(|r| plan_typing(r, text));
        for key in keys {
            match key {
                Keystroke::Char { ch, delay_ms } => {
                    page.type_char(element, ch).await?;
                    self.pacer.sleep_ms(delay_ms).await?;
                }
                Keystroke::Backspace { delay_ms } => {
                    page.press_backspace(element).await?;
                    self.pacer.sleep_ms(delay_ms).await?;
                }
            }
        }
        Ok(())
    }

    /// Move near the element's center, dwell, then click.
    pub async fn click(&self, page: &mut dyn PageAdapter, element: &ElementRef) -> BotResult<()> {
        let (cx, cy) = page.bounding_box(element).await?.center();
        let x = cx + self.pacer.uniform(-CLICK_AIM_JITTER_PX, CLICK_AIM_JITTER_PX);
        let y = cy + self.pacer.uniform(-CLICK_AIM_JITTER_PX, CLICK_AIM_JITTER_PX);
        self.move_to(page, x, y).await?;
        self.pacer.sleep_between(150, 350).await?;
        page.click(element).await
    }
}
