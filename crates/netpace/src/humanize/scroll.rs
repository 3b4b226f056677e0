//! Natural scroll bursts with occasional reversals.

use rand::Rng;

/// One wheel burst and the quiet period after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollBurst {
    pub dy: f64,
    pub steps: u32,
    pub pause_ms: u64,
}

/// 3–6 bursts of 400–800 px. Every other burst has an even chance of
/// being a half-magnitude scroll back up instead.
pub fn plan_scroll<R: Rng + ?Sized>(rng: &mut R, scroll_pause_ms: u64) -> Vec<ScrollBurst> {
    let count = rng.gen_range(3..=6);
    (0..count)
        .map(|i| {
            let magnitude = rng.gen_range(400.0..=800.0);
            let dy = if i % 2 == 1 && rng.gen_bool(0.5) {
                -magnitude / 2.0
            } else {
                magnitude
            };
            ScrollBurst {
                dy,
                steps: rng.gen_range(10..=15),
                pause_ms: rng.gen_range(scroll_pause_ms..=scroll_pause_ms + 500),
            }
        })
        .collect()
}
