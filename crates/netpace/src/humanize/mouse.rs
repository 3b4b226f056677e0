//! Curved pointer paths and idle wandering.

use rand::Rng;

use crate::page::Viewport;

const MIN_CURVE_STEPS: usize = 12;
const MAX_CURVE_STEPS: usize = 22;
const OVERSHOOT_PX: f64 = 6.0;
const CORRECTION_PX: f64 = 1.5;
const CORRECTIONS: usize = 3;

/// One pointer-moved event followed by a pause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerStep {
    pub x: f64,
    pub y: f64,
    pub delay_ms: u64,
}

/// A complete humanized move toward a target.
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub origin: (f64, f64),
    pub control: (f64, f64),
    pub overshoot: (f64, f64),
    /// Number of steps on the Bézier segment, excluding the origin event.
    pub curve_steps: usize,
    /// Origin, curve, micro-corrections, then the exact target.
    pub steps: Vec<PointerStep>,
}

fn quad_bezier(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    (
        u * u * p0.0 + 2.0 * u * t * p1.0 + t * t * p2.0,
        u * u * p0.1 + 2.0 * u * t * p1.1 + t * t * p2.1,
    )
}

/// Plan a move from a random upper-left origin to `target`, overshooting
/// slightly and settling on the exact target.
pub fn plan_move<R: Rng + ?Sized>(rng: &mut R, target: (f64, f64)) -> MovePlan {
    let origin = (rng.gen_range(100.0..300.0), rng.gen_range(80.0..230.0));
    let overshoot = (
        target.0 + rng.gen_range(-OVERSHOOT_PX..=OVERSHOOT_PX),
        target.1 + rng.gen_range(-OVERSHOOT_PX..=OVERSHOOT_PX),
    );
    // Horizontal midpoint, vertically pulled most of the way toward the target.
    let control = (
        (origin.0 + overshoot.0) / 2.0,
        origin.1 + (overshoot.1 - origin.1) * 0.6,
    );

    let curve_steps = rng.gen_range(MIN_CURVE_STEPS..=MAX_CURVE_STEPS);
    let mut steps = Vec::with_capacity(curve_steps + CORRECTIONS + 2);
    steps.push(PointerStep {
        x: origin.0,
        y: origin.1,
        delay_ms: rng.gen_range(12..=28),
    });
    for i in 1..=curve_steps {
        let t = i as f64 / curve_steps as f64;
        let (x, y) = quad_bezier(origin, control, overshoot, t);
        steps.push(PointerStep {
            x,
            y,
            delay_ms: rng.gen_range(12..=28),
        });
    }

    for _ in 0..CORRECTIONS {
        steps.push(PointerStep {
            x: target.0 + rng.gen_range(-CORRECTION_PX..=CORRECTION_PX),
            y: target.1 + rng.gen_range(-CORRECTION_PX..=CORRECTION_PX),
            delay_ms: rng.gen_range(20..=50),
        });
    }

    steps.push(PointerStep {
        x: target.0,
        y: target.1,
        delay_ms: 0,
    });

    MovePlan {
        origin,
        control,
        overshoot,
        curve_steps,
        steps,
    }
}

/// Random drift inside the central 80% of the viewport.
pub fn plan_wander<R: Rng + ?Sized>(rng: &mut R, viewport: Viewport) -> Vec<PointerStep> {
    let (w, h) = (viewport.width as f64, viewport.height as f64);
    let count = rng.gen_range(5..=9);
    (0..count)
        .map(|_| PointerStep {
            x: w * 0.1 + rng.gen::<f64>() * w * 0.8,
            y: h * 0.1 + rng.gen::<f64>() * h * 0.8,
            delay_ms: rng.gen_range(80..=240),
        })
        .collect()
}
