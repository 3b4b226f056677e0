//! Character-by-character typing with backspace-and-retype corrections.
//!
//! The "typo" is never a wrong glyph: a correction deletes the character
//! just typed and types it again.

use rand::Rng;

const CORRECTION_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    Char { ch: char, delay_ms: u64 },
    Backspace { delay_ms: u64 },
}

pub fn plan_typing<R: Rng + ?Sized>(rng: &mut R, text: &str) -> Vec<Keystroke> {
    let mut keys = Vec::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        keys.push(Keystroke::Char {
            ch,
            delay_ms: rng.gen_range(60..=180),
        });
        if rng.gen_bool(CORRECTION_PROBABILITY) {
            keys.push(Keystroke::Backspace {
                delay_ms: rng.gen_range(80..=200),
            });
            keys.push(Keystroke::Char {
                ch,
                delay_ms: rng.gen_range(60..=180),
            });
        }
    }
    keys
}

/// The text an input would hold after receiving `keys`.
pub fn replay(keys: &[Keystroke]) -> String {
    let mut out = String::new();
    for key in keys {
        match key {
            Keystroke::Char { ch, .. } => out.push(*ch),
            Keystroke::Backspace { .. } => {
                out.pop();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_typing_preserves_text() {
        let mut rng = StdRng::seed_from_u64(8);
        let samples = [
            "",
            "a",
            "Hi Ada, saw your work at Analytical Engines, would love to connect!",
            "pässwörd-with-ünïcode ✓",
        ];
        for text in samples {
            for _ in 0..50 {
                let keys = plan_typing(&mut rng, text);
                assert_eq!(replay(&keys), text);
            }
        }
    }

    #[test]
    fn test_corrections_retype_same_char() {
        let mut rng = StdRng::seed_from_u64(21);
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(8);
        let keys = plan_typing(&mut rng, &text);
        let mut corrections = 0;
        for w in keys.windows(3) {
            if let [Keystroke::Char { ch: a, .. }, Keystroke::Backspace { delay_ms }, Keystroke::Char { ch: b, .. }] = w {
                assert_eq!(a, b);
                assert!((80..=200).contains(delay_ms));
                corrections += 1;
            }
        }
        assert!(corrections > 0);
        // no backspace ever starts the stream or follows another backspace
        assert!(!matches!(keys.first(), Some(Keystroke::Backspace { .. })));
        for w in keys.windows(2) {
            assert!(!matches!(w, [Keystroke::Backspace { .. }, Keystroke::Backspace { .. }]));
        }
    }
}
