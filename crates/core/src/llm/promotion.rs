use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Share of watches flagged for visual emphasis.
pub const DEFAULT_PROMOTION_PROBABILITY: f64 = 0.15;

/// Decides, one watch at a time, whether a recommendation gets the promoted badge.
pub trait PromotionSource: Send + Sync {
    fn draw(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct RandomPromotion {
    probability: f64,
}

impl RandomPromotion {
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Default for RandomPromotion {
    fn default() -> Self {
        Self::new(DEFAULT_PROMOTION_PROBABILITY)
    }
}

impl PromotionSource for RandomPromotion {
    fn draw(&self) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}

/// Always answers the same thing.
#[derive(Debug, Clone, Copy)]
pub struct FixedPromotion(pub bool);

impl PromotionSource for FixedPromotion {
    fn draw(&self) -> bool {
        self.0
    }
}

/// Replays a scripted series of draws, then answers `false`.
#[derive(Debug, Default)]
pub struct SequencePromotion {
    draws: Mutex<VecDeque<bool>>,
}

impl SequencePromotion {
    pub fn new(draws: impl IntoIterator<Item = bool>) -> Self {
        Self {
            draws: Mutex::new(draws.into_iter().collect()),
        }
    }
}

impl PromotionSource for SequencePromotion {
    fn draw(&self) -> bool {
        match self.draws.lock() {
            Ok(mut draws) => draws.pop_front().unwrap_or(false),
            Err(poisoned) => poisoned.into_inner().pop_front().unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_is_clamped() {
        assert_eq!(RandomPromotion::new(2.0).probability(), 1.0);
        assert_eq!(RandomPromotion::new(-1.0).probability(), 0.0);
        assert_eq!(RandomPromotion::new(f64::NAN).probability(), 0.0);
    }

    #[test]
    fn extreme_probabilities_are_deterministic() {
        let never = RandomPromotion::new(0.0);
        let always = RandomPromotion::new(1.0);
        for _ in 0..100 {
            assert!(!never.draw());
            assert!(always.draw());
        }
    }

    #[test]
    fn default_rate_is_roughly_fifteen_percent() {
        let source = RandomPromotion::default();
        let hits = (0..20_000).filter(|_| source.draw()).count();
        // 15% of 20k is 3000; the bounds sit well outside normal variance.
        assert!((2_400..=3_600).contains(&hits), "hits={hits}");
    }

    #[test]
    fn sequence_falls_back_to_false() {
        let source = SequencePromotion::new([true, true]);
        assert!(source.draw());
        assert!(source.draw());
        assert!(!source.draw());
    }
}
