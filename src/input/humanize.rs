//! Click humanization
//!
//! Adds small, centre-weighted offsets to click positions and variance to
//! fixed delays so repeated clicks do not land on the exact same pixel at
//! the exact same rhythm.

use rand::Rng;

use crate::config::HumanizeSettings;
use crate::geometry::{ScreenPoint, WindowRect};

/// Delays never drop below this after variance is applied
const MIN_DELAY_MS: u64 = 20;

/// Generates jittered click positions and delays
pub struct Humanizer {
    rng: rand::rngs::ThreadRng,
    settings: HumanizeSettings,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new(HumanizeSettings::default())
    }
}

impl Humanizer {
    pub fn new(settings: HumanizeSettings) -> Self {
        Self {
            rng: rand::thread_rng(),
            settings,
        }
    }

    /// Jitter a click position, keeping it inside `within`
    pub fn click_position(&mut self, point: ScreenPoint, within: &WindowRect) -> ScreenPoint {
        if !self.settings.enabled || within.is_empty() {
            return point;
        }

        let (dx, dy) = self.humanize_position(self.settings.position_offset_max);
        let x = (point.x as i64 + dx as i64).clamp(within.x as i64, within.right() - 1);
        let y = (point.y as i64 + dy as i64).clamp(within.y as i64, within.bottom() - 1);
        ScreenPoint::new(x as i32, y as i32)
    }

    /// Random (dx, dy) offset, each within `max_offset`
    pub fn humanize_position(&mut self, max_offset: i32) -> (i32, i32) {
        if max_offset <= 0 {
            return (0, 0);
        }
        (self.gaussian_offset(max_offset), self.gaussian_offset(max_offset))
    }

    // Sum of three uniforms, close enough to a bell curve
    fn gaussian_offset(&mut self, max_offset: i32) -> i32 {
        let sum: f32 = (0..3).map(|_| self.rng.gen::<f32>() - 0.5).sum();
        (sum * max_offset as f32 * 0.67) as i32
    }

    /// Apply the configured percentage variance to a delay
    pub fn delay(&mut self, base_ms: u64) -> u64 {
        if !self.settings.enabled {
            return base_ms;
        }
        self.humanize_delay(base_ms, self.settings.timing_variance_percent)
    }

    pub fn humanize_delay(&mut self, base_ms: u64, variance_percent: u32) -> u64 {
        if variance_percent == 0 || base_ms == 0 {
            return base_ms;
        }

        let variance = (base_ms as f64 * variance_percent.min(100) as f64 / 100.0) as i64;
        let offset = self.rng.gen_range(-variance..=variance);
        (base_ms as i64 + offset).max(MIN_DELAY_MS as i64) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(max_offset: i32) -> Humanizer {
        Humanizer::new(HumanizeSettings {
            enabled: true,
            position_offset_max: max_offset,
            timing_variance_percent: 30,
        })
    }

    #[test]
    fn test_offsets_are_bounded() {
        let mut humanizer = enabled(10);
        for _ in 0..200 {
            let (x, y) = humanizer.humanize_position(10);
            assert!((-10..=10).contains(&x));
            assert!((-10..=10).contains(&y));
        }
    }

    #[test]
    fn test_jitter_stays_inside_window() {
        let mut humanizer = enabled(50);
        let rect = WindowRect::new(-1920, 0, 40, 40);
        for _ in 0..200 {
            let point = humanizer.click_position(ScreenPoint::new(-1920, 39), &rect);
            assert!(rect.contains(point));
        }
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut humanizer = Humanizer::new(HumanizeSettings {
            enabled: false,
            ..Default::default()
        });
        let rect = WindowRect::new(0, 0, 100, 100);
        let point = ScreenPoint::new(42, 17);

        assert_eq!(humanizer.click_position(point, &rect), point);
        assert_eq!(humanizer.delay(500), 500);
    }

    #[test]
    fn test_delay_variance_is_bounded() {
        let mut humanizer = enabled(3);
        for _ in 0..500 {
            let delay = humanizer.humanize_delay(500, 30);
            assert!((350..=650).contains(&delay));
        }
        assert_eq!(humanizer.humanize_delay(500, 0), 500);
    }
}
