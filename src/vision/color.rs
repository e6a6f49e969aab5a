//! Colour bands and coverage statistics
//!
//! Frames are converted once to 8-bit HSV (hue 0-179, saturation and
//! value 0-255, the layout most hand-tuned colour tables use) and every
//! band is an inclusive per-channel range in that space. Hue ranges do not
//! wrap; a red that straddles 0 needs two bands.

use image::{GrayImage, ImageBuffer, Luma, Rgb};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Frame;

/// Mask value for pixels inside a band
pub const MASK_ON: u8 = 255;

/// Largest hue value produced by [`rgb_to_hsv`]
pub const HUE_MAX: u8 = 180;

/// Convert one RGB pixel to 8-bit HSV
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    let mut hue = (hue / 2.0).round() as u8;
    if hue >= HUE_MAX {
        hue = 0;
    }

    [hue, saturation.round() as u8, max as u8]
}

/// A named inclusive HSV range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    pub name: String,
    /// Lower bound (h, s, v)
    pub lower: [u8; 3],
    /// Upper bound (h, s, v)
    pub upper: [u8; 3],
}

impl ColorBand {
    pub fn new(name: &str, lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            lower,
            upper,
        }
    }

    /// Whether an HSV pixel lies inside the band on every channel
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }

    /// Check the bounds are ordered and the hue fits the 0-180 scale
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("colour band with empty name".to_string());
        }
        if (0..3).any(|c| self.lower[c] > self.upper[c]) {
            return Err(format!(
                "band '{}' has lower bound {:?} above upper bound {:?}",
                self.name, self.lower, self.upper
            ));
        }
        if self.upper[0] > HUE_MAX {
            return Err(format!(
                "band '{}' hue upper bound {} exceeds {}",
                self.name, self.upper[0], HUE_MAX
            ));
        }
        Ok(())
    }
}

/// The set of named bands known to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorCatalog {
    bands: Vec<ColorBand>,
}

impl ColorCatalog {
    pub fn new(bands: Vec<ColorBand>) -> Self {
        Self { bands }
    }

    /// Look up a band by name
    pub fn get(&self, name: &str) -> Option<&ColorBand> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColorBand> {
        self.bands.iter()
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Bands for the given names, skipping unknown ones
    pub fn select<'a>(&'a self, names: &[&str]) -> Vec<&'a ColorBand> {
        names.iter().filter_map(|name| self.get(name)).collect()
    }

    /// Validate every band and reject duplicate names
    pub fn validate(&self) -> Result<(), String> {
        for (idx, band) in self.bands.iter().enumerate() {
            band.validate()?;
            if self.bands[..idx].iter().any(|b| b.name == band.name) {
                return Err(format!("duplicate colour band '{}'", band.name));
            }
        }
        Ok(())
    }
}

impl Default for ColorCatalog {
    fn default() -> Self {
        Self::new(vec![
            ColorBand::new(bands::MENU_BACKGROUND, [0, 0, 200], [180, 30, 255]),
            ColorBand::new(bands::MENU_BLUE, [90, 20, 100], [120, 200, 255]),
            ColorBand::new(bands::ROAD_GRAY, [0, 0, 40], [180, 30, 120]),
            ColorBand::new(bands::GRASS_GREEN, [35, 40, 40], [85, 255, 255]),
            ColorBand::new(bands::WATER_BLUE, [90, 50, 50], [110, 255, 255]),
            ColorBand::new(bands::BUILDING_RED, [0, 120, 120], [10, 255, 255]),
            ColorBand::new(bands::UI_ELEMENTS, [0, 0, 180], [180, 50, 255]),
            ColorBand::new(bands::ACCENT_YELLOW, [15, 50, 100], [35, 255, 255]),
            ColorBand::new(bands::ACCENT_ORANGE, [10, 50, 100], [25, 255, 255]),
            ColorBand::new(bands::PLAY_BUTTON, [60, 20, 60], [110, 255, 255]),
            ColorBand::new(bands::CITY_SELECTION, [90, 30, 100], [120, 200, 255]),
        ])
    }
}

/// Names of the built-in bands
pub mod bands {
    pub const MENU_BACKGROUND: &str = "menu_background";
    pub const MENU_BLUE: &str = "menu_blue";
    pub const ROAD_GRAY: &str = "road_gray";
    pub const GRASS_GREEN: &str = "grass_green";
    pub const WATER_BLUE: &str = "water_blue";
    pub const BUILDING_RED: &str = "building_red";
    pub const UI_ELEMENTS: &str = "ui_elements";
    pub const ACCENT_YELLOW: &str = "accent_yellow";
    pub const ACCENT_ORANGE: &str = "accent_orange";
    pub const PLAY_BUTTON: &str = "play_button";
    pub const CITY_SELECTION: &str = "city_selection";
}

/// Fraction of a frame's pixels inside each requested band
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorCoverage {
    fractions: BTreeMap<String, f64>,
}

impl ColorCoverage {
    /// Coverage of a band; bands that were not measured count as 0.0
    pub fn get(&self, name: &str) -> f64 {
        self.fractions.get(name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fractions.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fractions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }
}

/// A frame converted to HSV
pub struct HsvFrame {
    hsv: ImageBuffer<Rgb<u8>, Vec<u8>>,
}

impl HsvFrame {
    pub fn from_frame(frame: &Frame) -> Self {
        let rgb = frame.image();
        let hsv = ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
            Rgb(rgb_to_hsv(rgb.get_pixel(x, y).0))
        });
        Self { hsv }
    }

    pub fn width(&self) -> u32 {
        self.hsv.width()
    }

    pub fn height(&self) -> u32 {
        self.hsv.height()
    }

    /// HSV value at a pixel
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.hsv.get_pixel(x, y).0
    }

    /// Binary mask, [`MASK_ON`] where the pixel is inside the band
    pub fn mask(&self, band: &ColorBand) -> GrayImage {
        ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
            if band.contains(self.pixel(x, y)) {
                Luma([MASK_ON])
            } else {
                Luma([0])
            }
        })
    }

    /// Number of pixels inside the band
    pub fn count(&self, band: &ColorBand) -> u64 {
        self.hsv.pixels().filter(|p| band.contains(p.0)).count() as u64
    }

    /// Coverage fraction for each band
    pub fn coverage<'a, I>(&self, bands: I) -> ColorCoverage
    where
        I: IntoIterator<Item = &'a ColorBand>,
    {
        let total = self.width() as u64 * self.height() as u64;
        let fractions = bands
            .into_iter()
            .map(|band| {
                let fraction = if total == 0 {
                    0.0
                } else {
                    self.count(band) as f64 / total as f64
                };
                (band.name.clone(), fraction)
            })
            .collect();
        ColorCoverage { fractions }
    }
}

/// Convert `frame` and measure the coverage of `bands`
pub fn coverage<'a, I>(frame: &Frame, bands: I) -> ColorCoverage
where
    I: IntoIterator<Item = &'a ColorBand>,
{
    HsvFrame::from_frame(frame).coverage(bands)
}
