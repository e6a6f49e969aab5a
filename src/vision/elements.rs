//! UI element detection
//!
//! Finds clickable elements (play button, city tiles, menu buttons) as
//! connected blobs of a single colour band, filtered by size and by where
//! they are expected to sit on screen.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::color::{bands, ColorCatalog, HsvFrame};
use super::{Frame, FrameInfo};
use crate::geometry::{BoundingBox, FramePoint};

/// Element type names used by the default catalog
pub mod kinds {
    pub const PLAY_BUTTON: &str = "play_button";
    pub const CITY_SELECTION: &str = "city_selection";
    pub const MENU_BUTTON: &str = "menu_button";
}

/// Coarse screen region an element is expected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenPosition {
    Center,
    CenterBottom,
    TopLeft,
    TopRight,
    Anywhere,
}

impl ScreenPosition {
    /// Whether `point` lies in this region of a `width` x `height` frame
    pub fn accepts(&self, point: FramePoint, width: u32, height: u32) -> bool {
        let (x, y) = (point.x as i64, point.y as i64);
        let (w, h) = (width as i64, height as i64);

        match self {
            ScreenPosition::Center => (x - w / 2).abs() < w / 3 && (y - h / 2).abs() < h / 3,
            ScreenPosition::CenterBottom => {
                (x - w / 2).abs() < w / 2 && y as f64 > 0.7 * h as f64
            }
            ScreenPosition::TopLeft => (x as f64) < 0.3 * w as f64 && (y as f64) < 0.3 * h as f64,
            ScreenPosition::TopRight => x as f64 > 0.7 * w as f64 && (y as f64) < 0.3 * h as f64,
            ScreenPosition::Anywhere => true,
        }
    }
}

/// Declarative description of one kind of UI element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTypeSpec {
    /// Element type name
    pub name: String,
    /// Colour band the element is drawn in
    pub band: String,
    /// Minimum (width, height) of the bounding box, inclusive
    pub min_size: (u32, u32),
    /// Maximum (width, height) of the bounding box, inclusive
    pub max_size: (u32, u32),
    /// Where the element's center must fall
    pub expected_position: ScreenPosition,
}

impl ElementTypeSpec {
    pub fn new(
        name: &str,
        band: &str,
        min_size: (u32, u32),
        max_size: (u32, u32),
        expected_position: ScreenPosition,
    ) -> Self {
        Self {
            name: name.to_string(),
            band: band.to_string(),
            min_size,
            max_size,
            expected_position,
        }
    }

    /// Whether a box size lies within the inclusive size range on both axes
    pub fn accepts_size(&self, bbox: &BoundingBox) -> bool {
        (self.min_size.0..=self.max_size.0).contains(&bbox.width)
            && (self.min_size.1..=self.max_size.1).contains(&bbox.height)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("element type with empty name".to_string());
        }
        if self.min_size.0 > self.max_size.0 || self.min_size.1 > self.max_size.1 {
            return Err(format!(
                "element type '{}': min size {:?} exceeds max size {:?}",
                self.name, self.min_size, self.max_size
            ));
        }
        Ok(())
    }

    /// Built-in element catalog
    pub fn default_catalog() -> Vec<ElementTypeSpec> {
        vec![
            ElementTypeSpec::new(
                kinds::PLAY_BUTTON,
                bands::PLAY_BUTTON,
                (20, 15),
                (200, 100),
                ScreenPosition::CenterBottom,
            ),
            ElementTypeSpec::new(
                kinds::CITY_SELECTION,
                bands::CITY_SELECTION,
                (100, 100),
                (400, 300),
                ScreenPosition::Center,
            ),
            ElementTypeSpec::new(
                kinds::MENU_BUTTON,
                bands::UI_ELEMENTS,
                (50, 20),
                (200, 80),
                ScreenPosition::TopLeft,
            ),
        ]
    }
}

/// One detected element, in the pixel space of the frame it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiCandidate {
    /// Element type name
    pub kind: String,
    pub bbox: BoundingBox,
    pub center: FramePoint,
    /// Contour polygon area
    pub area: f64,
    /// Contour area over bounding-box area, in [0, 1]
    pub confidence: f64,
    /// Frame the candidate was detected in
    pub source: FrameInfo,
}

/// What the detections suggest doing next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    ClickPlay,
    SelectCity,
    NavigateMenu,
    None,
}

/// Detections for every element type of a catalog over one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub frame: FrameInfo,
    pub elements: BTreeMap<String, Vec<UiCandidate>>,
}

impl DetectionReport {
    /// All candidates of a type, best first
    pub fn candidates(&self, kind: &str) -> &[UiCandidate] {
        self.elements.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest-confidence candidate of a type
    pub fn best(&self, kind: &str) -> Option<&UiCandidate> {
        self.candidates(kind).first()
    }

    pub fn total(&self) -> usize {
        self.elements.values().map(Vec::len).sum()
    }

    /// Play button beats city tiles, which beat menu buttons
    pub fn recommended_action(&self) -> RecommendedAction {
        if self.best(kinds::PLAY_BUTTON).is_some() {
            RecommendedAction::ClickPlay
        } else if self.best(kinds::CITY_SELECTION).is_some() {
            RecommendedAction::SelectCity
        } else if self.best(kinds::MENU_BUTTON).is_some() {
            RecommendedAction::NavigateMenu
        } else {
            RecommendedAction::None
        }
    }

    /// Candidate to click for the recommended action
    pub fn target(&self) -> Option<&UiCandidate> {
        match self.recommended_action() {
            RecommendedAction::ClickPlay => self.best(kinds::PLAY_BUTTON),
            RecommendedAction::SelectCity => self.best(kinds::CITY_SELECTION),
            RecommendedAction::NavigateMenu => self.best(kinds::MENU_BUTTON),
            RecommendedAction::None => None,
        }
    }
}

/// Detects UI elements by colour band and connected components
#[derive(Debug, Clone)]
pub struct ElementDetector {
    catalog: ColorCatalog,
    specs: Vec<ElementTypeSpec>,
}

impl ElementDetector {
    pub fn new(catalog: ColorCatalog, specs: Vec<ElementTypeSpec>) -> Self {
        Self { catalog, specs }
    }

    pub fn specs(&self) -> &[ElementTypeSpec] {
        &self.specs
    }

    /// Spec by element type name
    pub fn spec(&self, kind: &str) -> Option<&ElementTypeSpec> {
        self.specs.iter().find(|s| s.name == kind)
    }

    /// Candidates of one element type, highest confidence first
    pub fn detect(&self, frame: &Frame, spec: &ElementTypeSpec) -> Vec<UiCandidate> {
        self.detect_hsv(&HsvFrame::from_frame(frame), frame.info(), spec)
    }

    /// Run every spec of the catalog over one frame
    pub fn detect_all(&self, frame: &Frame) -> DetectionReport {
        self.detect_all_hsv(&HsvFrame::from_frame(frame), frame.info())
    }

    /// Run every spec over an already converted frame
    pub fn detect_all_hsv(&self, hsv: &HsvFrame, info: FrameInfo) -> DetectionReport {
        let elements = self
            .specs
            .iter()
            .map(|spec| (spec.name.clone(), self.detect_hsv(hsv, info, spec)))
            .collect();

        let report = DetectionReport {
            frame: info,
            elements,
        };
        log::debug!(
            "Detected {} UI elements in {}x{} frame",
            report.total(),
            info.width,
            info.height
        );
        report
    }

    pub fn detect_hsv(
        &self,
        hsv: &HsvFrame,
        info: FrameInfo,
        spec: &ElementTypeSpec,
    ) -> Vec<UiCandidate> {
        let Some(band) = self.catalog.get(&spec.band) else {
            log::warn!(
                "Element type '{}' uses unknown colour band '{}'",
                spec.name,
                spec.band
            );
            return Vec::new();
        };

        let mask = clean_mask(&hsv.mask(band));
        let contours = find_contours::<u32>(&mask);

        let mut candidates: Vec<UiCandidate> = contours
            .iter()
            .filter(|contour| is_external(contour, &contours))
            .filter_map(|contour| {
                let bbox = bounding_box(&contour.points)?;
                if !spec.accepts_size(&bbox) {
                    return None;
                }

                let center = bbox.center();
                if !spec
                    .expected_position
                    .accepts(center, info.width, info.height)
                {
                    return None;
                }

                let area = polygon_area(&contour.points);
                let confidence = (area / bbox.area() as f64).clamp(0.0, 1.0);

                Some(UiCandidate {
                    kind: spec.name.clone(),
                    bbox,
                    center,
                    area,
                    confidence,
                    source: info,
                })
            })
            .collect();

        // Stable, so equal confidences keep contour order
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}

/// 3x3 close then open, filling pinholes and dropping speckle
fn clean_mask(mask: &GrayImage) -> GrayImage {
    let closed = morphology::close(mask, Norm::LInf, 1);
    morphology::open(&closed, Norm::LInf, 1)
}

/// Outer borders not nested inside a hole of another component
fn is_external(contour: &Contour<u32>, all: &[Contour<u32>]) -> bool {
    contour.border_type == BorderType::Outer
        && contour
            .parent
            .map_or(true, |p| all[p].border_type != BorderType::Hole)
}

fn bounding_box(points: &[Point<u32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox::new(
        min_x,
        min_y,
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}

/// Shoelace area of the closed polygon through `points`
fn polygon_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64)
        .sum();
    twice.abs() / 2.0
}
