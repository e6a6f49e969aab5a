//! One-frame perception: state, colour evidence and UI elements together

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::vision::{
    ColorCatalog, ColorCoverage, DetectionReport, ElementDetector, Frame, FrameInfo, GameState,
    HsvFrame, RecommendedAction, StateClassifier,
};

/// Everything learned from one frame
#[derive(Debug, Clone)]
pub struct Observation {
    pub frame: Frame,
    pub state: GameState,
    /// Coverage of every catalog band
    pub coverage: ColorCoverage,
    pub detections: DetectionReport,
}

impl Observation {
    pub fn summary(&self) -> ObservationSummary {
        ObservationSummary {
            frame: self.frame.info(),
            state: self.state,
            coverage: self.coverage.clone(),
            recommended_action: self.detections.recommended_action(),
            detections: self.detections.clone(),
        }
    }
}

/// Serializable view of an [`Observation`] without pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSummary {
    pub frame: FrameInfo,
    pub state: GameState,
    pub coverage: ColorCoverage,
    pub recommended_action: RecommendedAction,
    pub detections: DetectionReport,
}

/// The classifier and detector built from one set of settings
#[derive(Debug, Clone)]
pub struct Perception {
    catalog: ColorCatalog,
    classifier: StateClassifier,
    detector: ElementDetector,
}

impl Perception {
    pub fn new(settings: &Settings) -> Self {
        Self {
            catalog: settings.colors.clone(),
            classifier: StateClassifier::new(settings.colors.clone(), settings.states.clone()),
            detector: ElementDetector::new(settings.colors.clone(), settings.elements.clone()),
        }
    }

    /// Classify and detect over a frame, converting it to HSV once
    pub fn observe(&self, frame: Frame) -> Observation {
        let hsv = HsvFrame::from_frame(&frame);
        let coverage = hsv.coverage(self.catalog.iter());
        let state = self.classifier.classify_coverage(&coverage);
        let detections = self.detector.detect_all_hsv(&hsv, frame.info());

        log::info!(
            "Observed {} ({} elements, next: {:?})",
            state,
            detections.total(),
            detections.recommended_action()
        );

        Observation {
            frame,
            state,
            coverage,
            detections,
        }
    }

    pub fn classifier(&self) -> &StateClassifier {
        &self.classifier
    }

    pub fn detector(&self) -> &ElementDetector {
        &self.detector
    }
}
