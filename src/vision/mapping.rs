//! Frame to screen coordinate mapping

use super::{CaptureSpace, Frame, FrameInfo};
use crate::geometry::{FramePoint, ScreenPoint, WindowRect};

/// Coordinate mapping errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Point {point} lies outside window {rect}")]
    OutOfBounds { point: ScreenPoint, rect: WindowRect },
    #[error("Frame has no screen position")]
    Unmapped,
}

/// Maps frame pixels to absolute desktop coordinates
///
/// When the frame and rectangle sizes match this is a pure translation;
/// otherwise (high-density displays) the point is first scaled down by
/// `rect / frame` on each axis, rounded to nearest.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateMapper;

impl CoordinateMapper {
    pub fn new() -> Self {
        Self
    }

    /// Map `point` of a `frame`-sized image captured over `rect`
    pub fn to_screen(&self, point: FramePoint, frame: &FrameInfo, rect: &WindowRect) -> ScreenPoint {
        if frame.width == rect.width && frame.height == rect.height {
            return ScreenPoint::new(rect.x + point.x as i32, rect.y + point.y as i32);
        }

        let sx = axis_scale(rect.width, frame.width);
        let sy = axis_scale(rect.height, frame.height);
        ScreenPoint::new(
            rect.x + (point.x as f64 * sx).round() as i32,
            rect.y + (point.y as f64 * sy).round() as i32,
        )
    }

    /// Map a point using the rectangle the frame was captured over
    pub fn frame_to_screen(&self, point: FramePoint, frame: &FrameInfo) -> Result<ScreenPoint, MapError> {
        match frame.space {
            CaptureSpace::Window(rect) | CaptureSpace::Desktop(rect) => {
                Ok(self.to_screen(point, frame, &rect))
            }
            CaptureSpace::Unmapped => Err(MapError::Unmapped),
        }
    }

    /// Convenience over [`Self::frame_to_screen`] for a whole frame
    pub fn map(&self, point: FramePoint, frame: &Frame) -> Result<ScreenPoint, MapError> {
        self.frame_to_screen(point, &frame.info())
    }

    /// Reject points outside `rect`; a miss means the window moved
    pub fn ensure_within(&self, point: ScreenPoint, rect: &WindowRect) -> Result<ScreenPoint, MapError> {
        if rect.contains(point) {
            Ok(point)
        } else {
            Err(MapError::OutOfBounds { point, rect: *rect })
        }
    }
}

fn axis_scale(rect_len: u32, frame_len: u32) -> f64 {
    if frame_len == 0 {
        1.0
    } else {
        rect_len as f64 / frame_len as f64
    }
}
