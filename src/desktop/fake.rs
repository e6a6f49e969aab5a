//! In-memory desktop used by tests

use image::{Rgba, RgbaImage};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::{BackendError, DesktopBackend, DisplayInfo, WindowInfo};
use crate::geometry::WindowRect;

pub(crate) struct FakeDisplay {
    pub info: DisplayInfo,
    pub image: RgbaImage,
}

pub(crate) struct FakeDesktop {
    pub windows: Vec<WindowInfo>,
    pub displays: Vec<FakeDisplay>,
    schedule: RefCell<VecDeque<Vec<WindowInfo>>>,
    replaced: RefCell<HashMap<u32, RgbaImage>>,
    window_queries: Cell<usize>,
    fail_windows: Cell<bool>,
    fail_capture: Cell<bool>,
}

impl FakeDesktop {
    pub fn new(displays: Vec<FakeDisplay>) -> Self {
        Self {
            windows: Vec::new(),
            displays,
            schedule: RefCell::new(VecDeque::new()),
            replaced: RefCell::new(HashMap::new()),
            window_queries: Cell::new(0),
            fail_windows: Cell::new(false),
            fail_capture: Cell::new(false),
        }
    }

    pub fn display(id: u32, rect: WindowRect, scale: f32, primary: bool) -> FakeDisplay {
        let width = (rect.width as f32 * scale).round() as u32;
        let height = (rect.height as f32 * scale).round() as u32;
        FakeDisplay {
            info: DisplayInfo {
                id,
                name: format!("Display {}", id),
                rect,
                scale_factor: scale,
                is_primary: primary,
            },
            image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        }
    }

    pub fn single_display(width: u32, height: u32) -> Self {
        Self::new(vec![Self::display(
            1,
            WindowRect::new(0, 0, width, height),
            1.0,
            true,
        )])
    }

    /// Primary at the origin, secondary to its left
    pub fn dual_display() -> Self {
        Self::new(vec![
            Self::display(1, WindowRect::new(0, 0, 1920, 1080), 1.0, true),
            Self::display(2, WindowRect::new(-1920, 0, 1920, 1080), 1.0, false),
        ])
    }

    /// Successive `windows()` calls return these lists, then `self.windows`
    pub fn set_window_schedule(&self, schedule: Vec<Vec<WindowInfo>>) {
        *self.schedule.borrow_mut() = schedule.into();
    }

    pub fn window_queries(&self) -> usize {
        self.window_queries.get()
    }

    pub fn fail_window_enumeration(&self) {
        self.fail_windows.set(true);
    }

    /// Replace what a display shows from now on, without `&mut`
    pub fn show(&self, display_id: u32, image: RgbaImage) {
        self.replaced.borrow_mut().insert(display_id, image);
    }

    pub fn fail_capture(&self) {
        self.fail_capture.set(true);
    }

    /// Paint a rectangle given in desktop coordinates onto every display it touches
    pub fn paint(&mut self, rect: WindowRect, color: [u8; 3]) {
        for display in &mut self.displays {
            let Some(overlap) = display.info.rect.intersection(&rect) else {
                continue;
            };
            let scale = display.info.scale_factor;
            let x0 = ((overlap.x - display.info.rect.x) as f32 * scale) as u32;
            let y0 = ((overlap.y - display.info.rect.y) as f32 * scale) as u32;
            let x1 = (x0 + (overlap.width as f32 * scale) as u32).min(display.image.width());
            let y1 = (y0 + (overlap.height as f32 * scale) as u32).min(display.image.height());
            for y in y0..y1 {
                for x in x0..x1 {
                    display
                        .image
                        .put_pixel(x, y, Rgba([color[0], color[1], color[2], 255]));
                }
            }
        }
    }
}

impl DesktopBackend for FakeDesktop {
    fn windows(&self) -> Result<Vec<WindowInfo>, BackendError> {
        self.window_queries.set(self.window_queries.get() + 1);
        if self.fail_windows.get() {
            return Err(BackendError::WindowEnumeration("access denied".to_string()));
        }
        if let Some(next) = self.schedule.borrow_mut().pop_front() {
            return Ok(next);
        }
        Ok(self.windows.clone())
    }

    fn displays(&self) -> Result<Vec<DisplayInfo>, BackendError> {
        Ok(self.displays.iter().map(|d| d.info.clone()).collect())
    }

    fn capture_display(&self, display: &DisplayInfo) -> Result<RgbaImage, BackendError> {
        if self.fail_capture.get() {
            return Err(BackendError::Capture("permission denied".to_string()));
        }
        if let Some(image) = self.replaced.borrow().get(&display.id) {
            return Ok(image.clone());
        }
        self.displays
            .iter()
            .find(|d| d.info.id == display.id)
            .map(|d| d.image.clone())
            .ok_or(BackendError::DisplayGone(display.id))
    }
}

impl DesktopBackend for Rc<FakeDesktop> {
    fn windows(&self) -> Result<Vec<WindowInfo>, BackendError> {
        self.as_ref().windows()
    }

    fn displays(&self) -> Result<Vec<DisplayInfo>, BackendError> {
        self.as_ref().displays()
    }

    fn capture_display(&self, display: &DisplayInfo) -> Result<RgbaImage, BackendError> {
        self.as_ref().capture_display(display)
    }
}
