//! Dispatcher that records instead of acting

use super::{ActionDispatcher, DispatchError, KeyPress};
use crate::desktop::TrackedWindow;
use crate::geometry::ScreenPoint;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Dispatched {
    Activate(TrackedWindow),
    Click(ScreenPoint),
    Key(KeyPress),
}

/// Records every action; `on_click` runs after each recorded click
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    pub actions: Vec<Dispatched>,
    pub fail_clicks: bool,
    pub on_click: Option<Box<dyn FnMut(ScreenPoint)>>,
}

impl RecordingDispatcher {
    pub fn clicks(&self) -> Vec<ScreenPoint> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Dispatched::Click(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl ActionDispatcher for RecordingDispatcher {
    fn activate(&mut self, window: &TrackedWindow) -> Result<(), DispatchError> {
        self.actions.push(Dispatched::Activate(window.clone()));
        Ok(())
    }

    fn click(&mut self, point: ScreenPoint) -> Result<(), DispatchError> {
        if self.fail_clicks {
            return Err(DispatchError::Input("click refused".to_string()));
        }
        self.actions.push(Dispatched::Click(point));
        if let Some(hook) = self.on_click.as_mut() {
            hook(point);
        }
        Ok(())
    }

    fn press_key(&mut self, key: KeyPress) -> Result<(), DispatchError> {
        self.actions.push(Dispatched::Key(key));
        Ok(())
    }
}
