// src/task/surface.rs
// Display bindings owned by a task controller

use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusKind {
    Success,
    Error,
}

/// The handful of controls a controller keeps in sync with its state: one
/// action button, one result display, one status line, one elapsed-time
/// readout, one provider/model selector, and the inputs feeding the task.
///
/// Implementations must tolerate being called from the controller's spawned
/// tasks as well as the caller's thread.
pub trait TaskSurface: Send + Sync {
    fn set_action_label(&self, label: &str);
    fn set_action_enabled(&self, enabled: bool);

    fn set_result_text(&self, text: &str);
    fn result_text(&self) -> String;
    fn set_result_loading(&self, loading: bool);

    fn set_status(&self, kind: StatusKind, text: &str);
    fn clear_status(&self);

    /// `Some(text)` shows the readout with `text`, `None` hides it.
    fn set_elapsed(&self, text: Option<&str>);

    fn set_selector_enabled(&self, enabled: bool);
    fn set_inputs_enabled(&self, enabled: bool);
}

/// Plain observable form model standing in for the page's controls. The
/// embedding application reads the fields after events settle; tests do the
/// same.
#[derive(Debug, Clone, Serialize)]
pub struct PanelState {
    pub action_label: String,
    pub action_enabled: bool,
    pub result_text: String,
    pub result_loading: bool,
    pub status: Option<(StatusKind, String)>,
    pub elapsed: Option<String>,
    pub selector_enabled: bool,
    pub inputs_enabled: bool,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            action_label: String::new(),
            action_enabled: true,
            result_text: String::new(),
            result_loading: false,
            status: None,
            elapsed: None,
            selector_enabled: true,
            inputs_enabled: true,
        }
    }
}

#[derive(Default)]
pub struct PanelSurface {
    state: Mutex<PanelState>,
}

impl PanelSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PanelState {
        self.state.lock().unwrap().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }
}

impl TaskSurface for PanelSurface {
    fn set_action_label(&self, label: &str) {
        self.with(|s| s.action_label = label.to_string());
    }

    fn set_action_enabled(&self, enabled: bool) {
        self.with(|s| s.action_enabled = enabled);
    }

    fn set_result_text(&self, text: &str) {
        self.with(|s| s.result_text = text.to_string());
    }

    fn result_text(&self) -> String {
        self.with(|s| s.result_text.clone())
    }

    fn set_result_loading(&self, loading: bool) {
        self.with(|s| s.result_loading = loading);
    }

    fn set_status(&self, kind: StatusKind, text: &str) {
        self.with(|s| s.status = Some((kind, text.to_string())));
    }

    fn clear_status(&self) {
        self.with(|s| s.status = None);
    }

    fn set_elapsed(&self, text: Option<&str>) {
        self.with(|s| s.elapsed = text.map(|t| t.to_string()));
    }

    fn set_selector_enabled(&self, enabled: bool) {
        self.with(|s| s.selector_enabled = enabled);
    }

    fn set_inputs_enabled(&self, enabled: bool) {
        self.with(|s| s.inputs_enabled = enabled);
    }
}
