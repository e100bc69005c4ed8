//! Per-item compare toggle
//!
//! The toggle sits inside the link to a device's detail page, so activating
//! it must not trigger the surrounding navigation.

use super::store::CompareStore;
use serde::{Deserialize, Serialize};

/// How the toggle is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleMode {
    /// Icon only
    #[default]
    Icon,
    /// Icon followed by a text label
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleIcon {
    Plus,
    Check,
}

/// Render model of a toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleView {
    pub id: String,
    pub selected: bool,
    pub icon: ToggleIcon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'static str>,
    pub title: &'static str,
}

/// UI activation (click, key press) reaching the toggle
#[derive(Debug, Default)]
pub struct ActivationEvent {
    default_prevented: bool,
    propagation_stopped: bool,
}

impl ActivationEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Compare toggle bound to one device
pub struct CompareToggle {
    store: CompareStore,
    id: String,
    mode: ToggleMode,
}

impl CompareToggle {
    pub fn new(store: CompareStore, id: impl Into<String>, mode: ToggleMode) -> Self {
        Self {
            store,
            id: id.into(),
            mode,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Render from the store's current membership
    pub fn view(&self) -> ToggleView {
        let selected = self.store.is_selected(&self.id);
        let label = match (self.mode, selected) {
            (ToggleMode::Icon, _) => None,
            (ToggleMode::Label, false) => Some("Compare"),
            (ToggleMode::Label, true) => Some("Comparing"),
        };

        ToggleView {
            id: self.id.clone(),
            selected,
            icon: if selected {
                ToggleIcon::Check
            } else {
                ToggleIcon::Plus
            },
            label,
            title: if selected {
                "Remove from compare"
            } else {
                "Add to compare"
            },
        }
    }

    /// Handle an activation; returns whether the device is selected afterwards
    pub fn activate(&self, event: &mut ActivationEvent) -> bool {
        event.prevent_default();
        event.stop_propagation();
        self.store.toggle(&self.id)
    }
}
