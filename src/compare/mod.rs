//! Compare list - devices selected for side-by-side comparison
//!
//! The selection lives in a per-tab [`CompareStore`], mirrored to durable
//! storage and kept consistent across tabs through storage notifications.
//! [`CompareToggle`] and [`CompareBar`] are the two UI consumers.

mod bar;
mod echo;
mod selection;
mod store;
mod toggle;

#[cfg(test)]
mod tests;

pub use bar::{BarView, CompareBar};
pub use echo::{EchoGuard, DEFAULT_ECHO_WINDOW_MS};
pub use selection::{compare_href, normalize_id, DecodeError, SelectionSet};
pub use store::{ChangeCause, CompareOptions, CompareStore, SelectionChanged, DEFAULT_STORAGE_KEY};
pub use toggle::{ActivationEvent, CompareToggle, ToggleIcon, ToggleMode, ToggleView};
