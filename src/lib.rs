//! Emulators.wtf compare list
//!
//! Per-tab device selection for side-by-side comparison, persisted to
//! durable storage and synchronized across tabs.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod paths;
pub mod storage;
