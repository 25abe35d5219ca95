//! Treemap view for the SpaceScout disk-usage explorer.
//!
//! Scanning and layout live in a separate backend process; this crate renders
//! the rectangles it publishes and turns user gestures into zoom and scan
//! commands.

pub mod backend;
pub mod canvas;
pub mod color;
pub mod config;
pub mod error;
pub mod format;
pub mod navigation;
pub mod process;
pub mod protocol;
pub mod render;
pub mod state;
pub mod sync;
pub mod treemap;

pub use error::{Result, ViewError};
