//! Utility functions for string formatting.

pub mod format;

pub use format::{display_width, truncate_string, wrap_text};
