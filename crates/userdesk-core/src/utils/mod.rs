//! Utility functions for string formatting and manipulation.

pub mod format;

pub use format::{age_display, cmp_ignore_case, contains_ignore_case, truncate_string};
