//! Terminal UI module using ratatui.
//!
//! - `render`: Frame layout, the access-gated main area and overlays
//! - `input`: Keyboard event handling
//! - `styles`: Color schemes and text styling
//! - `users`: User table and detail pane

pub mod input;
pub mod render;
pub mod styles;
pub mod users;
