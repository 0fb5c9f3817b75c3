//! Utility modules for the static site generator.

pub mod date;
pub mod fsx;
pub mod html;
pub mod pattern;
pub mod slug;
