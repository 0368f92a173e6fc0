//! Command-line configuration helpers.

pub mod duration;
