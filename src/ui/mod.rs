//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output streams with terminal detection
//! - [`prompts`] - Interactive prompts and confirmations
//! - [`browser`] - Opening URLs in a web browser
//!
//! # Design
//!
//! All output and prompts go through this module to ensure consistent
//! formatting and proper handling of interactive vs non-interactive modes.

pub mod browser;
pub mod output;
pub mod prompts;
