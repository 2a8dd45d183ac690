//! core
//!
//! Core domain types and resolution logic for ghr.
//!
//! # Modules
//!
//! - [`types`] - Repository identity and remote URL helpers
//! - [`remotes`] - Local git remotes mapped to repositories, in priority order
//! - [`refs`] - Push target and pull request head/base resolution
//! - [`editable`] - Requested edits to pull request metadata
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Cache and scratch locations
//!
//! # Design Principles
//!
//! - Resolution logic reads git through traits so it runs against stubs
//! - Every type here is an owned value; nothing is shared mutably

pub mod config;
pub mod editable;
pub mod paths;
pub mod refs;
pub mod remotes;
pub mod types;
