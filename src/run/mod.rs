//! run
//!
//! Workflow run commands.
//!
//! - [`logs`] - Run log archive cache and job/step log mapping
//! - [`view`] - `ghr run view`

pub mod logs;
pub mod view;
