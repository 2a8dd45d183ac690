//! pr
//!
//! Pull request commands.
//!
//! # Modules
//!
//! - [`finder`] - Locate a pull request from a number, URL or branch
//! - [`create`] - Head/base resolution, pushing, and pull request creation
//! - [`edit`] - Concurrent application of metadata edits
//! - [`view`] - Display of a single pull request
//! - [`state`] - Input gathered during creation, and its recovery file
//! - [`templates`] - Body templates from the working tree

pub mod create;
pub mod edit;
pub mod finder;
pub mod state;
pub mod templates;
pub mod view;
