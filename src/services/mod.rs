//! Application services.
//!
//! Business rules that sit between the handlers and the repository
//! functions in [`crate::db`].

pub mod archive;
pub mod pack_manager;
pub mod submission;

pub use pack_manager::PackManager;
