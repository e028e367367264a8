//! MultiJack - isolated game environments from a single install
//!
//! Library crate for environment materialization, mod injection and Steam
//! launch options, shared with the `multijack` command-line binary.

#[macro_use]
pub mod paths;

pub mod config;
pub mod environments;
pub mod error;
pub mod games;
pub mod inject;
pub mod launcher;
pub mod logging;
pub mod platform;
pub mod shadow;
pub mod steam;
pub mod task;
pub mod vdf;

pub use error::{Error, Result};
