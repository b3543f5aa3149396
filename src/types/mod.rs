//! Shared types

pub mod error;

pub use error::{LoginError, Result};
