//! Core domain types and traits for the maestrod build scheduler.
//!
//! This crate contains:
//! - Build requests and the running-build identity model
//! - The `Driver` trait implemented by backend adapters
//! - Shared error types

pub mod build;
pub mod driver;
pub mod error;

pub use build::{BuildKey, BuildRequest, RunningBuild};
pub use driver::Driver;
pub use error::{Error, Result};
