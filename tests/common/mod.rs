//! Shared test utilities for tracer integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file.

#![allow(dead_code)]

pub mod assertions;
pub mod builders;
pub mod fake_process;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fake_process::*;
pub use fixtures::*;
