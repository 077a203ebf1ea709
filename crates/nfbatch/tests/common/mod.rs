//! Shared test utilities for nfbatch integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated batch directories and pipeline runs
//! - Builders for PDFs, zip archives and config files
//! - Fake collaborators standing in for the extraction service

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::TestHarness;
