//! Shared utilities for Tsudoi binaries and tests.

pub mod logger;
pub mod time;
