//! Repository 実装

pub mod inmemory;
