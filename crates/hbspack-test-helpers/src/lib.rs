//! Test utilities and fixtures for hbspack
//!
//! This crate provides shared test helpers for the integration tests
//! (tests/ directories) of the other crates.

pub mod compile;
pub mod fixtures;
pub mod mocks;
