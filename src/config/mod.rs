//! # Configuration Module
//!
//! This module centralizes the configuration constants for wrendb. Constants
//! are grouped by functional area and their interdependencies are documented
//! and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! Page geometry, record encoding sizes, and descent sanity limits all depend
//! on one another. A `MAX_KEY_SIZE` that cannot fit a fresh page, or a header
//! size that disagrees with the zerocopy struct, is a data-corruption bug. By
//! co-locating these constants and adding compile-time checks, mismatches are
//! caught at build time instead of on disk.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;

pub use constants::*;
