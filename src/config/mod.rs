//! # Jsonb Configuration Module
//!
//! This module centralizes all layout constants of the jsonb container format.
//! Constants are grouped by the part of the buffer they describe, and their
//! interdependencies are enforced through compile-time assertions.
//!
//! ## Module Organization
//!
//! - [`constants`]: Header and entry bit layout, alignment, frame capacities

pub mod constants;
pub use constants::*;
