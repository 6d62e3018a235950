//! Kestrel Core
//!
//! Shared utilities for the Kestrel 2D engine: geometry primitives,
//! logging setup, and puffin-based profiling.

pub mod geometry;
pub mod logging;
pub mod profiling;
