//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the compositor:
//! - Math types and operations
//! - Geometric primitives shared by culling, picking and collision
//! - Scene-time management
//! - Logging utilities

pub mod geometry;
pub mod logging;
pub mod math;
pub mod time;
