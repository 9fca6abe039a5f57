//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used by the material table:
//! - Color and vector math types
//! - Logging utilities

pub mod math;
pub mod logging;
