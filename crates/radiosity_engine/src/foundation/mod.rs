//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Low-discrepancy and random sampling
//! - Logging utilities

pub mod math;
pub mod sampling;
pub mod logging;
