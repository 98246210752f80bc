//! # Core Engine Module
//!
//! Shared configuration types used by every stage of the indirect-lighting
//! pipeline.

pub mod config;

pub use config::{
    FilterConfig,
    InterleaveConfig,
    LightDescriptor,
    LightShape,
    RadiosityConfig,
    ViewportConfig,
    VplConfig,
};
pub use crate::config::{Config, ConfigError};
