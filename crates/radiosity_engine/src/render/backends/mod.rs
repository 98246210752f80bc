//! Ray-tracing backend implementations

pub mod cpu;

pub use cpu::{CpuBackend, CpuBackendStats};
