//! # Indirect Lighting
//!
//! Instant radiosity with a persistent, budgeted VPL population.
//!
//! ## Frame Order
//!
//! 1. [`revalidation`]: every valid VPL is tested against its parent
//! 2. [`generation`]: a bounded number of invalid slots is re-seeded
//! 3. [`interleave`]: each pixel tests a rotating block of VPLs
//! 4. [`filter`]: the interleaving pattern is smoothed away
//! 5. [`history`]: the filtered frame joins the ring and the last `H` frames
//!    are reprojected and averaged
//!
//! [`IndirectRenderer`] runs the whole sequence over a
//! [`RayTracingBackend`](crate::render::RayTracingBackend).

pub mod filter;
pub mod generation;
pub mod history;
pub mod interleave;
pub mod renderer;
pub mod revalidation;
pub mod vpl;

#[cfg(test)]
mod tests;

pub use filter::{DiscontinuityFilter, PingPong};
pub use generation::{CandidateSlots, GenerationEngine, GenerationReport, FIRST_SAMPLE_INDEX};
pub use history::{composite, HistoryFrame, HistoryRing};
pub use interleave::{
    reconstruct, DispatchPlan, DispatchReport, InterleavePattern, InterleavedDispatcher, VisibilityMask,
};
pub use renderer::{FrameOutput, FrameStats, IndirectRenderer};
pub use revalidation::{quad_travel_distance, RevalidationEngine, RevalidationReport};
pub use vpl::{GpuVpl, Vpl, VplTable};
