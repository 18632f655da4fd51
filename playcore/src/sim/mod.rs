//! In-memory collaborators
//!
//! [`SimulatedPipeline`] and [`StaticDrmGate`] stand in for a platform
//! pipeline and DRM system. They back the `playcore-sim` binary and the
//! integration tests.

mod drm;
mod pipeline;

pub use drm::StaticDrmGate;
pub use pipeline::{PushedSample, SimulatedPipeline};
