//! Event-driven patch-match optical flow for eDVS cameras.
//!
//! Events are accumulated into a ring of three signed histograms ("slices")
//! in a subsampled grid. For each event the engine searches for the shift
//! between the current slice and the previous-previous slice that minimizes
//! the sum of absolute differences around the event, and reports it as a
//! velocity.
//!
//! ```no_run
//! use edvs_patchflow::{Event, FlowConfig, FlowEngine};
//!
//! let mut engine = FlowEngine::with_sensor(FlowConfig::default(), 128, 128)?;
//! if let Some(flow) = engine.process(&Event::new(64, 64, 1_000, 1)) {
//!     println!("{}", flow);
//! }
//! # Ok::<(), edvs_patchflow::FlowError>(())
//! ```

pub mod block_match;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod ffi;
pub mod grid;
pub mod popcount;
pub mod reichardt;
pub mod rotation;
pub mod slice_buffer;

pub use block_match::{BlockMatcher, Displacement};
pub use config::{FlowConfig, SliceMethod};
pub use engine::{EngineState, FlowEngine, FlowRecord, MotionEstimator, PacketStats};
pub use error::{FlowError, Result};
pub use event::Event;
pub use grid::GridDims;
pub use reichardt::ReichardtFlow;
pub use rotation::RotationPolicy;
pub use slice_buffer::SliceBuffer;

/// Maximum allowed sensor dimension to prevent excessive memory allocation.
/// 32768 x 32768 = ~1 GB per filter, far beyond any real eDVS sensor.
pub const MAX_SENSOR_DIM: u32 = 32768;
