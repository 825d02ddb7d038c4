//! Per-event patch-match flow pipeline.
//!
//! ```text
//! event -> subsample -> rotation check -> accumulate -> block match -> FlowRecord
//! ```
//!
//! The engine matches the current slice against the previous-previous slice,
//! one full slice period behind the latest rotation, so the reference slice
//! is always complete when it is read.

use log::{debug, trace};

use crate::block_match::{BlockMatcher, Displacement};
use crate::config::FlowConfig;
use crate::error::Result;
use crate::event::Event;
use crate::grid::{self, GridDims};
use crate::rotation::RotationPolicy;
use crate::slice_buffer::{SliceBuffer, SliceSnapshot};

/// Flow estimate for one accepted event.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowRecord {
    pub x: u16,
    pub y: u16,
    pub timestamp: i64,
    pub vx: f32,
    pub vy: f32,
    pub speed: f32,
    /// Raw shift in subsampled pixels, before scaling.
    pub dx: i32,
    pub dy: i32,
    pub match_cost: u32,
}

impl FlowRecord {
    pub fn from_displacement(event: &Event, d: Displacement, scale_factor: f32) -> Self {
        let vx = d.dx as f32 * scale_factor;
        let vy = d.dy as f32 * scale_factor;
        Self {
            x: event.x,
            y: event.y,
            timestamp: event.timestamp,
            vx,
            vy,
            speed: (vx * vx + vy * vy).sqrt(),
            dx: d.dx,
            dy: d.dy,
            match_cost: d.match_cost,
        }
    }
}

impl std::fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}",
            self.x, self.y, self.timestamp, self.vx, self.vy, self.speed
        )
    }
}

/// Anything that turns an event into a displacement estimate.
pub trait MotionEstimator {
    /// Update internal state with `event` and estimate its displacement.
    /// Returns `None` for events the estimator rejects.
    fn estimate(&mut self, event: &Event) -> Option<Displacement>;

    /// Clear all accumulated history, keeping the geometry.
    fn reset_state(&mut self);

    fn scale_factor(&self) -> f32;

    fn flow(&mut self, event: &Event) -> Option<FlowRecord> {
        let d = self.estimate(event)?;
        Some(FlowRecord::from_displacement(event, d, self.scale_factor()))
    }
}

/// Counters for one call to [`FlowEngine::process_packet`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PacketStats {
    pub events: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Sum of squared match costs over accepted events.
    pub sad_sum: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
}

struct Geometry {
    sensor_width: u32,
    sensor_height: u32,
    dims: GridDims,
    slices: SliceBuffer,
    matcher: BlockMatcher,
}

/// Event-driven patch-match optical flow engine.
///
/// Not thread-safe; `process` takes `&mut self`, so sharing an engine between
/// producers means wrapping it in a `Mutex` and holding the lock per call or
/// per packet.
pub struct FlowEngine {
    config: FlowConfig,
    policy: RotationPolicy,
    geometry: Option<Geometry>,
    rejected: u64,
}

impl FlowEngine {
    /// Create an engine in the `Uninitialized` state. Call [`FlowEngine::reset`]
    /// once the sensor size is known.
    pub fn new(config: FlowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy: RotationPolicy::from_config(&config),
            config,
            geometry: None,
            rejected: 0,
        })
    }

    /// Create an engine and reset it for the given sensor.
    pub fn with_sensor(config: FlowConfig, sensor_width: u32, sensor_height: u32) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine.reset(sensor_width, sensor_height)?;
        Ok(engine)
    }

    /// (Re)build the working grid for a sensor and zero all slices.
    ///
    /// On error the engine is left `Uninitialized`.
    pub fn reset(&mut self, sensor_width: u32, sensor_height: u32) -> Result<GridDims> {
        let dims = match grid::configure(
            sensor_width,
            sensor_height,
            self.config.subsample_shift,
            self.config.search_distance,
        ) {
            Ok(dims) => dims,
            Err(e) => {
                self.geometry = None;
                return Err(e);
            }
        };
        let matcher = BlockMatcher::new(&dims, self.config.search_distance);
        match &mut self.geometry {
            Some(g) => {
                g.slices.reset(dims);
                g.matcher = matcher;
                g.dims = dims;
                g.sensor_width = sensor_width;
                g.sensor_height = sensor_height;
            }
            None => {
                self.geometry = Some(Geometry {
                    sensor_width,
                    sensor_height,
                    dims,
                    slices: SliceBuffer::new(dims),
                    matcher,
                });
            }
        }
        self.policy.reset();
        self.rejected = 0;
        debug!(
            "flow engine ready: sensor {}x{} -> grid {}x{} (shift {}, search distance {}, {:?})",
            sensor_width,
            sensor_height,
            dims.sub_size_x,
            dims.sub_size_y,
            dims.subsample_shift,
            self.config.search_distance,
            self.config.slice_method
        );
        Ok(dims)
    }

    /// Replace the configuration. A `Ready` engine is reset for the same
    /// sensor under the new settings.
    pub fn set_config(&mut self, config: FlowConfig) -> Result<()> {
        config.validate()?;
        self.policy = RotationPolicy::from_config(&config);
        self.config = config;
        if let Some((w, h)) = self
            .geometry
            .as_ref()
            .map(|g| (g.sensor_width, g.sensor_height))
        {
            self.reset(w, h)?;
        }
        Ok(())
    }

    /// Process one event. Returns `None` if the engine is not ready or the
    /// event is malformed or outside the matchable area.
    pub fn process(&mut self, event: &Event) -> Option<FlowRecord> {
        let d = self.estimate(event)?;
        Some(FlowRecord::from_displacement(
            event,
            d,
            self.config.scale_factor,
        ))
    }

    /// Process a packet of events, appending a record to `out` for every
    /// accepted event.
    pub fn process_packet(&mut self, events: &[Event], out: &mut Vec<FlowRecord>) -> PacketStats {
        let mut stats = PacketStats {
            events: events.len() as u64,
            ..PacketStats::default()
        };
        out.reserve(events.len());
        for event in events {
            match self.process(event) {
                Some(record) => {
                    let cost = record.match_cost as f64;
                    stats.sad_sum += cost * cost;
                    stats.accepted += 1;
                    out.push(record);
                }
                None => stats.rejected += 1,
            }
        }
        trace!(
            "packet: {} events, {} accepted, {} rejected, sad_sum {}",
            stats.events,
            stats.accepted,
            stats.rejected,
            stats.sad_sum
        );
        stats
    }

    fn displacement(&mut self, event: &Event) -> Option<Displacement> {
        let geometry = self.geometry.as_mut()?;
        let sign = event.polarity_sign()?;
        if event.x as u32 >= geometry.sensor_width || event.y as u32 >= geometry.sensor_height {
            return None;
        }
        let (sx, sy) = geometry.dims.to_subsampled(event.x, event.y);
        if !geometry
            .dims
            .in_match_margin(sx, sy, self.config.search_distance as usize)
        {
            return None;
        }

        if self.policy.should_rotate(event) {
            geometry.slices.rotate();
        }
        geometry.slices.accumulate(sx, sy, sign);

        let snap = geometry.slices.snapshot();
        Some(geometry.matcher.best_shift(sx, sy, snap.prev_prev, snap.current))
    }

    pub fn state(&self) -> EngineState {
        if self.geometry.is_some() {
            EngineState::Ready
        } else {
            EngineState::Uninitialized
        }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn dims(&self) -> Option<GridDims> {
        self.geometry.as_ref().map(|g| g.dims)
    }

    pub fn snapshot(&self) -> Option<SliceSnapshot<'_>> {
        self.geometry.as_ref().map(|g| g.slices.snapshot())
    }

    pub fn slices(&self) -> Option<&SliceBuffer> {
        self.geometry.as_ref().map(|g| &g.slices)
    }

    /// Slice rotations since the last reset.
    pub fn rotations(&self) -> u64 {
        self.geometry.as_ref().map_or(0, |g| g.slices.rotations())
    }

    /// Presence-bitmap Hamming distance between the two completed slices.
    pub fn presence_distance(&self) -> Option<u32> {
        self.geometry.as_ref().map(|g| g.slices.presence_distance())
    }

    /// Events rejected by `process` since the last reset.
    pub fn rejected_events(&self) -> u64 {
        self.rejected
    }
}

impl MotionEstimator for FlowEngine {
    fn estimate(&mut self, event: &Event) -> Option<Displacement> {
        let d = self.displacement(event);
        if d.is_none() {
            self.rejected += 1;
        }
        d
    }

    fn reset_state(&mut self) {
        if let Some((w, h)) = self
            .geometry
            .as_ref()
            .map(|g| (g.sensor_width, g.sensor_height))
        {
            // Same geometry already validated once.
            let result = self.reset(w, h);
            debug_assert!(result.is_ok(), "reset with validated geometry failed");
        }
    }

    fn scale_factor(&self) -> f32 {
        self.config.scale_factor
    }
}
