use crate::config::{FlowConfig, SliceMethod};
use crate::event::Event;

/// Bookkeeping shared by both rotation policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RotationState {
    pub last_rotation_ts: i64,
    pub events_since_rotation: u32,
    /// Set by `reset`; suppresses the first duration check.
    pub just_reset: bool,
}

/// Decides, per event, whether the current slice is complete.
///
/// A `true` from [`RotationPolicy::should_rotate`] also restarts the policy's
/// own interval, so the caller only has to rotate the slice buffer.
#[derive(Clone, Debug)]
pub enum RotationPolicy {
    /// Rotate once `slice_duration_us` of event time has passed.
    Duration {
        slice_duration_us: i64,
        state: RotationState,
    },
    /// Rotate every `slice_event_count` events.
    EventCount {
        slice_event_count: u32,
        state: RotationState,
    },
}

impl RotationPolicy {
    pub fn duration(slice_duration_us: i64) -> Self {
        assert!(slice_duration_us > 0, "slice duration must be positive");
        RotationPolicy::Duration {
            slice_duration_us,
            state: Self::fresh_state(),
        }
    }

    pub fn event_count(slice_event_count: u32) -> Self {
        assert!(slice_event_count > 0, "slice event count must be positive");
        RotationPolicy::EventCount {
            slice_event_count,
            state: Self::fresh_state(),
        }
    }

    pub fn from_config(config: &FlowConfig) -> Self {
        match config.slice_method {
            SliceMethod::ConstantDuration => Self::duration(config.slice_duration_us),
            SliceMethod::ConstantEventNumber => Self::event_count(config.slice_event_count),
        }
    }

    fn fresh_state() -> RotationState {
        RotationState {
            just_reset: true,
            ..RotationState::default()
        }
    }

    /// Returns true if the slices should rotate before `event` is accumulated.
    pub fn should_rotate(&mut self, event: &Event) -> bool {
        match self {
            RotationPolicy::Duration {
                slice_duration_us,
                state,
            } => {
                let ts = event.timestamp;
                if state.just_reset {
                    // Anchor the first slice on the first event seen.
                    state.just_reset = false;
                    state.last_rotation_ts = ts;
                    state.events_since_rotation = 1;
                    return false;
                }
                state.events_since_rotation = state.events_since_rotation.saturating_add(1);
                let dt = ts.saturating_sub(state.last_rotation_ts);
                // Negative dt is a rewound timestamp; never due.
                if dt < 0 || dt < *slice_duration_us {
                    return false;
                }
                state.last_rotation_ts = ts;
                state.events_since_rotation = 0;
                true
            }
            RotationPolicy::EventCount {
                slice_event_count,
                state,
            } => {
                state.just_reset = false;
                state.last_rotation_ts = event.timestamp;
                state.events_since_rotation += 1;
                if state.events_since_rotation >= *slice_event_count {
                    state.events_since_rotation = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Restart the interval and re-arm the post-reset suppression.
    pub fn reset(&mut self) {
        *self.state_mut() = Self::fresh_state();
    }

    pub fn state(&self) -> &RotationState {
        match self {
            RotationPolicy::Duration { state, .. } | RotationPolicy::EventCount { state, .. } => {
                state
            }
        }
    }

    fn state_mut(&mut self) -> &mut RotationState {
        match self {
            RotationPolicy::Duration { state, .. } | RotationPolicy::EventCount { state, .. } => {
                state
            }
        }
    }

    pub fn method(&self) -> SliceMethod {
        match self {
            RotationPolicy::Duration { .. } => SliceMethod::ConstantDuration,
            RotationPolicy::EventCount { .. } => SliceMethod::ConstantEventNumber,
        }
    }
}
