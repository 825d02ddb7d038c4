//! Flow engine configuration.
//!
//! All fields have defaults, so a TOML file only needs the values it changes:
//!
//! ```toml
//! search_distance = 3
//! subsample_shift = 1
//! slice_method = "constant_event_number"
//! slice_event_count = 2000
//! scale_factor = 5.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// How the engine decides when the current slice is complete.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceMethod {
    /// Rotate every `slice_duration_us` microseconds of event time.
    ConstantDuration = 0,
    /// Rotate every `slice_event_count` events.
    ConstantEventNumber = 1,
}

impl SliceMethod {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(SliceMethod::ConstantDuration),
            1 => Some(SliceMethod::ConstantEventNumber),
            _ => None,
        }
    }
}

impl std::str::FromStr for SliceMethod {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "constant_duration" | "duration" => Ok(SliceMethod::ConstantDuration),
            "constant_event_number" | "count" => Ok(SliceMethod::ConstantEventNumber),
            other => Err(FlowError::InvalidConfig(format!(
                "unknown slice method '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Half-width of the match window and of the shift search range, in
    /// subsampled pixels.
    pub search_distance: u32,
    /// Right shift applied to sensor coordinates (0 = full resolution).
    pub subsample_shift: u32,
    pub slice_duration_us: i64,
    pub slice_event_count: u32,
    pub slice_method: SliceMethod,
    /// Converts a shift in subsampled pixels per slice into output velocity units.
    pub scale_factor: f32,
    /// Maximum timestamp gap accepted by the correlation estimator.
    pub max_dt_us: i64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            search_distance: 3,
            subsample_shift: 0,
            slice_duration_us: 1000,
            slice_event_count: 1000,
            slice_method: SliceMethod::ConstantDuration,
            scale_factor: 5.0,
            max_dt_us: 100_000,
        }
    }
}

impl FlowConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: FlowConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_distance == 0 {
            return Err(FlowError::InvalidConfig(
                "search_distance must be positive".into(),
            ));
        }
        if self.search_distance > 64 {
            return Err(FlowError::InvalidConfig(
                "search_distance must be at most 64".into(),
            ));
        }
        if self.subsample_shift > 15 {
            return Err(FlowError::InvalidConfig(
                "subsample_shift must be at most 15".into(),
            ));
        }
        if self.slice_duration_us <= 0 {
            return Err(FlowError::InvalidConfig(
                "slice_duration_us must be positive".into(),
            ));
        }
        if self.slice_event_count == 0 {
            return Err(FlowError::InvalidConfig(
                "slice_event_count must be positive".into(),
            ));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(FlowError::InvalidConfig(
                "scale_factor must be a positive finite number".into(),
            ));
        }
        if self.max_dt_us <= 0 {
            return Err(FlowError::InvalidConfig(
                "max_dt_us must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FlowConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FlowConfig::from_toml_str(
            r#"
            search_distance = 2
            slice_method = "constant_event_number"
            slice_event_count = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.search_distance, 2);
        assert_eq!(config.slice_method, SliceMethod::ConstantEventNumber);
        assert_eq!(config.slice_event_count, 500);
        assert_eq!(config.slice_duration_us, 1000);
        assert_eq!(config.subsample_shift, 0);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(FlowConfig::from_toml_str("").unwrap(), FlowConfig::default());
    }

    #[test]
    fn test_unknown_slice_method_rejected() {
        let err = FlowConfig::from_toml_str(r#"slice_method = "sometimes""#).unwrap_err();
        assert!(matches!(err, FlowError::ConfigParse(_)));
    }

    #[test]
    fn test_zero_search_distance_rejected() {
        let err = FlowConfig::from_toml_str("search_distance = 0").unwrap_err();
        assert!(matches!(err, FlowError::InvalidConfig(_)));
    }

    #[test]
    fn test_negative_scale_rejected() {
        let config = FlowConfig {
            scale_factor: -1.0,
            ..FlowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FlowConfig::load("/nonexistent/edvs_flow.toml").unwrap_err();
        assert!(matches!(err, FlowError::Io(_)));
    }

    #[test]
    fn test_slice_method_from_i32() {
        assert_eq!(SliceMethod::from_i32(0), Some(SliceMethod::ConstantDuration));
        assert_eq!(SliceMethod::from_i32(1), Some(SliceMethod::ConstantEventNumber));
        assert_eq!(SliceMethod::from_i32(99), None);
    }

    #[test]
    fn test_slice_method_from_str() {
        assert_eq!(
            "count".parse::<SliceMethod>().unwrap(),
            SliceMethod::ConstantEventNumber
        );
        assert_eq!(
            "constant_duration".parse::<SliceMethod>().unwrap(),
            SliceMethod::ConstantDuration
        );
        assert!("bogus".parse::<SliceMethod>().is_err());
    }
}
