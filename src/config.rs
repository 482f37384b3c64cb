use serde::{Deserialize, Serialize};

pub const MIN_SNAP_VALUE: f32 = 0.0001;

/// Editor behavior knobs. Every field has a default, so a partial JSON
/// object (or `{}`) is a valid config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub snap_enabled: bool,
    pub snap_value: f32,
    pub grid_visible: bool,
    pub axes_visible: bool,
    /// Per-axis change below which a dragged transform counts as unchanged.
    pub drag_epsilon: f32,
    /// Max component deviation from the mean for a scale to count as uniform.
    pub uniform_scale_epsilon: f32,
    /// Handle size per unit of camera radius.
    pub handle_scale_factor: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_enabled: false,
            snap_value: 1.0,
            grid_visible: true,
            axes_visible: true,
            drag_epsilon: 1e-5,
            uniform_scale_epsilon: 1e-4,
            handle_scale_factor: 0.04,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        self.snap_value = clamp_snap_value(self.snap_value);
        self
    }

    /// Snap step handed to the manipulation handle.
    pub fn snap_distance(&self) -> Option<f32> {
        self.snap_enabled.then_some(self.snap_value)
    }
}

/// Zero and non-finite values fall back to 1, everything else is clamped
/// to `MIN_SNAP_VALUE`.
pub fn clamp_snap_value(value: f32) -> f32 {
    if !value.is_finite() || value == 0.0 {
        1.0
    } else {
        value.max(MIN_SNAP_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EditorConfig::from_json_str("{}").unwrap(), EditorConfig::default());
    }

    #[test]
    fn partial_config_overrides_and_ignores_unknown() {
        let config =
            EditorConfig::from_json_str(r#"{ "snapEnabled": true, "snapValue": 0.25, "theme": "dark" }"#)
                .unwrap();
        assert!(config.snap_enabled);
        assert_eq!(config.snap_value, 0.25);
        assert!(config.grid_visible);
        assert_eq!(config.snap_distance(), Some(0.25));
    }

    #[test]
    fn snap_value_is_clamped() {
        assert_eq!(clamp_snap_value(0.0), 1.0);
        assert_eq!(clamp_snap_value(f32::NAN), 1.0);
        assert_eq!(clamp_snap_value(0.00001), MIN_SNAP_VALUE);
        assert_eq!(clamp_snap_value(-3.0), MIN_SNAP_VALUE);
        let config = EditorConfig::from_json_str(r#"{ "snapValue": 0.000001 }"#).unwrap();
        assert_eq!(config.snap_value, MIN_SNAP_VALUE);
    }
}
