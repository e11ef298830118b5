//! Application settings

use serde::{Deserialize, Serialize};

/// Orbit control tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Fraction of the remaining distance covered per frame, in (0, 1)
    pub damping_factor: f32,
    /// Multiplier for drag rotation
    pub rotate_speed: f32,
    /// Multiplier for wheel zoom
    pub zoom_speed: f32,
    /// Multiplier for drag panning
    pub pan_speed: f32,
    /// Closest orbit distance
    pub min_distance: f32,
    /// Farthest orbit distance
    pub max_distance: f32,
    /// Largest polar angle from +Y (radians)
    pub max_polar_angle: f32,
    /// Allow secondary-button panning
    pub enable_pan: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 1.0,
            max_distance: 20.0,
            max_polar_angle: std::f32::consts::PI / 1.5,
            enable_pan: true,
        }
    }
}

impl ControlSettings {
    /// Replace out-of-range values with defaults
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut out = self;

        if !(out.damping_factor > 0.0 && out.damping_factor < 1.0) {
            tracing::warn!(
                "damping_factor {} outside (0, 1), using {}",
                out.damping_factor,
                defaults.damping_factor
            );
            out.damping_factor = defaults.damping_factor;
        }
        if !(out.min_distance > 0.0 && out.min_distance <= out.max_distance)
            || !out.max_distance.is_finite()
        {
            tracing::warn!(
                "zoom range [{}, {}] is invalid, using defaults",
                out.min_distance,
                out.max_distance
            );
            out.min_distance = defaults.min_distance;
            out.max_distance = defaults.max_distance;
        }
        if !(out.max_polar_angle > 0.0 && out.max_polar_angle <= std::f32::consts::PI) {
            tracing::warn!("max_polar_angle {} is invalid", out.max_polar_angle);
            out.max_polar_angle = defaults.max_polar_angle;
        }
        for speed in [&mut out.rotate_speed, &mut out.zoom_speed, &mut out.pan_speed] {
            if !(speed.is_finite() && *speed > 0.0) {
                *speed = 1.0;
            }
        }
        out
    }
}

/// UI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Font size in points
    pub font_size: f32,
    /// Page count used when the app starts without `--pages`
    pub page_count: u32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            page_count: shared::DEFAULT_PAGE_COUNT,
        }
    }
}

/// All viewer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default)]
    pub controls: ControlSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

impl ViewerSettings {
    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        if let Some(dirs) = project_dirs() {
            let config_path = dirs.config_dir().join("settings.json");
            if let Ok(json) = std::fs::read_to_string(&config_path) {
                match Self::from_json(&json) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!("Ignoring {}: {e}", config_path.display()),
                }
            }
        }
        Self::default()
    }

    /// Parse settings, sanitizing control values
    pub fn from_json(json: &str) -> Result<Self, String> {
        let mut settings: ViewerSettings =
            serde_json::from_str(json).map_err(|e| format!("JSON parse error: {e}"))?;
        settings.controls = settings.controls.sanitized();
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(dirs) = project_dirs() {
            let config_dir = dirs.config_dir();
            if std::fs::create_dir_all(config_dir).is_ok() {
                let config_path = config_dir.join("settings.json");
                if let Ok(json) = serde_json::to_string_pretty(self) {
                    if let Err(e) = std::fs::write(&config_path, json) {
                        tracing::warn!("Failed to save {}: {e}", config_path.display());
                    }
                }
            }
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "notebook", "notebook-viewer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let c = ControlSettings::default();
        assert_eq!(c.clone().sanitized(), c);
    }

    #[test]
    fn test_sanitize_damping() {
        let c = ControlSettings {
            damping_factor: 1.5,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(c.damping_factor, 0.05);

        let c = ControlSettings {
            damping_factor: 0.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(c.damping_factor, 0.05);
    }

    #[test]
    fn test_sanitize_inverted_zoom_range() {
        let c = ControlSettings {
            min_distance: 10.0,
            max_distance: 2.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(c.min_distance, 1.0);
        assert_eq!(c.max_distance, 20.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s = ViewerSettings::from_json(r#"{"controls":{"damping_factor":0.2}}"#).unwrap();
        assert_eq!(s.controls.damping_factor, 0.2);
        assert_eq!(s.controls.max_distance, 20.0);
        assert_eq!(s.ui.page_count, shared::DEFAULT_PAGE_COUNT);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(ViewerSettings::from_json("{").is_err());
    }
}
