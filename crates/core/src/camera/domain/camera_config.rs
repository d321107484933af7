use std::fmt;

use crate::shared::constants::{AUTO_FLASH_LUMA_THRESHOLD, DEFAULT_MAX_ZOOM};

/// Which physical camera is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CameraPosition {
    Front,
    #[default]
    Back,
}

impl CameraPosition {
    pub fn opposite(self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

impl FlashMode {
    /// Whether the flash fires for a still. `scene_luma` is only evaluated in
    /// `Auto` mode. Never fires without a flash unit.
    pub fn fires(self, has_flash: bool, scene_luma: impl FnOnce() -> f64) -> bool {
        if !has_flash {
            return false;
        }
        match self {
            FlashMode::Off => false,
            FlashMode::On => true,
            FlashMode::Auto => scene_luma() < AUTO_FLASH_LUMA_THRESHOLD,
        }
    }
}

impl fmt::Display for FlashMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashMode::Off => write!(f, "off"),
            FlashMode::On => write!(f, "on"),
            FlashMode::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for FlashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(FlashMode::Off),
            "on" => Ok(FlashMode::On),
            "auto" => Ok(FlashMode::Auto),
            other => Err(format!("unknown flash mode '{other}' (expected on, off or auto)")),
        }
    }
}

/// What an opened device can do.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraCapabilities {
    pub positions: Vec<CameraPosition>,
    pub max_zoom: f64,
    pub has_flash: bool,
}

impl CameraCapabilities {
    pub fn supports(&self, position: CameraPosition) -> bool {
        self.positions.contains(&position)
    }
}

impl Default for CameraCapabilities {
    fn default() -> Self {
        Self {
            positions: vec![CameraPosition::Back],
            max_zoom: DEFAULT_MAX_ZOOM,
            has_flash: false,
        }
    }
}

/// Runtime camera configuration, read once per processed frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: CameraPosition,
    /// Always within `[1.0, max_zoom]`.
    zoom: f64,
    max_zoom: f64,
    pub flash: FlashMode,
    pub detection_enabled: bool,
}

impl CameraConfig {
    pub fn new(position: CameraPosition, max_zoom: f64) -> Self {
        Self {
            position,
            zoom: 1.0,
            max_zoom: sanitize_max_zoom(max_zoom),
            flash: FlashMode::Off,
            detection_enabled: true,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    /// Sets zoom, clamping into `[1.0, max_zoom]`. Returns the applied value.
    pub fn set_zoom(&mut self, factor: f64) -> f64 {
        self.zoom = clamp_zoom(factor, self.max_zoom);
        self.zoom
    }

    /// Replaces the zoom ceiling and re-clamps the current zoom.
    pub fn set_max_zoom(&mut self, max_zoom: f64) {
        self.max_zoom = sanitize_max_zoom(max_zoom);
        self.zoom = clamp_zoom(self.zoom, self.max_zoom);
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::new(CameraPosition::default(), DEFAULT_MAX_ZOOM)
    }
}

/// Clamps a requested zoom into `[1.0, max_zoom]`; non-finite input maps to 1.0.
pub fn clamp_zoom(factor: f64, max_zoom: f64) -> f64 {
    if factor.is_nan() {
        return 1.0;
    }
    factor.clamp(1.0, sanitize_max_zoom(max_zoom))
}

fn sanitize_max_zoom(max_zoom: f64) -> f64 {
    if max_zoom.is_finite() && max_zoom >= 1.0 {
        max_zoom
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::off(FlashMode::Off, true, 10.0, false)]
    #[case::on(FlashMode::On, true, 200.0, true)]
    #[case::auto_dark(FlashMode::Auto, true, 20.0, true)]
    #[case::auto_bright(FlashMode::Auto, true, 150.0, false)]
    #[case::no_unit(FlashMode::On, false, 10.0, false)]
    fn test_flash_fires(
        #[case] mode: FlashMode,
        #[case] has_flash: bool,
        #[case] luma: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(mode.fires(has_flash, || luma), expected);
    }

    #[test]
    fn test_default_config() {
        let config = CameraConfig::default();
        assert_eq!(config.position, CameraPosition::Back);
        assert_relative_eq!(config.zoom(), 1.0, epsilon = 1e-9);
        assert_eq!(config.flash, FlashMode::Off);
        assert!(config.detection_enabled);
    }

    #[rstest]
    #[case::below_one(0.5, 1.0)]
    #[case::in_range(2.5, 2.5)]
    #[case::at_max(4.0, 4.0)]
    #[case::above_max(9.0, 4.0)]
    #[case::nan(f64::NAN, 1.0)]
    #[case::infinity(f64::INFINITY, 4.0)]
    #[case::neg_infinity(f64::NEG_INFINITY, 1.0)]
    fn test_set_zoom_clamps(#[case] requested: f64, #[case] expected: f64) {
        let mut config = CameraConfig::new(CameraPosition::Back, 4.0);
        assert_relative_eq!(config.set_zoom(requested), expected, epsilon = 1e-9);
        assert_relative_eq!(config.zoom(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_clamping_is_idempotent_above_max() {
        let max = 3.0;
        for k in [0.001, 1.0, 100.0] {
            assert_relative_eq!(clamp_zoom(max + k, max), clamp_zoom(max, max), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_set_max_zoom_reclamps() {
        let mut config = CameraConfig::new(CameraPosition::Front, 8.0);
        config.set_zoom(6.0);
        config.set_max_zoom(2.0);
        assert_relative_eq!(config.zoom(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_max_zoom_falls_back_to_one() {
        let config = CameraConfig::new(CameraPosition::Front, 0.2);
        assert_relative_eq!(config.max_zoom(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flash_mode_parse() {
        assert_eq!("AUTO".parse::<FlashMode>().unwrap(), FlashMode::Auto);
        assert!("strobe".parse::<FlashMode>().is_err());
    }

    #[test]
    fn test_position_opposite() {
        assert_eq!(CameraPosition::Front.opposite(), CameraPosition::Back);
        assert_eq!(CameraPosition::Back.opposite(), CameraPosition::Front);
    }
}
