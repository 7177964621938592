use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use sdl2::keyboard::Keycode;

use crate::config::Settings;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One user adjustment, named after the control that produces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    AutoRotate(bool),
    /// Radians per frame.
    RotateSpeed(f32),
    /// Degrees.
    CameraFov(f32),
    AmbientIntensity(f32),
    /// Degrees, any range.
    EnvRotation(f32),
    DirectionalIntensity(f32),
    DirectionalPosition(Axis, f32),
    SelectModel(usize),
}

pub const ROTATE_SPEED: RangeInclusive<f32> = 0.0005..=0.05;
pub const CAMERA_FOV: RangeInclusive<f32> = 20.0..=100.0;
pub const AMBIENT_INTENSITY: RangeInclusive<f32> = 0.0..=2.0;
pub const DIRECTIONAL_INTENSITY: RangeInclusive<f32> = 0.0..=5.0;
pub const DIRECTIONAL_POSITION: RangeInclusive<f32> = -10.0..=10.0;

fn clamp(value: f32, range: &RangeInclusive<f32>) -> f32 {
    value.clamp(*range.start(), *range.end())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "checked" => Some(true),
        "false" | "0" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Control {
    pub const IDS: [&'static str; 10] = [
        "autoRotate",
        "rotateSpeed",
        "cameraFov",
        "ambientIntensity",
        "envRotation",
        "dirIntensity",
        "dirX",
        "dirY",
        "dirZ",
        "model",
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Control::AutoRotate(_) => "autoRotate",
            Control::RotateSpeed(_) => "rotateSpeed",
            Control::CameraFov(_) => "cameraFov",
            Control::AmbientIntensity(_) => "ambientIntensity",
            Control::EnvRotation(_) => "envRotation",
            Control::DirectionalIntensity(_) => "dirIntensity",
            Control::DirectionalPosition(Axis::X, _) => "dirX",
            Control::DirectionalPosition(Axis::Y, _) => "dirY",
            Control::DirectionalPosition(Axis::Z, _) => "dirZ",
            Control::SelectModel(_) => "model",
        }
    }

    /// Builds a control from its id and raw input value, clamped to the control's range.
    pub fn parse(id: &str, value: &str) -> Result<Self> {
        let invalid = || Error::InvalidControlValue {
            id: id.to_string(),
            value: value.to_string(),
        };
        let number = || {
            value
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(invalid)
        };

        let control = match id {
            "autoRotate" => Control::AutoRotate(parse_bool(value).ok_or_else(invalid)?),
            "rotateSpeed" => Control::RotateSpeed(number()?),
            "cameraFov" => Control::CameraFov(number()?),
            "ambientIntensity" => Control::AmbientIntensity(number()?),
            "envRotation" => Control::EnvRotation(number()?),
            "dirIntensity" => Control::DirectionalIntensity(number()?),
            "dirX" => Control::DirectionalPosition(Axis::X, number()?),
            "dirY" => Control::DirectionalPosition(Axis::Y, number()?),
            "dirZ" => Control::DirectionalPosition(Axis::Z, number()?),
            "model" => Control::SelectModel(value.trim().parse().map_err(|_| invalid())?),
            _ => return Err(Error::UnknownControl(id.to_string())),
        };
        Ok(control.clamped())
    }

    pub fn clamped(self) -> Self {
        match self {
            Control::RotateSpeed(v) => Control::RotateSpeed(clamp(v, &ROTATE_SPEED)),
            Control::CameraFov(v) => Control::CameraFov(clamp(v, &CAMERA_FOV)),
            Control::AmbientIntensity(v) => Control::AmbientIntensity(clamp(v, &AMBIENT_INTENSITY)),
            Control::DirectionalIntensity(v) => {
                Control::DirectionalIntensity(clamp(v, &DIRECTIONAL_INTENSITY))
            }
            Control::DirectionalPosition(axis, v) => {
                Control::DirectionalPosition(axis, clamp(v, &DIRECTIONAL_POSITION))
            }
            other => other,
        }
    }
}

/// `id=value`, as sent on stdin.
impl FromStr for Control {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (id, value) = s.split_once('=').unwrap_or((s, ""));
        Control::parse(id.trim(), value)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::AutoRotate(v) => write!(f, "{}={}", self.id(), v),
            Control::SelectModel(v) => write!(f, "{}={}", self.id(), v),
            Control::RotateSpeed(v)
            | Control::CameraFov(v)
            | Control::AmbientIntensity(v)
            | Control::EnvRotation(v)
            | Control::DirectionalIntensity(v)
            | Control::DirectionalPosition(_, v) => write!(f, "{}={}", self.id(), v),
        }
    }
}

/// Keyboard shortcuts, expressed as the control they nudge from the current values.
pub fn control_for_key(key: Keycode, settings: &Settings, fov: f32) -> Option<Control> {
    let control = match key {
        Keycode::R => Control::AutoRotate(!settings.auto_rotate),
        Keycode::Equals | Keycode::KpPlus => Control::RotateSpeed(settings.rotate_speed + 0.0025),
        Keycode::Minus | Keycode::KpMinus => Control::RotateSpeed(settings.rotate_speed - 0.0025),
        Keycode::RightBracket => Control::CameraFov(fov + 5.0),
        Keycode::LeftBracket => Control::CameraFov(fov - 5.0),
        Keycode::A => Control::AmbientIntensity(settings.ambient_intensity + 0.1),
        Keycode::Z => Control::AmbientIntensity(settings.ambient_intensity - 0.1),
        Keycode::Right => Control::EnvRotation(settings.env_rotation.to_degrees() + 5.0),
        Keycode::Left => Control::EnvRotation(settings.env_rotation.to_degrees() - 5.0),
        Keycode::I => Control::DirectionalIntensity(settings.directional_intensity + 0.25),
        Keycode::K => Control::DirectionalIntensity(settings.directional_intensity - 0.25),
        Keycode::Num1 => Control::SelectModel(0),
        Keycode::Num2 => Control::SelectModel(1),
        Keycode::Num3 => Control::SelectModel(2),
        Keycode::Num4 => Control::SelectModel(3),
        Keycode::Num5 => Control::SelectModel(4),
        Keycode::Num6 => Control::SelectModel(5),
        Keycode::Num7 => Control::SelectModel(6),
        Keycode::Num8 => Control::SelectModel(7),
        Keycode::Num9 => Control::SelectModel(8),
        _ => return None,
    };
    Some(control.clamped())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_id_parses() {
        for id in Control::IDS {
            let value = if id == "autoRotate" { "true" } else { "1" };
            let control = Control::parse(id, value).unwrap();
            assert_eq!(control.id(), id);
        }
    }

    #[test]
    fn values_are_clamped_to_slider_ranges() {
        assert_eq!(Control::parse("cameraFov", "150").unwrap(), Control::CameraFov(100.0));
        assert_eq!(
            Control::parse("ambientIntensity", "-1").unwrap(),
            Control::AmbientIntensity(0.0)
        );
        assert_eq!(Control::parse("rotateSpeed", "1").unwrap(), Control::RotateSpeed(0.05));
        // environment rotation has no bounds
        assert_eq!(Control::parse("envRotation", "720").unwrap(), Control::EnvRotation(720.0));
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(matches!(
            Control::parse("brightness", "1"),
            Err(Error::UnknownControl(_))
        ));
        assert!(matches!(
            Control::parse("cameraFov", "wide"),
            Err(Error::InvalidControlValue { .. })
        ));
        assert!(Control::parse("rotateSpeed", "NaN").is_err());
        assert!(Control::parse("model", "-1").is_err());
        assert!(Control::parse("autoRotate", "maybe").is_err());
    }

    #[test]
    fn line_form_round_trips_through_display() {
        let control: Control = "dirY = 4.5".parse().unwrap();
        assert_eq!(control, Control::DirectionalPosition(Axis::Y, 4.5));
        assert_eq!(control.to_string(), "dirY=4.5");
        assert_eq!("autoRotate=on".parse::<Control>().unwrap(), Control::AutoRotate(true));
    }

    #[test]
    fn keys_nudge_current_values() {
        let settings = Settings::default();
        assert_eq!(
            control_for_key(Keycode::R, &settings, 45.0),
            Some(Control::AutoRotate(true))
        );
        assert_eq!(
            control_for_key(Keycode::RightBracket, &settings, 98.0),
            Some(Control::CameraFov(100.0))
        );
        assert_eq!(
            control_for_key(Keycode::Num3, &settings, 45.0),
            Some(Control::SelectModel(2))
        );
        assert_eq!(control_for_key(Keycode::Q, &settings, 45.0), None);
    }
}
