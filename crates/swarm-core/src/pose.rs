//! Cursor pose: the state a participant broadcasts and observes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Clamps `value` into `[min, max]`.
pub fn clamp(min: f64, value: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Cursor sprite shown by the party server. The wire format is the numeric
/// code; alias names used by the web client collapse onto the same codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Glyph {
    #[default]
    Cursor,
    Gun,
    Four,
    HandBack,
    HornsFront,
    PointerFront,
    HandFront,
    HornsBack,
    FistBack,
    PointerBack,
    Shaka,
    FistFront,
    Thumb,
    Wait,
}

impl Glyph {
    pub fn code(self) -> u8 {
        match self {
            Glyph::Cursor => 0,
            Glyph::Gun => 1,
            Glyph::Four => 2,
            Glyph::HandBack => 3,
            Glyph::HornsFront => 4,
            Glyph::PointerFront => 5,
            Glyph::HandFront => 6,
            Glyph::HornsBack => 7,
            Glyph::FistBack => 8,
            Glyph::PointerBack => 9,
            Glyph::Shaka => 10,
            Glyph::FistFront => 11,
            Glyph::Thumb => 12,
            Glyph::Wait => 13,
        }
    }

    /// Unknown codes fall back to the default cursor rather than failing the
    /// whole event decode; new sprites are expected during partial rollout.
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Glyph::Cursor,
            1 => Glyph::Gun,
            2 => Glyph::Four,
            3 => Glyph::HandBack,
            4 => Glyph::HornsFront,
            5 => Glyph::PointerFront,
            6 => Glyph::HandFront,
            7 => Glyph::HornsBack,
            8 => Glyph::FistBack,
            9 => Glyph::PointerBack,
            10 => Glyph::Shaka,
            11 => Glyph::FistFront,
            12 => Glyph::Thumb,
            13 => Glyph::Wait,
            _ => Glyph::Cursor,
        }
    }
}

impl Serialize for Glyph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Glyph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u64::deserialize(deserializer)?;
        Ok(Glyph::from_code(code))
    }
}

/// A participant's cursor pose. Field names match the wire payload of the
/// `mouse-coords` event exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub cursor: Glyph,
    pub scale: f64,
    pub rotations: u64,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            cursor: Glyph::default(),
            scale: 0.15,
            rotations: 0,
        }
    }
}

impl Pose {
    /// Sets the position, clamped into the unit square. Idempotent: feeding
    /// an out-of-range value twice yields the same result as once.
    pub fn set_position(&mut self, x: f64, y: f64) -> &mut Self {
        self.x = clamp(0.0, x, 1.0);
        self.y = clamp(0.0, y, 1.0);
        self
    }

    pub fn set_angle(&mut self, angle: f64) -> &mut Self {
        self.angle = angle;
        self
    }

    pub fn set_scale(&mut self, scale: f64) -> &mut Self {
        self.scale = clamp(0.05, scale, 10.0);
        self
    }

    pub fn set_glyph(&mut self, glyph: Glyph) -> &mut Self {
        self.cursor = glyph;
        self
    }

    pub fn rotate(&mut self) -> &mut Self {
        self.rotations += 1;
        self
    }
}
