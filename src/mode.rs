//! Operating modes derived from the angle limit registers.
//!
//! The servo has no mode register. Its mode follows from the CW and CCW
//! angle limits alone:
//!
//! | cw            | ccw           | mode       |
//! |---------------|---------------|------------|
//! | 0             | 0             | wheel      |
//! | 1..=4094      | 1..=4094      | joint      |
//! | 4095          | 4095          | multi-turn |
//!
//! Any other pair, including the factory reset pair `(0, 4095)`, matches no
//! mode.

use crate::control_table::{CW_DIRECTION_BIT, MAX_ENCODER, RPM_PER_UNIT};
use serde::{Deserialize, Serialize};

/// Operating mode of the servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveMode {
    /// Endless rotation, speed control only.
    Wheel,
    /// Position control inside the angle limits.
    Joint,
    /// Position control over several turns.
    Multiturn,
}

impl MoveMode {
    /// Classify a limit pair. `None` means the pair matches no mode.
    pub fn classify(limits: LimitPair) -> Option<MoveMode> {
        let inner = |v: u16| v > 0 && v < MAX_ENCODER;
        match (limits.cw, limits.ccw) {
            (0, 0) => Some(MoveMode::Wheel),
            (MAX_ENCODER, MAX_ENCODER) => Some(MoveMode::Multiturn),
            (cw, ccw) if inner(cw) && inner(ccw) => Some(MoveMode::Joint),
            _ => None,
        }
    }
}

impl std::fmt::Display for MoveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveMode::Wheel => write!(f, "wheel"),
            MoveMode::Joint => write!(f, "joint"),
            MoveMode::Multiturn => write!(f, "multiturn"),
        }
    }
}

/// CW and CCW angle limits as read from the servo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPair {
    pub cw: u16,
    pub ccw: u16,
}

impl LimitPair {
    pub const WHEEL: LimitPair = LimitPair { cw: 0, ccw: 0 };
    pub const MULTITURN: LimitPair = LimitPair {
        cw: MAX_ENCODER,
        ccw: MAX_ENCODER,
    };
    /// Factory limits. Leaves the servo outside every mode.
    pub const RESET: LimitPair = LimitPair {
        cw: 0,
        ccw: MAX_ENCODER,
    };

    pub fn new(cw: u16, ccw: u16) -> Self {
        Self { cw, ccw }
    }

    pub fn min(&self) -> u16 {
        self.cw.min(self.ccw)
    }

    pub fn max(&self) -> u16 {
        self.cw.max(self.ccw)
    }

    pub fn mode(&self) -> Option<MoveMode> {
        MoveMode::classify(*self)
    }
}

/// Rotation direction, as seen from the horn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Cw,
    Ccw,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CW" => Ok(Direction::Cw),
            "CCW" => Ok(Direction::Ccw),
            other => Err(format!("unknown direction {other}, expected CW or CCW")),
        }
    }
}

/// Decoded present load or present speed register.
///
/// Bit 10 carries the direction: values up to 1023 act counter-clockwise,
/// values above 1024 act clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directional {
    Idle,
    Ccw(u16),
    Cw(u16),
}

impl Directional {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 | CW_DIRECTION_BIT => Directional::Idle,
            r if r < CW_DIRECTION_BIT => Directional::Ccw(r),
            r => Directional::Cw(r - CW_DIRECTION_BIT),
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Directional::Idle => None,
            Directional::Ccw(_) => Some(Direction::Ccw),
            Directional::Cw(_) => Some(Direction::Cw),
        }
    }

    /// Signed register value: positive counter-clockwise, negative clockwise.
    pub fn value(&self) -> i32 {
        match self {
            Directional::Idle => 0,
            Directional::Ccw(magnitude) => *magnitude as i32,
            Directional::Cw(magnitude) => -(*magnitude as i32),
        }
    }

    /// Signed value in RPM, for present speed readings.
    pub fn rpm(&self) -> f32 {
        self.value() as f32 * RPM_PER_UNIT
    }
}
