//! Control table of MX series servos running firmware 41.
//!
//! Factory state of the gripper servo: baud rate 34 (57600 bps), return
//! delay 250 (500 usec), CW angle limit 0, CCW angle limit 4095.

use serde::{Deserialize, Serialize};

/// Serial line speed the servo is configured for.
pub const BAUD_RATE: u32 = 57_600;
/// Dynamixel protocol spoken by the servo.
pub const PROTOCOL_VERSION: f32 = 1.0;

/// Highest raw encoder count in one revolution.
pub const MAX_ENCODER: u16 = 4095;
/// Bound of the goal position in multi-turn mode, both directions.
pub const MULTITURN_LIMIT: i32 = 28_672;
/// Highest moving speed in joint and multi-turn modes.
pub const MAX_JOINT_SPEED: u16 = 1023;
/// Highest moving speed in wheel mode, direction bit included.
pub const MAX_WHEEL_SPEED: u16 = 2047;
/// Highest torque limit.
pub const MAX_TORQUE: u16 = 1023;
/// Direction bit of speed and load registers, set for clockwise.
pub const CW_DIRECTION_BIT: u16 = 1024;
/// RPM per unit of the present speed register.
pub const RPM_PER_UNIT: f32 = 0.11;
/// Volts per unit of the present voltage register.
pub const VOLTS_PER_UNIT: f32 = 0.1;

/// One cell of the control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub address: u8,
    /// Width in bytes, 1 or 2.
    pub width: u8,
}

impl Register {
    pub const fn new(address: u8, width: u8) -> Self {
        Self { address, width }
    }
}

/// Register layout used by one servo handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlTable {
    pub cw_angle_limit: Register,
    pub ccw_angle_limit: Register,
    pub torque_enable: Register,
    pub goal_position: Register,
    pub moving_speed: Register,
    pub torque_limit: Register,
    pub present_position: Register,
    pub present_speed: Register,
    pub present_load: Register,
    pub present_voltage: Register,
    pub moving: Register,
}

impl ControlTable {
    /// MX-28/MX-64 layout, firmware 41.
    pub const MX_FIRMWARE_41: ControlTable = ControlTable {
        cw_angle_limit: Register::new(6, 2),
        ccw_angle_limit: Register::new(8, 2),
        torque_enable: Register::new(24, 1),
        goal_position: Register::new(30, 2),
        moving_speed: Register::new(32, 2),
        torque_limit: Register::new(34, 2),
        present_position: Register::new(36, 2),
        present_speed: Register::new(38, 2),
        present_load: Register::new(40, 2),
        present_voltage: Register::new(42, 1),
        moving: Register::new(46, 1),
    };
}

impl Default for ControlTable {
    fn default() -> Self {
        Self::MX_FIRMWARE_41
    }
}
