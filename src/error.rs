use crate::mode::{LimitPair, MoveMode};
use crate::protocol::{CommResult, DeviceError};
use thiserror::Error;

pub type GripperResult<T> = Result<T, GripperError>;

#[derive(Debug, Error)]
pub enum GripperError {
    #[error("std io error")]
    IOError(#[from] std::io::Error),
    #[error("serial port error")]
    SerialError(#[from] tokio_serial::Error),
    #[error("communication failure: {0}")]
    CommunicationFailure(CommResult),
    #[error("servo reported an error: {0}")]
    DeviceError(DeviceError),
    #[error("{operation} is not available in {actual:?} mode, switch to {required:?} mode first")]
    ModeViolation {
        operation: &'static str,
        required: MoveMode,
        actual: MoveMode,
    },
    #[error("limits cw={} ccw={} match no operating mode", .0.cw, .0.ccw)]
    InconsistentMode(LimitPair),
    #[error("{what} {value} is out of range, valid range is [{min}, {max}]")]
    RangeViolation {
        what: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
    #[error("calibration aborted while confirming the {step} position")]
    CalibrationAborted { step: &'static str },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("calibration file error")]
    CalibrationError(#[from] csv::Error),
    #[error("calibration file {0} holds no record")]
    MissingCalibration(String),
    #[error("configuration error")]
    ConfigError(#[from] config::ConfigError),
}

impl GripperError {
    /// True for rejections made before anything was sent to the servo.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GripperError::ModeViolation { .. }
                | GripperError::InconsistentMode(_)
                | GripperError::RangeViolation { .. }
        )
    }
}
