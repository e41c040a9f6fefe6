//! # dxl-gripper
//!
//! `dxl-gripper` is a library for driving a one finger gripper built on a
//! Dynamixel MX servo (firmware 41, protocol 1.0, 57600 baud).
//!
//! ### Layers
//! - [`servo::Servo`]: named registers of one servo, with the operating mode
//!   derived from the CW/CCW angle limits on every call
//! - [`calibration`]: records the closed and open positions of the finger
//! - [`gripper::Gripper`]: open / close / move within the calibrated range
//! - [`grasp`]: grasp rectangle proposals from a patch scoring model
//!
//! ## Example
//! ```no_run
//! use dxl_gripper::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), GripperError> {
//!     // run `dxl-calibrate` first, it writes calibration.csv
//!     let config = GripperConfig::new("/dev/ttyUSB0", 3);
//!
//!     // opens the port, switches the servo to multi-turn mode
//!     // and loads the calibration
//!     let mut gripper = Gripper::connect(&config).await?;
//!
//!     gripper.close(100).await?;
//!     std::thread::sleep(std::time::Duration::from_millis(1000));
//!     gripper.open(100).await?;
//!     std::thread::sleep(std::time::Duration::from_millis(1000));
//!
//!     // chained commands
//!     let range = *gripper.calibration();
//!     gripper
//!         .move_to((range.open_limit + range.close_limit) / 2, 50)
//!         .await?
//!         .stop()
//!         .await?;
//!
//!     // register level access
//!     let servo = gripper.servo_mut();
//!     println!("mode     : {}", servo.move_mode().await?);
//!     println!("position : {}", servo.read_current_position().await?);
//!     println!("voltage  : {} V", servo.read_voltage().await?);
//!     println!("load     : {:?}", servo.read_load().await?);
//!
//!     Ok(())
//! }
//! ```

pub mod app_config;
pub mod calibration;
pub mod control_table;
pub mod error;
pub mod grasp;
pub mod gripper;
pub mod logging;
pub mod mode;
pub mod protocol;
pub mod servo;
pub mod transport;

pub use app_config::GripperConfig;
pub use calibration::{CalibrationRecord, CalibrationWorkflow};
pub use error::{GripperError, GripperResult};
pub use gripper::Gripper;
pub use mode::{Direction, Directional, LimitPair, MoveMode};
pub use protocol::{CommResult, DeviceError};
pub use servo::{Servo, ServoStatus};
pub use transport::{MockTransport, SerialTransport, Transport};
