//! Calibration of the gripper travel range.
//!
//! The operator pushes the finger to its closed position, confirms, pulls it
//! to its open position and confirms again. Both encoder positions are
//! stored as a one row CSV file with the columns `close_limit,open_limit`.
//!
//! Run the `dxl-calibrate` binary to create `calibration.csv`. Recalibrate
//! whenever the finger tips or the mounting change.

use crate::error::{GripperError, GripperResult};
use crate::servo::Servo;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default location of the calibration file, relative to the working directory.
pub const DEFAULT_CALIBRATION_PATH: &str = "calibration.csv";

/// The only answer accepted as a confirmation.
pub const CONFIRMATION: &str = "yes";

/// Travel range of the gripper in raw encoder counts.
///
/// Positions between `open_limit` and `close_limit` are legal targets.
/// Nothing enforces `open_limit <= close_limit`; an inverted record leaves
/// no legal target at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub close_limit: i32,
    pub open_limit: i32,
}

impl CalibrationRecord {
    pub fn new(close_limit: i32, open_limit: i32) -> Self {
        Self {
            close_limit,
            open_limit,
        }
    }

    /// Whether `position` lies in `open_limit..=close_limit`.
    pub fn contains(&self, position: i32) -> bool {
        position >= self.open_limit && position <= self.close_limit
    }

    /// Load the first record of a calibration file.
    pub fn load(path: impl AsRef<Path>) -> GripperResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let record = reader
            .deserialize::<CalibrationRecord>()
            .next()
            .ok_or_else(|| GripperError::MissingCalibration(path.display().to_string()))??;
        info!(
            "Loaded calibration from {}: close {} open {}",
            path.display(),
            record.close_limit,
            record.open_limit
        );
        Ok(record)
    }

    /// Write this record as the only row of `path`, replacing any old file.
    pub fn save(&self, path: impl AsRef<Path>) -> GripperResult<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.serialize(self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Serial port name for the port number the operator typed.
///
/// A number `n` becomes `COMn` on Windows and `/dev/ttyUSBn` elsewhere.
/// Anything else is taken as a port path.
pub fn port_name(answer: &str) -> GripperResult<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(GripperError::InvalidInput("empty port".to_string()));
    }
    Ok(match answer.parse::<u32>() {
        Ok(n) if cfg!(windows) => format!("COM{}", n),
        Ok(n) => format!("/dev/ttyUSB{}", n),
        Err(_) => answer.to_string(),
    })
}

const README: &str = "\
--------------------------------------------------------------------
README
This is the calibration tool, it helps you calibrate the gripper for
different devices. Calibrate the gripper every time you set up a new
finger tip or device.

Read the calibration instructions carefully in advance, otherwise the
gripper may break your device.

The calibration takes around 3 minutes.
Check the Dynamixel ID and the port number in advance.
When you are ready, take the gripper in your hand and plug in the
cables (power and USB).
--------------------------------------------------------------------";

/// The interactive calibration dialog.
///
/// Reads the operator's answers from `input` and writes prompts to `output`.
/// Any answer other than `yes` at a confirmation aborts the whole run.
pub struct CalibrationWorkflow<R, W> {
    input: R,
    output: W,
    settle: Duration,
}

impl<R: BufRead, W: Write> CalibrationWorkflow<R, W> {
    /// Pause after connecting and after each captured position.
    pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            settle: Self::DEFAULT_SETTLE,
        }
    }

    pub fn settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn say(&mut self, text: &str) -> GripperResult<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    fn ask(&mut self, prompt: &str) -> GripperResult<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Run the dialog up to and including both captures.
    ///
    /// `connect` opens a transport for the port name and servo id the
    /// operator gave.
    pub async fn run<T, F>(&mut self, connect: F) -> GripperResult<CalibrationRecord>
    where
        T: Transport,
        F: FnOnce(&str, u8) -> GripperResult<T>,
    {
        self.say(README)?;
        self.ask("Press 'Enter' for confirmation")?;

        let id = self.ask("Please enter the ID of your Dynamixel, e.g. 3\nYour input: ")?;
        let id = id
            .trim()
            .parse::<u8>()
            .map_err(|_| GripperError::InvalidInput(format!("servo id {:?}", id)))?;
        let port = self.ask("Please enter the port number of your PC, e.g. 5\nYour input: ")?;
        let port = port_name(&port)?;

        self.say("\nInitializing and activating your servo......")?;
        let mut servo = Servo::new(connect(port.as_str(), id)?, id);
        tokio::time::sleep(self.settle).await;
        self.say("Initializing and activating finished, follow the instructions to finish the calibration\n")?;

        let close_limit = self
            .capture(&mut servo, "close", "Please gently push the finger to your expected close position")
            .await?;
        self.say("The close limit is successfully stored\n")?;

        let open_limit = self
            .capture(&mut servo, "open", "Please gently pull the finger to your expected open position")
            .await?;
        self.say("The open limit is successfully stored\n")?;

        Ok(CalibrationRecord {
            close_limit,
            open_limit,
        })
    }

    /// Run the dialog and persist the record to `path`.
    pub async fn run_and_save<T, F>(
        &mut self,
        connect: F,
        path: impl AsRef<Path>,
    ) -> GripperResult<CalibrationRecord>
    where
        T: Transport,
        F: FnOnce(&str, u8) -> GripperResult<T>,
    {
        let record = self.run(connect).await?;
        record.save(path.as_ref())?;
        info!("Calibration written to {}", path.as_ref().display());
        self.say("\nThe calibration is successful, thanks for your cooperation :)")?;
        Ok(record)
    }

    async fn capture<T: Transport>(
        &mut self,
        servo: &mut Servo<T>,
        step: &'static str,
        instruction: &str,
    ) -> GripperResult<i32> {
        self.say(instruction)?;
        let answer =
            self.ask("Please enter 'yes' (lower case) and press 'Enter' to confirm the position\nYour input: ")?;
        if answer != CONFIRMATION {
            self.say("Invalid input, exiting")?;
            return Err(GripperError::CalibrationAborted { step });
        }
        self.say("Don't move the finger, writing......")?;
        let position = servo.read_current_position().await?;
        tokio::time::sleep(self.settle).await;
        info!("Captured {} limit {}", step, position);
        Ok(position as i32)
    }
}
