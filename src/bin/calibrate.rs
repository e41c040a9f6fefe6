//! Interactive calibration of the gripper travel range.
//!
//! ```sh
//! cargo run --bin dxl-calibrate
//! ```
//!
//! Asks for the servo id and port number, then for the closed and the open
//! finger position. Writes `calibration.csv` in the working directory.
//! Answering anything but `yes` at a confirmation exits without writing.

use dxl_gripper::calibration::{CalibrationWorkflow, DEFAULT_CALIBRATION_PATH};
use dxl_gripper::control_table::BAUD_RATE;
use dxl_gripper::logging::setup_tracing;
use dxl_gripper::SerialTransport;
use std::io::{self, BufRead};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_tracing(0);

    let result = CalibrationWorkflow::new(io::stdin().lock(), io::stdout())
        .run_and_save(
            |port, _id| SerialTransport::open(port, BAUD_RATE, SerialTransport::DEFAULT_TIMEOUT),
            DEFAULT_CALIBRATION_PATH,
        )
        .await;

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }

    println!("Press enter to exit");
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
