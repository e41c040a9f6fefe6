use anyhow::Result;
use clap::{Parser, Subcommand};
use dxl_gripper::app_config::get_configuration;
use dxl_gripper::logging::setup_tracing;
use dxl_gripper::Gripper;
use std::path::PathBuf;
use tracing::{error, info};

/// Drive the calibrated gripper
#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Configuration file (.yaml or .toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serial port of the servo, overrides the configuration
    #[arg(short, long)]
    port: Option<String>,
    /// Dynamixel id of the servo, overrides the configuration
    #[arg(short, long)]
    id: Option<u8>,
    /// Calibration file, overrides the configuration
    #[arg(long)]
    calibration: Option<PathBuf>,
    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move to the calibrated open position
    Open {
        #[arg(long)]
        speed: Option<u16>,
    },
    /// Move to the calibrated closed position
    Close {
        #[arg(long)]
        speed: Option<u16>,
    },
    /// Move to a position inside the calibrated range
    MoveTo {
        #[arg(allow_hyphen_values = true)]
        position: i32,
        #[arg(long)]
        speed: Option<u16>,
    },
    /// Release and restore holding torque
    Stop,
    /// Print the servo state as json
    Status,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    // any failure ends the process, as the gripper scripts always did
    if let Err(err) = run(args).await {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut overrides = vec![];
    if let Some(port) = args.port {
        overrides.push(("port", port));
    }
    if let Some(id) = args.id {
        overrides.push(("id", id.to_string()));
    }
    if let Some(calibration) = args.calibration {
        overrides.push(("calibration_path", calibration.display().to_string()));
    }
    let config = get_configuration(args.config.as_deref(), &overrides)?;
    let speed = |speed: Option<u16>| speed.unwrap_or(config.default_speed);

    let mut gripper = Gripper::connect(&config).await?;
    match args.command {
        Command::Open { speed: s } => {
            gripper.open(speed(s)).await?;
        }
        Command::Close { speed: s } => {
            gripper.close(speed(s)).await?;
        }
        Command::MoveTo { position, speed: s } => {
            gripper.move_to(position, speed(s)).await?;
            info!("Gripper moved to {}", position);
        }
        Command::Stop => {
            gripper.stop().await?;
            info!("Gripper stopped");
        }
        Command::Status => {
            let status = gripper.servo_mut().status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
