use dxl_gripper::*;

#[tokio::main]
async fn main() -> Result<(), GripperError> {
    // The serial port path and the servo id
    let path = "COM5";
    let id = 3;

    // Servo
    //
    // open the port at 57600 baud, protocol 1.0
    let transport = SerialTransport::open(path, 57_600, SerialTransport::DEFAULT_TIMEOUT)?;
    let mut servo = Servo::new(transport, id);

    // the mode follows from the angle limits
    servo.init_joint_mode(1000, 3000).await?;
    println!("Mode : {}", servo.move_mode().await?);
    servo.joint_set_speed(80).await?;
    servo.goto(2000).await?;
    while servo.is_moving().await? {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    println!("Position : {}", servo.read_current_position().await?);

    // out of range targets are rejected before anything is sent
    if let Err(err) = servo.goto(3500).await {
        println!("Rejected : {}", err);
    }

    // wheel mode takes a direction and a speed instead of a position
    servo.init_wheel_mode().await?;
    servo.wheel_set_speed(Direction::Ccw, 200).await?;
    std::thread::sleep(std::time::Duration::from_millis(1000));
    println!("Speed : {} rpm", servo.read_speed().await?.rpm());
    servo.wheel_set_speed(Direction::Ccw, 0).await?;

    // Gripper
    //
    // switches to multi-turn mode, bounded by a calibration record
    let calibration = CalibrationRecord::load("calibration.csv")?;
    let mut gripper = Gripper::new(servo, calibration).await?;
    gripper.close(Gripper::<SerialTransport>::DEFAULT_SPEED).await?;
    std::thread::sleep(std::time::Duration::from_millis(1000));
    gripper
        .open(Gripper::<SerialTransport>::DEFAULT_SPEED)
        .await?
        .stop()
        .await?;

    // restore the factory limits
    gripper.into_inner().reset_move_mode().await?;

    Ok(())
}
