use dxl_gripper::control_table::ControlTable;
use dxl_gripper::*;
use tempdir::TempDir;

const ID: u8 = 3;

async fn calibrated_gripper() -> Gripper<MockTransport> {
    let dir = TempDir::new("gripper").unwrap();
    let path = dir.path().join("calibration.csv");
    CalibrationRecord::new(3000, 1000).save(&path).unwrap();

    let calibration = CalibrationRecord::load(&path).unwrap();
    let servo = Servo::new(MockTransport::factory(ID), ID);
    Gripper::new(servo, calibration).await.unwrap()
}

#[tokio::test]
async fn close_open_stop() {
    let table = ControlTable::default();
    let mut gripper = calibrated_gripper().await;
    assert_eq!(
        gripper.servo_mut().move_mode().await.unwrap(),
        MoveMode::Multiturn
    );
    gripper.servo_mut().transport_mut().clear_journal();

    gripper.close(Gripper::<MockTransport>::DEFAULT_SPEED).await.unwrap();
    assert_eq!(
        gripper.servo().transport().writes_to(table.goal_position.address),
        vec![3000]
    );

    gripper.open(Gripper::<MockTransport>::DEFAULT_SPEED).await.unwrap();
    assert_eq!(
        gripper.servo().transport().writes_to(table.goal_position.address),
        vec![3000, 1000]
    );
    assert_eq!(
        gripper.servo().transport().writes_to(table.moving_speed.address),
        vec![100, 100]
    );

    gripper.servo_mut().transport_mut().clear_journal();
    gripper.stop().await.unwrap();
    let writes = gripper.servo().transport().writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].address, table.torque_enable.address);
    assert_eq!(writes[0].value, 0);
    assert_eq!(writes[1].address, table.torque_enable.address);
    assert_eq!(writes[1].value, 1);
}

#[tokio::test]
async fn move_to_inside_and_outside_range() {
    let table = ControlTable::default();
    let mut gripper = calibrated_gripper().await;
    gripper.servo_mut().transport_mut().clear_journal();

    let err = gripper.move_to(500, 100).await.unwrap_err();
    assert!(err.is_rejection());
    gripper.move_to(1500, 100).await.unwrap();
    let err = gripper.move_to(3500, 100).await.unwrap_err();
    assert!(err.is_rejection());

    assert_eq!(
        gripper.servo().transport().writes_to(table.goal_position.address),
        vec![1500]
    );
}

#[tokio::test]
async fn communication_failure_surfaces() {
    let mut gripper = calibrated_gripper().await;
    gripper
        .servo_mut()
        .transport_mut()
        .fail_next(CommResult::RxTimeout);
    let err = gripper.close(100).await.unwrap_err();
    assert!(matches!(
        err,
        GripperError::CommunicationFailure(CommResult::RxTimeout)
    ));
    assert!(!err.is_rejection());
}

#[tokio::test]
async fn gripper_rejects_commands_after_mode_change() {
    let mut gripper = calibrated_gripper().await;
    gripper.servo_mut().init_wheel_mode().await.unwrap();
    assert!(matches!(
        gripper.close(100).await,
        Err(GripperError::ModeViolation { .. })
    ));
}

#[tokio::test]
async fn missing_calibration_file_is_fatal() {
    let dir = TempDir::new("gripper").unwrap();
    assert!(CalibrationRecord::load(dir.path().join("calibration.csv")).is_err());
}
