use crate::app_config::GripperConfig;
use crate::calibration::CalibrationRecord;
use crate::error::{GripperError, GripperResult};
use crate::servo::Servo;
use crate::transport::{SerialTransport, Transport};
use tracing::{info, warn};

/// One finger gripper driven by a multi-turn servo.
///
/// All motion is bounded by the calibrated travel range: the closed
/// position is `close_limit`, the open position `open_limit`.
#[derive(Debug)]
pub struct Gripper<T: Transport> {
    servo: Servo<T>,
    calibration: CalibrationRecord,
}

impl Gripper<SerialTransport> {
    /// Open the serial port, switch the servo to multi-turn mode and load
    /// the calibration file named in `config`.
    pub async fn connect(config: &GripperConfig) -> GripperResult<Self> {
        let transport =
            SerialTransport::open(config.port.clone(), config.baud_rate, config.timeout())?;
        let calibration = CalibrationRecord::load(&config.calibration_path)?;
        Self::new(Servo::new(transport, config.id), calibration).await
    }
}

impl<T: Transport> Gripper<T> {
    /// Moving speed used by [`Gripper::open`] and [`Gripper::close`] callers
    /// that have no preference.
    pub const DEFAULT_SPEED: u16 = 100;

    /// Take over `servo` and switch it to multi-turn mode.
    pub async fn new(mut servo: Servo<T>, calibration: CalibrationRecord) -> GripperResult<Self> {
        servo.init_multiturn_mode().await?;
        info!(
            "Gripper ready on servo {}, open {} close {}",
            servo.id(),
            calibration.open_limit,
            calibration.close_limit
        );
        Ok(Self { servo, calibration })
    }

    pub fn calibration(&self) -> &CalibrationRecord {
        &self.calibration
    }

    pub fn servo(&self) -> &Servo<T> {
        &self.servo
    }

    pub fn servo_mut(&mut self) -> &mut Servo<T> {
        &mut self.servo
    }

    pub fn into_inner(self) -> Servo<T> {
        self.servo
    }

    /// Move to the calibrated closed position.
    pub async fn close(&mut self, speed: u16) -> GripperResult<&mut Self> {
        self.servo.multiturn_set_speed(speed).await?;
        self.servo.goto(self.calibration.close_limit).await?;
        info!("Gripper is successfully closed");
        Ok(self)
    }

    /// Move to the calibrated open position.
    pub async fn open(&mut self, speed: u16) -> GripperResult<&mut Self> {
        self.servo.multiturn_set_speed(speed).await?;
        self.servo.goto(self.calibration.open_limit).await?;
        info!("Gripper is successfully opened");
        Ok(self)
    }

    /// Move to `position`, which must lie within the calibrated range.
    ///
    /// An out of range target is rejected before anything is written.
    pub async fn move_to(&mut self, position: i32, speed: u16) -> GripperResult<&mut Self> {
        if !self.calibration.contains(position) {
            let err = GripperError::RangeViolation {
                what: "gripper position",
                value: position,
                min: self.calibration.open_limit,
                max: self.calibration.close_limit,
            };
            warn!("{}", err);
            return Err(err);
        }
        self.servo.multiturn_set_speed(speed).await?;
        self.servo.goto(position).await?;
        Ok(self)
    }

    /// Drop and restore holding torque.
    ///
    /// The goal position is left untouched. Torque is always re-enabled,
    /// even when disabling failed; the first error is returned.
    pub async fn stop(&mut self) -> GripperResult<&mut Self> {
        let disabled = self.servo.disable_torque().await;
        let enabled = self.servo.enable_torque().await;
        disabled.and(enabled)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CommResult;
    use crate::transport::MockTransport;

    const ID: u8 = 2;

    async fn gripper(close: i32, open: i32) -> Gripper<MockTransport> {
        let servo = Servo::new(MockTransport::factory(ID), ID);
        let mut gripper = Gripper::new(servo, CalibrationRecord::new(close, open))
            .await
            .unwrap();
        gripper.servo_mut().transport_mut().clear_journal();
        gripper
    }

    #[tokio::test]
    async fn construction_forces_multiturn() {
        let servo = Servo::new(MockTransport::factory(ID), ID);
        let gripper = Gripper::new(servo, CalibrationRecord::new(3000, 1000))
            .await
            .unwrap();
        let mock = gripper.servo().transport();
        assert_eq!(mock.writes_to(6), vec![4095]);
        assert_eq!(mock.writes_to(8), vec![4095]);
    }

    #[tokio::test]
    async fn move_to_bounds() {
        let mut gripper = gripper(3000, 1000).await;

        assert!(matches!(
            gripper.move_to(500, 100).await,
            Err(GripperError::RangeViolation { .. })
        ));
        assert!(matches!(
            gripper.move_to(3500, 100).await,
            Err(GripperError::RangeViolation { .. })
        ));
        assert!(gripper.servo().transport().writes().is_empty());

        gripper.move_to(1500, 80).await.unwrap();
        let mock = gripper.servo().transport();
        assert_eq!(mock.writes_to(32), vec![80]);
        assert_eq!(mock.writes_to(30), vec![1500]);
    }

    #[tokio::test]
    async fn inverted_calibration_rejects_every_target() {
        let mut gripper = gripper(1000, 3000).await;
        for position in [500, 1000, 2000, 3000, 3500] {
            assert!(gripper.move_to(position, 100).await.is_err());
        }
        assert!(gripper.servo().transport().writes().is_empty());
    }

    #[tokio::test]
    async fn speed_out_of_range_moves_nothing() {
        let mut gripper = gripper(3000, 1000).await;
        assert!(gripper.close(2000).await.is_err());
        assert!(gripper.servo().transport().writes().is_empty());
    }

    #[tokio::test]
    async fn stop_restores_torque_after_failed_disable() {
        let mut gripper = gripper(3000, 1000).await;
        gripper
            .servo_mut()
            .transport_mut()
            .fail_next(CommResult::RxTimeout);

        assert!(matches!(
            gripper.stop().await,
            Err(GripperError::CommunicationFailure(CommResult::RxTimeout))
        ));
        assert_eq!(gripper.servo().transport().writes_to(24), vec![1]);
    }
}
