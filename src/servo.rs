use crate::control_table::{
    ControlTable, Register, CW_DIRECTION_BIT, MAX_ENCODER, MAX_JOINT_SPEED, MAX_TORQUE,
    MAX_WHEEL_SPEED, MULTITURN_LIMIT, VOLTS_PER_UNIT,
};
use crate::error::{GripperError, GripperResult};
use crate::mode::{Direction, Directional, LimitPair, MoveMode};
use crate::protocol::{CommResult, DeviceError};
use crate::transport::{Reply, Transport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Check the outcome of one exchange.
///
/// A value is only trustworthy when the exchange succeeded and the servo
/// flagged no error.
pub fn check_comm(comm: CommResult, error: DeviceError) -> GripperResult<()> {
    if !comm.is_success() {
        warn!("{}", comm);
        return Err(GripperError::CommunicationFailure(comm));
    }
    if !error.is_empty() {
        warn!("{}", error);
        return Err(GripperError::DeviceError(error));
    }
    Ok(())
}

fn check_range(what: &'static str, value: i32, min: i32, max: i32) -> GripperResult<()> {
    if value < min || value > max {
        let err = GripperError::RangeViolation {
            what,
            value,
            min,
            max,
        };
        warn!("{}", err);
        return Err(err);
    }
    Ok(())
}

/// Snapshot of the servo's present state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoStatus {
    pub id: u8,
    pub limits: LimitPair,
    pub mode: Option<MoveMode>,
    pub position: u16,
    pub goal_position: u16,
    pub moving: bool,
    pub voltage: f32,
    pub load: Directional,
    pub speed_rpm: f32,
}

/// One Dynamixel MX servo on a bus.
#[derive(Debug)]
pub struct Servo<T: Transport> {
    transport: T,
    id: u8,
    table: ControlTable,
}

impl<T: Transport> Servo<T> {
    /// Servo `id` with the firmware 41 control table.
    pub fn new(transport: T, id: u8) -> Self {
        Self::with_table(transport, id, ControlTable::default())
    }

    pub fn with_table(transport: T, id: u8, table: ControlTable) -> Self {
        Self {
            transport,
            id,
            table,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn table(&self) -> &ControlTable {
        &self.table
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    async fn read(&mut self, register: Register) -> GripperResult<u16> {
        let Reply { value, comm, error } = self
            .transport
            .read_register(self.id, register.address, register.width)
            .await;
        check_comm(comm, error)?;
        debug!("[ID:{:03}] read {} -> {}", self.id, register.address, value);
        Ok(value)
    }

    async fn write(&mut self, register: Register, value: u16) -> GripperResult<()> {
        debug!("[ID:{:03}] write {} <- {}", self.id, register.address, value);
        let reply = self
            .transport
            .write_register(self.id, register.address, register.width, value)
            .await;
        check_comm(reply.comm, reply.error)
    }

    // status

    /// Raw encoder count of the present position.
    pub async fn read_current_position(&mut self) -> GripperResult<u16> {
        self.read(self.table.present_position).await
    }

    pub async fn read_goal_position(&mut self) -> GripperResult<u16> {
        self.read(self.table.goal_position).await
    }

    pub async fn is_moving(&mut self) -> GripperResult<bool> {
        Ok(self.read(self.table.moving).await? != 0)
    }

    /// Supply voltage in volts.
    pub async fn read_voltage(&mut self) -> GripperResult<f32> {
        Ok(self.read(self.table.present_voltage).await? as f32 * VOLTS_PER_UNIT)
    }

    pub async fn read_load(&mut self) -> GripperResult<Directional> {
        let load = Directional::from_raw(self.read(self.table.present_load).await?);
        match load {
            Directional::Idle => debug!("No load works"),
            Directional::Ccw(_) => debug!("Load works to the CCW direction"),
            Directional::Cw(_) => debug!("Load works to the CW direction"),
        }
        Ok(load)
    }

    /// Present speed. Use [`Directional::rpm`] for the value in RPM.
    pub async fn read_speed(&mut self) -> GripperResult<Directional> {
        let speed = Directional::from_raw(self.read(self.table.present_speed).await?);
        match speed {
            Directional::Idle => debug!("Servo is not running"),
            Directional::Ccw(_) => debug!("Servo is running in the CCW direction"),
            Directional::Cw(_) => debug!("Servo is running in the CW direction"),
        }
        Ok(speed)
    }

    pub async fn status(&mut self) -> GripperResult<ServoStatus> {
        let limits = self.limits().await?;
        Ok(ServoStatus {
            id: self.id,
            limits,
            mode: limits.mode(),
            position: self.read_current_position().await?,
            goal_position: self.read_goal_position().await?,
            moving: self.is_moving().await?,
            voltage: self.read_voltage().await?,
            load: self.read_load().await?,
            speed_rpm: self.read_speed().await?.rpm(),
        })
    }

    // torque

    pub async fn enable_torque(&mut self) -> GripperResult<()> {
        self.write(self.table.torque_enable, 1)
            .await
            .inspect_err(|_| warn!("Unable to enable torque"))
    }

    pub async fn disable_torque(&mut self) -> GripperResult<()> {
        self.write(self.table.torque_enable, 0)
            .await
            .inspect_err(|_| warn!("Unable to disable torque"))
    }

    /// Maximum output torque, `0..=1023`.
    pub async fn set_torque_limit(&mut self, torque: u16) -> GripperResult<()> {
        check_range("torque", torque as i32, 0, MAX_TORQUE as i32)?;
        self.write(self.table.torque_limit, torque).await
    }

    // limits and modes

    pub async fn set_cw_limit(&mut self, limit: u16) -> GripperResult<()> {
        check_range("CW limit", limit as i32, 0, MAX_ENCODER as i32)?;
        self.write(self.table.cw_angle_limit, limit)
            .await
            .inspect_err(|_| warn!("Fail to set CW limit to position {}", limit))
    }

    pub async fn set_ccw_limit(&mut self, limit: u16) -> GripperResult<()> {
        check_range("CCW limit", limit as i32, 0, MAX_ENCODER as i32)?;
        self.write(self.table.ccw_angle_limit, limit)
            .await
            .inspect_err(|_| warn!("Fail to set CCW limit to position {}", limit))
    }

    pub async fn check_cw_limit(&mut self) -> GripperResult<u16> {
        self.read(self.table.cw_angle_limit).await
    }

    pub async fn check_ccw_limit(&mut self) -> GripperResult<u16> {
        self.read(self.table.ccw_angle_limit).await
    }

    /// Both angle limits, freshly read.
    pub async fn limits(&mut self) -> GripperResult<LimitPair> {
        Ok(LimitPair {
            cw: self.check_cw_limit().await?,
            ccw: self.check_ccw_limit().await?,
        })
    }

    async fn set_limits(&mut self, limits: LimitPair) -> GripperResult<()> {
        self.set_cw_limit(limits.cw).await?;
        self.set_ccw_limit(limits.ccw).await
    }

    /// Current mode, derived from the limits on every call.
    pub async fn move_mode(&mut self) -> GripperResult<MoveMode> {
        let limits = self.limits().await?;
        MoveMode::classify(limits).ok_or_else(|| {
            let err = GripperError::InconsistentMode(limits);
            warn!("{}", err);
            err
        })
    }

    async fn require_mode(&mut self, operation: &'static str, required: MoveMode) -> GripperResult<()> {
        let actual = self.move_mode().await?;
        if actual != required {
            let err = GripperError::ModeViolation {
                operation,
                required,
                actual,
            };
            warn!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Joint mode with travel between `cw` and `ccw`, both in `1..=4094`.
    pub async fn init_joint_mode(&mut self, cw: u16, ccw: u16) -> GripperResult<()> {
        check_range("CW limit", cw as i32, 1, MAX_ENCODER as i32 - 1)?;
        check_range("CCW limit", ccw as i32, 1, MAX_ENCODER as i32 - 1)?;
        self.set_limits(LimitPair { cw, ccw }).await?;
        info!("[ID:{:03}] joint mode, limits {}..{}", self.id, cw, ccw);
        Ok(())
    }

    pub async fn init_wheel_mode(&mut self) -> GripperResult<()> {
        self.set_limits(LimitPair::WHEEL).await?;
        info!("[ID:{:03}] wheel mode", self.id);
        Ok(())
    }

    pub async fn init_multiturn_mode(&mut self) -> GripperResult<()> {
        self.set_limits(LimitPair::MULTITURN).await?;
        info!("[ID:{:03}] multiturn mode", self.id);
        Ok(())
    }

    /// Restore factory limits `(0, 4095)`.
    ///
    /// This pair matches no mode, so [`Servo::move_mode`] reports it as
    /// inconsistent until one of the `init_*` methods runs.
    pub async fn reset_move_mode(&mut self) -> GripperResult<()> {
        self.set_limits(LimitPair::RESET).await?;
        info!("[ID:{:03}] limits reset", self.id);
        Ok(())
    }

    // movement

    /// Command a goal position.
    ///
    /// Not available in wheel mode. In joint mode the position must lie
    /// between the angle limits, in multi-turn mode within `±28672`.
    /// Negative multi-turn positions are sent as two's complement.
    pub async fn goto(&mut self, position: i32) -> GripperResult<()> {
        match self.move_mode().await? {
            MoveMode::Wheel => {
                let err = GripperError::ModeViolation {
                    operation: "goto",
                    required: MoveMode::Joint,
                    actual: MoveMode::Wheel,
                };
                warn!("{}", err);
                Err(err)
            }
            MoveMode::Joint => {
                let limits = self.limits().await?;
                check_range("position", position, limits.min() as i32, limits.max() as i32)?;
                self.write(self.table.goal_position, position as u16).await
            }
            MoveMode::Multiturn => {
                check_range("position", position, -MULTITURN_LIMIT, MULTITURN_LIMIT)?;
                self.write(self.table.goal_position, position as i16 as u16)
                    .await
            }
        }
    }

    /// Endless rotation speed, `0..=2047`. Clockwise sets the direction bit.
    pub async fn wheel_set_speed(&mut self, direction: Direction, speed: u16) -> GripperResult<()> {
        self.require_mode("wheel_set_speed", MoveMode::Wheel).await?;
        check_range("speed", speed as i32, 0, MAX_WHEEL_SPEED as i32)?;
        let value = match direction {
            Direction::Cw => speed + CW_DIRECTION_BIT,
            Direction::Ccw => speed,
        };
        self.write(self.table.moving_speed, value).await
    }

    pub async fn joint_set_speed(&mut self, speed: u16) -> GripperResult<()> {
        self.require_mode("joint_set_speed", MoveMode::Joint).await?;
        check_range("speed", speed as i32, 0, MAX_JOINT_SPEED as i32)?;
        self.write(self.table.moving_speed, speed).await
    }

    pub async fn multiturn_set_speed(&mut self, speed: u16) -> GripperResult<()> {
        self.require_mode("multiturn_set_speed", MoveMode::Multiturn)
            .await?;
        check_range("speed", speed as i32, 0, MAX_JOINT_SPEED as i32)?;
        self.write(self.table.moving_speed, speed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use approx::assert_relative_eq;

    const ID: u8 = 1;

    fn servo_with_limits(cw: u16, ccw: u16) -> Servo<MockTransport> {
        let mut mock = MockTransport::factory(ID);
        mock.set_register(ID, 6, cw);
        mock.set_register(ID, 8, ccw);
        Servo::new(mock, ID)
    }

    fn goal_writes(servo: &Servo<MockTransport>) -> Vec<u16> {
        servo.transport().writes_to(30)
    }

    #[tokio::test]
    async fn goto_in_wheel_mode_never_writes() {
        let mut servo = servo_with_limits(0, 0);
        for position in [-30000, -1, 0, 1, 2048, 4095, 30000] {
            let err = servo.goto(position).await.unwrap_err();
            assert!(matches!(err, GripperError::ModeViolation { .. }));
        }
        assert!(servo.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn goto_in_joint_mode_respects_limits() {
        let mut servo = servo_with_limits(3000, 1000);
        for position in [999, 3001, -5, 4095] {
            assert!(matches!(
                servo.goto(position).await,
                Err(GripperError::RangeViolation { .. })
            ));
        }
        assert!(goal_writes(&servo).is_empty());
        for position in [1000, 2000, 3000] {
            servo.goto(position).await.unwrap();
        }
        assert_eq!(goal_writes(&servo), vec![1000, 2000, 3000]);
    }

    #[tokio::test]
    async fn goto_in_multiturn_mode_respects_range() {
        let mut servo = servo_with_limits(4095, 4095);
        assert!(servo.goto(28673).await.is_err());
        assert!(servo.goto(-28673).await.is_err());
        assert!(goal_writes(&servo).is_empty());

        servo.goto(28672).await.unwrap();
        servo.goto(-28672).await.unwrap();
        servo.goto(0).await.unwrap();
        assert_eq!(
            goal_writes(&servo),
            vec![28672, (-28672i16) as u16, 0]
        );
    }

    #[tokio::test]
    async fn goto_with_inconsistent_limits_fails() {
        let mut servo = servo_with_limits(0, 4095);
        let err = servo.goto(100).await.unwrap_err();
        assert!(matches!(err, GripperError::InconsistentMode(LimitPair { cw: 0, ccw: 4095 })));
        assert!(servo.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn mode_follows_limit_writes() {
        let mut servo = Servo::new(MockTransport::factory(ID), ID);
        servo.init_wheel_mode().await.unwrap();
        assert_eq!(servo.move_mode().await.unwrap(), MoveMode::Wheel);
        servo.init_joint_mode(100, 3000).await.unwrap();
        assert_eq!(servo.move_mode().await.unwrap(), MoveMode::Joint);
        servo.init_multiturn_mode().await.unwrap();
        assert_eq!(servo.move_mode().await.unwrap(), MoveMode::Multiturn);
        servo.reset_move_mode().await.unwrap();
        assert!(matches!(
            servo.move_mode().await,
            Err(GripperError::InconsistentMode(_))
        ));
    }

    #[tokio::test]
    async fn mode_is_read_fresh_each_time() {
        let mut servo = servo_with_limits(0, 0);
        servo.move_mode().await.unwrap();
        servo.transport_mut().set_register(ID, 6, 4095);
        servo.transport_mut().set_register(ID, 8, 4095);
        assert_eq!(servo.move_mode().await.unwrap(), MoveMode::Multiturn);
        assert_eq!(
            servo.transport().reads(),
            &[(ID, 6), (ID, 8), (ID, 6), (ID, 8)]
        );
    }

    #[tokio::test]
    async fn joint_mode_rejects_edge_limits() {
        let mut servo = Servo::new(MockTransport::factory(ID), ID);
        assert!(servo.init_joint_mode(0, 2000).await.is_err());
        assert!(servo.init_joint_mode(2000, 4095).await.is_err());
        assert!(servo.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn limit_setters_reject_out_of_range() {
        let mut servo = Servo::new(MockTransport::factory(ID), ID);
        assert!(servo.set_cw_limit(4096).await.is_err());
        assert!(servo.set_ccw_limit(5000).await.is_err());
        assert!(servo.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn wheel_speed_encodes_direction() {
        let mut servo = servo_with_limits(0, 0);
        servo.wheel_set_speed(Direction::Ccw, 200).await.unwrap();
        servo.wheel_set_speed(Direction::Cw, 200).await.unwrap();
        assert_eq!(servo.transport().writes_to(32), vec![200, 1224]);
        assert!(servo.wheel_set_speed(Direction::Ccw, 2048).await.is_err());
    }

    #[tokio::test]
    async fn speed_setters_are_mode_gated() {
        let mut servo = servo_with_limits(4095, 4095);
        assert!(matches!(
            servo.wheel_set_speed(Direction::Cw, 10).await,
            Err(GripperError::ModeViolation { .. })
        ));
        assert!(matches!(
            servo.joint_set_speed(10).await,
            Err(GripperError::ModeViolation { .. })
        ));
        assert!(servo.transport().writes().is_empty());

        assert!(servo.multiturn_set_speed(1024).await.is_err());
        servo.multiturn_set_speed(1023).await.unwrap();
        assert_eq!(servo.transport().writes_to(32), vec![1023]);
    }

    #[tokio::test]
    async fn joint_speed_in_joint_mode() {
        let mut servo = servo_with_limits(10, 4000);
        servo.joint_set_speed(0).await.unwrap();
        assert!(servo.multiturn_set_speed(0).await.is_err());
        assert_eq!(servo.transport().writes_to(32), vec![0]);
    }

    #[tokio::test]
    async fn load_branches() {
        let mut servo = servo_with_limits(0, 4095);
        servo.transport_mut().queue_reads(ID, 40, [500, 1100, 0]);
        assert_eq!(servo.read_load().await.unwrap().value(), 500);
        assert_eq!(servo.read_load().await.unwrap().value(), -76);
        assert_eq!(servo.read_load().await.unwrap(), Directional::Idle);
    }

    #[tokio::test]
    async fn speed_branches_in_rpm() {
        let mut servo = servo_with_limits(0, 4095);
        servo.transport_mut().queue_reads(ID, 38, [500, 1100, 0]);
        assert_relative_eq!(servo.read_speed().await.unwrap().rpm(), 55.0, epsilon = 1e-3);
        assert_relative_eq!(servo.read_speed().await.unwrap().rpm(), -8.36, epsilon = 1e-3);
        assert_relative_eq!(servo.read_speed().await.unwrap().rpm(), 0.0);
    }

    #[tokio::test]
    async fn voltage_in_volts() {
        let mut servo = servo_with_limits(0, 4095);
        servo.transport_mut().set_register(ID, 42, 121);
        assert_relative_eq!(servo.read_voltage().await.unwrap(), 12.1, epsilon = 1e-4);
    }

    #[tokio::test]
    async fn status_snapshot() {
        let mut servo = servo_with_limits(4095, 4095);
        let mock = servo.transport_mut();
        mock.set_register(ID, 30, 2000);
        mock.set_register(ID, 36, 1990);
        mock.set_register(ID, 38, 1034);
        mock.set_register(ID, 40, 300);
        mock.set_register(ID, 42, 120);
        mock.set_register(ID, 46, 1);

        assert_eq!(servo.read_goal_position().await.unwrap(), 2000);
        assert!(servo.is_moving().await.unwrap());

        let status = servo.status().await.unwrap();
        assert_eq!(status.id, ID);
        assert_eq!(status.limits, LimitPair::MULTITURN);
        assert_eq!(status.mode, Some(MoveMode::Multiturn));
        assert_eq!(status.position, 1990);
        assert_eq!(status.goal_position, 2000);
        assert!(status.moving);
        assert_relative_eq!(status.voltage, 12.0, epsilon = 1e-4);
        assert_eq!(status.load, Directional::Ccw(300));
        assert_relative_eq!(status.speed_rpm, -1.1, epsilon = 1e-3);

        servo.transport_mut().set_register(ID, 46, 0);
        assert!(!servo.is_moving().await.unwrap());
    }

    #[tokio::test]
    async fn failed_exchange_yields_no_value() {
        let mut servo = servo_with_limits(0, 4095);
        servo.transport_mut().set_register(ID, 36, 1234);

        servo.transport_mut().fail_next(CommResult::RxTimeout);
        assert!(matches!(
            servo.read_current_position().await,
            Err(GripperError::CommunicationFailure(CommResult::RxTimeout))
        ));

        servo.transport_mut().error_next(DeviceError::OVERLOAD);
        assert!(matches!(
            servo.read_current_position().await,
            Err(GripperError::DeviceError(e)) if e == DeviceError::OVERLOAD
        ));

        assert_eq!(servo.read_current_position().await.unwrap(), 1234);
    }

    #[tokio::test]
    async fn torque_failure_is_reported() {
        let mut servo = servo_with_limits(0, 4095);
        servo.transport_mut().fail_next(CommResult::TxFail);
        assert!(servo.enable_torque().await.is_err());
        servo.disable_torque().await.unwrap();
        assert_eq!(servo.transport().writes_to(24), vec![0]);
    }

    #[tokio::test]
    async fn torque_limit_range() {
        let mut servo = servo_with_limits(0, 4095);
        assert!(servo.set_torque_limit(1024).await.is_err());
        servo.set_torque_limit(512).await.unwrap();
        assert_eq!(servo.transport().writes_to(34), vec![512]);
    }

    #[test]
    fn check_comm_order() {
        assert!(check_comm(CommResult::Success, DeviceError::empty()).is_ok());
        assert!(matches!(
            check_comm(CommResult::RxCorrupt, DeviceError::RANGE),
            Err(GripperError::CommunicationFailure(CommResult::RxCorrupt))
        ));
    }
}
