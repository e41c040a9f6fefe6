use super::{Reply, Transport};
use crate::control_table::{ControlTable, MAX_ENCODER};
use crate::protocol::{CommResult, DeviceError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};

/// A write the mock accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub id: u8,
    pub address: u8,
    pub width: u8,
    pub value: u16,
}

/// In-memory stand-in for a servo bus.
///
/// Writes land in a register file and a journal. Reads return queued values
/// for an address first, then the register file, then zero.
#[derive(Debug, Default)]
pub struct MockTransport {
    registers: HashMap<(u8, u8), u16>,
    queued_reads: HashMap<(u8, u8), VecDeque<u16>>,
    writes: Vec<WriteRecord>,
    reads: Vec<(u8, u8)>,
    next_failure: Option<CommResult>,
    next_error: DeviceError,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A servo `id` in factory state: joint limits `0..=4095`, torque on.
    pub fn factory(id: u8) -> Self {
        let table = ControlTable::default();
        let mut mock = Self::new();
        mock.set_register(id, table.cw_angle_limit.address, 0);
        mock.set_register(id, table.ccw_angle_limit.address, MAX_ENCODER);
        mock.set_register(id, table.torque_enable.address, 1);
        mock
    }

    pub fn set_register(&mut self, id: u8, address: u8, value: u16) {
        self.registers.insert((id, address), value);
    }

    pub fn register(&self, id: u8, address: u8) -> Option<u16> {
        self.registers.get(&(id, address)).copied()
    }

    /// Answer the next reads of `address` with `values`, in order.
    pub fn queue_reads(&mut self, id: u8, address: u8, values: impl IntoIterator<Item = u16>) {
        self.queued_reads
            .entry((id, address))
            .or_default()
            .extend(values);
    }

    /// Fail the next exchange with `comm`.
    pub fn fail_next(&mut self, comm: CommResult) {
        self.next_failure = Some(comm);
    }

    /// Flag `error` in the next status packet.
    pub fn error_next(&mut self, error: DeviceError) {
        self.next_error = error;
    }

    /// Every accepted write, oldest first.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Accepted writes to `address`.
    pub fn writes_to(&self, address: u8) -> Vec<u16> {
        self.writes
            .iter()
            .filter(|w| w.address == address)
            .map(|w| w.value)
            .collect()
    }

    /// Every attempted read as `(id, address)`.
    pub fn reads(&self) -> &[(u8, u8)] {
        &self.reads
    }

    pub fn clear_journal(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }

    fn take_fault(&mut self) -> (Option<CommResult>, DeviceError) {
        let error = std::mem::take(&mut self.next_error);
        (self.next_failure.take(), error)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_register(&mut self, id: u8, address: u8, _width: u8) -> Reply<u16> {
        self.reads.push((id, address));
        let (failure, error) = self.take_fault();
        if let Some(comm) = failure {
            return Reply::failed(comm);
        }
        let value = self
            .queued_reads
            .get_mut(&(id, address))
            .and_then(|queue| queue.pop_front())
            .or_else(|| self.register(id, address))
            .unwrap_or(0);
        Reply {
            value,
            comm: CommResult::Success,
            error,
        }
    }

    async fn write_register(&mut self, id: u8, address: u8, width: u8, value: u16) -> Reply<()> {
        let (failure, error) = self.take_fault();
        if let Some(comm) = failure {
            return Reply::failed(comm);
        }
        if error.is_empty() {
            self.set_register(id, address, value);
            self.writes.push(WriteRecord {
                id,
                address,
                width,
                value,
            });
        }
        Reply {
            value: (),
            comm: CommResult::Success,
            error,
        }
    }
}
