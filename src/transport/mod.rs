//! Register level access to servos on a shared bus.
//!
//! Every exchange yields the value together with the communication result
//! and the device error byte. Nothing here judges whether a value can be
//! trusted; that is left to [`crate::servo::Servo`].

mod mock;
mod serial;

pub use mock::{MockTransport, WriteRecord};
pub use serial::SerialTransport;

use crate::protocol::{CommResult, DeviceError};
use async_trait::async_trait;

/// Raw result of one register exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply<T> {
    pub value: T,
    pub comm: CommResult,
    pub error: DeviceError,
}

impl<T: Default> Reply<T> {
    /// Failed exchange carrying no usable value.
    pub fn failed(comm: CommResult) -> Self {
        Reply {
            value: T::default(),
            comm,
            error: DeviceError::empty(),
        }
    }
}

/// A request/response channel to servos addressed by id.
#[async_trait]
pub trait Transport: Send {
    /// Read a `width` byte register.
    async fn read_register(&mut self, id: u8, address: u8, width: u8) -> Reply<u16>;

    /// Write the low `width` bytes of `value` to a register.
    async fn write_register(&mut self, id: u8, address: u8, width: u8, value: u16) -> Reply<()>;
}
