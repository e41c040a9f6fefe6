use super::{Reply, Transport};
use crate::control_table::PROTOCOL_VERSION;
use crate::error::GripperError;
use crate::protocol::{self, CommResult, StatusPacket};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace};

/// Protocol 1.0 transport over a serial adapter such as the U2D2.
#[derive(Debug)]
pub struct SerialTransport {
    port: SerialStream,
    timeout: Duration,
}

impl SerialTransport {
    /// Default time to wait for a status packet.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    /// Open `path` at `baud_rate`, 8N1.
    pub fn open(
        path: impl Into<String>,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self, GripperError> {
        let path = path.into();
        let port = tokio_serial::new(path.clone(), baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .timeout(timeout)
            .open_native_async()?;
        info!(
            "Opened {} at {} baud, protocol {:.1}",
            path, baud_rate, PROTOCOL_VERSION
        );
        Ok(Self { port, timeout })
    }

    async fn exchange(&mut self, id: u8, request: &[u8]) -> Result<StatusPacket, CommResult> {
        // stale bytes from an earlier timed out exchange would shift the frame
        if let Err(err) = self.port.clear(tokio_serial::ClearBuffer::Input) {
            debug!("unable to clear input buffer: {}", err);
        }

        trace!("tx {:02X?}", request);
        self.port
            .write_all(request)
            .await
            .map_err(|_| CommResult::TxFail)?;
        self.port.flush().await.map_err(|_| CommResult::TxFail)?;

        let deadline = Instant::now() + self.timeout;
        let mut header = [0u8; 4];
        tokio::time::timeout_at(deadline, self.port.read_exact(&mut header))
            .await
            .map_err(|_| CommResult::RxTimeout)?
            .map_err(|_| CommResult::RxFail)?;
        if header[..2] != protocol::HEADER {
            return Err(CommResult::RxCorrupt);
        }
        let mut rest = vec![0u8; header[3] as usize];
        // the header arrived, so a timeout here leaves a partial packet
        tokio::time::timeout_at(deadline, self.port.read_exact(&mut rest))
            .await
            .map_err(|_| CommResult::RxWaiting)?
            .map_err(|_| CommResult::RxFail)?;

        let mut response = header.to_vec();
        response.extend_from_slice(&rest);
        trace!("rx {:02X?}", response);

        let status = StatusPacket::parse(&response)?;
        if status.id != id {
            debug!("status packet from id {} while talking to {}", status.id, id);
            return Err(CommResult::RxCorrupt);
        }
        Ok(status)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn read_register(&mut self, id: u8, address: u8, width: u8) -> Reply<u16> {
        let request = match protocol::read_request(id, address, width) {
            Ok(request) => request,
            Err(comm) => return Reply::failed(comm),
        };
        match self.exchange(id, &request).await {
            Ok(status) => match status.value(width) {
                Ok(value) => Reply {
                    value,
                    comm: CommResult::Success,
                    error: status.error,
                },
                Err(comm) => Reply::failed(comm),
            },
            Err(comm) => Reply::failed(comm),
        }
    }

    async fn write_register(&mut self, id: u8, address: u8, width: u8, value: u16) -> Reply<()> {
        let request = match protocol::write_request(id, address, width, value) {
            Ok(request) => request,
            Err(comm) => return Reply::failed(comm),
        };
        match self.exchange(id, &request).await {
            Ok(status) => Reply {
                value: (),
                comm: CommResult::Success,
                error: status.error,
            },
            Err(comm) => Reply::failed(comm),
        }
    }
}
