//! Dynamixel protocol 1.0 packets.
//!
//! An instruction packet is `FF FF id len instr params.. checksum`, where
//! `len = params.len() + 2` and the checksum is the bitwise not of the byte
//! sum from `id` up to the last parameter. A status packet has the same
//! framing with the device error byte in place of the instruction.

use bitflags::bitflags;
use num::FromPrimitive;
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Packet preamble shared by instruction and status packets.
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction byte of an instruction packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Read = 0x02,
    Write = 0x03,
}

/// Outcome of one request/response exchange, independent of what the
/// servo reported in its error byte.
#[repr(i32)]
#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommResult {
    /// Request sent and a well formed status packet received.
    Success = 0,
    /// The instruction packet could not be written.
    TxFail = -1001,
    /// No status packet could be read back.
    RxFail = -1002,
    /// The instruction packet could not be built, e.g. an unsupported
    /// register width.
    TxError = -2000,
    /// The status packet header arrived but the rest of it did not.
    RxWaiting = -3000,
    /// The status packet did not arrive before the timeout.
    RxTimeout = -3001,
    /// The status packet failed its header, id or checksum check.
    RxCorrupt = -3002,
}

impl CommResult {
    pub fn is_success(&self) -> bool {
        *self == CommResult::Success
    }

    /// Decode a raw result code.
    pub fn from_code(code: i32) -> Option<Self> {
        CommResult::from_i32(code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommResult::Success => "communication success",
            CommResult::TxFail => "failed to transmit instruction packet",
            CommResult::RxFail => "failed to get status packet from device",
            CommResult::TxError => "incorrect instruction packet",
            CommResult::RxWaiting => "status packet arrived incomplete",
            CommResult::RxTimeout => "no status packet received",
            CommResult::RxCorrupt => "incorrect status packet",
        }
    }
}

impl std::fmt::Display for CommResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[TxRxResult] {}", self.description())
    }
}

bitflags! {
    /// Error byte of a protocol 1.0 status packet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DeviceError: u8 {
        const INPUT_VOLTAGE = 1 << 0;
        const ANGLE_LIMIT = 1 << 1;
        const OVERHEATING = 1 << 2;
        const RANGE = 1 << 3;
        const CHECKSUM = 1 << 4;
        const OVERLOAD = 1 << 5;
        const INSTRUCTION = 1 << 6;
    }
}

const DEVICE_ERROR_REASONS: [(DeviceError, &str); 7] = [
    (DeviceError::INPUT_VOLTAGE, "input voltage error"),
    (DeviceError::ANGLE_LIMIT, "angle limit error"),
    (DeviceError::OVERHEATING, "overheat error"),
    (DeviceError::RANGE, "out of range error"),
    (DeviceError::CHECKSUM, "checksum error"),
    (DeviceError::OVERLOAD, "overload error"),
    (DeviceError::INSTRUCTION, "instruction code error"),
];

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "[RxPacketError] no error");
        }
        let reasons = DEVICE_ERROR_REASONS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, reason)| *reason)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[RxPacketError] {}", reasons)
    }
}

impl std::error::Error for DeviceError {}

/// Protocol 1.0 checksum over `id..=last param`.
pub fn checksum(data: &[u8]) -> u8 {
    !data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build a complete instruction packet.
pub fn encode_instruction(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((params.len() + 2) as u8);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

fn check_width(width: u8) -> Result<usize, CommResult> {
    match width {
        1 | 2 => Ok(width as usize),
        _ => Err(CommResult::TxError),
    }
}

/// Instruction packet reading `width` bytes starting at `address`.
///
/// Registers are one or two bytes wide; any other width is a `TxError`.
pub fn read_request(id: u8, address: u8, width: u8) -> Result<Vec<u8>, CommResult> {
    check_width(width)?;
    Ok(encode_instruction(id, Instruction::Read, &[address, width]))
}

/// Instruction packet writing the low `width` bytes of `value`, little endian.
pub fn write_request(id: u8, address: u8, width: u8, value: u16) -> Result<Vec<u8>, CommResult> {
    let width = check_width(width)?;
    let bytes = value.to_le_bytes();
    let mut params = vec![address];
    params.extend_from_slice(&bytes[..width]);
    Ok(encode_instruction(id, Instruction::Write, &params))
}

/// A decoded status packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: u8,
    pub error: DeviceError,
    pub params: Vec<u8>,
}

impl StatusPacket {
    /// Parse a full status packet, header included.
    pub fn parse(bytes: &[u8]) -> Result<Self, CommResult> {
        if bytes.len() < 6 || bytes[..2] != HEADER {
            return Err(CommResult::RxCorrupt);
        }
        let len = bytes[3] as usize;
        if len < 2 || bytes.len() != len + 4 {
            return Err(CommResult::RxCorrupt);
        }
        let body = &bytes[2..bytes.len() - 1];
        if checksum(body) != bytes[bytes.len() - 1] {
            return Err(CommResult::RxCorrupt);
        }
        Ok(StatusPacket {
            id: bytes[2],
            error: DeviceError::from_bits_truncate(bytes[4]),
            params: bytes[5..bytes.len() - 1].to_vec(),
        })
    }

    /// Little endian value of the first `width` parameter bytes.
    pub fn value(&self, width: u8) -> Result<u16, CommResult> {
        match (width, self.params.as_slice()) {
            (1, [lo, ..]) => Ok(*lo as u16),
            (2, [lo, hi, ..]) => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(CommResult::RxCorrupt),
        }
    }
}
