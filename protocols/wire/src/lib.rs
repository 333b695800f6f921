// Copyright (C) 2026  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

//! The ASIC wire protocol: frame header, Modbus CRC-16 and the four payload
//! kinds exchanged with a mining ASIC (`TxConfig`, `TxTask`, `RxStatus`,
//! `RxNonce`). Pure data transformation - no I/O, no concurrency. The
//! transport (USB, character device, RPC) lives one layer up.

use byteorder::{ByteOrder, LittleEndian};
use failure::Fail;
use ii_bitcoin::{Header, Midstate};
use once_cell::sync::Lazy;

/// Token byte identifying a frame's payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    TxConfig,
    TxTask,
    RxStatus,
    RxStatusResp,
    RxNonceResp,
}

impl Token {
    pub fn code(self) -> u8 {
        match self {
            Token::TxConfig => 0x51,
            Token::TxTask => 0x52,
            Token::RxStatus => 0x53,
            Token::RxStatusResp => 0xA1,
            Token::RxNonceResp => 0xA2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x51 => Some(Token::TxConfig),
            0x52 => Some(Token::TxTask),
            0x53 => Some(Token::RxStatus),
            0xA1 => Some(Token::RxStatusResp),
            0xA2 => Some(Token::RxNonceResp),
            _ => None,
        }
    }
}

pub const PROTOCOL_VERSION: u8 = 0x00;
/// token(1) + version(1) + length(2)
const FRAME_HEADER_SIZE: usize = 4;
/// crc(2)
const FRAME_CRC_SIZE: usize = 2;

const TX_CONFIG_PAYLOAD_SIZE: usize = 22;
const ASIC_TASK_SIZE: usize = 1 + 32 + 12;
const RX_STATUS_RESP_PAYLOAD_SIZE: usize = 5;
const RX_NONCE_ENTRY_SIZE: usize = 8;

/// Modbus-style CRC-16, computed with a pair of 256-entry lookup tables
/// (high/low byte of the running remainder) rather than a single combined
/// table, matching the layout a constrained ASIC firmware would use.
///
/// Polynomial 0xA001 (reflected 0x8005), initial remainder 0xFFFF - the
/// canonical CRC-16/MODBUS parameters.
struct CrcTables {
    hi: [u8; 256],
    lo: [u8; 256],
}

static CRC_TABLES: Lazy<CrcTables> = Lazy::new(|| {
    let mut hi = [0u8; 256];
    let mut lo = [0u8; 256];
    for (index, (hi_slot, lo_slot)) in hi.iter_mut().zip(lo.iter_mut()).enumerate() {
        let mut remainder = index as u16;
        for _ in 0..8 {
            if remainder & 1 != 0 {
                remainder = (remainder >> 1) ^ 0xA001;
            } else {
                remainder >>= 1;
            }
        }
        *hi_slot = (remainder >> 8) as u8;
        *lo_slot = (remainder & 0xff) as u8;
    }
    CrcTables { hi, lo }
});

fn crc16_modbus(data: &[u8]) -> u16 {
    let tables = &*CRC_TABLES;
    let mut crc_hi: u8 = 0xFF;
    let mut crc_lo: u8 = 0xFF;
    for &byte in data {
        let index = (crc_lo ^ byte) as usize;
        let new_hi = tables.hi[index];
        let new_lo = tables.lo[index] ^ crc_hi;
        crc_hi = new_hi;
        crc_lo = new_lo;
    }
    u16::from(crc_hi) << 8 | u16::from(crc_lo)
}

/// A reason a byte slice failed to parse as a `Frame`.
#[derive(Debug, Fail, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[fail(display = "frame shorter than the minimum header+crc size")]
    ShortFrame,
    #[fail(display = "unrecognized token byte {:#04x}", _0)]
    UnknownToken(u8),
    #[fail(
        display = "declared payload length {} does not match {} bytes available",
        declared, actual
    )]
    LengthMismatch { declared: usize, actual: usize },
    #[fail(display = "CRC mismatch: frame says {:#06x}, computed {:#06x}", frame, computed)]
    CrcMismatch { frame: u16, computed: u16 },
}

/// A fully decoded frame: token, protocol version and the raw payload bytes.
/// Payload-specific structure (`TxConfigPayload`, `DeviceState`, ...) is
/// extracted from `Frame::payload` by the caller that knows which token to
/// expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub token: Token,
    pub version: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    fn encode(token: Token, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + FRAME_CRC_SIZE);
        out.push(token.code());
        out.push(PROTOCOL_VERSION);
        let mut length_buf = [0u8; 2];
        LittleEndian::write_u16(&mut length_buf, payload.len() as u16);
        out.extend_from_slice(&length_buf);
        out.extend_from_slice(payload);
        let crc = crc16_modbus(&out);
        let mut crc_buf = [0u8; 2];
        LittleEndian::write_u16(&mut crc_buf, crc);
        out.extend_from_slice(&crc_buf);
        out
    }
}

/// Parses one framed packet out of `bytes`. `bytes` must hold exactly one
/// frame - the caller (C2's transport) is responsible for carving frames out
/// of a byte stream before calling this.
pub fn parse_response(bytes: &[u8]) -> Result<Frame, ParseErrorKind> {
    if bytes.len() < FRAME_HEADER_SIZE + FRAME_CRC_SIZE {
        return Err(ParseErrorKind::ShortFrame);
    }
    let token_code = bytes[0];
    let token = Token::from_code(token_code).ok_or(ParseErrorKind::UnknownToken(token_code))?;
    let version = bytes[1];
    let declared_length = LittleEndian::read_u16(&bytes[2..4]) as usize;
    let actual_length = bytes.len() - FRAME_HEADER_SIZE - FRAME_CRC_SIZE;
    if declared_length != actual_length {
        return Err(ParseErrorKind::LengthMismatch {
            declared: declared_length,
            actual: actual_length,
        });
    }
    let payload_end = FRAME_HEADER_SIZE + declared_length;
    let payload = &bytes[FRAME_HEADER_SIZE..payload_end];
    let crc_in_frame = LittleEndian::read_u16(&bytes[payload_end..payload_end + 2]);
    let computed_crc = crc16_modbus(&bytes[0..payload_end]);
    if crc_in_frame != computed_crc {
        return Err(ParseErrorKind::CrcMismatch {
            frame: crc_in_frame,
            computed: computed_crc,
        });
    }
    Ok(Frame {
        token,
        version,
        payload: payload.to_vec(),
    })
}

/// Control parameters sent once at the start of `Configuring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxConfigPayload {
    pub control_flags: u8,
    pub chain_check_timer_ms: u16,
    pub chain_count: u8,
    pub asics_per_chain: u8,
    pub fan_pwm_percent: u8,
    pub timeout_ms: u16,
    pub frequency_mhz: u16,
    pub voltage_mv: u16,
    pub chip_address: u8,
    pub register_address: u8,
}

/// Bit positions within `TxConfigPayload::control_flags`.
pub mod control_flags {
    pub const FAN_ENABLE: u8 = 1 << 0;
    pub const TIMEOUT_ENABLE: u8 = 1 << 1;
    pub const FREQUENCY_ENABLE: u8 = 1 << 2;
    pub const VOLTAGE_ENABLE: u8 = 1 << 3;
}

pub fn build_tx_config(cfg: &TxConfigPayload) -> Vec<u8> {
    let mut payload = [0u8; TX_CONFIG_PAYLOAD_SIZE];
    payload[0] = cfg.control_flags;
    LittleEndian::write_u16(&mut payload[1..3], cfg.chain_check_timer_ms);
    payload[3] = cfg.chain_count;
    payload[4] = cfg.asics_per_chain;
    payload[5] = cfg.fan_pwm_percent;
    LittleEndian::write_u16(&mut payload[6..8], cfg.timeout_ms);
    LittleEndian::write_u16(&mut payload[8..10], cfg.frequency_mhz);
    LittleEndian::write_u16(&mut payload[10..12], cfg.voltage_mv);
    // payload[12..16] reserved register bytes, left zeroed
    payload[16] = cfg.chip_address;
    payload[17] = cfg.register_address;
    // payload[18..22] reserved, left zeroed
    Frame::encode(Token::TxConfig, &payload)
}

pub fn parse_tx_config_payload(payload: &[u8]) -> Result<TxConfigPayload, ParseErrorKind> {
    if payload.len() != TX_CONFIG_PAYLOAD_SIZE {
        return Err(ParseErrorKind::LengthMismatch {
            declared: TX_CONFIG_PAYLOAD_SIZE,
            actual: payload.len(),
        });
    }
    Ok(TxConfigPayload {
        control_flags: payload[0],
        chain_check_timer_ms: LittleEndian::read_u16(&payload[1..3]),
        chain_count: payload[3],
        asics_per_chain: payload[4],
        fan_pwm_percent: payload[5],
        timeout_ms: LittleEndian::read_u16(&payload[6..8]),
        frequency_mhz: LittleEndian::read_u16(&payload[8..10]),
        voltage_mv: LittleEndian::read_u16(&payload[10..12]),
        chip_address: payload[16],
        register_address: payload[17],
    })
}

/// One mining work item as it travels in a `TxTask` frame. `work_id` is the
/// single byte used to correlate a later `RxNonce` back to this task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsicTask {
    pub work_id: u8,
    pub midstate: [u8; 32],
    pub tail: [u8; 12],
}

impl AsicTask {
    /// Builds the task for a real 80-byte Bitcoin-style header: midstate is
    /// SHA-256 of the first 64 bytes, tail is bytes 64..76 (nonce itself,
    /// bytes 76..80, is never transmitted).
    pub fn from_header(work_id: u8, header: &Header) -> Self {
        Self {
            work_id,
            midstate: *header.midstate().as_bytes(),
            tail: header.tail(),
        }
    }

    /// Builds the task for the ensemble's non-Bitcoin activation path: the
    /// caller supplies input-derived bytes in place of a real midstate, and
    /// `nonce_start` (the work id, widened) seeds the ASIC's nonce search.
    pub fn from_activation(work_id: u8, input_midstate: [u8; 32], input_tail: [u8; 8]) -> Self {
        let mut tail = [0u8; 12];
        tail[0..8].copy_from_slice(&input_tail);
        LittleEndian::write_u32(&mut tail[8..12], ii_bitcoin::EASY_TARGET_N_BITS);
        Self {
            work_id,
            midstate: input_midstate,
            tail,
        }
    }
}

pub fn build_tx_task(task: &AsicTask) -> Vec<u8> {
    let mut payload = [0u8; 1 + ASIC_TASK_SIZE];
    payload[0] = 1; // work_num
    payload[1] = task.work_id;
    payload[2..34].copy_from_slice(&task.midstate);
    payload[34..46].copy_from_slice(&task.tail);
    Frame::encode(Token::TxTask, &payload)
}

pub fn parse_tx_task_payload(payload: &[u8]) -> Result<Vec<AsicTask>, ParseErrorKind> {
    if payload.is_empty() {
        return Err(ParseErrorKind::ShortFrame);
    }
    let work_num = payload[0] as usize;
    let expected = 1 + work_num * ASIC_TASK_SIZE;
    if payload.len() != expected {
        return Err(ParseErrorKind::LengthMismatch {
            declared: expected,
            actual: payload.len(),
        });
    }
    let mut tasks = Vec::with_capacity(work_num);
    for i in 0..work_num {
        let start = 1 + i * ASIC_TASK_SIZE;
        let work_id = payload[start];
        let mut midstate = [0u8; 32];
        midstate.copy_from_slice(&payload[start + 1..start + 33]);
        let mut tail = [0u8; 12];
        tail.copy_from_slice(&payload[start + 33..start + 45]);
        tasks.push(AsicTask {
            work_id,
            midstate,
            tail,
        });
    }
    Ok(tasks)
}

/// Builds the (empty-payload) status query frame; the device answers with an
/// `RxStatusResp`-tokened frame carrying a `DeviceState` payload.
pub fn build_rx_status() -> Vec<u8> {
    Frame::encode(Token::RxStatus, &[])
}

/// Decoded `RxStatusResp` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    pub chip_count: u8,
    pub fifo_space: u16,
    pub hw_version: u8,
    pub operational: bool,
}

pub fn parse_rx_status_payload(payload: &[u8]) -> Result<DeviceState, ParseErrorKind> {
    if payload.len() != RX_STATUS_RESP_PAYLOAD_SIZE {
        return Err(ParseErrorKind::LengthMismatch {
            declared: RX_STATUS_RESP_PAYLOAD_SIZE,
            actual: payload.len(),
        });
    }
    Ok(DeviceState {
        chip_count: payload[0],
        fifo_space: LittleEndian::read_u16(&payload[1..3]),
        hw_version: payload[3],
        operational: payload[4] != 0,
    })
}

/// One completed nonce as reported in an `RxNonceResp` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceEntry {
    pub work_id: u8,
    pub nonce: u32,
    pub chain: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxNoncePayload {
    pub fifo_space: u16,
    pub entries: Vec<NonceEntry>,
}

pub fn parse_rx_nonce_payload(payload: &[u8]) -> Result<RxNoncePayload, ParseErrorKind> {
    if payload.len() < 4 {
        return Err(ParseErrorKind::ShortFrame);
    }
    let fifo_space = LittleEndian::read_u16(&payload[0..2]);
    let nonce_num = payload[2] as usize;
    let expected = 4 + nonce_num * RX_NONCE_ENTRY_SIZE;
    if payload.len() != expected {
        return Err(ParseErrorKind::LengthMismatch {
            declared: expected,
            actual: payload.len(),
        });
    }
    let mut entries = Vec::with_capacity(nonce_num);
    for i in 0..nonce_num {
        let start = 4 + i * RX_NONCE_ENTRY_SIZE;
        let work_id = payload[start];
        let nonce = LittleEndian::read_u32(&payload[start + 1..start + 5]);
        let chain = payload[start + 5];
        entries.push(NonceEntry {
            work_id,
            nonce,
            chain,
        });
    }
    Ok(RxNoncePayload {
        fifo_space,
        entries,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn reference_crc16(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= u16::from(byte);
            for _ in 0..8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xA001;
                } else {
                    crc >>= 1;
                }
            }
        }
        crc
    }

    #[test]
    fn crc_table_implementation_matches_bitwise_reference() {
        let probe = [0x51, 0x00, 0x16, 0x00];
        assert_eq!(crc16_modbus(&probe), reference_crc16(&probe));

        let longer = [0x52, 0x00, 0x2e, 0x00, 0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03];
        assert_eq!(crc16_modbus(&longer), reference_crc16(&longer));
    }

    #[test]
    fn tx_config_round_trips() {
        let cfg = TxConfigPayload {
            control_flags: control_flags::FAN_ENABLE | control_flags::FREQUENCY_ENABLE,
            chain_check_timer_ms: 5000,
            chain_count: 8,
            asics_per_chain: 63,
            fan_pwm_percent: 80,
            timeout_ms: 2000,
            frequency_mhz: 650,
            voltage_mv: 890,
            chip_address: 0x00,
            register_address: 0x04,
        };
        let frame_bytes = build_tx_config(&cfg);
        let frame = parse_response(&frame_bytes).expect("valid frame");
        assert_eq!(frame.token, Token::TxConfig);
        let parsed = parse_tx_config_payload(&frame.payload).expect("valid payload");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn tx_task_round_trips() {
        let header = Header::from_bytes([0x11; ii_bitcoin::HEADER_SIZE]);
        let task = AsicTask::from_header(7, &header);
        let frame_bytes = build_tx_task(&task);
        let frame = parse_response(&frame_bytes).expect("valid frame");
        assert_eq!(frame.token, Token::TxTask);
        let tasks = parse_tx_task_payload(&frame.payload).expect("valid payload");
        assert_eq!(tasks, vec![task]);
    }

    #[test]
    fn rx_status_query_has_empty_payload_and_parses() {
        let frame_bytes = build_rx_status();
        let frame = parse_response(&frame_bytes).expect("valid frame");
        assert_eq!(frame.token, Token::RxStatus);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn rx_status_resp_round_trips_through_manual_encode() {
        let payload = [4u8, 0x10, 0x00, 0x02, 0x01];
        let frame_bytes = Frame::encode(Token::RxStatusResp, &payload);
        let frame = parse_response(&frame_bytes).expect("valid frame");
        let state = parse_rx_status_payload(&frame.payload).expect("valid payload");
        assert_eq!(
            state,
            DeviceState {
                chip_count: 4,
                fifo_space: 0x0010,
                hw_version: 2,
                operational: true,
            }
        );
    }

    #[test]
    fn rx_nonce_payload_with_two_entries_round_trips() {
        let mut payload = vec![0x20, 0x00, 0x02, 0x00];
        payload.extend_from_slice(&[0x03, 0xEF, 0xBE, 0xAD, 0xDE, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(&[0x05, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]);
        let frame_bytes = Frame::encode(Token::RxNonceResp, &payload);
        let frame = parse_response(&frame_bytes).expect("valid frame");
        let decoded = parse_rx_nonce_payload(&frame.payload).expect("valid payload");
        assert_eq!(decoded.fifo_space, 0x0020);
        assert_eq!(decoded.entries.len(), 2);
        assert_eq!(decoded.entries[0].work_id, 0x03);
        assert_eq!(decoded.entries[0].nonce, 0xDEAD_BEEF);
        assert_eq!(decoded.entries[1].work_id, 0x05);
        assert_eq!(decoded.entries[1].nonce, 1);
    }

    #[test]
    fn single_byte_mutation_anywhere_breaks_parse() {
        let header = Header::from_bytes([0x22; ii_bitcoin::HEADER_SIZE]);
        let task = AsicTask::from_header(1, &header);
        let good = build_tx_task(&task);

        for i in 0..good.len() {
            let mut mutated = good.clone();
            mutated[i] ^= 0xFF;
            let result = parse_response(&mutated);
            assert!(
                result.is_err(),
                "byte {} flip unexpectedly produced a valid frame",
                i
            );
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        let mut frame_bytes = build_rx_status();
        frame_bytes[0] = 0xFF;
        // token changed, so CRC no longer matches either, but token check
        // must fire (or CRC - either is an acceptable rejection reason)
        match parse_response(&frame_bytes) {
            Err(ParseErrorKind::UnknownToken(0xFF)) | Err(ParseErrorKind::CrcMismatch { .. }) => {}
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn short_frame_is_rejected() {
        assert_eq!(parse_response(&[0x51, 0x00]), Err(ParseErrorKind::ShortFrame));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut frame_bytes = build_rx_status();
        // declare a non-zero payload length while keeping the buffer short
        LittleEndian::write_u16(&mut frame_bytes[2..4], 5);
        assert!(matches!(
            parse_response(&frame_bytes),
            Err(ParseErrorKind::LengthMismatch { .. })
        ));
    }
}
