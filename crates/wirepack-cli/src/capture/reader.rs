use std::io::{Read, Seek, SeekFrom};

use pcap_parser::Linktype;
use time::OffsetDateTime;

use super::error::CaptureError;

pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
pub const READER_BUFFER_SIZE: usize = 64 * 1024;

/// Read the magic bytes and rewind the reader to the start.
///
/// # Errors
/// Returns `CaptureError::Io` when the input is shorter than four bytes or
/// cannot be rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], CaptureError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

pub fn is_pcapng_magic(magic: &[u8; 4]) -> bool {
    magic == &PCAPNG_MAGIC
}

/// Microsecond resolution, used when an interface carries no `if_tsresol`.
pub const DEFAULT_TSRESOL: u8 = 6;

/// What a PCAPNG Interface Description Block says about its packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub linktype: Linktype,
    /// Raw `if_tsresol`: a power of ten, or of two when the high bit is set.
    pub tsresol: u8,
    /// `if_tsoffset` in seconds, added to every timestamp.
    pub tsoffset: i64,
}

impl Default for InterfaceInfo {
    fn default() -> Self {
        Self {
            linktype: Linktype::ETHERNET,
            tsresol: DEFAULT_TSRESOL,
            tsoffset: 0,
        }
    }
}

/// Interface a packet was captured on; Ethernet/microseconds when unknown.
pub fn interface_for_packet(interfaces: &[InterfaceInfo], if_id: u32) -> InterfaceInfo {
    interfaces
        .get(if_id as usize)
        .copied()
        .unwrap_or_default()
}

/// Timestamp units per second for an `if_tsresol` value.
pub fn units_per_second(tsresol: u8) -> Option<u64> {
    let exponent = u32::from(tsresol & 0x7f);
    if tsresol & 0x80 == 0 {
        10u64.checked_pow(exponent)
    } else {
        1u64.checked_shl(exponent)
    }
}

/// Timestamp from whole seconds and microseconds.
pub fn timestamp_from_micros(micros: u64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).ok()
}

/// Timestamp of a PCAPNG enhanced packet in its interface's resolution.
pub fn pcapng_timestamp(
    ts_high: u32,
    ts_low: u32,
    interface: &InterfaceInfo,
) -> Option<OffsetDateTime> {
    let units = i128::from(units_per_second(interface.tsresol)?);
    let ticks = i128::from((u64::from(ts_high) << 32) | u64::from(ts_low));
    let nanos = ticks * 1_000_000_000 / units + i128::from(interface.tsoffset) * 1_000_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

pub fn legacy_timestamp(ts_sec: u32, ts_usec: u32) -> Option<OffsetDateTime> {
    timestamp_from_micros(u64::from(ts_sec) * 1_000_000 + u64::from(ts_usec))
}
