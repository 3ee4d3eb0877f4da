//! Capture file input for the `pcap` command.
//!
//! Opens legacy PCAP and PCAPNG files, detected by their magic bytes, and
//! yields the link-layer bytes of every captured frame with its timestamp and
//! link type. PCAPNG timestamps follow each interface's `if_tsresol` and
//! `if_tsoffset`. Everything else in the file is skipped.
//!
//! Version française (résumé):
//! Lecture des fichiers PCAP/PCAPNG : chaque trame est rendue avec son
//! horodatage et son type de lien ; les autres blocs sont ignorés.

pub mod error;
pub mod reader;

use std::fs::File;
use std::path::Path;

use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader};
use time::OffsetDateTime;

pub use error::CaptureError;

use self::reader::{
    InterfaceInfo, READER_BUFFER_SIZE, interface_for_packet, is_pcapng_magic, legacy_timestamp,
    pcapng_timestamp, read_magic_and_rewind,
};

/// One captured frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub timestamp: Option<OffsetDateTime>,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

pub struct CaptureFile {
    inner: Inner,
}

enum Inner {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Option<Linktype>,
    },
    Ng {
        reader: PcapNGReader<File>,
        interfaces: Vec<InterfaceInfo>,
    },
}

impl CaptureFile {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let mut file = File::open(path)?;
        let magic = read_magic_and_rewind(&mut file)?;
        let inner = if is_pcapng_magic(&magic) {
            let reader = PcapNGReader::new(READER_BUFFER_SIZE, file)
                .map_err(|err| CaptureError::parse("pcapng reader init", err))?;
            Inner::Ng {
                reader,
                interfaces: Vec::new(),
            }
        } else {
            let reader = LegacyPcapReader::new(READER_BUFFER_SIZE, file)
                .map_err(|err| CaptureError::parse("pcap reader init", err))?;
            Inner::Legacy {
                reader,
                linktype: None,
            }
        };
        Ok(Self { inner })
    }

    /// Next captured frame, or `None` at end of file.
    pub fn next_frame(&mut self) -> Result<Option<CapturedFrame>, CaptureError> {
        loop {
            let frame = match &mut self.inner {
                Inner::Legacy { reader, linktype } => match reader.next() {
                    Ok((offset, block)) => {
                        let frame = match block {
                            PcapBlockOwned::LegacyHeader(header) => {
                                *linktype = Some(header.network);
                                None
                            }
                            PcapBlockOwned::Legacy(packet) => Some(CapturedFrame {
                                timestamp: legacy_timestamp(packet.ts_sec, packet.ts_usec),
                                linktype: linktype.unwrap_or(Linktype::ETHERNET),
                                data: packet.data.to_vec(),
                            }),
                            _ => None,
                        };
                        reader.consume(offset);
                        frame
                    }
                    Err(PcapError::Eof) => return Ok(None),
                    Err(PcapError::Incomplete(_)) => {
                        reader
                            .refill()
                            .map_err(|err| CaptureError::parse("pcap reader refill", err))?;
                        None
                    }
                    Err(err) => return Err(CaptureError::parse("pcap reader next", err)),
                },
                Inner::Ng { reader, interfaces } => match reader.next() {
                    Ok((offset, block)) => {
                        let frame = match block {
                            PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                                interfaces.push(InterfaceInfo {
                                    linktype: intf.linktype,
                                    tsresol: intf.if_tsresol,
                                    tsoffset: intf.if_tsoffset as i64,
                                });
                                None
                            }
                            PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                                let interface = interface_for_packet(interfaces, packet.if_id);
                                Some(CapturedFrame {
                                    timestamp: pcapng_timestamp(
                                        packet.ts_high,
                                        packet.ts_low,
                                        &interface,
                                    ),
                                    linktype: interface.linktype,
                                    data: packet.data.to_vec(),
                                })
                            }
                            _ => None,
                        };
                        reader.consume(offset);
                        frame
                    }
                    Err(PcapError::Eof) => return Ok(None),
                    Err(PcapError::Incomplete(_)) => {
                        reader
                            .refill()
                            .map_err(|err| CaptureError::parse("pcapng reader refill", err))?;
                        None
                    }
                    Err(err) => return Err(CaptureError::parse("pcapng reader next", err)),
                },
            };
            if frame.is_some() {
                return Ok(frame);
            }
        }
    }
}
