use std::fs::File;
use std::path::Path;

use pcap_parser::{
    Block, LegacyPcapReader, Linktype, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};

use crate::source::{PacketEvent, PacketSource, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{
    is_pcapng_magic, legacy_ts_to_seconds, linktype_for_interface, pcapng_ts_to_seconds,
    read_magic_and_rewind,
};

/// Packet source reading a PCAP or PCAPNG file from disk.
pub struct PcapFileSource {
    inner: PcapReader,
    frames: u64,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        linktype: Linktype,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        linktypes: Vec<Linktype>,
    },
}

struct RawFrame {
    ts: Option<f64>,
    linktype: Linktype,
    data: Vec<u8>,
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let inner = create_reader(file)?;
        Ok(Self { inner, frames: 0 })
    }

    /// Frames returned so far.
    pub fn frames_read(&self) -> u64 {
        self.frames
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        let Some(raw) = self.inner.next_frame()? else {
            return Ok(None);
        };
        self.frames += 1;
        Ok(Some(PacketEvent {
            frame: self.frames,
            ts: raw.ts,
            linktype: raw.linktype,
            data: raw.data,
        }))
    }
}

fn create_reader(mut file: File) -> Result<PcapReader, PcapSourceError> {
    let magic = read_magic_and_rewind(&mut file)?;

    if is_pcapng_magic(&magic) {
        let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
            .map_err(|e| PcapSourceError::pcap("pcapng reader init", e))?;
        Ok(PcapReader::Ng {
            reader,
            linktypes: Vec::new(),
        })
    } else {
        let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file)
            .map_err(|e| PcapSourceError::pcap("pcap reader init", e))?;
        Ok(PcapReader::Legacy {
            reader,
            linktype: Linktype::ETHERNET,
            nanosecond: false,
        })
    }
}

impl PcapReader {
    fn next_frame(&mut self) -> Result<Option<RawFrame>, PcapSourceError> {
        loop {
            let frame = match self {
                PcapReader::Legacy {
                    reader,
                    linktype,
                    nanosecond,
                } => match reader.next() {
                    Ok((offset, block)) => {
                        let frame = match block {
                            PcapBlockOwned::LegacyHeader(header) => {
                                *linktype = header.network;
                                *nanosecond = header.is_nanosecond_precision();
                                None
                            }
                            PcapBlockOwned::Legacy(packet) => Some(RawFrame {
                                ts: Some(legacy_ts_to_seconds(
                                    packet.ts_sec,
                                    packet.ts_usec,
                                    *nanosecond,
                                )),
                                linktype: *linktype,
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
                            .map_err(|e| PcapSourceError::pcap("pcap reader refill", e))?;
                        None
                    }
                    Err(e) => return Err(PcapSourceError::pcap("pcap reader next", e)),
                },
                PcapReader::Ng { reader, linktypes } => match reader.next() {
                    Ok((offset, block)) => {
                        let frame = match block {
                            PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                                linktypes.clear();
                                None
                            }
                            PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                                linktypes.push(intf.linktype);
                                None
                            }
                            PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => Some(RawFrame {
                                ts: Some(pcapng_ts_to_seconds(packet.ts_high, packet.ts_low)),
                                linktype: linktype_for_interface(linktypes, packet.if_id),
                                data: unpadded(packet.data, packet.caplen),
                            }),
                            PcapBlockOwned::NG(Block::SimplePacket(packet)) => Some(RawFrame {
                                ts: None,
                                linktype: linktype_for_interface(linktypes, 0),
                                data: unpadded(packet.data, packet.origlen),
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
                            .map_err(|e| PcapSourceError::pcap("pcapng reader refill", e))?;
                        None
                    }
                    Err(e) => return Err(PcapSourceError::pcap("pcapng reader next", e)),
                },
            };
            if frame.is_some() {
                return Ok(frame);
            }
        }
    }
}

/// PCAPNG packet data is padded to 32 bits; keep the captured bytes only.
fn unpadded(data: &[u8], len: u32) -> Vec<u8> {
    let len = (len as usize).min(data.len());
    data[..len].to_vec()
}
