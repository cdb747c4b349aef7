//! Synthetic AVTP captures.
//!
//! Builders for VLAN-tagged AVTP frames and for the PCAP and PCAPNG
//! containers around them. Used by the test suites and by the
//! `capture_fixtures` binary.

use std::fs;
use std::path::Path;

use crate::MacAddr;
use crate::protocols::avtp::layout;

const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_AVTP: u16 = 0x22f0;
const LINKTYPE_ETHERNET: u16 = 1;
const SNAPLEN: u32 = 65535;

const PCAP_MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const PCAPNG_SECTION_HEADER: u32 = 0x0a0d_0d0a;
const PCAPNG_BYTE_ORDER_MAGIC: u32 = 0x1a2b_3c4d;
const PCAPNG_INTERFACE_DESCRIPTION: u32 = 1;
const PCAPNG_ENHANCED_PACKET: u32 = 6;

/// Talker MAC used when a frame does not specify one.
pub const DEFAULT_SOURCE: MacAddr = MacAddr([0x00, 0x1b, 0x21, 0x3c, 0x4d, 0x5e]);
/// Default SR class A VLAN.
pub const DEFAULT_VLAN: u16 = 2;

/// One AVTP stream data frame, as seen on the wire.
#[derive(Debug, Clone)]
pub struct AvtpFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub vlan: Option<u16>,
    pub control_data: u8,
    pub flags: u8,
    pub sequence: u8,
    pub timestamp_uncertain: u8,
    pub stream_id: u64,
    pub avtp_timestamp: u32,
}

impl AvtpFrame {
    /// A VLAN-tagged data frame carrying a valid, certain presentation time.
    pub fn timestamped(dst: MacAddr, sequence: u8, avtp_timestamp: u32) -> Self {
        let [a, b, c, d, e, f] = DEFAULT_SOURCE.octets();
        let stream_id = u64::from_be_bytes([a, b, c, d, e, f, 0x00, dst.octets()[5]]);
        Self {
            dst,
            src: DEFAULT_SOURCE,
            vlan: Some(DEFAULT_VLAN),
            control_data: layout::STREAM_DATA_CONTROL,
            flags: layout::TIMESTAMP_VALID_FLAGS,
            sequence,
            timestamp_uncertain: 0,
            stream_id,
            avtp_timestamp,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(18 + layout::CIP_HEADER_END);
        frame.extend_from_slice(&self.dst.octets());
        frame.extend_from_slice(&self.src.octets());
        if let Some(vlan) = self.vlan {
            frame.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
            // PCP 3, SR class A
            frame.extend_from_slice(&((3u16 << 13) | (vlan & 0x0fff)).to_be_bytes());
        }
        frame.extend_from_slice(&ETHERTYPE_AVTP.to_be_bytes());
        frame.extend_from_slice(&self.avtp_header());
        frame
    }

    fn avtp_header(&self) -> Vec<u8> {
        let mut header = vec![0u8; layout::CIP_HEADER_END];
        header[layout::CONTROL_DATA_OFFSET] = self.control_data;
        header[layout::FLAGS_OFFSET] = self.flags;
        header[layout::SEQUENCE_OFFSET] = self.sequence;
        header[layout::TIMESTAMP_UNCERTAIN_OFFSET] = self.timestamp_uncertain;
        header[layout::STREAM_ID0_RANGE.start..layout::STREAM_ID1_RANGE.end]
            .copy_from_slice(&self.stream_id.to_be_bytes());
        header[layout::AVTP_TIMESTAMP_RANGE.clone()]
            .copy_from_slice(&self.avtp_timestamp.to_be_bytes());
        let data_length = (layout::CIP_HEADER_END - layout::STREAM_HEADER_LEN) as u16;
        header[layout::PACKET_DATA_LENGTH_RANGE.clone()]
            .copy_from_slice(&data_length.to_be_bytes());
        header[layout::FORMAT_OFFSET] = 0x7a;
        header[layout::TCODE_OFFSET] = 0xa0;
        header[layout::CIP_DATA_BLOCK_SIZE_OFFSET] = 0x02;
        header[layout::CIP_DBC_OFFSET] = self.sequence.wrapping_mul(6);
        header[layout::CIP_FORMAT_ID_OFFSET] = 0x90;
        header
    }
}

/// Frames of two talkers sending interleaved, one pair per 125 µs cycle.
///
/// Presentation times advance by `step` ns per frame and start close enough
/// to `u32::MAX` that both streams wrap within the first few frames.
pub fn two_stream_capture(
    first: MacAddr,
    second: MacAddr,
    pairs: u32,
    step: u32,
) -> Vec<(u64, Vec<u8>)> {
    let start = u32::MAX - 2 * step;
    let mut packets = Vec::with_capacity(pairs as usize * 2);
    for k in 0..pairs {
        let ts = start.wrapping_add(k.wrapping_mul(step));
        let ts_us = u64::from(k) * 125;
        packets.push((ts_us, AvtpFrame::timestamped(first, k as u8, ts).to_bytes()));
        packets.push((
            ts_us,
            AvtpFrame::timestamped(second, k as u8, ts.wrapping_add(1_000)).to_bytes(),
        ));
    }
    packets
}

/// Legacy PCAP (microsecond resolution, Ethernet) file contents.
pub fn pcap_bytes(packets: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut output = Vec::new();
    output.extend_from_slice(&PCAP_MAGIC_MICROS.to_le_bytes());
    output.extend_from_slice(&2u16.to_le_bytes());
    output.extend_from_slice(&4u16.to_le_bytes());
    output.extend_from_slice(&0i32.to_le_bytes());
    output.extend_from_slice(&0u32.to_le_bytes());
    output.extend_from_slice(&SNAPLEN.to_le_bytes());
    output.extend_from_slice(&u32::from(LINKTYPE_ETHERNET).to_le_bytes());

    for (ts_us, data) in packets {
        let ts_sec = (ts_us / 1_000_000) as u32;
        let ts_usec = (ts_us % 1_000_000) as u32;
        let len = data.len() as u32;
        output.extend_from_slice(&ts_sec.to_le_bytes());
        output.extend_from_slice(&ts_usec.to_le_bytes());
        output.extend_from_slice(&len.to_le_bytes());
        output.extend_from_slice(&len.to_le_bytes());
        output.extend_from_slice(data);
    }
    output
}

/// PCAPNG (single Ethernet interface, microsecond resolution) file contents.
pub fn pcapng_bytes(packets: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut output = Vec::new();
    output.extend_from_slice(&pcapng_block(PCAPNG_SECTION_HEADER, &section_header_body()));
    output.extend_from_slice(&pcapng_block(
        PCAPNG_INTERFACE_DESCRIPTION,
        &interface_desc_body(),
    ));
    for (ts_us, data) in packets {
        output.extend_from_slice(&pcapng_block(
            PCAPNG_ENHANCED_PACKET,
            &enhanced_packet_body(*ts_us, data),
        ));
    }
    output
}

pub fn write_pcap(path: &Path, packets: &[(u64, Vec<u8>)]) -> std::io::Result<()> {
    fs::write(path, pcap_bytes(packets))
}

pub fn write_pcapng(path: &Path, packets: &[(u64, Vec<u8>)]) -> std::io::Result<()> {
    fs::write(path, pcapng_bytes(packets))
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn section_header_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&PCAPNG_BYTE_ORDER_MAGIC.to_be_bytes());
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&(-1i64).to_be_bytes());
    body
}

fn interface_desc_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&LINKTYPE_ETHERNET.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&SNAPLEN.to_be_bytes());
    body
}

fn enhanced_packet_body(ts_us: u64, data: &[u8]) -> Vec<u8> {
    let ts_high = (ts_us >> 32) as u32;
    let ts_low = ts_us as u32;
    let cap_len = data.len() as u32;
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&ts_high.to_be_bytes());
    body.extend_from_slice(&ts_low.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(data);
    let pad_len = (4 - (data.len() % 4)) % 4;
    body.resize(body.len() + pad_len, 0);
    body
}

#[cfg(test)]
mod tests {
    use super::{AvtpFrame, pcap_bytes, pcapng_bytes};
    use crate::MacAddr;
    use crate::protocols::avtp::parse_avtp_stream;

    const DST: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x07]);

    #[test]
    fn frame_round_trips_through_avtp_parser() {
        let bytes = AvtpFrame::timestamped(DST, 9, 0xdead_beef).to_bytes();
        assert_eq!(&bytes[..6], &DST.octets());
        assert_eq!(&bytes[12..14], &[0x81, 0x00]);
        assert_eq!(&bytes[16..18], &[0x22, 0xf0]);

        let packet = parse_avtp_stream(&bytes[18..]).unwrap();
        assert_eq!(packet.sequence, 9);
        assert_eq!(packet.avtp_timestamp, 0xdead_beef);
        assert!(packet.cip.is_some());
        assert_eq!(packet.stream_id() & 0xff, 0x07);
    }

    #[test]
    fn untagged_frame_has_no_vlan_header() {
        let mut frame = AvtpFrame::timestamped(DST, 0, 0);
        frame.vlan = None;
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[12..14], &[0x22, 0xf0]);
    }

    #[test]
    fn containers_start_with_their_magic() {
        let packets = vec![(0u64, vec![0u8; 3])];
        assert_eq!(&pcap_bytes(&packets)[..4], &[0xd4, 0xc3, 0xb2, 0xa1]);
        let ng = pcapng_bytes(&packets);
        assert_eq!(&ng[..4], &[0x0a, 0x0d, 0x0d, 0x0a]);
        assert_eq!(ng.len() % 4, 0);
    }
}
