use super::error::AvtpError;
use super::layout;
use super::reader::AvtpReader;

/// Decoded AVTP stream data header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvtpPacket {
    pub control_data: u8,
    pub flags: u8,
    pub sequence: u8,
    pub timestamp_uncertain: u8,
    pub stream_id0: u32,
    pub stream_id1: u32,
    /// Lower 32 bits of the 802.1AS presentation time, in nanoseconds.
    pub avtp_timestamp: u32,
    pub gateway: u32,
    pub packet_data_length: u16,
    pub format: u8,
    pub tcode: u8,
    pub cip: Option<CipHeader>,
}

/// IEC 61883 CIP header carried after the stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipHeader {
    pub source_id: u8,
    pub data_block_size: u8,
    pub packing: u8,
    pub dbc: u8,
    pub format_id: u8,
    pub syt: u8,
    pub ptp_upper: u32,
    pub ptp_lower: u32,
}

impl AvtpPacket {
    pub fn stream_id(&self) -> u64 {
        ((self.stream_id0 as u64) << 32) | self.stream_id1 as u64
    }

    pub fn is_stream_data(&self) -> bool {
        self.control_data == layout::STREAM_DATA_CONTROL
    }

    /// Whether the presentation time field carries a usable timestamp.
    pub fn has_valid_timestamp(&self) -> bool {
        self.flags == layout::TIMESTAMP_VALID_FLAGS
    }

    pub fn is_timestamp_uncertain(&self) -> bool {
        self.timestamp_uncertain != 0
    }
}

/// Decode an AVTP stream header from an Ethernet payload.
///
/// The CIP header is decoded only when the payload is long enough to hold it.
pub fn parse_avtp_stream(payload: &[u8]) -> Result<AvtpPacket, AvtpError> {
    let reader = AvtpReader::new(payload);
    reader.require_len(layout::STREAM_HEADER_LEN)?;

    let cip = if reader.len() >= layout::CIP_HEADER_END {
        Some(parse_cip(&reader)?)
    } else {
        None
    };

    Ok(AvtpPacket {
        control_data: reader.read_u8(layout::CONTROL_DATA_OFFSET)?,
        flags: reader.read_u8(layout::FLAGS_OFFSET)?,
        sequence: reader.read_u8(layout::SEQUENCE_OFFSET)?,
        timestamp_uncertain: reader.read_u8(layout::TIMESTAMP_UNCERTAIN_OFFSET)?,
        stream_id0: reader.read_u32_be(layout::STREAM_ID0_RANGE.clone())?,
        stream_id1: reader.read_u32_be(layout::STREAM_ID1_RANGE.clone())?,
        avtp_timestamp: reader.read_u32_be(layout::AVTP_TIMESTAMP_RANGE.clone())?,
        gateway: reader.read_u32_be(layout::GATEWAY_RANGE.clone())?,
        packet_data_length: reader.read_u16_be(layout::PACKET_DATA_LENGTH_RANGE.clone())?,
        format: reader.read_u8(layout::FORMAT_OFFSET)?,
        tcode: reader.read_u8(layout::TCODE_OFFSET)?,
        cip,
    })
}

fn parse_cip(reader: &AvtpReader<'_>) -> Result<CipHeader, AvtpError> {
    Ok(CipHeader {
        source_id: reader.read_u8(layout::CIP_SOURCE_ID_OFFSET)?,
        data_block_size: reader.read_u8(layout::CIP_DATA_BLOCK_SIZE_OFFSET)?,
        packing: reader.read_u8(layout::CIP_PACKING_OFFSET)?,
        dbc: reader.read_u8(layout::CIP_DBC_OFFSET)?,
        format_id: reader.read_u8(layout::CIP_FORMAT_ID_OFFSET)?,
        syt: reader.read_u8(layout::CIP_SYT_OFFSET)?,
        ptp_upper: reader.read_u32_be(layout::CIP_PTP_UPPER_RANGE.clone())?,
        ptp_lower: reader.read_u32_be(layout::CIP_PTP_LOWER_RANGE.clone())?,
    })
}

#[cfg(test)]
mod tests {
    use super::parse_avtp_stream;
    use crate::protocols::avtp::error::AvtpError;
    use crate::protocols::avtp::layout;

    fn stream_header(sequence: u8, timestamp: u32) -> Vec<u8> {
        let mut payload = vec![0u8; layout::STREAM_HEADER_LEN];
        payload[layout::FLAGS_OFFSET] = layout::TIMESTAMP_VALID_FLAGS;
        payload[layout::SEQUENCE_OFFSET] = sequence;
        payload[layout::STREAM_ID0_RANGE.clone()].copy_from_slice(&0x0011_2233u32.to_be_bytes());
        payload[layout::STREAM_ID1_RANGE.clone()].copy_from_slice(&0x4455_0001u32.to_be_bytes());
        payload[layout::AVTP_TIMESTAMP_RANGE.clone()].copy_from_slice(&timestamp.to_be_bytes());
        payload[layout::PACKET_DATA_LENGTH_RANGE.clone()].copy_from_slice(&56u16.to_be_bytes());
        payload
    }

    #[test]
    fn parse_stream_header() {
        let payload = stream_header(7, 0xfedc_ba98);
        let packet = parse_avtp_stream(&payload).unwrap();
        assert!(packet.is_stream_data());
        assert!(packet.has_valid_timestamp());
        assert!(!packet.is_timestamp_uncertain());
        assert_eq!(packet.sequence, 7);
        assert_eq!(packet.avtp_timestamp, 0xfedc_ba98);
        assert_eq!(packet.stream_id(), 0x0011_2233_4455_0001);
        assert_eq!(packet.packet_data_length, 56);
        assert!(packet.cip.is_none());
    }

    #[test]
    fn parse_cip_when_present() {
        let mut payload = stream_header(1, 10);
        payload.resize(layout::CIP_HEADER_END, 0);
        payload[layout::CIP_DBC_OFFSET] = 0x40;
        payload[layout::CIP_PTP_LOWER_RANGE.clone()].copy_from_slice(&99u32.to_be_bytes());

        let packet = parse_avtp_stream(&payload).unwrap();
        let cip = packet.cip.unwrap();
        assert_eq!(cip.dbc, 0x40);
        assert_eq!(cip.ptp_lower, 99);
    }

    #[test]
    fn control_packet_is_not_stream_data() {
        let mut payload = stream_header(1, 10);
        payload[layout::CONTROL_DATA_OFFSET] = 0x80;
        let packet = parse_avtp_stream(&payload).unwrap();
        assert!(!packet.is_stream_data());
    }

    #[test]
    fn parse_short_payload() {
        let payload = vec![0u8; layout::STREAM_HEADER_LEN - 1];
        let err = parse_avtp_stream(&payload).unwrap_err();
        assert!(matches!(err, AvtpError::TooShort { needed: 24, .. }));
    }
}
