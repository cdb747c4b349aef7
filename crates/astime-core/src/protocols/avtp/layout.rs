pub const CONTROL_DATA_OFFSET: usize = 0;
pub const FLAGS_OFFSET: usize = 1;
pub const SEQUENCE_OFFSET: usize = 2;
pub const TIMESTAMP_UNCERTAIN_OFFSET: usize = 3;
pub const STREAM_ID0_RANGE: std::ops::Range<usize> = 4..8;
pub const STREAM_ID1_RANGE: std::ops::Range<usize> = 8..12;
pub const AVTP_TIMESTAMP_RANGE: std::ops::Range<usize> = 12..16;
pub const GATEWAY_RANGE: std::ops::Range<usize> = 16..20;
pub const PACKET_DATA_LENGTH_RANGE: std::ops::Range<usize> = 20..22;
pub const FORMAT_OFFSET: usize = 22;
pub const TCODE_OFFSET: usize = 23;
pub const STREAM_HEADER_LEN: usize = 24;

pub const CIP_SOURCE_ID_OFFSET: usize = 24;
pub const CIP_DATA_BLOCK_SIZE_OFFSET: usize = 25;
pub const CIP_PACKING_OFFSET: usize = 26;
pub const CIP_DBC_OFFSET: usize = 27;
pub const CIP_FORMAT_ID_OFFSET: usize = 28;
pub const CIP_SYT_OFFSET: usize = 29;
pub const CIP_PTP_UPPER_RANGE: std::ops::Range<usize> = 30..34;
pub const CIP_PTP_LOWER_RANGE: std::ops::Range<usize> = 34..38;
pub const CIP_HEADER_END: usize = 38;

/// Control/subtype byte of a stream data packet.
pub const STREAM_DATA_CONTROL: u8 = 0x00;
/// Stream-valid and timestamp-valid bits set, no media clock restart.
pub const TIMESTAMP_VALID_FLAGS: u8 = 0x81;
