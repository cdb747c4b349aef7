//! AVTP (IEEE 1722) stream header decoding.
//!
//! The parser decodes the 24-byte stream data header (control/flags,
//! sequence, uncertainty, stream id, presentation time, gateway info, data
//! length and 1394 format) and, when the payload is long enough, the IEC
//! 61883 CIP header that follows it. Fields are big-endian.
//!
//! Byte offsets live in `layout`, bounds-checked reads in `reader`.
//!
//! Version française (résumé):
//! Décodage de l'en-tête de flux AVTP (24 octets) et de l'en-tête CIP
//! optionnel. Les positions sont dans `layout`, les lectures dans `reader`.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::{AvtpPacket, CipHeader, parse_avtp_stream};
