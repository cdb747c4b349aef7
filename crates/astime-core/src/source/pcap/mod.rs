//! PCAP/PCAPNG source implementation.
//!
//! The container format is detected from the magic bytes. Legacy PCAP files
//! with microsecond or nanosecond resolution are supported, as are PCAPNG
//! enhanced and simple packet blocks.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
