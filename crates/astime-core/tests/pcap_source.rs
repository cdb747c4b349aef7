use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use astime_core::fixtures::{AvtpFrame, two_stream_capture, write_pcap, write_pcapng};
use astime_core::{MacAddr, PacketSource, PcapFileSource, SourceError};

const TALKER_A: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x00]);
const TALKER_B: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x01]);

fn temp_path(name: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("astime_{unique}_{name}"))
}

fn read_all(path: &PathBuf) -> Vec<(u64, Option<f64>, Vec<u8>)> {
    let mut source = PcapFileSource::open(path).unwrap();
    let mut frames = Vec::new();
    while let Some(event) = source.next_packet().unwrap() {
        frames.push((event.frame, event.ts, event.data));
    }
    assert_eq!(source.frames_read(), frames.len() as u64);
    frames
}

#[test]
fn pcap_and_pcapng_yield_the_same_frames() {
    let packets = two_stream_capture(TALKER_A, TALKER_B, 4, 125_000);
    let pcap = temp_path("same.pcap");
    let pcapng = temp_path("same.pcapng");
    write_pcap(&pcap, &packets).unwrap();
    write_pcapng(&pcapng, &packets).unwrap();

    let legacy = read_all(&pcap);
    let ng = read_all(&pcapng);
    let _ = fs::remove_file(&pcap);
    let _ = fs::remove_file(&pcapng);

    assert_eq!(legacy.len(), 8);
    assert_eq!(legacy, ng);
    assert_eq!(legacy[0].0, 1);
    assert_eq!(legacy[7].0, 8);
    assert_eq!(legacy[2].1, Some(0.000125));
    assert_eq!(legacy[3].2, packets[3].1);
}

#[test]
fn odd_sized_frames_survive_pcapng_padding() {
    let mut frame = AvtpFrame::timestamped(TALKER_A, 1, 42).to_bytes();
    frame.push(0xaa);
    let path = temp_path("padding.pcapng");
    write_pcapng(&path, &[(0, frame.clone())]).unwrap();

    let frames = read_all(&path);
    let _ = fs::remove_file(&path);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].2, frame);
}

#[test]
fn pcap_source_rejects_truncated_file() {
    let path = temp_path("truncated.pcapng");
    fs::write(&path, [0x0a, 0x0d, 0x0d]).unwrap();
    let err = match PcapFileSource::open(&path) {
        Ok(_) => panic!("expected truncated file to be rejected"),
        Err(err) => err,
    };
    let _ = fs::remove_file(&path);

    assert!(matches!(err, SourceError::Io(_)));
}

#[test]
fn pcap_source_reports_missing_file() {
    let err = match PcapFileSource::open(&temp_path("missing.pcap")) {
        Ok(_) => panic!("expected missing file to be rejected"),
        Err(err) => err,
    };
    assert!(matches!(err, SourceError::Io(_)));
}
