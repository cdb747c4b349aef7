use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use astime_core::MacAddr;
use astime_core::fixtures::{AvtpFrame, two_stream_capture, write_pcap, write_pcapng};

const TALKER_A: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x00]);
const TALKER_B: MacAddr = MacAddr([0x91, 0xe0, 0xf0, 0x00, 0xfe, 0x01]);
/// One 48 kHz class A packet of 6 samples.
const STEP_NS: u32 = 125_000;

fn main() -> ExitCode {
    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demos").join("captures"));
    if let Err(err) = run(&root) {
        eprintln!("error: {}", err);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run(root: &Path) -> Result<(), String> {
    fs::create_dir_all(root)
        .map_err(|err| format!("failed to create {}: {}", root.display(), err))?;

    let packets = two_stream_capture(TALKER_A, TALKER_B, 250, STEP_NS);
    write(root, "two_streams.pcap", &packets, Container::Pcap)?;
    write(root, "two_streams.pcapng", &packets, Container::PcapNg)?;
    write(root, "uncertain.pcapng", &uncertain_capture(), Container::PcapNg)?;
    write(root, "sequence_gap.pcap", &sequence_gap_capture(), Container::Pcap)?;
    Ok(())
}

enum Container {
    Pcap,
    PcapNg,
}

fn write(
    root: &Path,
    name: &str,
    packets: &[(u64, Vec<u8>)],
    container: Container,
) -> Result<(), String> {
    let path = root.join(name);
    let written = match container {
        Container::Pcap => write_pcap(&path, packets),
        Container::PcapNg => write_pcapng(&path, packets),
    };
    written.map_err(|err| format!("failed to write {}: {}", path.display(), err))?;
    println!("wrote {} ({} frames)", path.display(), packets.len());
    Ok(())
}

/// Single talker whose first frames carry an uncertain timestamp.
fn uncertain_capture() -> Vec<(u64, Vec<u8>)> {
    (0..120u32)
        .map(|k| {
            let mut frame = AvtpFrame::timestamped(TALKER_A, k as u8, k.wrapping_mul(STEP_NS));
            if k < 4 {
                frame.timestamp_uncertain = 1;
            }
            (u64::from(k) * 125, frame.to_bytes())
        })
        .collect()
}

/// Single talker that drops frames 40..=42.
fn sequence_gap_capture() -> Vec<(u64, Vec<u8>)> {
    (0..120u32)
        .filter(|k| !(40..=42).contains(k))
        .map(|k| {
            let ts = (u32::MAX - 10 * STEP_NS).wrapping_add(k.wrapping_mul(STEP_NS));
            let frame = AvtpFrame::timestamped(TALKER_A, k as u8, ts);
            (u64::from(k) * 125, frame.to_bytes())
        })
        .collect()
}
