#![no_main]
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use wende::series::TimeRange;
use wende::sources::smard::{blocks_overlapping, parse_block, parse_index};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let range = TimeRange::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
    );

    if let Ok(starts) = parse_index(json) {
        let picked = blocks_overlapping(&starts, range);
        assert!(picked.len() <= starts.len());
    }
    if let Ok(points) = parse_block(json, range) {
        assert!(points.iter().all(|(ts, _)| range.contains(*ts)));
    }
});
