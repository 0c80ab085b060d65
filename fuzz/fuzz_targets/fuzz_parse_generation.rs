#![no_main]
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use wende::series::TimeRange;
use wende::sources::entsoe::parse_generation;

fuzz_target!(|data: &[u8]| {
    let Ok(xml) = std::str::from_utf8(data) else {
        return;
    };
    let range = TimeRange::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
    );
    let psr_types = vec!["B16".to_string(), "B19".to_string()];

    // Any output must satisfy the series invariants
    if let Ok(series) = parse_generation(xml, &psr_types, range) {
        for pair in series.points().windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        assert!(series.points().iter().all(|p| range.contains(p.timestamp)));
    }
});
