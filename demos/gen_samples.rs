//! Generate a morning of heart-rate samples as NDJSON for `pulse detect`
//!
//! `cargo run --example gen_samples > day.ndjson`
//! `cargo run --example gen_samples -- --sessions` prints the detected sessions instead

use chrono::{Duration, TimeZone, Utc};
use synheart_pulse::{sessions_to_json, EngineConfig, Sample};

fn main() {
    let Some(t0) = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).single() else {
        eprintln!("Error: invalid start time");
        return;
    };

    // (start minute, minutes, base bpm, activity)
    let blocks = [
        (0, 20, 135.0, "Run"),
        (27, 15, 150.0, "Run"),
        (43, 12, 105.0, "Walk"),
        (60, 6, 160.0, "Run"),
    ];

    let mut samples: Vec<Sample> = Vec::new();
    for (start, minutes, base, activity) in blocks {
        for m in 0..=minutes {
            // Slow climb and a wobble so zones and std dev are not flat
            let hr = base + f64::from(m) * 0.8 + if m % 2 == 0 { 2.0 } else { -2.0 };
            samples.push(Sample::new(
                t0 + Duration::minutes(i64::from(start + m)),
                Some(hr),
                Some(activity),
            ));
        }
    }

    if std::env::args().any(|arg| arg == "--sessions") {
        match sessions_to_json(&samples, &EngineConfig::default()) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: {e:?}"),
        }
        return;
    }

    for sample in &samples {
        match serde_json::to_string(sample) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error: {e:?}"),
        }
    }
}
