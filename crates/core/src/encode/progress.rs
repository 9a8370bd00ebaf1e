//! Pure parsing of ffmpeg's streaming progress output.
//!
//! ffmpeg interleaves stats lines like
//! `frame=  120 fps= 24 q=28.0 size=    1024KiB time=00:00:05.00 bitrate=1677.7kbits/s speed=1.25x`
//! with arbitrary log output on the same stream. A line parses into a sample
//! only when both the `time=` and `speed=` fields are present and valid;
//! everything else yields `None` and is left to the log sink.

use serde::Serialize;

/// One parsed progress reading from the encoder's output stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Encoded media time so far, in milliseconds.
    pub elapsed_millis: u64,
    /// Encode speed as a multiple of realtime.
    pub speed: f32,
}

/// Parse one line of encoder output into a progress sample.
///
/// Returns `None` for malformed or partial lines; never panics.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let elapsed_millis = parse_ffmpeg_time(extract_field(line, "time=")?)?;
    let speed_token = extract_field(line, "speed=")?;
    let speed: f32 = speed_token.trim_end_matches('x').parse().ok()?;
    if !speed.is_finite() || speed < 0.0 {
        return None;
    }
    Some(ProgressSample {
        elapsed_millis,
        speed,
    })
}

/// Parse an ffmpeg `HH:MM:SS.cc` timestamp into milliseconds.
pub fn parse_ffmpeg_time(token: &str) -> Option<u64> {
    let mut parts = token.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + (seconds * 1000.0).round() as u64)
}

/// Value of `key` in a stats line, tolerating the padding ffmpeg inserts
/// between the key and the value (`frame=  120`).
fn extract_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let token = rest.split_whitespace().next()?;
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Format a millisecond count as `HH:MM:SS` for display.
pub fn format_millis(millis: u64) -> String {
    let total_secs = millis / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60
    )
}

/// Format an encode speed multiplier for display, e.g. `1.25x`.
pub fn format_speed(speed: f32) -> String {
    format!("{:.2}x", speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_recorded_stats_line() {
        let line = "frame=  120 fps= 24 q=28.0 size=    1024KiB time=00:00:05.00 bitrate=1677.7kbits/s speed=1.25x";
        let sample = parse_progress_line(line).expect("stats line should parse");
        assert_eq!(sample.elapsed_millis, 5_000);
        assert!((sample.speed - 1.25).abs() < 0.001);
    }

    #[test]
    fn test_parse_line_with_hours() {
        let line = "frame=172800 fps=120 q=20.0 size=  204800KiB time=01:12:00.50 bitrate=388.2kbits/s speed=3.01x";
        let sample = parse_progress_line(line).expect("stats line should parse");
        assert_eq!(sample.elapsed_millis, 3_600_000 + 12 * 60_000 + 500);
    }

    #[test]
    fn test_malformed_lines_yield_none() {
        assert_eq!(parse_progress_line(""), None);
        assert_eq!(parse_progress_line("Press [q] to stop, [?] for help"), None);
        assert_eq!(
            parse_progress_line("[libx264 @ 0x55] using SAR=1/1"),
            None
        );
        // startup stats before timing is known
        assert_eq!(
            parse_progress_line("frame=    0 fps=0.0 q=0.0 size=       0KiB time=N/A bitrate=N/A speed=N/A"),
            None
        );
        // time present but speed missing
        assert_eq!(parse_progress_line("time=00:00:05.00 bitrate=1.0"), None);
        // truncated mid-field
        assert_eq!(parse_progress_line("time=00:00"), None);
    }

    #[test]
    fn test_parse_ffmpeg_time_bounds() {
        assert_eq!(parse_ffmpeg_time("00:00:00.00"), Some(0));
        assert_eq!(parse_ffmpeg_time("100:00:00.00"), Some(360_000_000));
        assert_eq!(parse_ffmpeg_time("00:61:00.00"), None);
        assert_eq!(parse_ffmpeg_time("00:00:75.00"), None);
        assert_eq!(parse_ffmpeg_time("00:00:00:00"), None);
        assert_eq!(parse_ffmpeg_time("N/A"), None);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0), "00:00:00");
        assert_eq!(format_millis(5_000), "00:00:05");
        assert_eq!(format_millis(3_661_000), "01:01:01");
        assert_eq!(format_millis(86_400_000), "24:00:00");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1.25), "1.25x");
        assert_eq!(format_speed(0.5), "0.50x");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // *For any* valid timestamp and speed, a synthesized stats line
        // parses back to the source values.
        #[test]
        fn prop_stats_line_round_trip(
            hours in 0u64..100,
            minutes in 0u64..60,
            seconds in 0u64..60,
            centis in 0u64..100,
            speed_hundredths in 0u32..10_000,
        ) {
            let speed = speed_hundredths as f32 / 100.0;
            let line = format!(
                "frame=  999 fps= 30 q=28.0 size=    2048KiB time={:02}:{:02}:{:02}.{:02} bitrate=900.0kbits/s speed={:.2}x",
                hours, minutes, seconds, centis, speed
            );
            let sample = parse_progress_line(&line).expect("synthesized line should parse");
            let expected_millis = hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + centis * 10;
            prop_assert_eq!(sample.elapsed_millis, expected_millis);
            prop_assert!((sample.speed - speed).abs() < 0.005);
        }

        // Arbitrary input never panics the parser.
        #[test]
        fn prop_parser_never_panics(line in ".*") {
            let _ = parse_progress_line(&line);
        }
    }
}
