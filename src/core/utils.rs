use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, Utc};

/// Format of SQLite's `datetime('now')`
pub const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// Breaks prefer the last newline inside the window, then the last space,
/// and fall back to a hard cut. Never splits a UTF-8 character.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        // Byte offset just past the `max_chars`-th character
        let window_end = rest.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(window_end);

        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
        rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix(' ')).unwrap_or(rest);
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Unix seconds now
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Parses a `/timezone` argument such as `+3`, `-5` or `0`. Valid range is -12..=14.
pub fn parse_tz_offset(arg: &str) -> Option<i64> {
    let arg = arg.trim();
    let arg = arg.strip_prefix('+').unwrap_or(arg);
    arg.parse::<i64>().ok().filter(|h| (-12..=14).contains(h))
}

/// Local hour for a UTC hour and an offset in hours.
pub fn local_hour(utc_hour: u32, tz_offset: i64) -> u32 {
    (utc_hour as i64 + tz_offset).rem_euclid(24) as u32
}

/// Wall-clock time at a fixed offset of `tz_offset` hours.
pub fn local_time(now: DateTime<Utc>, tz_offset: i64) -> NaiveDateTime {
    now.naive_utc() + TimeDelta::hours(tz_offset)
}

/// UTC instant of the user's local midnight starting the day that contains
/// `now`, formatted like SQLite's `datetime()` so it compares with `created_at`.
pub fn local_day_start_utc(now: DateTime<Utc>, tz_offset: i64) -> String {
    let midnight = local_time(now, tz_offset).date().and_time(NaiveTime::MIN);
    (midnight - TimeDelta::hours(tz_offset))
        .format(SQLITE_DATETIME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello", 4000), vec!["hello"]);
        assert_eq!(split_message("", 4000), vec![""]);
    }

    #[test]
    fn chunks_respect_limit_and_char_boundaries() {
        let text = "🧬".repeat(9000);
        let chunks = split_message(&text, 4000);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4000));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newline_breaks() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn truncates_by_chars() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("ok", 100), "ok");
    }

    #[test]
    fn timezone_parsing() {
        assert_eq!(parse_tz_offset("+3"), Some(3));
        assert_eq!(parse_tz_offset("-5"), Some(-5));
        assert_eq!(parse_tz_offset("15"), None);
        assert_eq!(parse_tz_offset("abc"), None);
    }

    #[test]
    fn local_hour_wraps() {
        assert_eq!(local_hour(23, 2), 1);
        assert_eq!(local_hour(1, -3), 22);
        assert_eq!(local_hour(9, 0), 9);
    }

    #[test]
    fn local_day_start_follows_offset() {
        use chrono::TimeZone;

        // 02:00 UTC on May 3 is still May 2, 21:00 at UTC-5
        let now = Utc.with_ymd_and_hms(2026, 5, 3, 2, 0, 0).unwrap();
        assert_eq!(local_day_start_utc(now, -5), "2026-05-02 05:00:00");
        assert_eq!(local_day_start_utc(now, 0), "2026-05-03 00:00:00");

        // 23:00 UTC on May 1 is already May 2, 09:00 at UTC+10
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 23, 0, 0).unwrap();
        assert_eq!(local_day_start_utc(now, 10), "2026-05-01 14:00:00");
        assert_eq!(
            local_time(now, 10),
            Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap().naive_utc()
        );
    }
}
