//! Cookie lifetime wording as used by consent policies.

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

/// Round half up, the way policy authors' tooling rounds.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = value as i64;
        whole.to_string()
    } else {
        value.to_string()
    }
}

#[allow(clippy::float_cmp)]
fn plural(count: f64, unit: &str) -> String {
    if count == 1.0 {
        format!("1 {unit}")
    } else {
        format!("{} {unit}s", format_number(count))
    }
}

/// Lifetime text of a cookie captured at `frame_timestamp` (unix seconds).
///
/// `expires == -1` is a session cookie. Otherwise the remaining lifetime is
/// expressed in the largest rounded unit: days, then hours (only above one
/// hour), then minutes, then raw seconds.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn cookie_expiration_text(frame_timestamp: i64, expires: f64) -> String {
    if expires == -1.0 {
        return "Session".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let diff = expires - frame_timestamp as f64;
    let days = round_half_up(diff / DAY);
    let hours = round_half_up(diff / HOUR);
    let minutes = round_half_up(diff / MINUTE);

    if days > 0.0 {
        plural(days, "day")
    } else if hours > 1.0 {
        plural(hours, "hour")
    } else if minutes > 0.0 {
        plural(minutes, "minute")
    } else {
        plural(diff, "second")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[allow(clippy::cast_precision_loss)]
    fn text(diff: f64) -> String {
        cookie_expiration_text(NOW, NOW as f64 + diff)
    }

    #[test]
    fn test_session_cookie() {
        assert_eq!(cookie_expiration_text(NOW, -1.0), "Session");
        assert_eq!(cookie_expiration_text(0, -1.0), "Session");
    }

    #[test]
    fn test_one_day_window() {
        for diff in [86_400.0, 100_000.0, 129_599.0] {
            assert_eq!(text(diff), "1 day", "diff {diff}");
        }
        // Rounds up to two days past one and a half.
        assert_eq!(text(129_600.0), "2 days");
        assert_eq!(text(172_799.0), "2 days");
        assert_eq!(text(172_800.0), "2 days");
    }

    #[test]
    fn test_days_round_from_half_a_day() {
        assert_eq!(text(43_200.0), "1 day");
        assert_eq!(text(43_199.0), "12 hours");
        assert_eq!(text(365.0 * 86_400.0), "365 days");
    }

    #[test]
    fn test_hours_and_minutes() {
        assert_eq!(text(2.0 * 3600.0), "2 hours");
        // One hour is reported in minutes.
        assert_eq!(text(3600.0), "60 minutes");
        assert_eq!(text(90.0), "2 minutes");
        assert_eq!(text(60.0), "1 minute");
    }

    #[test]
    fn test_seconds() {
        assert_eq!(text(29.0), "29 seconds");
        assert_eq!(text(1.0), "1 second");
        assert_eq!(text(0.0), "0 seconds");
        assert_eq!(text(-120.0), "-120 seconds");
        assert_eq!(text(12.5), "12.5 seconds");
    }
}
