use serde_json::Value;
use tracing::warn;

use crate::error::EtlError;

pub const MAX_DAY: i64 = 9;

pub fn encode(hours: i64) -> Result<String, EtlError> {
    if hours < 0 {
        return Err(EtlError::InvalidTimepoint(hours.to_string()));
    }
    // From the second day on the hour collapses to 00.
    let day = hours / 24 + 1;
    let (day, hour) = if day > 1 { (day, 0) } else { (1, hours) };
    if day > MAX_DAY {
        warn!(hours, day, "time point beyond day {MAX_DAY}; clamping");
    }
    Ok(format!("1970-01-{:02}T{:02}:00:00Z", day.min(MAX_DAY), hour))
}

pub fn parse_hours(value: Option<&Value>) -> Result<i64, EtlError> {
    let invalid = |raw: String| EtlError::InvalidTimepoint(raw);
    match value {
        None | Some(Value::Null) => Err(invalid("<missing>".to_string())),
        Some(Value::Number(number)) => number.as_i64().ok_or_else(|| invalid(number.to_string())),
        Some(Value::String(text)) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(text.clone())),
        Some(other) => Err(invalid(other.to_string())),
    }
}

pub fn encode_value(value: Option<&Value>) -> Result<String, EtlError> {
    encode(parse_hours(value)?)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn first_day_keeps_hour() {
        assert_eq!(encode(5).unwrap(), "1970-01-01T05:00:00Z");
        assert_eq!(encode(0).unwrap(), "1970-01-01T00:00:00Z");
        assert_eq!(encode(23).unwrap(), "1970-01-01T23:00:00Z");
    }

    #[test]
    fn later_days_collapse_hour() {
        assert_eq!(encode(26).unwrap(), "1970-01-02T00:00:00Z");
        assert_eq!(encode(48).unwrap(), "1970-01-03T00:00:00Z");
    }

    #[test]
    fn clamps_past_single_digit_day() {
        assert_eq!(encode(240).unwrap(), "1970-01-09T00:00:00Z");
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert_matches!(encode(-1), Err(EtlError::InvalidTimepoint(_)));
        assert_matches!(
            encode_value(Some(&json!("soon"))),
            Err(EtlError::InvalidTimepoint(_))
        );
        assert_matches!(encode_value(None), Err(EtlError::InvalidTimepoint(_)));
        assert_matches!(
            encode_value(Some(&json!(1.5))),
            Err(EtlError::InvalidTimepoint(_))
        );
    }

    #[test]
    fn accepts_text_and_numbers() {
        assert_eq!(
            encode_value(Some(&json!("26"))).unwrap(),
            "1970-01-02T00:00:00Z"
        );
        assert_eq!(encode_value(Some(&json!(5))).unwrap(), "1970-01-01T05:00:00Z");
    }
}
