//! Overview forecast payload published by the Japan Meteorological Agency

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// `ja-JP` style date-time, e.g. `2024/1/1 9:05:00`
const DISPLAY_FORMAT: &str = "%Y/%-m/%-d %-H:%M:%S";

/// Body of `overview_forecast/{code}.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    /// Issuing office, e.g. "銚子地方気象台"
    pub publishing_office: String,
    /// ISO-8601 timestamp with offset
    pub report_datetime: String,
    /// Forecast area name
    pub target_area: String,
    pub headline_text: String,
    /// Full report, may span several lines
    pub text: String,
}

impl WeatherReport {
    /// Parsed report timestamp, `None` when the service sent something odd
    #[must_use]
    pub fn report_time(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.report_datetime).ok()
    }

    /// Report timestamp rendered in `timezone`.
    ///
    /// Falls back to the raw string when it cannot be parsed.
    #[must_use]
    pub fn format_report_datetime(&self, timezone: Tz) -> String {
        match self.report_time() {
            Some(time) => time.with_timezone(&timezone).format(DISPLAY_FORMAT).to_string(),
            None => {
                tracing::warn!(raw = %self.report_datetime, "unparseable report timestamp");
                self.report_datetime.clone()
            }
        }
    }

    /// Page title for the detail view
    #[must_use]
    pub fn title(&self) -> String {
        format!("{}の天気", self.target_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn report_at(datetime: &str) -> WeatherReport {
        WeatherReport {
            publishing_office: "銚子地方気象台".into(),
            report_datetime: datetime.into(),
            target_area: "千葉県".into(),
            headline_text: "H".into(),
            text: "T".into(),
        }
    }

    #[test]
    fn test_deserialize_jma_payload() {
        let json = r#"{
            "publishingOffice": "気象庁",
            "reportDatetime": "2024-01-01T10:37:00+09:00",
            "targetArea": "東京都",
            "headlineText": "",
            "text": "　日本付近は高気圧に覆われています。\n\n　東京地方は、晴れています。"
        }"#;
        let report: WeatherReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.target_area, "東京都");
        assert_eq!(report.publishing_office, "気象庁");
        assert!(report.text.contains("\n\n"));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let json = r#"{"targetArea": "東京都", "text": "x"}"#;
        assert!(serde_json::from_str::<WeatherReport>(json).is_err());
    }

    #[rstest]
    #[case("2024-01-01T12:00:00+09:00", chrono_tz::Asia::Tokyo, "2024/1/1 12:00:00")]
    #[case("2024-01-01T03:00:00Z", chrono_tz::Asia::Tokyo, "2024/1/1 12:00:00")]
    #[case("2024-01-01T12:00:00+09:00", chrono_tz::Tz::UTC, "2024/1/1 3:00:00")]
    #[case("2023-12-31T20:05:09-05:00", chrono_tz::Asia::Tokyo, "2024/1/1 10:05:09")]
    fn test_format_report_datetime(
        #[case] raw: &str,
        #[case] timezone: Tz,
        #[case] expected: &str,
    ) {
        assert_eq!(report_at(raw).format_report_datetime(timezone), expected);
    }

    #[test]
    fn test_unparseable_datetime_shown_verbatim() {
        let report = report_at("yesterday");
        assert_eq!(report.format_report_datetime(chrono_tz::Asia::Tokyo), "yesterday");
        assert!(report.report_time().is_none());
    }

    #[test]
    fn test_title() {
        assert_eq!(report_at("2024-01-01T00:00:00+09:00").title(), "千葉県の天気");
    }
}
