//! KQL query construction for the proxied Azure Data Explorer backend.
//!
//! All queries are plain text POSTed to `/api/query_adx/`. User-supplied
//! values (the device serial) are escaped before templating; channel names
//! come from the static metric catalog and are trusted.

use chrono::NaiveDateTime;

use crate::series::TimeRange;

/// Escape a string for use inside a single-quoted KQL literal.
/// KQL doubles embedded single quotes.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Datetime literal format expected by the backend: `YYYY-MM-DD HH:MM:SS.0000`.
pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S.0000").to_string()
}

/// Builder for the standard date-bounded telemetry history query.
#[derive(Debug, Clone)]
pub struct HistoryQuery<'a> {
    serial: &'a str,
    channel: &'a str,
    range: &'a TimeRange,
    extra_filters: Vec<String>,
}

impl<'a> HistoryQuery<'a> {
    pub fn new(serial: &'a str, channel: &'a str, range: &'a TimeRange) -> Self {
        Self {
            serial,
            channel,
            range,
            extra_filters: Vec::new(),
        }
    }

    /// Append an additional `| where <filter>` stage.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.extra_filters.push(filter.into());
        self
    }

    pub fn build(&self) -> String {
        let mut lines = vec![
            format!("let s = '{}';", escape(self.serial)),
            format!("let start = datetime({});", format_datetime(self.range.from)),
            format!("let finish = datetime({});", format_datetime(self.range.to)),
            "Telemetry".to_string(),
            "| where comms_serial contains s".to_string(),
            format!("| where name contains '{}'", self.channel),
            "| where localtime between (start .. finish)".to_string(),
            "| where isnotnull(value_double)".to_string(),
        ];
        for filter in &self.extra_filters {
            lines.push(format!("| where {filter}"));
        }
        lines.push("| project localtime, value_double".to_string());
        lines.push("| order by localtime asc".to_string());
        lines.join("\n")
    }
}

/// History query with no extra filters.
pub fn history(serial: &str, channel: &str, range: &TimeRange) -> String {
    HistoryQuery::new(serial, channel, range).build()
}

/// Date-bounded alarm history. Same shape as `history` but against the
/// Alarms table and its plain `value` column.
pub fn alarm_history(serial: &str, channel: &str, range: &TimeRange) -> String {
    [
        format!("let s = '{}';", escape(serial)),
        format!("let start = datetime({});", format_datetime(range.from)),
        format!("let finish = datetime({});", format_datetime(range.to)),
        "Alarms".to_string(),
        "| where comms_serial contains s".to_string(),
        format!("| where name has '{channel}'"),
        "| where localtime between (start .. finish)".to_string(),
        "| project localtime, value".to_string(),
        "| order by localtime asc".to_string(),
    ]
    .join("\n")
}

/// Most recent sample for a telemetry channel.
pub fn latest(serial: &str, channel: &str) -> String {
    [
        format!("let s = '{}';", escape(serial)),
        "Telemetry".to_string(),
        "| where comms_serial contains s".to_string(),
        format!("| where name contains '{channel}'"),
        "| top 1 by localtime desc".to_string(),
        "| project localtime, value_double".to_string(),
    ]
    .join("\n")
}

/// Most recent alarm state. Alarms live in a separate table and expose a
/// plain `value` column instead of `value_double`.
pub fn latest_alarm(serial: &str, channel: &str) -> String {
    [
        format!("let s = '{}';", escape(serial)),
        "Alarms".to_string(),
        "| where comms_serial contains s".to_string(),
        format!("| where name has '{channel}'"),
        "| top 1 by localtime desc".to_string(),
        "| project localtime, value".to_string(),
    ]
    .join("\n")
}

/// Device registration lookup used by the serial existence check.
pub fn device_info(serial: &str) -> String {
    format!(
        "DevInfo | where comms_serial contains '{}' | limit 1",
        escape(serial)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> TimeRange {
        TimeRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 2)
                .unwrap()
                .and_hms_opt(12, 30, 45)
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_escape_doubles_quotes() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("O'Brien"), "O''Brien");
        assert_eq!(escape("' or 1==1 --"), "'' or 1==1 --");
    }

    #[test]
    fn test_format_datetime() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 7)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(format_datetime(dt), "2025-01-07 09:05:03.0000");
    }

    #[test]
    fn test_history_query_shape() {
        let kql = history("SN123", "/SCC/WIFI/STAT/SIGNAL_STRENGTH", &range());
        assert!(kql.starts_with("let s = 'SN123';"));
        assert!(kql.contains("let start = datetime(2025-03-01 00:00:00.0000);"));
        assert!(kql.contains("let finish = datetime(2025-03-02 12:30:45.0000);"));
        assert!(kql.contains("| where comms_serial contains s"));
        assert!(kql.contains("| where name contains '/SCC/WIFI/STAT/SIGNAL_STRENGTH'"));
        assert!(kql.contains("| where localtime between (start .. finish)"));
        assert!(kql.contains("| where isnotnull(value_double)"));
        assert!(kql.ends_with("| project localtime, value_double\n| order by localtime asc"));
    }

    #[test]
    fn test_history_query_escapes_serial() {
        let kql = history("SN'1", "/INV/DCPORT/STAT/PV1/V", &range());
        assert!(kql.starts_with("let s = 'SN''1';"));
    }

    #[test]
    fn test_history_query_extra_filter() {
        let r = range();
        let kql = HistoryQuery::new("SN123", "/INV/ACPORT/STAT/GRID/P", &r)
            .with_filter("value_double != 0")
            .build();
        let filter_pos = kql.find("| where value_double != 0").expect("filter present");
        let project_pos = kql.find("| project").expect("project present");
        assert!(filter_pos < project_pos);
    }

    #[test]
    fn test_alarm_history_query() {
        let kql = alarm_history("SN123", "/BMS/CLUSTER/EVENT/ALARM/MAIN_RELAY_ERROR", &range());
        assert!(kql.contains("Alarms"));
        assert!(kql.contains("| where name has '/BMS/CLUSTER/EVENT/ALARM/MAIN_RELAY_ERROR'"));
        assert!(kql.contains("| where localtime between (start .. finish)"));
        assert!(kql.contains("| project localtime, value\n| order by localtime asc"));
        assert!(!kql.contains("value_double"));
    }

    #[test]
    fn test_latest_query() {
        let kql = latest("SN123", "INV/DEV/STAT/OPERATING_STATE");
        assert!(kql.contains("| top 1 by localtime desc"));
        assert!(kql.contains("| project localtime, value_double"));
        assert!(!kql.contains("between"));
    }

    #[test]
    fn test_latest_alarm_query() {
        let kql = latest_alarm("SN123", "/BMS/CLUSTER/EVENT/ALARM/MAIN_RELAY_ERROR");
        assert!(kql.contains("Alarms"));
        assert!(kql.contains("| where name has '/BMS/CLUSTER/EVENT/ALARM/MAIN_RELAY_ERROR'"));
        assert!(kql.ends_with("| project localtime, value"));
    }

    #[test]
    fn test_device_info_query() {
        assert_eq!(
            device_info("AB'12"),
            "DevInfo | where comms_serial contains 'AB''12' | limit 1"
        );
    }
}
