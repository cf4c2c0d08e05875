use crate::config::ClientConfig;
use crate::sensor_data::error::FetchError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Layout of `starttime` / `endtime` in the aggregation query.
const QUERY_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// A request for the last `days` days of one sensor variable.
///
/// `(variable, days)` is also the identity of a [`crate::Dataset`] and the key of
/// its on-disk snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    variable: String,
    days: u32,
}

impl FetchRequest {
    /// Creates a request, rejecting a zero-day span.
    pub fn new(variable: impl Into<String>, days: u32) -> Result<Self, FetchError> {
        if days == 0 {
            return Err(FetchError::InvalidDays(days));
        }
        Ok(Self {
            variable: variable.into(),
            days,
        })
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    /// Query parameters for the aggregation endpoint, for a window ending at `now`.
    pub fn query_params(&self, now: DateTime<Utc>, config: &ClientConfig) -> Vec<(&'static str, String)> {
        let start = now - Duration::days(i64::from(self.days));
        vec![
            ("data_variable", self.variable.clone()),
            ("agg_method", config.agg_method().to_string()),
            ("agg_period", config.agg_period().to_string()),
            ("starttime", start.format(QUERY_TIME_FORMAT).to_string()),
            ("endtime", now.format(QUERY_TIME_FORMAT).to_string()),
            ("sensor_type", self.variable.clone()),
        ]
    }

    /// File name of the snapshot for this key. Path separators in the variable
    /// name are percent-encoded (as is `%` itself), so the snapshot always lands
    /// inside the cache folder and distinct variables never share a file.
    pub(crate) fn snapshot_file_name(&self) -> String {
        let mut variable = String::with_capacity(self.variable.len());
        for c in self.variable.chars() {
            match c {
                '%' => variable.push_str("%25"),
                '/' => variable.push_str("%2F"),
                '\\' => variable.push_str("%5C"),
                other => variable.push(other),
            }
        }
        format!("{}_{}_days.csv", variable, self.days)
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} days)", self.variable, self.days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_zero_days_rejected() {
        assert!(matches!(
            FetchRequest::new("PM2.5", 0),
            Err(FetchError::InvalidDays(0))
        ));
    }

    #[test]
    fn test_query_params() -> Result<(), FetchError> {
        let request = FetchRequest::new("NO2", 7)?;
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 12, 30, 5).unwrap();
        let params = request.query_params(now, &ClientConfig::default());

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("data_variable"), Some("NO2"));
        assert_eq!(get("sensor_type"), Some("NO2"));
        assert_eq!(get("agg_method"), Some("median"));
        assert_eq!(get("agg_period"), Some("15mins"));
        assert_eq!(get("starttime"), Some("20240301123005"));
        assert_eq!(get("endtime"), Some("20240308123005"));
        Ok(())
    }

    #[test]
    fn test_snapshot_file_name() -> Result<(), FetchError> {
        assert_eq!(
            FetchRequest::new("PM2.5", 1)?.snapshot_file_name(),
            "PM2.5_1_days.csv"
        );
        assert_eq!(
            FetchRequest::new("a/b", 3)?.snapshot_file_name(),
            "a%2Fb_3_days.csv"
        );
        assert_eq!(
            FetchRequest::new("a\\b", 3)?.snapshot_file_name(),
            "a%5Cb_3_days.csv"
        );
        Ok(())
    }

    #[test]
    fn test_snapshot_file_names_do_not_collide() -> Result<(), FetchError> {
        let names: Vec<String> = ["a/b", "a_b", "a%2Fb", "a\\b"]
            .into_iter()
            .map(|v| FetchRequest::new(v, 3).map(|r| r.snapshot_file_name()))
            .collect::<Result<_, _>>()?;
        for (i, name) in names.iter().enumerate() {
            assert!(!name.contains('/') && !name.contains('\\'));
            assert!(!names[i + 1..].contains(name), "duplicate {name}");
        }
        Ok(())
    }
}
