//! Maps a requested time span onto the bucket width used when downsampling.

use std::fmt;

/// Bucket width a series is resampled to, chosen from the number of days requested.
///
/// Short spans keep the service's native 15 minute resolution; longer spans are
/// thinned out so that a chart always shows a comparable number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFrequency {
    FifteenMinutes,
    OneHour,
    TwoHours,
    SixHours,
}

impl TargetFrequency {
    /// Picks the bucket width for a request spanning `days` days.
    ///
    /// # Examples
    ///
    /// ```
    /// use urbanobs::TargetFrequency;
    ///
    /// assert_eq!(TargetFrequency::for_days(1), TargetFrequency::FifteenMinutes);
    /// assert_eq!(TargetFrequency::for_days(3), TargetFrequency::OneHour);
    /// assert_eq!(TargetFrequency::for_days(7), TargetFrequency::TwoHours);
    /// assert_eq!(TargetFrequency::for_days(28), TargetFrequency::SixHours);
    /// ```
    pub fn for_days(days: u32) -> Self {
        match days {
            1 => TargetFrequency::FifteenMinutes,
            3 => TargetFrequency::OneHour,
            7 => TargetFrequency::TwoHours,
            _ => TargetFrequency::SixHours,
        }
    }

    /// Duration string understood by Polars temporal expressions.
    pub(crate) fn polars_every(&self) -> &'static str {
        match self {
            TargetFrequency::FifteenMinutes => "15m",
            TargetFrequency::OneHour => "1h",
            TargetFrequency::TwoHours => "2h",
            TargetFrequency::SixHours => "6h",
        }
    }
}

impl fmt::Display for TargetFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TargetFrequency::FifteenMinutes => "15min",
            TargetFrequency::OneHour => "1H",
            TargetFrequency::TwoHours => "2H",
            TargetFrequency::SixHours => "6H",
        };
        write!(f, "{label}")
    }
}
