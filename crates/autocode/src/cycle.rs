use core::fmt;

use chrono::{Datelike, NaiveDateTime};

/// Periodic reset policy for a sequence segment.
///
/// Each cycle partitions a sequence into calendar windows. Every window maps
/// to its own cycle key, and therefore to its own counter, so a `monthly`
/// sequence restarts at its `start` value on the first code of each month.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Cycle {
    /// A single counter that never resets.
    #[default]
    None,
    /// Calendar day, e.g. `2024-05-01`.
    Daily,
    /// ISO-8601 week, e.g. `2024-W18`.
    Weekly,
    /// Calendar month, e.g. `2024-05`.
    Monthly,
    /// Calendar year, e.g. `2024`.
    Yearly,
}

impl Cycle {
    /// Parses a cycle policy name.
    ///
    /// Unrecognized names resolve to [`Cycle::None`] so a misspelled policy
    /// degrades to a non-resetting sequence instead of failing generation.
    ///
    /// ```
    /// use autocode::Cycle;
    ///
    /// assert_eq!(Cycle::from_policy("monthly"), Cycle::Monthly);
    /// assert_eq!(Cycle::from_policy("fortnightly"), Cycle::None);
    /// ```
    pub fn from_policy(policy: &str) -> Self {
        match policy {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "yearly" => Self::Yearly,
            _ => Self::None,
        }
    }

    /// The policy name as it appears in pattern options.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Maps `now` to the key of the cycle window it falls in.
    ///
    /// Two instants resolve to the same key exactly when they share a window.
    /// Weekly keys use the ISO week-numbering year, so the last days of
    /// December can belong to week 1 of the following year.
    ///
    /// ```
    /// use autocode::Cycle;
    /// use chrono::NaiveDate;
    ///
    /// let now = NaiveDate::from_ymd_opt(2024, 12, 30)
    ///     .and_then(|d| d.and_hms_opt(9, 0, 0))
    ///     .unwrap();
    ///
    /// assert_eq!(Cycle::None.resolve(now), "");
    /// assert_eq!(Cycle::Daily.resolve(now), "2024-12-30");
    /// assert_eq!(Cycle::Weekly.resolve(now), "2025-W01");
    /// assert_eq!(Cycle::Monthly.resolve(now), "2024-12");
    /// assert_eq!(Cycle::Yearly.resolve(now), "2024");
    /// ```
    pub fn resolve(self, now: NaiveDateTime) -> String {
        match self {
            Self::None => String::new(),
            Self::Daily => format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day()),
            Self::Weekly => {
                let week = now.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
            Self::Monthly => format!("{:04}-{:02}", now.year(), now.month()),
            Self::Yearly => format!("{:04}", now.year()),
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a cycle policy name and an instant to a cycle key.
///
/// Shorthand for `Cycle::from_policy(policy).resolve(now)`.
pub fn resolve(policy: &str, now: NaiveDateTime) -> String {
    Cycle::from_policy(policy).resolve(now)
}
