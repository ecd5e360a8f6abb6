use chrono::{Local, NaiveDateTime};

/// A trait for time sources that return the current wall-clock instant.
///
/// Autocode dates and cycle windows are calendar concepts, so the instant is
/// a naive local date-time rather than a monotonic tick. Plug in a fixed
/// clock in tests to make rendered codes deterministic.
///
/// # Example
///
/// ```
/// use autocode::TimeSource;
/// use chrono::{NaiveDate, NaiveDateTime};
///
/// struct Noon;
/// impl TimeSource for Noon {
///     fn now(&self) -> NaiveDateTime {
///         NaiveDate::from_ymd_opt(2024, 3, 15)
///             .and_then(|d| d.and_hms_opt(12, 0, 0))
///             .unwrap()
///     }
/// }
///
/// assert_eq!(Noon.now().to_string(), "2024-03-15 12:00:00");
/// ```
pub trait TimeSource {
    /// Returns the current instant.
    fn now(&self) -> NaiveDateTime;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Reads the host's local wall clock on every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a single instant.
///
/// Useful for replaying a batch of writes "as of" a given date, and for
/// tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl TimeSource for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
