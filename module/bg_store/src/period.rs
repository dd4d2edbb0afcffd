//! Period window computation.
//!
//! For `daily`/`monthly` the window is derived from the wall clock; for
//! `custom` the stored `start_date`/`end_date` define it, and a missing
//! endpoint fails closed rather than defaulting to "unbounded".

use bg_types::{ BgError, Period };
use chrono::{ DateTime, Datelike, Duration, TimeZone, Utc };

/// Inclusive-start, exclusive-end window, in ms epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window
{
  pub start: i64,
  pub end: i64,
}

/// Compute the window for `period` anchored at `now`. `custom` requires
/// both bounds to already be known, so this function never looks them
/// up - callers pass `Period::Custom` only after resolving the stored
/// row's dates through `custom_window`.
#[must_use]
pub fn window_for(period: Period, now: DateTime<Utc>) -> Option<Window>
{
  match period
  {
    Period::Daily =>
    {
      let start = Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0).single()?;
      Some(Window { start: start.timestamp_millis(), end: (start + Duration::days(1)).timestamp_millis() })
    }
    Period::Monthly =>
    {
      let start = Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0).single()?;
      let next_month_start = if now.month() == 12
      {
        Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0).single()?
      }
      else
      {
        Utc.with_ymd_and_hms(now.year(), now.month() + 1, 1, 0, 0, 0).single()?
      };
      Some(Window { start: start.timestamp_millis(), end: next_month_start.timestamp_millis() })
    }
    Period::Custom => None,
  }
}

/// Resolve a custom window from stored bounds, failing closed when
/// either endpoint is missing.
///
/// # Errors
///
/// Returns `BgError::Validation` if `start_date` or `end_date` is absent.
pub fn custom_window(start_date: Option<i64>, end_date: Option<i64>) -> Result<Window, BgError>
{
  match (start_date, end_date)
  {
    (Some(start), Some(end)) => Ok(Window { start, end }),
    _ => Err(BgError::Validation("custom period requires both startDate and endDate".to_string())),
  }
}
