//! Trading session utilities.
//!
//! Provides the time-of-day admission window in the exchange timezone.
//! Used for:
//! - Rejecting webhook signals outside market hours
//! - Deriving the trading date for duplicate-signal fingerprints
//! - Day-of-month for the futures roll rule

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{CoreError, Result};

/// Outcome of checking a timestamp against the trading window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowCheck {
    /// Whether the timestamp falls inside the window.
    pub allowed: bool,
    /// Local time at the check, `HH:MM:SS`.
    pub current_time: String,
    /// Configured window, `HH:MM-HH:MM`.
    pub allowed_window: String,
}

/// Daily admission window, both ends inclusive at minute resolution.
///
/// With `09:30-15:00`, 09:29:59 is rejected, 09:30:00 and 15:00:59 are
/// accepted, 15:01:00 is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
}

impl TradingWindow {
    /// Create a window from already-parsed parts.
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open > close {
            return Err(CoreError::InvalidConfig(format!(
                "trading window opens after it closes ({open} > {close})"
            )));
        }
        Ok(Self {
            timezone,
            open,
            close,
        })
    }

    /// Parse a window from an IANA timezone name and `HH:MM` bounds.
    pub fn parse(timezone: &str, open: &str, close: &str) -> Result<Self> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| CoreError::UnknownTimezone(timezone.to_string()))?;
        let open = parse_hhmm(open)?;
        let close = parse_hhmm(close)?;
        Self::new(tz, open, close)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Local wall-clock time in the trading timezone.
    pub fn local(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        now.with_timezone(&self.timezone)
    }

    /// Calendar date in the trading timezone.
    pub fn trading_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local(now).date_naive()
    }

    /// Day of month (1-31) in the trading timezone.
    pub fn day_of_month(&self, now: DateTime<Utc>) -> u32 {
        self.local(now).day()
    }

    /// Check if a given UTC datetime is within the window.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = self.local(now);
        // Minute resolution: drop seconds so the close minute is inclusive.
        let minute = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0);
        match minute {
            Some(t) => t >= self.open && t <= self.close,
            None => false,
        }
    }

    /// Check a timestamp and describe the result for the response body.
    #[must_use]
    pub fn check_at(&self, now: DateTime<Utc>) -> WindowCheck {
        WindowCheck {
            allowed: self.contains(now),
            current_time: self.local(now).format("%H:%M:%S").to_string(),
            allowed_window: self.describe(),
        }
    }

    /// `HH:MM-HH:MM` representation.
    pub fn describe(&self) -> String {
        format!("{}-{}", self.open.format("%H:%M"), self.close.format("%H:%M"))
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| CoreError::InvalidTime(format!("{s}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> TradingWindow {
        TradingWindow::parse("Asia/Kolkata", "09:30", "15:00").unwrap()
    }

    /// Build a UTC instant from an IST wall-clock time.
    fn ist(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_open_boundary() {
        let w = window();
        assert!(!w.contains(ist(2026, 3, 10, 9, 29, 0)));
        assert!(!w.contains(ist(2026, 3, 10, 9, 29, 59)));
        assert!(w.contains(ist(2026, 3, 10, 9, 30, 0)));
    }

    #[test]
    fn test_close_boundary() {
        let w = window();
        assert!(w.contains(ist(2026, 3, 10, 15, 0, 0)));
        assert!(w.contains(ist(2026, 3, 10, 15, 0, 59)));
        assert!(!w.contains(ist(2026, 3, 10, 15, 1, 0)));
    }

    #[test]
    fn test_midday_and_night() {
        let w = window();
        assert!(w.contains(ist(2026, 3, 10, 12, 0, 0)));
        assert!(!w.contains(ist(2026, 3, 10, 23, 0, 0)));
        assert!(!w.contains(ist(2026, 3, 10, 3, 0, 0)));
    }

    #[test]
    fn test_check_at_describes_times() {
        let w = window();
        let check = w.check_at(ist(2026, 3, 10, 9, 29, 5));
        assert!(!check.allowed);
        assert_eq!(check.current_time, "09:29:05");
        assert_eq!(check.allowed_window, "09:30-15:00");
    }

    #[test]
    fn test_trading_date_uses_local_timezone() {
        let w = window();
        // 2026-03-10 20:00 UTC is 2026-03-11 01:30 IST
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap();
        assert_eq!(w.trading_date(now), NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert_eq!(w.day_of_month(now), 11);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(TradingWindow::parse("Mars/Olympus", "09:30", "15:00").is_err());
        assert!(TradingWindow::parse("Asia/Kolkata", "9h30", "15:00").is_err());
        assert!(TradingWindow::parse("Asia/Kolkata", "15:00", "09:30").is_err());
    }
}
