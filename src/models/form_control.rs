use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// The registration window lives in a single row.
pub const SINGLETON_ID: i64 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, PartialEq)]
pub struct FormControl {
    pub buka: Option<DateTime<Utc>>,
    pub tutup: Option<DateTime<Utc>>,
}

impl FormControl {
    /// A missing bound leaves that side of the window unbounded.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.buka.is_none_or(|buka| buka <= now) && self.tutup.is_none_or(|tutup| now <= tutup)
    }

    pub fn opened_for(now: DateTime<Utc>, duration: QuickDuration) -> Self {
        Self {
            buka: Some(now),
            tutup: Some(now + duration.as_duration()),
        }
    }

    pub fn closed_at(now: DateTime<Utc>) -> Self {
        Self {
            buka: None,
            tutup: Some(now),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuickDuration {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl QuickDuration {
    pub fn as_duration(self) -> Duration {
        match self {
            QuickDuration::Day => Duration::hours(24),
            QuickDuration::Week => Duration::days(7),
            QuickDuration::Month => Duration::days(30),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuickOpenPayload {
    pub duration: QuickDuration,
}

#[derive(Debug, Deserialize)]
pub struct FormWindowPayload {
    pub buka: Option<DateTime<Utc>>,
    pub tutup: Option<DateTime<Utc>>,
}

impl FormWindowPayload {
    /// Either bound may be left empty.
    pub fn into_window(self) -> Result<FormControl, AppError> {
        match (self.buka, self.tutup) {
            (Some(buka), Some(tutup)) if buka > tutup => Err(AppError::validation(
                "Tanggal buka tidak boleh setelah tanggal tutup",
            )),
            (buka, tutup) => Ok(FormControl { buka, tutup }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FormStatus {
    pub buka: Option<DateTime<Utc>>,
    pub tutup: Option<DateTime<Utc>>,
    pub is_open: bool,
}

impl FormStatus {
    /// No stored window at all reads as closed.
    pub fn at(window: Option<FormControl>, now: DateTime<Utc>) -> Self {
        let is_open = window.as_ref().is_some_and(|w| w.is_open(now));
        let window = window.unwrap_or_default();
        Self {
            buka: window.buka,
            tutup: window.tutup,
            is_open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn open_between_both_bounds() {
        let window = FormControl {
            buka: Some(at(1)),
            tutup: Some(at(10)),
        };
        assert!(window.is_open(at(1)));
        assert!(window.is_open(at(5)));
        assert!(window.is_open(at(10)));
        assert!(!window.is_open(at(11)));
    }

    #[test]
    fn missing_bounds_are_unbounded() {
        assert!(FormControl::default().is_open(at(5)));

        let no_end = FormControl {
            buka: Some(at(3)),
            tutup: None,
        };
        assert!(!no_end.is_open(at(2)));
        assert!(no_end.is_open(at(3)));
        assert!(no_end.is_open(at(30)));

        let no_start = FormControl {
            buka: None,
            tutup: Some(at(10)),
        };
        assert!(no_start.is_open(at(1)));
        assert!(!no_start.is_open(at(11)));
    }

    #[test]
    fn closing_shuts_the_window_from_now_on() {
        let closed = FormControl::closed_at(at(5));
        assert!(!closed.is_open(at(5) + Duration::seconds(1)));
        assert!(!closed.is_open(at(20)));
    }

    #[test]
    fn status_without_stored_window_is_closed() {
        let status = FormStatus::at(None, at(5));
        assert!(!status.is_open);
        assert_eq!(status.buka, None);

        let status = FormStatus::at(Some(FormControl::default()), at(5));
        assert!(status.is_open);
    }

    #[test]
    fn quick_open_durations() {
        let week = FormControl::opened_for(at(1), QuickDuration::Week);
        assert_eq!(week.tutup, Some(at(8)));
        assert!(week.is_open(at(3)));

        let parsed: QuickOpenPayload = serde_json::from_str(r#"{"duration":"24h"}"#).unwrap();
        assert_eq!(parsed.duration, QuickDuration::Day);
        assert!(serde_json::from_str::<QuickOpenPayload>(r#"{"duration":"1y"}"#).is_err());
    }

    #[test]
    fn window_bounds_must_be_ordered() {
        let bad = FormWindowPayload {
            buka: Some(at(10)),
            tutup: Some(at(1)),
        };
        assert!(bad.into_window().is_err());

        let open_ended = FormWindowPayload {
            buka: Some(at(1)),
            tutup: None,
        }
        .into_window()
        .unwrap();
        assert_eq!(open_ended.tutup, None);
        assert!(open_ended.is_open(at(20)));

        let unbounded = FormWindowPayload {
            buka: None,
            tutup: None,
        };
        assert_eq!(unbounded.into_window().unwrap(), FormControl::default());
    }
}
