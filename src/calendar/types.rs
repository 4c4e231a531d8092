use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

/// Who is calling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    /// Caller phone number (E.164)
    pub phone: String,

    /// Display name, if known
    pub name: Option<String>,

    /// Provider calendar to operate on
    pub calendar_id: Option<String>,
}

impl CallerInfo {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            ..Self::default()
        }
    }
}

/// A point in time with its provider time zone name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: DateTime<FixedOffset>,
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn new(date_time: DateTime<FixedOffset>) -> Self {
        Self {
            date_time,
            time_zone: None,
        }
    }
}

/// Provider appointment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
}

impl Appointment {
    pub fn duration(&self) -> Duration {
        self.end.date_time - self.start.date_time
    }

    /// Start and end moved to `new_start`, keeping the duration and time zone
    pub fn shifted_to(&self, new_start: DateTime<FixedOffset>) -> (EventTime, EventTime) {
        let start = EventTime {
            date_time: new_start,
            time_zone: self.start.time_zone.clone(),
        };
        let end = EventTime {
            date_time: new_start + self.duration(),
            time_zone: self.end.time_zone.clone(),
        };
        (start, end)
    }

    /// Spoken form, e.g. "Dental on Tuesday, October 20 at 10:00 AM"
    pub fn describe(&self) -> String {
        format!(
            "{} on {}",
            self.summary,
            self.start.date_time.format("%A, %B %-d at %-I:%M %p")
        )
    }
}

/// A new appointment before the provider assigns an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
}
