use chrono::NaiveTime;

/// Weekday tokens accepted on the wire. Stored lowercase, Monday..Friday only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub const ALL: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "monday" => Some(Self::Monday),
            "tuesday" => Some(Self::Tuesday),
            "wednesday" => Some(Self::Wednesday),
            "thursday" => Some(Self::Thursday),
            "friday" => Some(Self::Friday),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
        }
    }
}

/// A period row is either a teaching slot or a break. Breaks occupy grid rows
/// but can never carry a schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Class,
    Break,
}

impl PeriodKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "class" => Some(Self::Class),
            "break" => Some(Self::Break),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Break => "break",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Period {
    pub id: String,
    pub school_id: String,
    pub label: String,
    pub start_time: String,
    pub end_time: String,
    pub kind: PeriodKind,
    pub order_index: i64,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub id: String,
    pub school_id: String,
    pub academic_year_id: String,
    pub academic_term_id: String,
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    /// Lowercase weekday token, see [`Day`].
    pub day: String,
    pub period_id: String,
    pub room: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRangeError {
    MalformedStart,
    MalformedEnd,
    /// Start is not strictly earlier than end.
    EmptyRange,
}

/// Validates a period's display range. Times are `HH:MM` wall-clock strings.
pub fn validate_time_range(start: &str, end: &str) -> Result<(), TimeRangeError> {
    let start = NaiveTime::parse_from_str(start.trim(), "%H:%M")
        .map_err(|_| TimeRangeError::MalformedStart)?;
    let end = NaiveTime::parse_from_str(end.trim(), "%H:%M")
        .map_err(|_| TimeRangeError::MalformedEnd)?;
    if start >= end {
        return Err(TimeRangeError::EmptyRange);
    }
    Ok(())
}
