use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FORM_DATE_FORMAT: &str = "%d-%m-%Y";
pub const FORM_TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub id: i64,
    pub name: String,
    #[serde(with = "wire_time")]
    pub start_time: NaiveDateTime,
    #[serde(default, with = "wire_time::option")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(rename = "where")]
    pub location: Option<String>,
    pub with_who: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub subevents: Vec<Subevent>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subevent {
    pub id: i64,
    #[serde(default)]
    pub event_id: Option<i64>,
    pub name: String,
    #[serde(with = "wire_time")]
    pub start_time: NaiveDateTime,
    #[serde(default, with = "wire_time::option")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(rename = "where")]
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Create/update body for events and subevents. Dates travel as DD-MM-YYYY
/// and times as HH:MM, exactly as the entry forms submit them; the backend
/// fills in midnight / end-of-day when a time is omitted.
#[derive(Debug, Serialize, Clone, Default)]
pub struct EventPayload {
    pub name: String,
    pub start_date: String,
    pub start_time: Option<String>,
    pub end_date: String,
    pub end_time: Option<String>,
    #[serde(rename = "where")]
    pub location: Option<String>,
    pub with_who: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonthGrid {
    pub prev_days: Vec<u32>,
    pub current_days: Vec<u32>,
    pub next_days: Vec<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonthData {
    pub calendar_data: MonthGrid,
    pub month_label: String,
    #[serde(default)]
    pub mood_colors: HashMap<u32, String>,
    #[serde(default)]
    pub days_with_events: Vec<u32>,
    #[serde(default)]
    pub days_with_marker: Vec<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YearMonth {
    pub month: u32,
    pub calendar_data: MonthGrid,
    #[serde(default)]
    pub mood_colors: HashMap<u32, String>,
    #[serde(default)]
    pub days_with_events: Vec<u32>,
    #[serde(default)]
    pub days_with_marker: Vec<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YearData {
    pub year: i32,
    pub months: Vec<YearMonth>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub year: i32,
    pub month: u32,
}

impl ViewState {
    pub fn of(date: NaiveDate) -> Self {
        ViewState {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next_month(&mut self) {
        self.month += 1;
        if self.month > 12 {
            self.month = 1;
            self.year += 1;
        }
    }

    pub fn prev_month(&mut self) {
        if self.month <= 1 {
            self.month = 12;
            self.year -= 1;
        } else {
            self.month -= 1;
        }
    }

    pub fn next_year(&mut self) {
        self.year += 1;
    }

    pub fn prev_year(&mut self) {
        self.year -= 1;
    }

    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", self.year, self.month))
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    pub fn days_in_month(&self) -> u32 {
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(28)
    }
}

/// How an event occupies one displayed day in the diary view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaySpan {
    AllDay,
    Timed { start: NaiveTime, end: Option<NaiveTime> },
    /// First day of a multi-day event: start time through end of day.
    From(NaiveTime),
    /// Last day of a multi-day event: start of day through end time.
    Until(NaiveTime),
    /// A middle day; no time shown.
    Whole,
}

impl DaySpan {
    pub fn display(&self) -> String {
        match self {
            DaySpan::AllDay => "all day".to_string(),
            DaySpan::Timed { start, end } => match end {
                Some(end) => format!("{} -- {}", start.format("%H:%M"), end.format("%H:%M")),
                None => start.format("%H:%M").to_string(),
            },
            DaySpan::From(start) => format!("{} -- 23:59", start.format("%H:%M")),
            DaySpan::Until(end) => format!("00:00 -- {}", end.format("%H:%M")),
            DaySpan::Whole => String::new(),
        }
    }
}

fn is_midnight(t: NaiveTime) -> bool {
    t.hour() == 0 && t.minute() == 0
}

fn is_end_of_day(t: NaiveTime) -> bool {
    t.hour() == 23 && t.minute() == 59
}

impl Event {
    /// An event is all-day when it starts at midnight and ends at either
    /// 23:59 or midnight; stored data uses both end sentinels depending on
    /// which backend revision wrote it.
    pub fn is_all_day(&self) -> bool {
        let Some(end) = self.end_time else {
            return false;
        };
        is_midnight(self.start_time.time())
            && (is_end_of_day(end.time()) || is_midnight(end.time()))
    }

    pub fn start_day(&self) -> NaiveDate {
        self.start_time.date()
    }

    pub fn end_day(&self) -> NaiveDate {
        self.end_time
            .map(|e| e.date())
            .unwrap_or_else(|| self.start_time.date())
    }

    /// The event-card time line: all-day events show only the date range,
    /// timed events show "{date}, {start} -- {end}" with the end date added
    /// when it differs from the start date.
    pub fn display_time(&self) -> String {
        let start_date = format_card_date(self.start_time.date());
        let end_date = self
            .end_time
            .map(|e| format_card_date(e.date()))
            .unwrap_or_else(|| start_date.clone());

        if self.is_all_day() {
            return if end_date == start_date {
                start_date
            } else {
                format!("{} -- {}", start_date, end_date)
            };
        }

        let start = self.start_time.format("%H:%M").to_string();
        match self.end_time {
            None => format!("{}, {}", start_date, start),
            Some(end) => {
                let end = end.format("%H:%M").to_string();
                if start_date == end_date {
                    format!("{}, {} -- {}", start_date, start, end)
                } else {
                    format!("{}, {} -- {}, {}", start_date, start, end_date, end)
                }
            }
        }
    }

    /// Splits a multi-day event for the diary view: which portion of it
    /// falls on `date`, or None when the event does not touch that day.
    pub fn span_for_day(&self, date: NaiveDate) -> Option<DaySpan> {
        let start_day = self.start_day();
        let end_day = self.end_day();
        if date < start_day || date > end_day {
            return None;
        }
        if self.is_all_day() {
            return Some(DaySpan::AllDay);
        }
        if start_day == end_day {
            return Some(DaySpan::Timed {
                start: self.start_time.time(),
                end: self.end_time.map(|e| e.time()),
            });
        }
        if date == start_day {
            return Some(DaySpan::From(self.start_time.time()));
        }
        if let Some(end) = self.end_time {
            if date == end.date() {
                return Some(DaySpan::Until(end.time()));
            }
        }
        Some(DaySpan::Whole)
    }
}

impl Subevent {
    /// Subevents render time-only; the parent card already carries the date.
    pub fn display_time(&self) -> String {
        let start = self.start_time.format("%H:%M").to_string();
        match self.end_time {
            Some(end) => format!("{} - {}", start, end.format("%H:%M")),
            None => start,
        }
    }
}

fn format_card_date(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

pub fn format_form_date(date: NaiveDate) -> String {
    date.format(FORM_DATE_FORMAT).to_string()
}

pub fn parse_form_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), FORM_DATE_FORMAT).ok()
}

pub fn parse_form_time(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), FORM_TIME_FORMAT).ok()
}

#[derive(Debug, Clone, Copy)]
pub struct Mood {
    pub name: &'static str,
    pub color: &'static str,
}

/// The swatch palette offered by the mood picker. The backend stores the
/// color string verbatim; clearing a day sends null instead.
pub const MOODS: [Mood; 8] = [
    Mood { name: "radiant", color: "#f9c74f" },
    Mood { name: "good", color: "#90be6d" },
    Mood { name: "calm", color: "#43aa8b" },
    Mood { name: "focused", color: "#4d908e" },
    Mood { name: "tired", color: "#9d8189" },
    Mood { name: "anxious", color: "#f8961e" },
    Mood { name: "low", color: "#577590" },
    Mood { name: "rough", color: "#f94144" },
];

/// Stored mood colors arrive as either "#rrggbb" or "rgb(r, g, b)" strings;
/// both forms are accepted.
pub fn parse_color(input: &str) -> Option<(u8, u8, u8)> {
    let input = input.trim();
    if let Some(hex) = input.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some((r, g, b));
    }
    let body = input.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut parts = body.split(',').map(|p| p.trim().parse::<u8>());
    let r = parts.next()?.ok()?;
    let g = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((r, g, b))
}

pub(crate) mod wire_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M";

    pub fn serialize<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(dt: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_str(&dt.format(super::FORMAT).to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(raw) => NaiveDateTime::parse_from_str(&raw, super::FORMAT)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn event(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Event {
        Event {
            id: 1,
            name: "test".into(),
            start_time: start,
            end_time: end,
            location: None,
            with_who: None,
            notes: None,
            subevents: Vec::new(),
        }
    }

    #[test]
    fn view_state_rolls_over_at_year_boundaries() {
        let mut state = ViewState { year: 2024, month: 12 };
        state.next_month();
        assert_eq!(state, ViewState { year: 2025, month: 1 });
        state.prev_month();
        assert_eq!(state, ViewState { year: 2024, month: 12 });

        let mut state = ViewState { year: 2024, month: 6 };
        state.next_month();
        assert_eq!(state, ViewState { year: 2024, month: 7 });
        state.prev_year();
        assert_eq!(state, ViewState { year: 2023, month: 7 });
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(ViewState { year: 2024, month: 2 }.days_in_month(), 29);
        assert_eq!(ViewState { year: 2025, month: 2 }.days_in_month(), 28);
        assert_eq!(ViewState { year: 2025, month: 12 }.days_in_month(), 31);
    }

    #[test]
    fn all_day_accepts_both_end_sentinels() {
        let late = event(dt(2025, 3, 5, 0, 0), Some(dt(2025, 3, 5, 23, 59)));
        assert!(late.is_all_day());

        let midnight = event(dt(2025, 3, 5, 0, 0), Some(dt(2025, 3, 6, 0, 0)));
        assert!(midnight.is_all_day());

        let timed = event(dt(2025, 3, 5, 0, 0), Some(dt(2025, 3, 5, 14, 0)));
        assert!(!timed.is_all_day());

        let open_ended = event(dt(2025, 3, 5, 0, 0), None);
        assert!(!open_ended.is_all_day());
    }

    #[test]
    fn display_time_for_all_day_events() {
        let single = event(dt(2025, 3, 5, 0, 0), Some(dt(2025, 3, 5, 23, 59)));
        assert_eq!(single.display_time(), "Mar 5");

        let range = event(dt(2025, 3, 5, 0, 0), Some(dt(2025, 3, 7, 23, 59)));
        assert_eq!(range.display_time(), "Mar 5 -- Mar 7");
    }

    #[test]
    fn display_time_for_timed_events() {
        let same_day = event(dt(2025, 3, 5, 9, 30), Some(dt(2025, 3, 5, 11, 0)));
        assert_eq!(same_day.display_time(), "Mar 5, 09:30 -- 11:00");

        let cross_day = event(dt(2025, 3, 5, 9, 30), Some(dt(2025, 3, 7, 11, 0)));
        assert_eq!(cross_day.display_time(), "Mar 5, 09:30 -- Mar 7, 11:00");

        let open_ended = event(dt(2025, 3, 5, 9, 30), None);
        assert_eq!(open_ended.display_time(), "Mar 5, 09:30");
    }

    #[test]
    fn subevent_display_time_is_time_only() {
        let sub = Subevent {
            id: 7,
            event_id: Some(1),
            name: "warmup".into(),
            start_time: dt(2025, 3, 5, 9, 0),
            end_time: Some(dt(2025, 3, 5, 9, 30)),
            location: None,
            notes: None,
        };
        assert_eq!(sub.display_time(), "09:00 - 09:30");

        let no_end = Subevent { end_time: None, ..sub };
        assert_eq!(no_end.display_time(), "09:00");
    }

    #[test]
    fn span_for_day_splits_multi_day_events() {
        let ev = event(dt(2025, 3, 5, 9, 30), Some(dt(2025, 3, 8, 11, 0)));
        let day = |d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap();

        assert_eq!(ev.span_for_day(day(4)), None);
        assert_eq!(
            ev.span_for_day(day(5)),
            Some(DaySpan::From(NaiveTime::from_hms_opt(9, 30, 0).unwrap()))
        );
        assert_eq!(ev.span_for_day(day(6)), Some(DaySpan::Whole));
        assert_eq!(ev.span_for_day(day(7)), Some(DaySpan::Whole));
        assert_eq!(
            ev.span_for_day(day(8)),
            Some(DaySpan::Until(NaiveTime::from_hms_opt(11, 0, 0).unwrap()))
        );
        assert_eq!(ev.span_for_day(day(9)), None);
    }

    #[test]
    fn span_for_day_on_single_day_and_all_day_events() {
        let timed = event(dt(2025, 3, 5, 9, 30), Some(dt(2025, 3, 5, 11, 0)));
        let day = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(
            timed.span_for_day(day),
            Some(DaySpan::Timed {
                start: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                end: Some(NaiveTime::from_hms_opt(11, 0, 0).unwrap()),
            })
        );

        let all_day = event(dt(2025, 3, 5, 0, 0), Some(dt(2025, 3, 6, 23, 59)));
        assert_eq!(all_day.span_for_day(day), Some(DaySpan::AllDay));
    }

    #[test]
    fn day_span_display() {
        assert_eq!(DaySpan::AllDay.display(), "all day");
        assert_eq!(
            DaySpan::From(NaiveTime::from_hms_opt(9, 30, 0).unwrap()).display(),
            "09:30 -- 23:59"
        );
        assert_eq!(
            DaySpan::Until(NaiveTime::from_hms_opt(11, 0, 0).unwrap()).display(),
            "00:00 -- 11:00"
        );
        assert_eq!(DaySpan::Whole.display(), "");
    }

    #[test]
    fn parse_color_accepts_hex_and_rgb() {
        assert_eq!(parse_color("#f94144"), Some((0xf9, 0x41, 0x44)));
        assert_eq!(parse_color("rgb(249, 65, 68)"), Some((249, 65, 68)));
        assert_eq!(parse_color("rgb(1,2,3)"), Some((1, 2, 3)));
        assert_eq!(parse_color("#f941"), None);
        assert_eq!(parse_color("rgb(1,2)"), None);
        assert_eq!(parse_color("rgb(1,2,3,4)"), None);
        assert_eq!(parse_color("teal"), None);
    }

    #[test]
    fn form_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_form_date(date), "05-03-2025");
        assert_eq!(parse_form_date("05-03-2025"), Some(date));
        assert_eq!(parse_form_date("2025-03-05"), None);
        assert_eq!(parse_form_time("14:30"), NaiveTime::from_hms_opt(14, 30, 0));
        assert_eq!(parse_form_time("25:00"), None);
    }

    #[test]
    fn event_wire_round_trip() {
        let json = r#"{
            "id": 3,
            "name": "dinner",
            "start_time": "2025-03-05 19:00",
            "end_time": "2025-03-05 21:30",
            "where": "downtown",
            "with_who": "ana",
            "notes": null,
            "subevents": [
                {
                    "id": 9,
                    "event_id": 3,
                    "name": "dessert",
                    "start_time": "2025-03-05 21:00",
                    "end_time": null,
                    "where": null,
                    "notes": null
                }
            ]
        }"#;
        let ev: Event = serde_json::from_str(json).unwrap();
        assert_eq!(ev.id, 3);
        assert_eq!(ev.location.as_deref(), Some("downtown"));
        assert_eq!(ev.start_time, dt(2025, 3, 5, 19, 0));
        assert_eq!(ev.subevents.len(), 1);
        assert_eq!(ev.subevents[0].name, "dessert");
        assert!(ev.subevents[0].end_time.is_none());

        let back = serde_json::to_value(&ev).unwrap();
        assert_eq!(back["start_time"], "2025-03-05 19:00");
        assert_eq!(back["where"], "downtown");
    }

    #[test]
    fn month_data_parses_string_day_keys() {
        let json = r##"{
            "calendar_data": {"prev_days": [24, 25], "current_days": [1, 2, 3], "next_days": [1]},
            "month_label": "March 2025",
            "mood_colors": {"2": "#90be6d", "14": "rgb(67, 170, 139)"},
            "days_with_events": [2, 3],
            "days_with_marker": [3]
        }"##;
        let month: MonthData = serde_json::from_str(json).unwrap();
        assert_eq!(month.calendar_data.prev_days, vec![24, 25]);
        assert_eq!(month.mood_colors.get(&2).map(String::as_str), Some("#90be6d"));
        assert_eq!(month.days_with_events, vec![2, 3]);
    }

    #[test]
    fn event_payload_serializes_nulls() {
        let payload = EventPayload {
            name: "run".into(),
            start_date: "05-03-2025".into(),
            start_time: Some("07:00".into()),
            end_date: "05-03-2025".into(),
            end_time: None,
            location: None,
            with_who: None,
            notes: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["start_date"], "05-03-2025");
        assert!(value["end_time"].is_null());
        assert!(value.get("where").is_some());
    }
}
