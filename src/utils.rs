use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Serializer;
use slug::slugify;

/// Stored timestamps are naive UTC; render them as `2024-01-31T10:00:00.000Z`.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = Utc
        .from_utc_datetime(date)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn slug_for(title: &str) -> String {
    slugify(title)
}

/// `Some` only for values that carry something besides whitespace.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
