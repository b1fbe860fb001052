use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Serde adapters for `YYYY-MM-DD` dates.
pub mod iso_date {
    /// For `Option<Date>` fields; `null` and empty strings read as `None`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::macros::format_description;
        use time::Date;

        pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(date) => match super::super::iso_date_text(*date) {
                    Some(text) => serializer.serialize_some(&text),
                    None => Err(serde::ser::Error::custom("date is out of range")),
                },
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) if !text.trim().is_empty() => {
                    Date::parse(text.trim(), format_description!("[year]-[month]-[day]"))
                        .map(Some)
                        .map_err(serde::de::Error::custom)
                }
                _ => Ok(None),
            }
        }
    }
}

/// Parse the date text of an incident.
///
/// Accepted forms, tried in order: `2025-01-15`, an RFC 3339 timestamp (its
/// calendar date in the written offset), `2025-01-15T10:30[:00]` without an
/// offset, `February 14, 2025`, and `Feb 14, 2025`. Month names are matched
/// case-insensitively. Anything else is `None`.
#[must_use]
pub fn parse_incident_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(OffsetDateTime::date))
        .or_else(|| {
            PrimitiveDateTime::parse(
                raw,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
            .ok()
            .map(PrimitiveDateTime::date)
        })
        .or_else(|| {
            PrimitiveDateTime::parse(
                raw,
                format_description!("[year]-[month]-[day]T[hour]:[minute]"),
            )
            .ok()
            .map(PrimitiveDateTime::date)
        })
        .or_else(|| {
            Date::parse(
                raw,
                format_description!(
                    "[month repr:long case_sensitive:false] [day padding:none], [year]"
                ),
            )
            .ok()
        })
        .or_else(|| {
            Date::parse(
                raw,
                format_description!(
                    "[month repr:short case_sensitive:false] [day padding:none], [year]"
                ),
            )
            .ok()
        })
}

/// Parse a date-range bound as submitted by a date input (`YYYY-MM-DD`).
#[must_use]
pub fn parse_filter_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// `YYYY-MM-DD`; `None` only for years that need more than four digits.
#[must_use]
pub fn iso_date_text(date: Date) -> Option<String> {
    date.format(format_description!("[year]-[month]-[day]")).ok()
}

/// `"February 2025"` style heading for a month group.
#[must_use]
pub fn month_label(date: Date) -> String {
    format!("{} {}", date.month(), date.year())
}

#[cfg(test)]
mod tests {
    use time::Month;

    use super::*;

    fn date(year: i32, month: Month, day: u8) -> Date {
        match Date::from_calendar_date(year, month, day) {
            Ok(date) => date,
            Err(err) => panic!("invalid fixture date: {err}"),
        }
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_incident_date("2025-01-15"), Some(date(2025, Month::January, 15)));
        assert_eq!(parse_incident_date(" 2024-12-31 "), Some(date(2024, Month::December, 31)));
    }

    #[test]
    fn parses_timestamps_using_their_written_date() {
        assert_eq!(
            parse_incident_date("2025-01-15T23:30:00.000-05:00"),
            Some(date(2025, Month::January, 15))
        );
        assert_eq!(
            parse_incident_date("2025-01-15T08:00:00Z"),
            Some(date(2025, Month::January, 15))
        );
        assert_eq!(parse_incident_date("2025-03-01T10:30"), Some(date(2025, Month::March, 1)));
        assert_eq!(parse_incident_date("2025-03-01T10:30:15"), Some(date(2025, Month::March, 1)));
    }

    #[test]
    fn parses_long_and_short_month_names() {
        assert_eq!(
            parse_incident_date("February 14, 2025"),
            Some(date(2025, Month::February, 14))
        );
        assert_eq!(parse_incident_date("february 4, 2025"), Some(date(2025, Month::February, 4)));
        assert_eq!(parse_incident_date("Feb 14, 2025"), Some(date(2025, Month::February, 14)));
    }

    #[test]
    fn rejects_unsupported_or_invalid_dates() {
        for raw in ["", "   ", "last tuesday", "2025-02-30", "14/02/2025", "2025-13-01"] {
            assert_eq!(parse_incident_date(raw), None, "{raw:?} should not parse");
        }
    }

    #[test]
    fn filter_dates_accept_only_iso() {
        assert_eq!(parse_filter_date("2025-02-01"), Some(date(2025, Month::February, 1)));
        assert_eq!(parse_filter_date("February 1, 2025"), None);
        assert_eq!(parse_filter_date(""), None);
    }

    #[test]
    fn iso_text_is_zero_padded() {
        assert_eq!(iso_date_text(date(2025, Month::March, 2)).as_deref(), Some("2025-03-02"));
    }

    #[test]
    fn month_labels_use_full_month_names() {
        assert_eq!(month_label(date(2025, Month::February, 14)), "February 2025");
    }
}
