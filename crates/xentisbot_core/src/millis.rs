use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const EPOCH_NOTE: &str = "milliseconds since epoch (1970-01-01)";

/// Answer a `millis` request: the current time without an argument, otherwise the
/// argument read as epoch milliseconds, an ISO date time or an ISO date (all UTC).
pub fn describe_millis(argument: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(argument) = argument else {
        return format!(
            "The current date time is `{}` (in UTC) which corresponds to `{}` {EPOCH_NOTE}.",
            iso_date_time(now.naive_utc()),
            now.timestamp_millis()
        );
    };

    if let Ok(millis) = argument.parse::<i64>()
        && let Some(date_time) = DateTime::from_timestamp_millis(millis)
    {
        return format!(
            "The decimal value `{millis}` interpreted as {EPOCH_NOTE} corresponds to `{}` in UTC.",
            iso_date_time(date_time.naive_utc())
        );
    }

    if let Some(date_time) = parse_date_time(argument) {
        return format!(
            "The UTC date time `{}` corresponds to `{}` {EPOCH_NOTE}.",
            iso_date_time(date_time),
            date_time.and_utc().timestamp_millis()
        );
    }

    if let Ok(date) = NaiveDate::parse_from_str(argument, "%Y-%m-%d")
        && let Some(start) = date.and_hms_opt(0, 0, 0)
    {
        return format!(
            "The UTC date `{date}` corresponds to `{}` {EPOCH_NOTE}.",
            start.and_utc().timestamp_millis()
        );
    }

    format!(
        "`{argument}` is not a valid value for milliseconds/date time conversion.\n\
         It must be either a milliseconds value (like `{}`)\n\
         or a date like `{}`\n\
         or a date time like `{}`.",
        now.timestamp_millis(),
        now.date_naive(),
        iso_date_time(now.naive_utc())
    )
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// ISO-8601 local date time, dropping zero seconds and zero fractions.
fn iso_date_time(value: NaiveDateTime) -> String {
    if value.nanosecond() != 0 {
        value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    } else if value.second() != 0 {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        value.format("%Y-%m-%dT%H:%M").to_string()
    }
}
