use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::{AppError, AppResult};

pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|err| AppError::validation(format!("unknown timezone '{name}': {err}")))
}

/// Calendar date of `instant` as seen in the coaching timezone.
pub fn calendar_date(instant: DateTime<Utc>, timezone: &str) -> AppResult<NaiveDate> {
    let tz = parse_timezone(timezone)?;
    Ok(instant.with_timezone(&tz).date_naive())
}
