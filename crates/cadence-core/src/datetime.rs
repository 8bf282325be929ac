use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "cadence-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "CADENCE_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "CADENCE_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "UTC";

/// Canonical calendar-day key format.
pub const DAY_KEY_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// A stored point in time.
///
/// Bare `YYYY-MM-DD` values stay calendar
/// days: they name the same day in every
/// calendar and never pass through a
/// timezone.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Point {
  At(DateTime<Utc>),
  Day(NaiveDate)
}

impl From<DateTime<Utc>> for Point {
  fn from(at: DateTime<Utc>) -> Self {
    Self::At(at)
  }
}

impl From<NaiveDate> for Point {
  fn from(day: NaiveDate) -> Self {
    Self::Day(day)
  }
}

impl fmt::Display for Point {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::At(at) => {
        f.write_str(&at.to_rfc3339_opts(
          SecondsFormat::Secs,
          true
        ))
      }
      | Self::Day(day) => {
        f.write_str(&format_day_key(*day))
      }
    }
  }
}

/// Maps points in time onto local
/// calendar days.
///
/// Every day key the schedule emits is
/// produced by one `Calendar`, so the
/// display layer can look days up with
/// the same canonicalisation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct Calendar {
  tz: Tz
}

impl Calendar {
  #[must_use]
  pub const fn new(tz: Tz) -> Self {
    Self {
      tz
    }
  }

  /// Calendar in the configured project
  /// timezone.
  #[must_use]
  pub fn project() -> Self {
    Self::new(*project_timezone())
  }

  #[must_use]
  pub fn timezone(&self) -> Tz {
    self.tz
  }

  #[must_use]
  pub fn day_of(
    &self,
    at: impl Into<Point>
  ) -> NaiveDate {
    match at.into() {
      | Point::At(at) => {
        at.with_timezone(&self.tz)
          .date_naive()
      }
      | Point::Day(day) => day
    }
  }

  #[must_use]
  pub fn day_key(
    &self,
    at: impl Into<Point>
  ) -> String {
    format_day_key(self.day_of(at))
  }
}

#[must_use]
pub fn format_day_key(
  day: NaiveDate
) -> String {
  day.format(DAY_KEY_FORMAT).to_string()
}

/// Inverse of [`format_day_key`].
#[must_use]
pub fn parse_day_key(
  key: &str
) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(
    key.trim(),
    DAY_KEY_FORMAT
  )
  .ok()
}

/// `None` when the result leaves the
/// representable date range.
#[must_use]
pub fn add_days(
  day: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  let magnitude =
    Days::new(days.unsigned_abs());
  if days >= 0 {
    day.checked_add_days(magnitude)
  } else {
    day.checked_sub_days(magnitude)
  }
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses a stored point in time.
///
/// Accepts RFC 3339, the compact
/// `YYYYMMDDTHHMMSSZ` form, and bare
/// `YYYY-MM-DD` dates.
pub fn parse_point(
  raw: &str
) -> anyhow::Result<Point> {
  let token = raw.trim();

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(Point::At(
      dt.with_timezone(&Utc)
    ));
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    return Ok(Point::At(ndt.and_utc()));
  }

  if let Some(day) = parse_day_key(token)
  {
    return Ok(Point::Day(day));
  }

  Err(anyhow!(
    "unrecognized point in time: {raw}"
  ))
}

/// Resolves a CLI day expression to a
/// calendar day.
#[tracing::instrument(skip(now, cal), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  now: DateTime<Utc>,
  cal: &Calendar
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = cal.day_of(now);

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return add_days(today, 1)
        .ok_or_else(|| {
          anyhow!(
            "tomorrow is out of range"
          )
        });
    }
    | "yesterday" => {
      return add_days(today, -1)
        .ok_or_else(|| {
          anyhow!(
            "yesterday is out of range"
          )
        });
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    let this_year =
      NaiveDate::from_ymd_opt(
        year,
        target_month,
        1
      )
      .ok_or_else(|| {
        anyhow!(
          "invalid month value: \
           {target_month}"
        )
      })?;
    if this_year <= today {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year,
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year candidate"
      )
    });
  }

  static RELATIVE_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  let rel_re = RELATIVE_RE
    .get_or_init(|| {
      Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$").ok()
    })
    .as_ref()
    .ok_or_else(|| {
      anyhow!(
        "internal regex compile \
         failure"
      )
    })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("d") => num,
      | Some("w") => {
        num.checked_mul(7).ok_or_else(
          || {
            anyhow!(
              "relative week offset \
               too large"
            )
          }
        )?
      }
      | other => {
        return Err(anyhow!(
          "unknown relative unit: \
           {other:?}"
        ));
      }
    };
    let days =
      if sign == "-" { -days } else { days };

    return add_days(today, days)
      .ok_or_else(|| {
        anyhow!(
          "relative date {token} is \
           out of range"
        )
      });
  }

  if let Some(day) = parse_day_key(token)
  {
    return Ok(day);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(
      cal.day_of(dt.with_timezone(&Utc))
    );
  }

  Err(anyhow!(
    "unrecognized day expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     month names (e.g. march), \
     +Nd/-Nd/+Nw/-Nw, YYYY-MM-DD, \
     RFC3339"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta).unwrap_or(from)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    Calendar,
    Point,
    add_days,
    format_day_key,
    parse_day_expr,
    parse_day_key,
    parse_point
  };

  fn utc_calendar() -> Calendar {
    Calendar::new(chrono_tz::UTC)
  }

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn day_key_follows_timezone() {
    let late = Utc
      .with_ymd_and_hms(
        2024, 2, 5, 3, 30, 0
      )
      .single()
      .expect("valid instant");

    assert_eq!(
      utc_calendar().day_key(late),
      "2024-02-05"
    );
    assert_eq!(
      Calendar::new(
        chrono_tz::America::New_York
      )
      .day_key(late),
      "2024-02-04"
    );
  }

  #[test]
  fn day_key_roundtrips() {
    let key = format_day_key(day(
      2024, 2, 29
    ));
    assert_eq!(key, "2024-02-29");
    assert_eq!(
      parse_day_key(&key),
      Some(day(2024, 2, 29))
    );
    assert_eq!(
      parse_day_key("2024-02-30"),
      None
    );
  }

  #[test]
  fn bare_days_ignore_the_timezone() {
    let feb_5 = day(2024, 2, 5);
    for tz in [
      chrono_tz::UTC,
      chrono_tz::America::Chicago,
      chrono_tz::Pacific::Kiritimati
    ] {
      assert_eq!(
        Calendar::new(tz)
          .day_of(Point::Day(feb_5)),
        feb_5
      );
    }
  }

  #[test]
  fn add_days_handles_both_directions()
  {
    assert_eq!(
      add_days(day(2024, 2, 28), 2),
      Some(day(2024, 3, 1))
    );
    assert_eq!(
      add_days(day(2024, 3, 1), -1),
      Some(day(2024, 2, 29))
    );
    assert_eq!(
      add_days(NaiveDate::MAX, 1),
      None
    );
  }

  #[test]
  fn parses_points_in_time() {
    let expected = Utc
      .with_ymd_and_hms(
        2024, 2, 5, 9, 0, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(
      parse_point(
        "2024-02-05T09:00:00Z"
      )
      .expect("rfc3339"),
      Point::At(expected)
    );
    assert_eq!(
      parse_point("20240205T090000Z")
        .expect("compact"),
      Point::At(expected)
    );
    assert_eq!(
      parse_point(" 2024-02-05 ")
        .expect("bare date"),
      Point::Day(day(2024, 2, 5))
    );
    assert_eq!(
      Point::At(expected).to_string(),
      "2024-02-05T09:00:00Z"
    );
    assert_eq!(
      Point::Day(day(2024, 2, 5))
        .to_string(),
      "2024-02-05"
    );
    assert!(
      parse_point("next tuesday")
        .is_err()
    );
  }

  #[test]
  fn parses_relative_day_expressions()
  {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let cal = utc_calendar();

    assert_eq!(
      parse_day_expr("today", now, &cal)
        .expect("today"),
      day(2026, 2, 17)
    );
    assert_eq!(
      parse_day_expr("+2w", now, &cal)
        .expect("two weeks"),
      day(2026, 3, 3)
    );
    assert_eq!(
      parse_day_expr("-3d", now, &cal)
        .expect("three days back"),
      day(2026, 2, 14)
    );
  }

  #[test]
  fn parses_named_day_expressions() {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now");
    let cal = utc_calendar();

    assert_eq!(
      parse_day_expr(
        "wednesday",
        now,
        &cal
      )
      .expect("weekday"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_day_expr("tue", now, &cal)
        .expect("same weekday"),
      day(2026, 2, 24)
    );
    assert_eq!(
      parse_day_expr("march", now, &cal)
        .expect("month"),
      day(2026, 3, 1)
    );
    assert_eq!(
      parse_day_expr("feb", now, &cal)
        .expect("past month"),
      day(2027, 2, 1)
    );
    assert_eq!(
      parse_day_expr(
        "2024-02-05",
        now,
        &cal
      )
      .expect("day key"),
      day(2024, 2, 5)
    );
    assert!(
      parse_day_expr(
        "someday",
        now,
        &cal
      )
      .is_err()
    );
  }
}

/// Serde adapter for optional [`Point`]
/// fields. Blank strings read as unset.
pub mod point_serde {
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::Point;

  pub fn serialize<S>(
    point: &Option<Point>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match point {
      | Some(value) => {
        serializer.collect_str(value)
      }
      | None => serializer.serialize_none()
    }
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<Option<Point>, D::Error>
  where
    D: Deserializer<'de>
  {
    let opt =
      Option::<String>::deserialize(
        deserializer
      )?;
    match opt {
      | Some(raw)
        if !raw.trim().is_empty() =>
      {
        super::parse_point(&raw)
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
      }
      | _ => Ok(None)
    }
  }
}
