use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

fn duration_re() -> Option<&'static Regex>
{
  static DURATION_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  DURATION_RE
    .get_or_init(|| {
      Regex::new(
        r"(?i)^(?P<num>\d+)\s*(?P<unit>days?|d|weeks?|w)$"
      )
      .ok()
    })
    .as_ref()
}

/// Parses a plan-length shorthand such
/// as `14d`, `2w` or `3 weeks` into a
/// whole number of days.
///
/// Returns `None` for anything outside
/// the grammar and for zero-length
/// durations.
#[must_use]
pub fn parse_duration_days(
  text: &str
) -> Option<u32> {
  let token = text.trim();
  let caps =
    duration_re()?.captures(token)?;

  let num = caps
    .name("num")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let multiplier = match caps
    .name("unit")?
    .as_str()
    .to_ascii_lowercase()
    .as_str()
  {
    | "d" | "day" | "days" => 1,
    | "w" | "week" | "weeks" => 7,
    | _ => return None
  };

  let days = num.checked_mul(multiplier)?;
  if days == 0 {
    return None;
  }

  trace!(input = %token, days, "parsed plan length");
  Some(days)
}

#[cfg(test)]
mod tests {
  use super::parse_duration_days;

  #[test]
  fn parses_documented_examples() {
    assert_eq!(
      parse_duration_days("14d"),
      Some(14)
    );
    assert_eq!(
      parse_duration_days("2w"),
      Some(14)
    );
    assert_eq!(
      parse_duration_days("3 weeks"),
      Some(21)
    );
    assert_eq!(
      parse_duration_days("10 days"),
      Some(10)
    );
  }

  #[test]
  fn accepts_singular_units_and_case() {
    assert_eq!(
      parse_duration_days("1 day"),
      Some(1)
    );
    assert_eq!(
      parse_duration_days("1 week"),
      Some(7)
    );
    assert_eq!(
      parse_duration_days("  5D "),
      Some(5)
    );
    assert_eq!(
      parse_duration_days("2 Weeks"),
      Some(14)
    );
  }

  #[test]
  fn rejects_zero_length() {
    assert_eq!(
      parse_duration_days("  0d  "),
      None
    );
    assert_eq!(
      parse_duration_days("0 weeks"),
      None
    );
  }

  #[test]
  fn rejects_text_outside_grammar() {
    for input in [
      "", "abc", "14", "d", "-3d",
      "+3d", "1.5w", "2 fortnights",
      "3 weeks ago", "two weeks",
      "14dd"
    ] {
      assert_eq!(
        parse_duration_days(input),
        None,
        "{input:?} should not parse"
      );
    }
  }

  #[test]
  fn rejects_overflowing_values() {
    assert_eq!(
      parse_duration_days(
        "99999999999d"
      ),
      None
    );
    assert_eq!(
      parse_duration_days("700000000w"),
      None
    );
  }
}
