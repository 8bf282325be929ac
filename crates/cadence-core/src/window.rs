use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::datetime::{
  Calendar,
  add_days
};
use crate::duration::parse_duration_days;
use crate::sprint::SprintRecord;

/// Which field supplied a window's end.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EndSource {
  Planned,
  Computed,
  PlanLength,
  SingleDay
}

impl EndSource {
  #[must_use]
  pub fn as_str(&self) -> &'static str {
    match self {
      | Self::Planned => "planned",
      | Self::Computed => "computed",
      | Self::PlanLength => "plan-length",
      | Self::SingleDay => "single-day"
    }
  }
}

/// A sprint's resolved planned span,
/// inclusive on both ends.
///
/// `planned_end >= planned_start`
/// always holds.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct SprintWindow {
  pub planned_start: NaiveDate,
  pub planned_end:   NaiveDate,
  pub end_source:    EndSource
}

impl SprintWindow {
  #[must_use]
  pub fn contains(
    &self,
    day: NaiveDate
  ) -> bool {
    self.planned_start <= day
      && day <= self.planned_end
  }

  /// Number of days covered, counting
  /// both boundaries.
  #[must_use]
  pub fn len_days(&self) -> i64 {
    (self.planned_end
      - self.planned_start)
      .num_days()
      + 1
  }

  /// Part of the window inside
  /// `[range_start, range_end]`, or
  /// `None` when they do not meet.
  #[must_use]
  pub fn clip(
    &self,
    range_start: NaiveDate,
    range_end: NaiveDate
  ) -> Option<(NaiveDate, NaiveDate)> {
    let visible_start =
      self.planned_start.max(range_start);
    let visible_end =
      self.planned_end.min(range_end);
    (visible_start <= visible_end)
      .then_some((
        visible_start,
        visible_end
      ))
  }
}

/// Resolves a sprint's planned window.
///
/// The end is taken from the first of
/// `planned_end`, `computed_end`,
/// `plan_length` that resolves, else the
/// window collapses to its start day.
/// Sprints without a planned start have
/// no window.
#[must_use]
pub fn normalize_window(
  cal: &Calendar,
  sprint: &SprintRecord
) -> Option<SprintWindow> {
  let planned_start =
    cal.day_of(sprint.planned_start?);

  let (mut planned_end, end_source) =
    resolve_end(
      cal,
      sprint,
      planned_start
    );

  if planned_end < planned_start {
    debug!(
      sprint_id = sprint.id,
      start = %planned_start,
      end = %planned_end,
      source = end_source.as_str(),
      "window end precedes start; clamping to start"
    );
    planned_end = planned_start;
  }

  Some(SprintWindow {
    planned_start,
    planned_end,
    end_source
  })
}

fn resolve_end(
  cal: &Calendar,
  sprint: &SprintRecord,
  planned_start: NaiveDate
) -> (NaiveDate, EndSource) {
  if let Some(end) = sprint.planned_end
  {
    return (
      cal.day_of(end),
      EndSource::Planned
    );
  }

  if let Some(end) = sprint.computed_end
  {
    return (
      cal.day_of(end),
      EndSource::Computed
    );
  }

  if let Some(end) = sprint
    .plan_length
    .as_deref()
    .and_then(parse_duration_days)
    .and_then(|days| {
      add_days(
        planned_start,
        i64::from(days) - 1
      )
    })
  {
    return (end, EndSource::PlanLength);
  }

  if let Some(raw) =
    sprint.plan_length.as_deref()
  {
    debug!(
      sprint_id = sprint.id,
      plan_length = %raw,
      "plan length not usable; falling back to single day"
    );
  }

  (planned_start, EndSource::SingleDay)
}
