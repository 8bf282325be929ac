use std::collections::BTreeMap;

use chrono::{
  DateTime,
  NaiveDate,
  Utc
};
use serde::Serialize;
use tracing::{
  debug,
  trace
};

use crate::datetime::{
  Calendar,
  format_day_key,
  parse_day_key
};
use crate::sprint::SprintRecord;
use crate::window::{
  SprintWindow,
  normalize_window
};

/// One sprint's rendering record for one
/// day.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
  pub id:                  u64,
  pub label:               String,
  pub state:               String,
  pub is_start:            bool,
  pub is_end:              bool,
  pub is_actual_start:     bool,
  pub is_actual_end:       bool,
  pub before_actual_start: bool,
  pub after_actual_end:    bool,
  pub end_date:            NaiveDate
}

/// Day-indexed projection of sprints
/// onto a visible range.
///
/// Days no sprint touches are absent,
/// not present with an empty list.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(transparent)]
pub struct Schedule {
  days: BTreeMap<
    NaiveDate,
    Vec<ScheduleEntry>
  >
}

impl Schedule {
  /// Entries for a `YYYY-MM-DD` day key.
  #[must_use]
  pub fn get(
    &self,
    key: &str
  ) -> Option<&[ScheduleEntry]> {
    self.entries_on(parse_day_key(key)?)
  }

  #[must_use]
  pub fn entries_on(
    &self,
    day: NaiveDate
  ) -> Option<&[ScheduleEntry]> {
    self
      .days
      .get(&day)
      .map(Vec::as_slice)
  }

  /// Days in chronological order.
  pub fn iter(
    &self
  ) -> impl Iterator<
    Item = (NaiveDate, &[ScheduleEntry])
  > {
    self.days.iter().map(
      |(day, entries)| {
        (*day, entries.as_slice())
      }
    )
  }

  pub fn keys(
    &self
  ) -> impl Iterator<Item = String> + '_
  {
    self
      .days
      .keys()
      .copied()
      .map(format_day_key)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.days.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }

  /// Distinct sprint ids present, in
  /// order of first appearance.
  #[must_use]
  pub fn sprint_ids(&self) -> Vec<u64> {
    let mut ids = Vec::new();
    for entry in
      self.days.values().flatten()
    {
      if !ids.contains(&entry.id) {
        ids.push(entry.id);
      }
    }
    ids
  }

  fn push(
    &mut self,
    day: NaiveDate,
    entry: ScheduleEntry
  ) {
    self
      .days
      .entry(day)
      .or_default()
      .push(entry);
  }
}

/// Projects sprints onto the inclusive
/// range `[range_start, range_end]`.
///
/// Boundary flags always describe the
/// sprint's full window, never the
/// clipped part that is visible. Within a
/// day, entries keep the order of
/// `sprints`. Sprints without a window or
/// without overlap are left out.
#[tracing::instrument(
  skip_all,
  fields(
    sprints = sprints.len(),
    from = %range_start,
    to = %range_end
  )
)]
#[must_use]
pub fn build_schedule(
  cal: &Calendar,
  sprints: &[SprintRecord],
  range_start: NaiveDate,
  range_end: NaiveDate
) -> Schedule {
  let mut schedule = Schedule::default();

  if range_start > range_end {
    debug!("empty range requested");
    return schedule;
  }

  for sprint in sprints {
    let Some(window) =
      normalize_window(cal, sprint)
    else {
      trace!(
        sprint_id = sprint.id,
        "sprint has no planned start; skipping"
      );
      continue;
    };

    let Some((visible_start, visible_end)) =
      window.clip(range_start, range_end)
    else {
      trace!(
        sprint_id = sprint.id,
        start = %window.planned_start,
        end = %window.planned_end,
        "sprint outside visible range"
      );
      continue;
    };

    let actual = ActualDays {
      start: sprint
        .actual_start
        .map(|at| cal.day_of(at)),
      end:   sprint
        .actual_end
        .map(|at| cal.day_of(at))
    };

    for day in visible_start
      .iter_days()
      .take_while(|day| {
        *day <= visible_end
      })
    {
      schedule.push(
        day,
        entry_for(
          sprint, &window, actual, day
        )
      );
    }
  }

  debug!(
    days = schedule.len(),
    "schedule built"
  );
  schedule
}

/// [`build_schedule`] with bounds given
/// as points in time; each is truncated
/// to its local day first.
#[must_use]
pub fn build_schedule_between(
  cal: &Calendar,
  sprints: &[SprintRecord],
  range_start: DateTime<Utc>,
  range_end: DateTime<Utc>
) -> Schedule {
  build_schedule(
    cal,
    sprints,
    cal.day_of(range_start),
    cal.day_of(range_end)
  )
}

#[derive(Debug, Clone, Copy)]
struct ActualDays {
  start: Option<NaiveDate>,
  end:   Option<NaiveDate>
}

fn entry_for(
  sprint: &SprintRecord,
  window: &SprintWindow,
  actual: ActualDays,
  day: NaiveDate
) -> ScheduleEntry {
  ScheduleEntry {
    id:                  sprint.id,
    label:               sprint
      .display_name
      .clone(),
    state:               sprint
      .state
      .clone(),
    is_start:            day
      == window.planned_start,
    is_end:              day
      == window.planned_end,
    is_actual_start:     actual.start
      == Some(day),
    is_actual_end:       actual.end
      == Some(day),
    before_actual_start: actual
      .start
      .is_some_and(|start| day < start),
    after_actual_end:    actual
      .end
      .is_some_and(|end| day > end),
    end_date:            window
      .planned_end
  }
}
