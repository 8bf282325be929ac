use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, ScheduleArgs};
use crate::config::Config;
use crate::datetime::{Calendar, add_days, parse_day_expr};
use crate::duration::parse_duration_days;
use crate::render::Renderer;
use crate::schedule::build_schedule;
use crate::source::load_sprints;
use crate::sprint::SprintRecord;
use crate::window::normalize_window;

#[instrument(skip(cfg, renderer, command))]
pub fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    sprints_path: &Path,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let cal = Calendar::project();
    debug!(?command, timezone = %cal.timezone(), "dispatching command");

    match command {
        Command::Schedule(args) => cmd_schedule(cfg, renderer, sprints_path, &cal, &args, now),
        Command::Day { day, json } => cmd_day(renderer, sprints_path, &cal, &day, json, now),
        Command::Windows { json } => cmd_windows(renderer, sprints_path, &cal, json),
        Command::Duration { text } => cmd_duration(&text),
    }
}

/// Visible range for `schedule`: `--from` defaults to today and `--to` to
/// `schedule.range` days starting at `--from`.
pub fn resolve_range(
    cfg: &Config,
    cal: &Calendar,
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let start = match from {
        Some(expr) => parse_day_expr(expr, now, cal).context("invalid --from")?,
        None => cal.day_of(now),
    };

    let end = match to {
        Some(expr) => parse_day_expr(expr, now, cal).context("invalid --to")?,
        None => {
            let days = cfg.range_days()?;
            add_days(start, days - 1).ok_or_else(|| anyhow!("range end out of bounds"))?
        }
    };

    Ok((start, end))
}

/// Ids of sprints that cannot appear in any schedule.
pub fn unscheduled_ids(cal: &Calendar, sprints: &[SprintRecord]) -> Vec<u64> {
    sprints
        .iter()
        .filter(|sprint| normalize_window(cal, sprint).is_none())
        .map(|sprint| sprint.id)
        .collect()
}

#[instrument(skip(cfg, renderer, cal, now))]
fn cmd_schedule(
    cfg: &Config,
    renderer: &Renderer,
    sprints_path: &Path,
    cal: &Calendar,
    args: &ScheduleArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let (start, end) = resolve_range(cfg, cal, args.from.as_deref(), args.to.as_deref(), now)?;
    if start > end {
        warn!(%start, %end, "range starts after it ends; schedule will be empty");
    }

    let sprints = load_sprints(sprints_path)?;
    let unscheduled = unscheduled_ids(cal, &sprints);
    if !unscheduled.is_empty() {
        warn!(ids = ?unscheduled, "sprints without a planned start were left out");
    }

    let schedule = build_schedule(cal, &sprints, start, end);
    info!(
        %start,
        %end,
        days = schedule.len(),
        sprints = schedule.sprint_ids().len(),
        "built schedule"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }
    renderer.print_schedule(&schedule)
}

#[instrument(skip(renderer, cal, now))]
fn cmd_day(
    renderer: &Renderer,
    sprints_path: &Path,
    cal: &Calendar,
    day: &str,
    json: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let day = parse_day_expr(day, now, cal)?;
    let sprints = load_sprints(sprints_path)?;
    let schedule = build_schedule(cal, &sprints, day, day);
    let entries = schedule.entries_on(day).unwrap_or_default();

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }
    renderer.print_day(day, entries)
}

#[instrument(skip(renderer, cal))]
fn cmd_windows(
    renderer: &Renderer,
    sprints_path: &Path,
    cal: &Calendar,
    json: bool,
) -> anyhow::Result<()> {
    let sprints = load_sprints(sprints_path)?;
    let rows: Vec<_> = sprints
        .iter()
        .map(|sprint| (sprint, normalize_window(cal, sprint)))
        .collect();

    if json {
        let value: Vec<_> = rows
            .iter()
            .map(|(sprint, window)| {
                serde_json::json!({
                    "id": sprint.id,
                    "name": sprint.display_name,
                    "state": sprint.state,
                    "window": window,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    renderer.print_windows(&rows)
}

#[instrument]
fn cmd_duration(text: &str) -> anyhow::Result<()> {
    let days = parse_duration_days(text)
        .ok_or_else(|| anyhow!("not a plan length: {text:?} (expected e.g. 14d, 2w, 3 weeks)"))?;
    println!("{days}");
    Ok(())
}
