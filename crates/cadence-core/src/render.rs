use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_day_key;
use crate::schedule::{Schedule, ScheduleEntry};
use crate::sprint::SprintRecord;
use crate::window::SprintWindow;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(days = schedule.len()))]
    pub fn print_schedule(&self, schedule: &Schedule) -> anyhow::Result<()> {
        self.write_schedule(io::stdout().lock(), schedule)
    }

    #[tracing::instrument(skip(self, entries))]
    pub fn print_day(&self, day: NaiveDate, entries: &[ScheduleEntry]) -> anyhow::Result<()> {
        self.write_day(io::stdout().lock(), day, entries)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_windows(
        &self,
        rows: &[(&SprintRecord, Option<SprintWindow>)],
    ) -> anyhow::Result<()> {
        self.write_windows(io::stdout().lock(), rows)
    }

    pub fn write_schedule<W: Write>(&self, writer: W, schedule: &Schedule) -> anyhow::Result<()> {
        let headers = ["Day", "Sprint", "State", "Flags", "Ends"];
        let mut rows = Vec::new();

        for (day, entries) in schedule.iter() {
            let day_key = self.paint(&format_day_key(day), "33");
            for (idx, entry) in entries.iter().enumerate() {
                let day_cell = if idx == 0 { day_key.clone() } else { String::new() };
                let mut row = vec![day_cell];
                row.extend(self.entry_cells(entry));
                rows.push(row);
            }
        }

        write_table(writer, &headers, rows)
    }

    pub fn write_day<W: Write>(
        &self,
        mut writer: W,
        day: NaiveDate,
        entries: &[ScheduleEntry],
    ) -> anyhow::Result<()> {
        if entries.is_empty() {
            writeln!(writer, "no sprints on {}", format_day_key(day))?;
            return Ok(());
        }

        writeln!(writer, "{}", format_day_key(day))?;
        let headers = ["Sprint", "State", "Flags", "Ends"];
        let rows = entries.iter().map(|entry| self.entry_cells(entry)).collect();
        write_table(writer, &headers, rows)
    }

    pub fn write_windows<W: Write>(
        &self,
        writer: W,
        rows: &[(&SprintRecord, Option<SprintWindow>)],
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Sprint", "State", "Start", "End", "Days", "Source"];
        let rows = rows
            .iter()
            .map(|(sprint, window)| {
                let id = self.paint(&sprint.id.to_string(), "33");
                match window {
                    Some(window) => vec![
                        id,
                        sprint.display_name.clone(),
                        sprint.state.clone(),
                        format_day_key(window.planned_start),
                        format_day_key(window.planned_end),
                        window.len_days().to_string(),
                        window.end_source.as_str().to_string(),
                    ],
                    None => vec![
                        id,
                        sprint.display_name.clone(),
                        sprint.state.clone(),
                        "-".to_string(),
                        "-".to_string(),
                        "-".to_string(),
                        "-".to_string(),
                    ],
                }
            })
            .collect();

        write_table(writer, &headers, rows)
    }

    fn entry_cells(&self, entry: &ScheduleEntry) -> Vec<String> {
        let label = if entry.label.is_empty() {
            format!("#{}", entry.id)
        } else {
            format!("#{} {}", entry.id, entry.label)
        };
        let label = if entry.before_actual_start || entry.after_actual_end {
            self.paint(&label, "2")
        } else {
            label
        };

        vec![
            label,
            entry.state.clone(),
            entry_flags(entry).join(" "),
            format_day_key(entry.end_date),
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Short tokens naming every flag set on an entry.
pub fn entry_flags(entry: &ScheduleEntry) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if entry.is_start {
        flags.push("start");
    }
    if entry.is_end {
        flags.push("end");
    }
    if entry.is_actual_start {
        flags.push("actual-start");
    }
    if entry.is_actual_end {
        flags.push("actual-end");
    }
    if entry.before_actual_start {
        flags.push("pre-actual");
    }
    if entry.after_actual_end {
        flags.push("post-actual");
    }
    flags
}

fn write_table<W: Write>(
    mut writer: W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(*header));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        write!(writer, "{:width$} ", header, width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Renderer, entry_flags, strip_ansi};
    use crate::config::Config;
    use crate::datetime::Calendar;
    use crate::schedule::build_schedule;
    use crate::sprint::SprintRecord;
    use crate::window::normalize_window;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).expect("valid date")
    }

    fn sample() -> Vec<SprintRecord> {
        let at = |m, d| {
            Utc.with_ymd_and_hms(2024, m, d, 8, 0, 0)
                .single()
                .expect("valid instant")
        };
        vec![
            SprintRecord::new(1, "Alpha", "active")
                .starting(at(2, 1))
                .with_plan_length("3d")
                .actual(Some(at(2, 2)), None),
            SprintRecord::new(2, "", "OVERDUE").starting(at(2, 3)),
            SprintRecord::new(3, "Unplanned", "pending"),
        ]
    }

    #[test]
    fn schedule_table_lists_each_entry() {
        let cal = Calendar::new(chrono_tz::UTC);
        let schedule = build_schedule(&cal, &sample(), day(2, 1), day(2, 7));

        let mut out = Vec::new();
        Renderer::plain()
            .write_schedule(&mut out, &schedule)
            .expect("render schedule");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("Day"));
        assert_eq!(lines.len(), 2 + 4);
        assert!(lines[2].starts_with("2024-02-01 #1 Alpha"));
        assert!(lines[2].contains("start pre-actual"));
        assert!(lines[4].contains("end"));
        assert!(lines[5].trim_start().starts_with("#2"));
        assert!(lines[5].contains("OVERDUE"));
    }

    #[test]
    fn day_listing_reports_empty_days() {
        let mut out = Vec::new();
        Renderer::plain()
            .write_day(&mut out, day(2, 9), &[])
            .expect("render day");
        assert_eq!(String::from_utf8(out).expect("utf8"), "no sprints on 2024-02-09\n");
    }

    #[test]
    fn window_table_marks_missing_windows() {
        let cal = Calendar::new(chrono_tz::UTC);
        let sprints = sample();
        let rows: Vec<_> = sprints
            .iter()
            .map(|sprint| (sprint, normalize_window(&cal, sprint)))
            .collect();

        let mut out = Vec::new();
        Renderer::plain()
            .write_windows(&mut out, &rows)
            .expect("render windows");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("2024-02-03 3    plan-length"));
        assert!(text.contains("single-day"));
        let unplanned = text
            .lines()
            .find(|line| line.contains("Unplanned"))
            .expect("unplanned row");
        assert!(unplanned.contains('-'));
    }

    #[test]
    fn flags_are_listed_in_fixed_order() {
        let cal = Calendar::new(chrono_tz::UTC);
        let schedule = build_schedule(&cal, &sample(), day(2, 1), day(2, 1));
        let entry = &schedule.entries_on(day(2, 1)).expect("first day")[0];
        assert_eq!(entry_flags(entry), vec!["start", "pre-actual"]);
    }

    #[test]
    fn color_setting_uses_config_switches() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        assert!(!Renderer::new(&cfg).expect("switch").color);

        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        let err = Renderer::new(&cfg).expect_err("unknown switch");
        assert!(err.to_string().contains("invalid color setting"));
    }

    #[test]
    fn strips_ansi_sequences() {
        assert_eq!(strip_ansi("\x1b[33m2024\x1b[0m"), "2024");
    }
}
