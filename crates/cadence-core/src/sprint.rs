use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::{Point, point_serde};

/// A sprint as handed over by the sprint-management side.
///
/// `state` is carried through verbatim; it is never normalised or checked
/// against a known set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SprintRecord {
    pub id: u64,

    #[serde(default, rename = "name", alias = "displayName")]
    pub display_name: String,

    #[serde(default)]
    pub state: String,

    #[serde(default, with = "point_serde")]
    pub planned_start: Option<Point>,

    #[serde(default, with = "point_serde")]
    pub planned_end: Option<Point>,

    #[serde(default)]
    pub plan_length: Option<String>,

    #[serde(default, with = "point_serde")]
    pub actual_start: Option<Point>,

    #[serde(default, with = "point_serde")]
    pub actual_end: Option<Point>,

    #[serde(default, with = "point_serde")]
    pub computed_end: Option<Point>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SprintRecord {
    pub fn new(id: u64, display_name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            state: state.into(),
            planned_start: None,
            planned_end: None,
            plan_length: None,
            actual_start: None,
            actual_end: None,
            computed_end: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn starting(mut self, at: impl Into<Point>) -> Self {
        self.planned_start = Some(at.into());
        self
    }

    pub fn ending(mut self, at: impl Into<Point>) -> Self {
        self.planned_end = Some(at.into());
        self
    }

    pub fn with_computed_end(mut self, at: impl Into<Point>) -> Self {
        self.computed_end = Some(at.into());
        self
    }

    pub fn with_plan_length(mut self, expr: impl Into<String>) -> Self {
        self.plan_length = Some(expr.into());
        self
    }

    pub fn actual(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.actual_start = start.map(Point::from);
        self.actual_end = end.map(Point::from);
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::SprintRecord;
    use crate::datetime::Point;

    #[test]
    fn deserializes_mixed_point_formats() {
        let raw = r#"{
            "id": 7,
            "name": "Sprint 7",
            "state": "OVERDUE",
            "plannedStart": "2024-02-05T09:00:00Z",
            "computedEnd": "20240218T170000Z",
            "planLength": "2w",
            "actualStart": null,
            "velocity": 21
        }"#;

        let sprint: SprintRecord = serde_json::from_str(raw).expect("parse sprint");
        assert_eq!(sprint.id, 7);
        assert_eq!(sprint.display_name, "Sprint 7");
        assert_eq!(sprint.state, "OVERDUE");
        assert_eq!(
            sprint.planned_start,
            Utc.with_ymd_and_hms(2024, 2, 5, 9, 0, 0)
                .single()
                .map(Point::from)
        );
        assert_eq!(
            sprint.computed_end,
            Utc.with_ymd_and_hms(2024, 2, 18, 17, 0, 0)
                .single()
                .map(Point::from)
        );
        assert_eq!(sprint.plan_length.as_deref(), Some("2w"));
        assert_eq!(sprint.actual_start, None);
        assert_eq!(sprint.planned_end, None);
        assert_eq!(sprint.extra.get("velocity"), Some(&serde_json::json!(21)));
    }

    #[test]
    fn accepts_display_name_alias_and_missing_optionals() {
        let sprint: SprintRecord =
            serde_json::from_str(r#"{"id": 3, "displayName": "Hardening"}"#).expect("parse sprint");
        assert_eq!(sprint.display_name, "Hardening");
        assert_eq!(sprint.state, "");
        assert!(sprint.planned_start.is_none());
        assert!(sprint.extra.is_empty());
    }

    #[test]
    fn keeps_bare_dates_as_days() {
        let raw = r#"{"id": 4, "plannedStart": "2024-02-05", "plannedEnd": "", "planLength": "1d"}"#;
        let sprint: SprintRecord = serde_json::from_str(raw).expect("parse sprint");
        let feb_5 = NaiveDate::from_ymd_opt(2024, 2, 5).expect("valid date");

        assert_eq!(sprint.planned_start, Some(Point::Day(feb_5)));
        assert_eq!(sprint.planned_end, None);

        let value = serde_json::to_value(&sprint).expect("serialize sprint");
        assert_eq!(value["plannedStart"], "2024-02-05");
    }

    #[test]
    fn serializes_points_as_rfc3339() {
        let start = Utc
            .with_ymd_and_hms(2024, 2, 5, 9, 0, 0)
            .single()
            .expect("valid instant");
        let sprint = SprintRecord::new(1, "Alpha", "active").starting(start);

        let value = serde_json::to_value(&sprint).expect("serialize sprint");
        assert_eq!(value["plannedStart"], "2024-02-05T09:00:00Z");
        assert_eq!(value["name"], "Alpha");
        assert!(value["plannedEnd"].is_null());
    }
}
