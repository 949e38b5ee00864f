//! Dependency-driven scheduling: a node starts the day after the latest of
//! its dependencies ends, keeping its own duration.

use std::collections::HashSet;

use jiff::Span;
use jiff::civil::Date;
use tracing::debug;

use crate::models::node::{NodeId, WbsNode};
use crate::models::patch::NodePatch;
use crate::services::tree;

pub const WORKDAY_HOURS: f64 = 8.0;

/// Dates and effort derived for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub start_date: Date,
    pub end_date: Date,
    pub estimate_hours: f64,
}

impl Schedule {
    pub fn to_patch(&self) -> NodePatch {
        NodePatch {
            start_date: Some(Some(self.start_date)),
            end_date: Some(Some(self.end_date)),
            estimate_hours: Some(Some(self.estimate_hours)),
            ..NodePatch::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DependencyScheduler {
    workday_hours: f64,
}

impl Default for DependencyScheduler {
    fn default() -> Self {
        Self {
            workday_hours: WORKDAY_HOURS,
        }
    }
}

/// Inclusive day count, `None` when `end` is before `start`.
pub fn inclusive_days(start: Date, end: Date) -> Option<i64> {
    let days = start.until(end).ok()?.get_days() as i64;
    (days >= 0).then_some(days + 1)
}

fn add_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(Span::new().try_days(days).ok()?).ok()
}

impl DependencyScheduler {
    /// Non-positive values fall back to the standard eight-hour day.
    pub fn new(workday_hours: f64) -> Self {
        let workday_hours = if workday_hours.is_finite() && workday_hours > 0.0 {
            workday_hours
        } else {
            WORKDAY_HOURS
        };
        Self { workday_hours }
    }

    pub fn workday_hours(&self) -> f64 {
        self.workday_hours
    }

    /// Duration of `node` in whole days: its inclusive date range when both
    /// dates are set and ordered, else its estimate in workdays (at least
    /// one), else one day.
    pub fn duration_days(&self, node: &WbsNode) -> i64 {
        if let (Some(start), Some(end)) = (node.start_date, node.end_date)
            && let Some(days) = inclusive_days(start, end)
        {
            return days;
        }
        match node.estimate_hours {
            Some(hours) => ((hours / self.workday_hours).round() as i64).max(1),
            None => 1,
        }
    }

    /// Schedule `target` after the dependencies in `dependency_ids`.
    ///
    /// Each dependency contributes its end date, or its start date when it
    /// has no end. Unknown and dateless dependencies are skipped. `None` when
    /// nothing contributes a date. Only `target` is considered; its own
    /// dependents are not rescheduled.
    pub fn schedule(&self, forest: &[WbsNode], dependency_ids: &[NodeId], target: &WbsNode) -> Option<Schedule> {
        let mut seen = HashSet::new();
        let latest = dependency_ids
            .iter()
            .filter(|id| **id != target.id && seen.insert(id.as_str()))
            .filter_map(|id| tree::find(forest, id))
            .filter_map(|dependency| dependency.end_date.or(dependency.start_date))
            .max()?;

        let duration = self.duration_days(target);
        let start_date = add_days(latest, 1)?;
        let end_date = add_days(start_date, duration - 1)?;
        let schedule = Schedule {
            start_date,
            end_date,
            estimate_hours: duration as f64 * self.workday_hours,
        };

        debug!(node = %target.id, %latest, start = %start_date, end = %end_date, "schedule computed");
        Some(schedule)
    }

    /// Effort implied by a date range, for edits that set dates without an
    /// estimate.
    pub fn estimate_for_dates(&self, start: Option<Date>, end: Option<Date>) -> Option<f64> {
        let days = inclusive_days(start?, end?)?;
        Some(days as f64 * self.workday_hours)
    }

    /// Patch for a duration edit: effort follows the day count and, when the
    /// node has a start date, so does its end date.
    pub fn duration_change(&self, node: &WbsNode, days: i64) -> NodePatch {
        let days = days.max(1);
        NodePatch {
            estimate_hours: Some(Some(days as f64 * self.workday_hours)),
            end_date: node
                .start_date
                .and_then(|start| add_days(start, days - 1))
                .map(Some),
            ..NodePatch::default()
        }
    }
}

/// [`DependencyScheduler::schedule`] with the standard workday.
pub fn schedule(forest: &[WbsNode], dependency_ids: &[NodeId], target: &WbsNode) -> Option<Schedule> {
    DependencyScheduler::default().schedule(forest, dependency_ids, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn dated(id: &str, start: Option<Date>, end: Option<Date>) -> WbsNode {
        WbsNode {
            start_date: start,
            end_date: end,
            ..WbsNode::new(id, id)
        }
    }

    fn ids(raw: &[&str]) -> Vec<NodeId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_schedule_after_dependency() {
        let forest = vec![dated("dep", None, Some(date(2024, 1, 10)))];
        let target = WbsNode {
            estimate_hours: Some(16.0),
            ..WbsNode::new("t", "Target")
        };

        let result = schedule(&forest, &ids(&["dep"]), &target).unwrap();
        assert_eq!(result.start_date, date(2024, 1, 11));
        assert_eq!(result.end_date, date(2024, 1, 12));
        assert_eq!(result.estimate_hours, 16.0);
    }

    #[test]
    fn test_schedule_uses_latest_and_start_fallback() {
        let forest = vec![
            dated("a", Some(date(2024, 3, 1)), Some(date(2024, 3, 5))),
            dated("b", Some(date(2024, 3, 20)), None),
            dated("c", None, None),
        ];
        let target = dated("t", Some(date(2024, 1, 1)), Some(date(2024, 1, 3)));

        let result = schedule(&forest, &ids(&["a", "b", "c", "ghost", "a"]), &target).unwrap();
        assert_eq!(result.start_date, date(2024, 3, 21));
        assert_eq!(result.end_date, date(2024, 3, 23));
        assert_eq!(result.estimate_hours, 24.0);
    }

    #[test]
    fn test_schedule_none_without_dates() {
        let forest = vec![dated("c", None, None)];
        let target = WbsNode::new("t", "T");

        assert!(schedule(&forest, &[], &target).is_none());
        assert!(schedule(&forest, &ids(&["c"]), &target).is_none());
        assert!(schedule(&forest, &ids(&["ghost"]), &target).is_none());
    }

    #[test]
    fn test_duration_days() {
        let scheduler = DependencyScheduler::default();
        let reversed = dated("r", Some(date(2024, 1, 5)), Some(date(2024, 1, 1)));
        let estimated = WbsNode {
            estimate_hours: Some(20.0),
            ..WbsNode::new("e", "E")
        };
        let tiny = WbsNode {
            estimate_hours: Some(1.0),
            ..WbsNode::new("s", "S")
        };

        assert_eq!(scheduler.duration_days(&dated("d", Some(date(2024, 1, 1)), Some(date(2024, 1, 1)))), 1);
        assert_eq!(scheduler.duration_days(&reversed), 1);
        assert_eq!(scheduler.duration_days(&estimated), 3);
        assert_eq!(scheduler.duration_days(&tiny), 1);
        assert_eq!(scheduler.duration_days(&WbsNode::new("n", "N")), 1);
    }

    #[test]
    fn test_custom_workday() {
        let scheduler = DependencyScheduler::new(6.0);
        let forest = vec![dated("dep", None, Some(date(2024, 1, 10)))];
        let target = WbsNode {
            estimate_hours: Some(12.0),
            ..WbsNode::new("t", "T")
        };

        let result = scheduler.schedule(&forest, &ids(&["dep"]), &target).unwrap();
        assert_eq!(result.end_date, date(2024, 1, 12));
        assert_eq!(result.estimate_hours, 12.0);
        assert_eq!(DependencyScheduler::new(0.0).workday_hours(), WORKDAY_HOURS);
    }

    #[test]
    fn test_date_edits() {
        let scheduler = DependencyScheduler::default();
        assert_eq!(
            scheduler.estimate_for_dates(Some(date(2024, 1, 1)), Some(date(2024, 1, 3))),
            Some(24.0)
        );
        assert_eq!(scheduler.estimate_for_dates(Some(date(2024, 1, 1)), None), None);

        let started = dated("s", Some(date(2024, 2, 1)), None);
        let patch = scheduler.duration_change(&started, 5);
        assert_eq!(patch.estimate_hours, Some(Some(40.0)));
        assert_eq!(patch.end_date, Some(Some(date(2024, 2, 5))));

        let unstarted = scheduler.duration_change(&WbsNode::new("u", "U"), 0);
        assert_eq!(unstarted.estimate_hours, Some(Some(8.0)));
        assert_eq!(unstarted.end_date, None);
    }
}
