use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{percent, RecordId};

/// A savings goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Goal {
    pub id: RecordId,
    pub name: String,
    pub target: f64,
    pub current: f64,
    pub deadline: Option<NaiveDate>,
}

impl Goal {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, target: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            target,
            ..Default::default()
        }
    }

    pub fn with_current(mut self, current: f64) -> Self {
        self.current = current;
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Progress towards the target, capped at 100.
    pub fn progress_percent(&self) -> f64 {
        percent(self.current, self.target)
            .map(|p| p.clamp(0.0, 100.0))
            .unwrap_or(0.0)
    }

    pub fn is_reached(&self) -> bool {
        self.target > 0.0 && self.current >= self.target
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2} / {:.2} ({:.1}%)",
            self.name,
            self.current,
            self.target,
            self.progress_percent()
        )?;
        if let Some(deadline) = self.deadline {
            write!(f, " by {}", deadline)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sparse_goal_loads() {
        let goals: Vec<Goal> = serde_json::from_value(json!([{"id": 1, "target": 100}])).unwrap();
        assert_eq!(goals[0].id, RecordId::Number(1));
        assert_eq!(goals[0].target, 100.0);
        assert_eq!(goals[0].current, 0.0);
        assert!(goals[0].name.is_empty());
    }

    #[test]
    fn test_progress_percent() {
        let goal = Goal::new(1, "Emergency fund", 1000.0).with_current(250.0);
        assert_eq!(goal.progress_percent(), 25.0);
        assert!(!goal.is_reached());

        let over = Goal::new(2, "Holiday", 500.0).with_current(800.0);
        assert_eq!(over.progress_percent(), 100.0);
        assert!(over.is_reached());

        assert_eq!(Goal::new(3, "Empty", 0.0).progress_percent(), 0.0);
    }

    #[test]
    fn test_goal_display() {
        let goal = Goal::new(1, "Car", 200.0)
            .with_current(50.0)
            .with_deadline(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(goal.to_string(), "Car: 50.00 / 200.00 (25.0%) by 2025-06-01");
    }
}
