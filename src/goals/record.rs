use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::time::date_to_day_key;

pub type GoalId = Uuid;

/// One trackable goal and its per-day ledger. This is also the persisted shape, so field names
/// are part of the stored format.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecord {
    pub id: GoalId,
    pub name: String,
    /// Daily target.
    #[serde(with = "duration_ser")]
    pub target_duration: Duration,
    pub color_tag: String,
    pub icon_tag: String,
    /// Seconds accumulated per local day, keyed by `YYYY-MM-DD`. History is never pruned.
    #[serde(default)]
    pub daily_progress: BTreeMap<String, u64>,
    /// Day key of the last day-rollover pass over this record.
    pub last_reset_date: String,
}

impl GoalRecord {
    pub fn new(goal: NewGoal, today: NaiveDate) -> Self {
        let NewGoal {
            name,
            target_duration,
            color_tag,
            icon_tag,
        } = goal;
        Self {
            id: Uuid::new_v4(),
            name,
            target_duration: target_duration.max(Duration::zero()),
            color_tag,
            icon_tag,
            daily_progress: BTreeMap::new(),
            last_reset_date: date_to_day_key(today),
        }
    }

    pub fn today_progress(&self, today: NaiveDate) -> u64 {
        self.daily_progress
            .get(&date_to_day_key(today))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_progress(&self) -> u64 {
        self.daily_progress
            .values()
            .fold(0, |total, v| total.saturating_add(*v))
    }

    pub fn set_progress(&mut self, day: NaiveDate, seconds: u64) {
        self.daily_progress.insert(date_to_day_key(day), seconds);
    }

    /// Advances the rollover marker to `today`. Returns whether the record changed.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        let key = date_to_day_key(today);
        if self.last_reset_date == key {
            return false;
        }
        self.last_reset_date = key;
        true
    }
}

/// User supplied fields for a new goal. Missing fields fall back to [Default].
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub name: String,
    pub target_duration: Duration,
    pub color_tag: String,
    pub icon_tag: String,
}

impl Default for NewGoal {
    fn default() -> Self {
        Self {
            name: "New Goal".into(),
            target_duration: Duration::hours(1),
            color_tag: "#8E8E93".into(),
            icon_tag: "list.star".into(),
        }
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        if s < 0 {
            return Err(D::Error::custom(format!("negative target duration {s}")));
        }
        Duration::try_seconds(s)
            .ok_or_else(|| D::Error::custom(format!("target duration {s} is too large")))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, NaiveDate};

    use super::{GoalRecord, NewGoal};

    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
    const YESTERDAY: NaiveDate = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();

    #[test]
    fn test_progress_is_derived_from_ledger() {
        let mut goal = GoalRecord::new(NewGoal::default(), TODAY);
        assert_eq!(goal.today_progress(TODAY), 0);

        goal.set_progress(YESTERDAY, 120);
        goal.set_progress(TODAY, 30);

        assert_eq!(goal.today_progress(TODAY), 30);
        assert_eq!(goal.today_progress(YESTERDAY), 120);
        assert_eq!(goal.total_progress(), 150);
    }

    #[test]
    fn test_total_progress_saturates() {
        let mut goal = GoalRecord::new(NewGoal::default(), TODAY);
        goal.set_progress(YESTERDAY, u64::MAX);
        goal.set_progress(TODAY, 30);

        assert_eq!(goal.total_progress(), u64::MAX);
    }

    #[test]
    fn test_roll_over_keeps_history() {
        let mut goal = GoalRecord::new(NewGoal::default(), YESTERDAY);
        goal.set_progress(YESTERDAY, 120);

        assert!(goal.roll_over(TODAY));
        assert!(!goal.roll_over(TODAY));

        assert_eq!(goal.last_reset_date, "2025-05-06");
        assert_eq!(goal.today_progress(YESTERDAY), 120);
        assert_eq!(goal.today_progress(TODAY), 0);
    }

    #[test]
    fn test_persisted_field_names() -> Result<()> {
        let mut goal = GoalRecord::new(
            NewGoal {
                name: "Reading".into(),
                target_duration: Duration::minutes(45),
                ..Default::default()
            },
            TODAY,
        );
        goal.set_progress(TODAY, 60);

        let value = serde_json::to_value(&goal)?;
        assert_eq!(value["targetDuration"], 2700);
        assert_eq!(value["colorTag"], "#8E8E93");
        assert_eq!(value["iconTag"], "list.star");
        assert_eq!(value["dailyProgress"]["2025-05-06"], 60);
        assert_eq!(value["lastResetDate"], "2025-05-06");
        assert_eq!(value["id"], goal.id.to_string());
        Ok(())
    }

    #[test]
    fn test_negative_target_is_rejected() {
        let json = r#"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","name":"x","targetDuration":-5,
            "colorTag":"","iconTag":"","dailyProgress":{},"lastResetDate":"2025-05-06"}"#;
        assert!(serde_json::from_str::<GoalRecord>(json).is_err());
    }
}
