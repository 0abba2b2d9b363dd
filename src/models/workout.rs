//! Workout plans - scheduled exercises with planned and performed sets

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{require_id, Collection, Entity};
use crate::error::{CoachError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSet {
    pub reps: u32,
    #[serde(default)]
    pub weight_kg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_weight_kg: Option<f64>,
    #[serde(default)]
    pub completed: bool,
}

impl WorkoutSet {
    pub fn planned(reps: u32, weight_kg: f64) -> Self {
        Self {
            reps,
            weight_kg,
            actual_reps: None,
            actual_weight_kg: None,
            completed: false,
        }
    }

    /// Volume actually lifted (actual values override planned)
    pub fn volume(&self) -> f64 {
        let reps = self.actual_reps.unwrap_or(self.reps);
        let weight = self.actual_weight_kg.unwrap_or(self.weight_kg);
        reps as f64 * weight
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 0 = Sunday .. 6 = Saturday
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

impl WorkoutPlan {
    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        self.days_of_week.contains(&weekday)
    }

    pub fn sets(&self) -> impl Iterator<Item = &WorkoutSet> {
        self.exercises.iter().flat_map(|e| e.sets.iter())
    }

    /// Mark every set of every exercise as completed
    pub fn complete_all(&mut self) {
        for set in self.exercises.iter_mut().flat_map(|e| e.sets.iter_mut()) {
            set.completed = true;
        }
    }
}

impl Entity for WorkoutPlan {
    const COLLECTION: Collection = Collection::Workouts;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        require_id("workout plan", &self.id)?;
        require_id("studentId", &self.student_id)?;
        if let Some(day) = self.days_of_week.iter().find(|d| **d > 6) {
            return Err(CoachError::validation(format!(
                "daysOfWeek values must be in 0..=6, got {}",
                day
            )));
        }
        if self.exercises.iter().any(|e| e.name.trim().is_empty()) {
            return Err(CoachError::validation("exercise name must not be empty"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.days_of_week.sort_unstable();
        self.days_of_week.dedup();
        for (i, exercise) in self.exercises.iter_mut().enumerate() {
            if exercise.id.is_empty() {
                exercise.id = format!("{}-ex{}", self.id, i + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_plan(days: Vec<u8>) -> WorkoutPlan {
        WorkoutPlan {
            id: "w_1".to_string(),
            student_id: "s_1".to_string(),
            name: "Push".to_string(),
            description: None,
            days_of_week: days,
            exercises: vec![Exercise {
                id: String::new(),
                name: "Bench press".to_string(),
                notes: None,
                rest_seconds: Some(90),
                sets: vec![WorkoutSet::planned(8, 60.0), WorkoutSet::planned(8, 60.0)],
            }],
        }
    }

    #[test]
    fn test_days_of_week_range() {
        assert!(create_plan(vec![0, 3, 6]).validate().is_ok());
        assert!(create_plan(vec![1, 7]).validate().is_err());
    }

    #[test]
    fn test_is_scheduled_on() {
        let plan = create_plan(vec![1, 3, 5]);
        // 2024-03-04 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(plan.is_scheduled_on(monday));
        assert!(!plan.is_scheduled_on(tuesday));
    }

    #[test]
    fn test_normalize_sorts_days_and_names_exercises() {
        let mut plan = create_plan(vec![5, 1, 5, 3]);
        plan.normalize();
        assert_eq!(plan.days_of_week, vec![1, 3, 5]);
        assert_eq!(plan.exercises[0].id, "w_1-ex1");
    }

    #[test]
    fn test_set_volume_prefers_actual() {
        let mut set = WorkoutSet::planned(10, 50.0);
        assert_eq!(set.volume(), 500.0);
        set.actual_reps = Some(8);
        assert_eq!(set.volume(), 400.0);
    }
}
