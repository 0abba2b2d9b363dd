//! Derived metrics - progress computed from plans and daily logs
//!
//! Everything here is pure: no store access, no logging.

use chrono::{Duration, NaiveDate};

use crate::models::{DailyProgress, DietPlan, Macros, WorkoutPlan};

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    done as f64 * 100.0 / total as f64
}

/// Completed sets as a percentage of all sets (0 for an empty plan)
pub fn workout_completion(plan: &WorkoutPlan) -> f64 {
    let total = plan.sets().count();
    let done = plan.sets().filter(|s| s.completed).count();
    percent(done, total)
}

/// Completed foods as a percentage of all foods (0 for an empty plan)
pub fn diet_completion(plan: &DietPlan) -> f64 {
    let total = plan.foods().count();
    let done = plan.foods().filter(|f| f.completed).count();
    percent(done, total)
}

/// Effective macros of completed foods only
pub fn consumed_macros(plan: &DietPlan) -> Macros {
    plan.foods()
        .filter(|f| f.completed)
        .fold(Macros::default(), |acc, f| acc + f.effective_macros())
}

pub fn remaining_macros(plan: &DietPlan) -> Macros {
    let totals = plan.totals();
    let consumed = consumed_macros(plan);
    Macros {
        calories: (totals.calories - consumed.calories).max(0.0),
        protein: (totals.protein - consumed.protein).max(0.0),
        carbs: (totals.carbs - consumed.carbs).max(0.0),
        fat: (totals.fat - consumed.fat).max(0.0),
    }
}

/// Plans scheduled on the weekday of `date`
pub fn scheduled_workouts(plans: &[WorkoutPlan], date: NaiveDate) -> Vec<&WorkoutPlan> {
    plans.iter().filter(|p| p.is_scheduled_on(date)).collect()
}

/// Analytics over one student's daily progress log
pub struct ProgressAnalytics {
    entries: Vec<DailyProgress>,
}

impl ProgressAnalytics {
    pub fn new(mut entries: Vec<DailyProgress>) -> Self {
        entries.sort_by_key(|e| e.date);
        Self { entries }
    }

    fn entry_on(&self, date: NaiveDate) -> Option<&DailyProgress> {
        self.entries.iter().find(|e| e.date == date)
    }

    /// Workout done and every meal eaten. A day with no meals planned never counts.
    fn is_full_day(&self, date: NaiveDate, meals_per_day: u32) -> bool {
        self.entry_on(date).is_some_and(|e| {
            e.workout_completed && meals_per_day > 0 && e.meals_completed >= meals_per_day
        })
    }

    /// Full days among the 7 days ending `today`
    pub fn weekly_streak(&self, meals_per_day: u32, today: NaiveDate) -> usize {
        (0..7)
            .map(|back| today - Duration::days(back))
            .filter(|d| self.is_full_day(*d, meals_per_day))
            .count()
    }

    /// Consecutive full days ending today, or yesterday if today isn't done yet
    pub fn current_streak(&self, meals_per_day: u32, today: NaiveDate) -> usize {
        let start = if self.is_full_day(today, meals_per_day) {
            today
        } else {
            today - Duration::days(1)
        };

        let mut streak = 0;
        let mut day = start;
        while self.is_full_day(day, meals_per_day) {
            streak += 1;
            day -= Duration::days(1);
        }
        streak
    }

    fn window(&self, days: u32, today: NaiveDate) -> impl Iterator<Item = &DailyProgress> {
        let since = today - Duration::days(i64::from(days.saturating_sub(1)));
        self.entries.iter().filter(move |e| e.date >= since && e.date <= today)
    }

    /// Latest minus earliest logged weight in the window
    pub fn weight_change(&self, days: u32, today: NaiveDate) -> Option<f64> {
        let weights: Vec<f64> = self.window(days, today).filter_map(|e| e.weight_kg).collect();
        if weights.len() < 2 {
            return None;
        }
        Some(weights[weights.len() - 1] - weights[0])
    }

    /// Percentage of days in the window with the workout completed
    pub fn completion_rate(&self, days: u32, today: NaiveDate) -> f64 {
        let done = self.window(days, today).filter(|e| e.workout_completed).count();
        percent(done, days as usize)
    }
}
