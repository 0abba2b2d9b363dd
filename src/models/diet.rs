//! Diet plans - meals of foods with planned and consumed macros

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use super::{require_id, Collection, Entity};
use crate::error::{CoachError, Result};

/// Calories and macronutrients (grams)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub name: String,
    /// Grams
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_fat: Option<f64>,
    #[serde(default)]
    pub completed: bool,
}

impl Food {
    pub fn planned(name: &str, quantity: f64, macros: Macros) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            calories: macros.calories,
            protein: macros.protein,
            carbs: macros.carbs,
            fat: macros.fat,
            actual_quantity: None,
            actual_calories: None,
            actual_protein: None,
            actual_carbs: None,
            actual_fat: None,
            completed: false,
        }
    }

    /// Each actual field overrides its planned counterpart when present
    pub fn effective_macros(&self) -> Macros {
        Macros {
            calories: self.actual_calories.unwrap_or(self.calories),
            protein: self.actual_protein.unwrap_or(self.protein),
            carbs: self.actual_carbs.unwrap_or(self.carbs),
            fat: self.actual_fat.unwrap_or(self.fat),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Direction {
    pub step: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub foods: Vec<Food>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<Ingredient>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directions: Option<Vec<Direction>>,
}

impl Meal {
    pub fn is_completed(&self) -> bool {
        !self.foods.is_empty() && self.foods.iter().all(|f| f.completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DietPlan {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub meals: Vec<Meal>,
    // Stored redundantly; rewritten by `recompute_totals` on every write
    #[serde(default)]
    pub total_calories: f64,
    #[serde(default)]
    pub total_protein: f64,
    #[serde(default)]
    pub total_carbs: f64,
    #[serde(default)]
    pub total_fat: f64,
}

impl DietPlan {
    pub fn foods(&self) -> impl Iterator<Item = &Food> {
        self.meals.iter().flat_map(|m| m.foods.iter())
    }

    /// Sum of effective macros across all meals
    pub fn computed_totals(&self) -> Macros {
        self.foods().fold(Macros::default(), |acc, f| acc + f.effective_macros())
    }

    pub fn totals(&self) -> Macros {
        Macros {
            calories: self.total_calories,
            protein: self.total_protein,
            carbs: self.total_carbs,
            fat: self.total_fat,
        }
    }

    pub fn recompute_totals(&mut self) {
        let totals = self.computed_totals();
        self.total_calories = totals.calories;
        self.total_protein = totals.protein;
        self.total_carbs = totals.carbs;
        self.total_fat = totals.fat;
    }
}

impl Entity for DietPlan {
    const COLLECTION: Collection = Collection::Diets;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        require_id("diet plan", &self.id)?;
        require_id("studentId", &self.student_id)?;
        for food in self.foods() {
            let m = food.effective_macros();
            let values = [
                food.quantity,
                food.actual_quantity.unwrap_or(0.0),
                m.calories,
                m.protein,
                m.carbs,
                m.fat,
            ];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(CoachError::validation(format!(
                    "food '{}' has negative or non-numeric values",
                    food.name
                )));
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        for (i, meal) in self.meals.iter_mut().enumerate() {
            if meal.id.is_empty() {
                meal.id = format!("{}-meal{}", self.id, i + 1);
            }
        }
        self.recompute_totals();
    }
}
