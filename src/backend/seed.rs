//! Demo data - one trainer, one student and a plan of each kind

use chrono::Utc;
use tracing::info;

use super::{Backend, NewAccount};
use crate::error::Result;
use crate::models::{
    DietPlan, Direction, Exercise, Food, Ingredient, Macros, Meal, Role, Student, WorkoutPlan,
    WorkoutSet,
};

pub const DEMO_TRAINER: (&str, &str) = ("coach", "coach123");
pub const DEMO_STUDENT: (&str, &str) = ("student", "student123");

/// (exercise, sets, reps, kg)
const DEMO_EXERCISES: &[(&str, usize, u32, f64)] = &[
    ("Back squat", 3, 8, 60.0),
    ("Bench press", 3, 8, 45.0),
    ("Barbell row", 3, 10, 40.0),
    ("Plank", 2, 1, 0.0),
];

/// (meal, time, [(food, grams, kcal, protein, carbs, fat)])
type DemoMeal = (&'static str, &'static str, &'static [(&'static str, f64, f64, f64, f64, f64)]);

const DEMO_MEALS: &[DemoMeal] = &[
    ("Breakfast", "07:30", &[
        ("Oatmeal", 80.0, 300.0, 10.0, 54.0, 5.0),
        ("Greek yogurt", 150.0, 146.0, 15.0, 6.0, 7.0),
    ]),
    ("Lunch", "13:00", &[
        ("Chicken breast", 150.0, 248.0, 46.0, 0.0, 5.0),
        ("Rice", 200.0, 260.0, 5.0, 57.0, 1.0),
    ]),
    ("Dinner", "19:30", &[
        ("Salmon", 150.0, 310.0, 34.0, 0.0, 19.0),
        ("Broccoli", 120.0, 41.0, 3.0, 8.0, 0.0),
    ]),
];

fn demo_workout(student_id: &str) -> WorkoutPlan {
    WorkoutPlan {
        id: String::new(),
        student_id: student_id.to_string(),
        name: "Strength basics".to_string(),
        description: Some("Full body, three days a week".to_string()),
        days_of_week: vec![1, 3, 5],
        exercises: DEMO_EXERCISES
            .iter()
            .map(|(name, sets, reps, kg)| Exercise {
                id: String::new(),
                name: name.to_string(),
                notes: None,
                rest_seconds: Some(90),
                sets: (0..*sets).map(|_| WorkoutSet::planned(*reps, *kg)).collect(),
            })
            .collect(),
    }
}

fn demo_diet(student_id: &str) -> DietPlan {
    let meals = DEMO_MEALS
        .iter()
        .map(|(name, time, foods)| Meal {
            id: String::new(),
            name: name.to_string(),
            time: Some(time.to_string()),
            foods: foods
                .iter()
                .map(|(food, grams, calories, protein, carbs, fat)| {
                    Food::planned(
                        food,
                        *grams,
                        Macros {
                            calories: *calories,
                            protein: *protein,
                            carbs: *carbs,
                            fat: *fat,
                        },
                    )
                })
                .collect(),
            ingredients: None,
            directions: None,
        })
        .collect::<Vec<_>>();

    let mut plan = DietPlan {
        id: String::new(),
        student_id: student_id.to_string(),
        name: "Lean bulk".to_string(),
        meals,
        total_calories: 0.0,
        total_protein: 0.0,
        total_carbs: 0.0,
        total_fat: 0.0,
    };
    if let Some(breakfast) = plan.meals.first_mut() {
        breakfast.ingredients = Some(vec![
            Ingredient {
                name: "Rolled oats".to_string(),
                quantity: "80 g".to_string(),
            },
            Ingredient {
                name: "Milk".to_string(),
                quantity: "200 ml".to_string(),
            },
        ]);
        breakfast.directions = Some(vec![
            Direction {
                step: 1,
                text: "Simmer the oats in milk for 5 minutes".to_string(),
            },
            Direction {
                step: 2,
                text: "Top with yogurt".to_string(),
            },
        ]);
    }
    plan
}

/// Create the demo accounts and plans. Returns false when they already exist.
pub fn seed_demo(backend: &Backend) -> Result<bool> {
    if backend.find_user(DEMO_TRAINER.0)?.is_some() {
        info!("Demo data already present");
        return Ok(false);
    }

    let trainer = backend.register_user(NewAccount {
        username: DEMO_TRAINER.0.to_string(),
        password: DEMO_TRAINER.1.to_string(),
        name: "Demo Coach".to_string(),
        role: Role::Trainer,
        student_id: None,
    })?;

    let student = backend.upsert_student(Student {
        id: String::new(),
        trainer_id: trainer.id.clone(),
        name: "Demo Student".to_string(),
        email: Some("student@example.com".to_string()),
        goal: Some("Build strength".to_string()),
        age: Some(28),
        height_cm: Some(178.0),
        weight_kg: Some(76.5),
        photo_url: None,
        created_at: Utc::now(),
    })?;

    backend.register_user(NewAccount {
        username: DEMO_STUDENT.0.to_string(),
        password: DEMO_STUDENT.1.to_string(),
        name: student.name.clone(),
        role: Role::Student,
        student_id: Some(student.id.clone()),
    })?;

    backend.upsert_workout(demo_workout(&student.id))?;
    backend.upsert_diet(demo_diet(&student.id))?;

    info!("Seeded demo trainer '{}' and student '{}'", DEMO_TRAINER.0, DEMO_STUDENT.0);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::backend;

    #[test]
    fn test_seed_demo() {
        let backend = backend();
        assert!(seed_demo(&backend).unwrap());

        let session = backend.login(DEMO_STUDENT.0, DEMO_STUDENT.1).unwrap();
        let student_id = session.user.student_id.unwrap();
        let workouts = backend.list_workouts(&student_id).unwrap();
        assert_eq!(workouts.len(), 1);
        assert_eq!(workouts[0].sets().count(), 11);

        let diets = backend.list_diets(&student_id).unwrap();
        assert_eq!(diets[0].total_calories, 1305.0);
        assert_eq!(diets[0].meals[0].directions.as_ref().map(Vec::len), Some(2));

        let trainer = backend.login(DEMO_TRAINER.0, DEMO_TRAINER.1).unwrap();
        assert_eq!(backend.list_students(&trainer.user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_seed_twice_is_noop() {
        let backend = backend();
        assert!(seed_demo(&backend).unwrap());
        assert!(!seed_demo(&backend).unwrap());
        assert_eq!(backend.store().list(crate::models::Collection::Users, None).unwrap().len(), 2);
    }
}
