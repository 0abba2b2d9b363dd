//! Persistence backend - typed list/upsert/update/remove procedures per entity
//!
//! Input is validated before anything touches the store. Updates merge a
//! partial JSON object into the stored record inside one `Store::modify`, so
//! a failed validation leaves the stored record untouched.

pub mod auth;
pub mod seed;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CoachError, Result};
use crate::models::{
    apply_patch, from_document, new_id, DailyProgress, DietPlan, Entity, Media, Role, Student,
    UserRecord, WorkoutPlan,
};
use crate::store::Store;

pub use auth::NewAccount;

/// Backend procedures over a document store
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn Store>,
    /// session token -> user id
    sessions: Arc<RwLock<HashMap<String, String>>>,
    password_cost: u32,
}

impl Backend {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            password_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower bcrypt cost (seeding, tests)
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // ================================
    // Generic entity operations
    // ================================

    fn list_owned<E: Entity>(&self, owner: &str) -> Result<Vec<E>> {
        if owner.trim().is_empty() {
            return Err(CoachError::validation("owner id must not be empty"));
        }
        self.store
            .list(E::COLLECTION, Some(owner))?
            .into_iter()
            .map(from_document)
            .collect()
    }

    fn get_entity<E: Entity>(&self, id: &str) -> Result<E> {
        match self.store.get(E::COLLECTION, id)? {
            Some(doc) => from_document(doc),
            None => Err(CoachError::not_found(E::COLLECTION.kind(), id)),
        }
    }

    fn upsert_entity<E: Entity>(&self, mut entity: E, id_prefix: &str) -> Result<E> {
        if entity.id().trim().is_empty() {
            entity.set_id(new_id(id_prefix));
        }
        entity.normalize();
        entity.validate()?;
        self.store
            .put(E::COLLECTION, entity.id(), serde_json::to_value(&entity)?)?;
        info!("Upserted {} {}", E::COLLECTION.kind(), entity.id());
        Ok(entity)
    }

    fn update_entity<E: Entity>(&self, id: &str, patch: &Value) -> Result<E> {
        if !patch.is_object() {
            return Err(CoachError::validation("patch must be a JSON object"));
        }
        let updated = self.store.modify(E::COLLECTION, id, &mut |doc| {
            let current: E = from_document(doc)?;
            let merged = apply_patch(&current, patch)?;
            Ok(serde_json::to_value(&merged)?)
        })?;
        info!("Updated {} {}", E::COLLECTION.kind(), id);
        from_document(updated)
    }

    fn remove_entity<E: Entity>(&self, id: &str) -> Result<()> {
        if !self.store.remove(E::COLLECTION, id)? {
            return Err(CoachError::not_found(E::COLLECTION.kind(), id));
        }
        info!("Removed {} {}", E::COLLECTION.kind(), id);
        Ok(())
    }

    fn ensure_student(&self, student_id: &str) -> Result<()> {
        match self.get_student(student_id) {
            Ok(_) => Ok(()),
            Err(CoachError::NotFound { .. }) => Err(CoachError::validation(format!(
                "studentId '{}' does not reference an existing student",
                student_id
            ))),
            Err(e) => Err(e),
        }
    }

    /// A patch moving a record to another student must name an existing one
    fn ensure_patch_student(&self, patch: &Value) -> Result<()> {
        match patch.get("studentId") {
            Some(Value::String(student_id)) => self.ensure_student(student_id),
            _ => Ok(()),
        }
    }

    fn ensure_trainer(&self, trainer_id: &str) -> Result<()> {
        let trainer = match self.get_entity::<UserRecord>(trainer_id) {
            Ok(record) => record,
            Err(CoachError::NotFound { .. }) => {
                return Err(CoachError::validation(format!(
                    "trainerId '{}' does not reference an existing trainer",
                    trainer_id
                )));
            }
            Err(e) => return Err(e),
        };
        if trainer.profile.role != Role::Trainer {
            return Err(CoachError::validation(format!("user '{}' is not a trainer", trainer_id)));
        }
        Ok(())
    }

    // ================================
    // Students
    // ================================

    pub fn list_students(&self, trainer_id: &str) -> Result<Vec<Student>> {
        self.list_owned(trainer_id)
    }

    pub fn get_student(&self, id: &str) -> Result<Student> {
        self.get_entity(id)
    }

    pub fn upsert_student(&self, student: Student) -> Result<Student> {
        self.ensure_trainer(&student.trainer_id)?;
        self.upsert_entity(student, "s")
    }

    pub fn update_student(&self, id: &str, patch: &Value) -> Result<Student> {
        if let Some(trainer_id) = patch.get("trainerId").and_then(Value::as_str) {
            self.ensure_trainer(trainer_id)?;
        }
        self.update_entity(id, patch)
    }

    /// Plans, progress and media of the student are left in place
    pub fn remove_student(&self, id: &str) -> Result<()> {
        self.remove_entity::<Student>(id)
    }

    // ================================
    // Workout plans
    // ================================

    pub fn list_workouts(&self, student_id: &str) -> Result<Vec<WorkoutPlan>> {
        self.list_owned(student_id)
    }

    pub fn upsert_workout(&self, plan: WorkoutPlan) -> Result<WorkoutPlan> {
        self.ensure_student(&plan.student_id)?;
        self.upsert_entity(plan, "w")
    }

    pub fn update_workout(&self, id: &str, patch: &Value) -> Result<WorkoutPlan> {
        self.ensure_patch_student(patch)?;
        self.update_entity(id, patch)
    }

    pub fn remove_workout(&self, id: &str) -> Result<()> {
        self.remove_entity::<WorkoutPlan>(id)
    }

    // ================================
    // Diet plans
    // ================================

    pub fn list_diets(&self, student_id: &str) -> Result<Vec<DietPlan>> {
        self.list_owned(student_id)
    }

    pub fn upsert_diet(&self, plan: DietPlan) -> Result<DietPlan> {
        self.ensure_student(&plan.student_id)?;
        self.upsert_entity(plan, "d")
    }

    /// Totals are recomputed from the merged meals
    pub fn update_diet(&self, id: &str, patch: &Value) -> Result<DietPlan> {
        self.ensure_patch_student(patch)?;
        self.update_entity(id, patch)
    }

    pub fn remove_diet(&self, id: &str) -> Result<()> {
        self.remove_entity::<DietPlan>(id)
    }

    // ================================
    // Daily progress
    // ================================

    pub fn list_progress(&self, student_id: &str) -> Result<Vec<DailyProgress>> {
        let mut entries: Vec<DailyProgress> = self.list_owned(student_id)?;
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    /// Insert or replace the entry for (studentId, date)
    pub fn upsert_progress(&self, entry: DailyProgress) -> Result<DailyProgress> {
        self.ensure_student(&entry.student_id)?;
        debug!("Progress for {} on {}", entry.student_id, entry.date);
        self.upsert_entity(entry, "p")
    }

    // ================================
    // Media
    // ================================

    pub fn list_media(&self, student_id: &str) -> Result<Vec<Media>> {
        self.list_owned(student_id)
    }

    pub fn upsert_media(&self, media: Media) -> Result<Media> {
        self.ensure_student(&media.student_id)?;
        self.upsert_entity(media, "m")
    }

    pub fn remove_media(&self, id: &str) -> Result<()> {
        self.remove_entity::<Media>(id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Exercise, Food, Macros, Meal, User, WorkoutSet};
    use crate::store::{export_document, SqliteStore};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    pub(crate) fn backend() -> Backend {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        Backend::new(store).with_password_cost(4)
    }

    pub(crate) fn seed_trainer(backend: &Backend) -> User {
        backend
            .register_user(NewAccount {
                username: "coach".to_string(),
                password: "secret123".to_string(),
                name: "Coach Carter".to_string(),
                role: Role::Trainer,
                student_id: None,
            })
            .unwrap()
    }

    pub(crate) fn student_for(trainer_id: &str, name: &str) -> Student {
        Student {
            id: String::new(),
            trainer_id: trainer_id.to_string(),
            name: name.to_string(),
            email: None,
            goal: None,
            age: None,
            height_cm: None,
            weight_kg: None,
            photo_url: None,
            created_at: Utc::now(),
        }
    }

    /// `exercises` exercises of `sets` sets each
    pub(crate) fn workout_for(student_id: &str, exercises: usize, sets: usize) -> WorkoutPlan {
        WorkoutPlan {
            id: String::new(),
            student_id: student_id.to_string(),
            name: "Full body".to_string(),
            description: None,
            days_of_week: vec![1, 3, 5],
            exercises: (0..exercises)
                .map(|i| Exercise {
                    id: String::new(),
                    name: format!("Exercise {}", i + 1),
                    notes: None,
                    rest_seconds: Some(60),
                    sets: (0..sets).map(|_| WorkoutSet::planned(10, 40.0)).collect(),
                })
                .collect(),
        }
    }

    pub(crate) fn diet_for(student_id: &str) -> DietPlan {
        let m = |calories, protein, carbs, fat| Macros {
            calories,
            protein,
            carbs,
            fat,
        };
        DietPlan {
            id: String::new(),
            student_id: student_id.to_string(),
            name: "Maintenance".to_string(),
            meals: vec![
                Meal {
                    id: String::new(),
                    name: "Breakfast".to_string(),
                    time: Some("07:30".to_string()),
                    foods: vec![
                        Food::planned("Eggs", 120.0, m(180.0, 15.0, 1.0, 12.0)),
                        Food::planned("Toast", 60.0, m(150.0, 5.0, 28.0, 2.0)),
                    ],
                    ingredients: None,
                    directions: None,
                },
                Meal {
                    id: String::new(),
                    name: "Dinner".to_string(),
                    time: Some("19:00".to_string()),
                    foods: vec![Food::planned("Salmon", 150.0, m(310.0, 34.0, 0.0, 19.0))],
                    ingredients: None,
                    directions: None,
                },
            ],
            total_calories: 0.0,
            total_protein: 0.0,
            total_carbs: 0.0,
            total_fat: 0.0,
        }
    }

    fn seeded() -> (Backend, User, Student) {
        let backend = backend();
        let trainer = seed_trainer(&backend);
        let student = backend.upsert_student(student_for(&trainer.id, "Ana")).unwrap();
        (backend, trainer, student)
    }

    #[test]
    fn test_upsert_student_assigns_id() {
        let (backend, trainer, student) = seeded();
        assert!(student.id.starts_with("s_"));
        assert_eq!(backend.list_students(&trainer.id).unwrap(), vec![student]);
    }

    #[test]
    fn test_student_requires_existing_trainer() {
        let backend = backend();
        let err = backend.upsert_student(student_for("u_missing", "Bob")).unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
    }

    #[test]
    fn test_student_trainer_must_have_trainer_role() {
        let (backend, _, student) = seeded();
        let kid = backend
            .register_user(NewAccount {
                username: "ana".to_string(),
                password: "student123".to_string(),
                name: "Ana".to_string(),
                role: Role::Student,
                student_id: Some(student.id.clone()),
            })
            .unwrap();
        assert!(backend.upsert_student(student_for(&kid.id, "Bob")).is_err());
        assert!(backend.update_student(&student.id, &json!({"trainerId": kid.id})).is_err());
    }

    #[test]
    fn test_workout_roundtrip() {
        let (backend, _, student) = seeded();
        let plan = backend.upsert_workout(workout_for(&student.id, 2, 3)).unwrap();
        let listed = backend.list_workouts(&student.id).unwrap();
        assert_eq!(listed, vec![plan.clone()]);
        assert_eq!(plan.exercises[1].id, format!("{}-ex2", plan.id));
    }

    #[test]
    fn test_workout_rejects_bad_days() {
        let (backend, _, student) = seeded();
        let mut plan = workout_for(&student.id, 1, 1);
        plan.days_of_week = vec![2, 9];
        assert!(matches!(backend.upsert_workout(plan), Err(CoachError::Validation(_))));
        assert!(backend.list_workouts(&student.id).unwrap().is_empty());
    }

    #[test]
    fn test_workout_for_unknown_student() {
        let backend = backend();
        let err = backend.upsert_workout(workout_for("s_ghost", 1, 1)).unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
    }

    #[test]
    fn test_update_unknown_id_leaves_store_unchanged() {
        let (backend, _, student) = seeded();
        backend.upsert_workout(workout_for(&student.id, 1, 2)).unwrap();
        backend.upsert_diet(diet_for(&student.id)).unwrap();
        let before = export_document(backend.store().as_ref()).unwrap();

        let err = backend.update_workout("w_missing", &json!({"name": "x"})).unwrap_err();
        assert!(err.is_not_found());
        let err = backend.update_diet("d_missing", &json!({"name": "x"})).unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(export_document(backend.store().as_ref()).unwrap(), before);
    }

    #[test]
    fn test_invalid_patch_leaves_record_unchanged() {
        let (backend, _, student) = seeded();
        let plan = backend.upsert_workout(workout_for(&student.id, 1, 2)).unwrap();
        let err = backend
            .update_workout(&plan.id, &json!({"daysOfWeek": [8]}))
            .unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
        assert_eq!(backend.list_workouts(&student.id).unwrap(), vec![plan]);
    }

    #[test]
    fn test_plan_cannot_move_to_unknown_student() {
        let (backend, trainer, student) = seeded();
        let plan = backend.upsert_workout(workout_for(&student.id, 1, 1)).unwrap();
        let diet = backend.upsert_diet(diet_for(&student.id)).unwrap();

        let err = backend
            .update_workout(&plan.id, &json!({"studentId": "s_ghost"}))
            .unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
        let err = backend
            .update_diet(&diet.id, &json!({"studentId": "s_ghost"}))
            .unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
        assert_eq!(backend.list_workouts(&student.id).unwrap(), vec![plan.clone()]);
        assert_eq!(backend.list_diets(&student.id).unwrap(), vec![diet]);

        // moving to a real student is fine
        let other = backend.upsert_student(student_for(&trainer.id, "Bo")).unwrap();
        let moved = backend
            .update_workout(&plan.id, &json!({"studentId": &other.id}))
            .unwrap();
        assert_eq!(moved.student_id, other.id);
    }

    #[test]
    fn test_diet_totals_follow_every_write() {
        let (backend, _, student) = seeded();
        let plan = backend.upsert_diet(diet_for(&student.id)).unwrap();
        assert_eq!(plan.totals(), plan.computed_totals());
        assert_eq!(plan.total_calories, 640.0);

        // patch meals: drop the toast, eat a bigger salmon portion
        let mut meals = plan.meals.clone();
        meals[0].foods.remove(1);
        meals[1].foods[0].actual_calories = Some(400.0);
        meals[1].foods[0].completed = true;
        let updated = backend
            .update_diet(&plan.id, &json!({ "meals": meals }))
            .unwrap();
        assert_eq!(updated.total_calories, 580.0);
        assert_eq!(updated.total_protein, 49.0);
        assert_eq!(updated.totals(), updated.computed_totals());

        // stale totals sent by a client are overwritten
        let updated = backend
            .update_diet(&plan.id, &json!({"totalCalories": 1.0}))
            .unwrap();
        assert_eq!(updated.total_calories, 580.0);
    }

    #[test]
    fn test_progress_upsert_by_composite_key() {
        let (backend, _, student) = seeded();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let mut entry = DailyProgress::new(&student.id, date);
        entry.meals_completed = 1;
        backend.upsert_progress(entry.clone()).unwrap();

        entry.id = "client-made-up".to_string();
        entry.workout_completed = true;
        entry.meals_completed = 3;
        backend.upsert_progress(entry.clone()).unwrap();

        let next_day = DailyProgress::new(&student.id, date.succ_opt().unwrap());
        backend.upsert_progress(next_day).unwrap();

        let entries = backend.list_progress(&student.id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, date);
        assert!(entries[0].workout_completed);
        assert_eq!(entries[0].meals_completed, 3);
    }

    #[test]
    fn test_remove_student_does_not_cascade() {
        let (backend, trainer, student) = seeded();
        backend.upsert_workout(workout_for(&student.id, 1, 1)).unwrap();
        backend.remove_student(&student.id).unwrap();

        assert!(backend.list_students(&trainer.id).unwrap().is_empty());
        assert_eq!(backend.list_workouts(&student.id).unwrap().len(), 1);
        assert!(backend.remove_student(&student.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_media_lifecycle() {
        let (backend, _, student) = seeded();
        let media = backend
            .upsert_media(Media {
                id: String::new(),
                student_id: student.id.clone(),
                kind: crate::models::MediaKind::Photo,
                url: "https://cdn.example.com/front.jpg".to_string(),
                caption: Some("week 1".to_string()),
                created_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(backend.list_media(&student.id).unwrap(), vec![media.clone()]);
        backend.remove_media(&media.id).unwrap();
        assert!(backend.list_media(&student.id).unwrap().is_empty());
    }

    #[test]
    fn test_list_requires_owner() {
        let backend = backend();
        assert!(matches!(backend.list_workouts(" "), Err(CoachError::Validation(_))));
    }
}
