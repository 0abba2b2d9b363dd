//! Client state container
//!
//! Holds the signed-in user and the collections relevant to their role.
//! Every mutation goes through the gateway first, then the owning student's
//! collection is re-fetched and replaces local state, so the client always
//! shows what the backend stored rather than what it sent.

pub mod identity;

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{CoachError, Result};
use crate::gateway::{DataGateway, GatewayProvider};
use crate::models::{
    DailyProgress, DietPlan, Media, Role, Session, Student, User, WorkoutPlan,
};

pub use identity::IdentityCache;

/// Performed values for one workout set
#[derive(Debug, Clone, Default)]
pub struct SetLog {
    pub actual_reps: Option<u32>,
    pub actual_weight_kg: Option<f64>,
    pub completed: bool,
}

/// Consumed values for one food
#[derive(Debug, Clone, Default)]
pub struct FoodLog {
    pub actual_quantity: Option<f64>,
    pub actual_calories: Option<f64>,
    pub actual_protein: Option<f64>,
    pub actual_carbs: Option<f64>,
    pub actual_fat: Option<f64>,
    pub completed: bool,
}

pub struct ClientState {
    provider: Arc<dyn GatewayProvider>,
    gateway: Arc<dyn DataGateway>,
    identity: Option<IdentityCache>,
    session: Option<Session>,
    students: Vec<Student>,
    workouts: Vec<WorkoutPlan>,
    diets: Vec<DietPlan>,
    progress: Vec<DailyProgress>,
    media: Vec<Media>,
}

/// Log a failed mutation and hand the error back to the caller
fn logged<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        error!("{} failed: {}", operation, e);
    }
    result
}

impl ClientState {
    pub fn new(provider: Arc<dyn GatewayProvider>, identity: Option<IdentityCache>) -> Self {
        let gateway = provider.gateway_for(None);
        Self {
            provider,
            gateway,
            identity,
            session: None,
            students: Vec::new(),
            workouts: Vec::new(),
            diets: Vec::new(),
            progress: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn workouts(&self) -> &[WorkoutPlan] {
        &self.workouts
    }

    pub fn diets(&self) -> &[DietPlan] {
        &self.diets
    }

    pub fn progress(&self) -> &[DailyProgress] {
        &self.progress
    }

    pub fn media(&self) -> &[Media] {
        &self.media
    }

    pub fn workouts_for<'a>(&'a self, student_id: &'a str) -> impl Iterator<Item = &'a WorkoutPlan> {
        self.workouts.iter().filter(move |w| w.student_id == student_id)
    }

    pub fn diets_for<'a>(&'a self, student_id: &'a str) -> impl Iterator<Item = &'a DietPlan> {
        self.diets.iter().filter(move |d| d.student_id == student_id)
    }

    /// Name of the gateway currently in use
    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    // ================================
    // Session
    // ================================

    /// Sign in, persist the identity and load the user's collections
    pub async fn login(&mut self, username: &str, password: &str) -> Result<User> {
        let session = match self.gateway.login(username, password).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Login failed for '{}': {}", username, e);
                return Err(e);
            }
        };

        let gateway = self.provider.gateway_for(Some(&session));
        let user = gateway.profile(&session.user.id).await?;
        let session = Session {
            user: user.clone(),
            ..session
        };

        if let Some(cache) = &self.identity {
            if let Err(e) = cache.save(&session) {
                warn!("Could not persist identity: {}", e);
            }
        }
        info!("Signed in as '{}' ({:?}) via {}", user.username, user.role, gateway.name());

        self.gateway = gateway;
        self.session = Some(session);
        if let Err(e) = self.refresh().await {
            warn!("Could not load data after sign-in, signing out: {}", e);
            self.clear_local();
            return Err(e);
        }
        Ok(user)
    }

    /// Resume a persisted session.
    ///
    /// A rejected session is forgotten; a transport failure keeps it so the
    /// next refresh can retry.
    pub async fn restore(&mut self) -> Result<Option<User>> {
        let Some(cache) = &self.identity else {
            return Ok(None);
        };
        let Some(session) = cache.load()? else {
            return Ok(None);
        };

        self.gateway = self.provider.gateway_for(Some(&session));
        let user = session.user.clone();
        self.session = Some(session);
        info!("Restored session for '{}'", user.username);

        match self.refresh().await {
            Ok(()) => Ok(Some(user)),
            Err(CoachError::Unauthenticated) => {
                warn!("Stored session was rejected, signing out");
                self.clear_local();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Clears local state unconditionally, then reports the remote sign-out
    pub async fn logout(&mut self) -> Result<()> {
        let remote = match &self.session {
            Some(session) => self.gateway.logout(&session.token).await,
            None => Ok(()),
        };
        self.clear_local();
        info!("Signed out");
        logged("logout", remote)
    }

    fn clear_local(&mut self) {
        self.session = None;
        self.students.clear();
        self.workouts.clear();
        self.diets.clear();
        self.progress.clear();
        self.media.clear();
        if let Some(cache) = &self.identity {
            if let Err(e) = cache.clear() {
                warn!("Could not remove stored identity: {}", e);
            }
        }
        self.gateway = self.provider.gateway_for(None);
    }

    fn current_user(&self) -> Result<&User> {
        self.user().ok_or(CoachError::Unauthenticated)
    }

    fn require_role(&self, role: Role, action: &str) -> Result<&User> {
        let user = self.current_user()?;
        if user.role != role {
            return Err(CoachError::validation(format!(
                "only {:?} accounts can {}",
                role, action
            ).to_lowercase()));
        }
        Ok(user)
    }

    /// Reload everything relevant to the signed-in user
    pub async fn refresh(&mut self) -> Result<()> {
        let user = self.current_user()?.clone();
        match user.role {
            Role::Trainer => {
                self.students = self.gateway.list_students(&user.id).await?;
                self.workouts.clear();
                self.diets.clear();
                self.progress.clear();
                self.media.clear();
                let ids: Vec<String> = self.students.iter().map(|s| s.id.clone()).collect();
                for id in ids {
                    self.reload_student(&id).await?;
                }
            }
            Role::Student => {
                let student_id = user
                    .student_id
                    .clone()
                    .ok_or_else(|| CoachError::validation("student account has no student record"))?;
                self.students.clear();
                self.media.clear();
                self.reload_student(&student_id).await?;
            }
        }
        info!(
            "Loaded {} students, {} workout plans, {} diet plans",
            self.students.len(),
            self.workouts.len(),
            self.diets.len()
        );
        Ok(())
    }

    async fn reload_student(&mut self, student_id: &str) -> Result<()> {
        self.reload_workouts(student_id).await?;
        self.reload_diets(student_id).await?;
        self.reload_progress(student_id).await?;
        self.reload_media(student_id).await
    }

    async fn reload_students(&mut self, trainer_id: &str) -> Result<()> {
        self.students = self.gateway.list_students(trainer_id).await?;
        Ok(())
    }

    async fn reload_workouts(&mut self, student_id: &str) -> Result<()> {
        let fresh = self.gateway.list_workouts(student_id).await?;
        self.workouts.retain(|w| w.student_id != student_id);
        self.workouts.extend(fresh);
        Ok(())
    }

    async fn reload_diets(&mut self, student_id: &str) -> Result<()> {
        let fresh = self.gateway.list_diets(student_id).await?;
        self.diets.retain(|d| d.student_id != student_id);
        self.diets.extend(fresh);
        Ok(())
    }

    async fn reload_progress(&mut self, student_id: &str) -> Result<()> {
        let fresh = self.gateway.list_progress(student_id).await?;
        self.progress.retain(|p| p.student_id != student_id);
        self.progress.extend(fresh);
        Ok(())
    }

    async fn reload_media(&mut self, student_id: &str) -> Result<()> {
        let fresh = self.gateway.list_media(student_id).await?;
        self.media.retain(|m| m.student_id != student_id);
        self.media.extend(fresh);
        Ok(())
    }

    // ================================
    // Students (trainer)
    // ================================

    pub async fn add_student(&mut self, mut student: Student) -> Result<Student> {
        let result: Result<Student> = async {
            let trainer_id = self.require_role(Role::Trainer, "add students")?.id.clone();
            if student.trainer_id.is_empty() {
                student.trainer_id = trainer_id.clone();
            }
            info!("add_student '{}'", student.name);
            let stored = self.gateway.upsert_student(student).await?;
            self.reload_students(&trainer_id).await?;
            Ok(stored)
        }
        .await;
        logged("add_student", result)
    }

    pub async fn update_student(&mut self, id: &str, patch: Value) -> Result<Student> {
        let result: Result<Student> = async {
            let trainer_id = self.require_role(Role::Trainer, "edit students")?.id.clone();
            if !self.students.iter().any(|s| s.id == id) {
                return Err(CoachError::not_found("student", id));
            }
            info!("update_student {}", id);
            let stored = self.gateway.update_student(id, patch).await?;
            self.reload_students(&trainer_id).await?;
            Ok(stored)
        }
        .await;
        logged("update_student", result)
    }

    /// The student's plans stay in the backend; they are only dropped locally
    pub async fn remove_student(&mut self, id: &str) -> Result<()> {
        let result: Result<()> = async {
            let trainer_id = self.require_role(Role::Trainer, "remove students")?.id.clone();
            if !self.students.iter().any(|s| s.id == id) {
                return Err(CoachError::not_found("student", id));
            }
            info!("remove_student {}", id);
            self.gateway.remove_student(id).await?;
            self.reload_students(&trainer_id).await?;
            self.workouts.retain(|w| w.student_id != id);
            self.diets.retain(|d| d.student_id != id);
            self.progress.retain(|p| p.student_id != id);
            self.media.retain(|m| m.student_id != id);
            Ok(())
        }
        .await;
        logged("remove_student", result)
    }

    // ================================
    // Workout plans
    // ================================

    pub async fn add_workout_plan(&mut self, plan: WorkoutPlan) -> Result<WorkoutPlan> {
        let result: Result<WorkoutPlan> = async {
            self.require_role(Role::Trainer, "create workout plans")?;
            let student_id = plan.student_id.clone();
            info!("add_workout_plan '{}' for {}", plan.name, student_id);
            let stored = self.gateway.upsert_workout(plan).await?;
            self.reload_workouts(&student_id).await?;
            Ok(stored)
        }
        .await;
        logged("add_workout_plan", result)
    }

    /// Reassigning a plan to another student goes through delete and add
    fn ensure_same_owner(owner: &str, patch: &Value) -> Result<()> {
        match patch.get("studentId") {
            Some(Value::String(student_id)) if student_id != owner => Err(CoachError::validation(
                "a plan can't be moved to another student",
            )),
            _ => Ok(()),
        }
    }

    fn workout_owner(&self, id: &str) -> Result<String> {
        self.workouts
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.student_id.clone())
            .ok_or_else(|| CoachError::not_found("workout plan", id))
    }

    pub async fn update_workout_plan(&mut self, id: &str, patch: Value) -> Result<WorkoutPlan> {
        let result: Result<WorkoutPlan> = async {
            self.current_user()?;
            let student_id = self.workout_owner(id)?;
            Self::ensure_same_owner(&student_id, &patch)?;
            info!("update_workout_plan {}", id);
            let stored = self.gateway.update_workout(id, patch).await?;
            self.reload_workouts(&student_id).await?;
            Ok(stored)
        }
        .await;
        logged("update_workout_plan", result)
    }

    pub async fn delete_workout_plan(&mut self, id: &str) -> Result<()> {
        let result: Result<()> = async {
            self.require_role(Role::Trainer, "delete workout plans")?;
            let student_id = self.workout_owner(id)?;
            info!("delete_workout_plan {}", id);
            self.gateway.remove_workout(id).await?;
            self.reload_workouts(&student_id).await
        }
        .await;
        logged("delete_workout_plan", result)
    }

    /// Record what was actually performed for one set
    pub async fn log_set(
        &mut self,
        plan_id: &str,
        exercise: usize,
        set: usize,
        log: SetLog,
    ) -> Result<WorkoutPlan> {
        let mut exercises = self
            .workouts
            .iter()
            .find(|w| w.id == plan_id)
            .ok_or_else(|| CoachError::not_found("workout plan", plan_id))?
            .exercises
            .clone();
        let target = exercises
            .get_mut(exercise)
            .and_then(|e| e.sets.get_mut(set))
            .ok_or_else(|| CoachError::validation(format!("no set {} in exercise {}", set, exercise)))?;
        target.actual_reps = log.actual_reps;
        target.actual_weight_kg = log.actual_weight_kg;
        target.completed = log.completed;

        self.update_workout_plan(plan_id, json!({ "exercises": exercises })).await
    }

    // ================================
    // Diet plans
    // ================================

    pub async fn add_diet_plan(&mut self, plan: DietPlan) -> Result<DietPlan> {
        let result: Result<DietPlan> = async {
            self.require_role(Role::Trainer, "create diet plans")?;
            let student_id = plan.student_id.clone();
            info!("add_diet_plan '{}' for {}", plan.name, student_id);
            let stored = self.gateway.upsert_diet(plan).await?;
            self.reload_diets(&student_id).await?;
            Ok(stored)
        }
        .await;
        logged("add_diet_plan", result)
    }

    fn diet_owner(&self, id: &str) -> Result<String> {
        self.diets
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.student_id.clone())
            .ok_or_else(|| CoachError::not_found("diet plan", id))
    }

    pub async fn update_diet_plan(&mut self, id: &str, patch: Value) -> Result<DietPlan> {
        let result: Result<DietPlan> = async {
            self.current_user()?;
            let student_id = self.diet_owner(id)?;
            Self::ensure_same_owner(&student_id, &patch)?;
            info!("update_diet_plan {}", id);
            let stored = self.gateway.update_diet(id, patch).await?;
            self.reload_diets(&student_id).await?;
            Ok(stored)
        }
        .await;
        logged("update_diet_plan", result)
    }

    pub async fn delete_diet_plan(&mut self, id: &str) -> Result<()> {
        let result: Result<()> = async {
            self.require_role(Role::Trainer, "delete diet plans")?;
            let student_id = self.diet_owner(id)?;
            info!("delete_diet_plan {}", id);
            self.gateway.remove_diet(id).await?;
            self.reload_diets(&student_id).await
        }
        .await;
        logged("delete_diet_plan", result)
    }

    /// Record what was actually eaten for one food
    pub async fn log_food(
        &mut self,
        plan_id: &str,
        meal: usize,
        food: usize,
        log: FoodLog,
    ) -> Result<DietPlan> {
        let mut meals = self
            .diets
            .iter()
            .find(|d| d.id == plan_id)
            .ok_or_else(|| CoachError::not_found("diet plan", plan_id))?
            .meals
            .clone();
        let target = meals
            .get_mut(meal)
            .and_then(|m| m.foods.get_mut(food))
            .ok_or_else(|| CoachError::validation(format!("no food {} in meal {}", food, meal)))?;
        target.actual_quantity = log.actual_quantity;
        target.actual_calories = log.actual_calories;
        target.actual_protein = log.actual_protein;
        target.actual_carbs = log.actual_carbs;
        target.actual_fat = log.actual_fat;
        target.completed = log.completed;

        self.update_diet_plan(plan_id, json!({ "meals": meals })).await
    }

    // ================================
    // Progress and media (student)
    // ================================

    /// Upsert the signed-in student's entry for `entry.date`
    pub async fn update_progress(&mut self, mut entry: DailyProgress) -> Result<DailyProgress> {
        let result: Result<DailyProgress> = async {
            let student_id = self
                .require_role(Role::Student, "log progress")?
                .student_id
                .clone()
                .ok_or_else(|| CoachError::validation("student account has no student record"))?;
            if entry.student_id.is_empty() {
                entry.student_id = student_id.clone();
            }
            if entry.student_id != student_id {
                return Err(CoachError::validation("progress can only be logged for yourself"));
            }
            info!("update_progress {} {}", student_id, entry.date);
            let stored = self.gateway.upsert_progress(entry).await?;
            self.reload_progress(&student_id).await?;
            Ok(stored)
        }
        .await;
        logged("update_progress", result)
    }

    pub async fn add_media(&mut self, media: Media) -> Result<Media> {
        let result: Result<Media> = async {
            self.current_user()?;
            let student_id = media.student_id.clone();
            info!("add_media {:?} for {}", media.kind, student_id);
            let stored = self.gateway.upsert_media(media).await?;
            self.reload_media(&student_id).await?;
            Ok(stored)
        }
        .await;
        logged("add_media", result)
    }

    pub async fn delete_media(&mut self, id: &str) -> Result<()> {
        let result: Result<()> = async {
            self.current_user()?;
            let student_id = self
                .media
                .iter()
                .find(|m| m.id == id)
                .map(|m| m.student_id.clone())
                .ok_or_else(|| CoachError::not_found("media", id))?;
            info!("delete_media {}", id);
            self.gateway.remove_media(id).await?;
            self.reload_media(&student_id).await
        }
        .await;
        logged("delete_media", result)
    }
}
