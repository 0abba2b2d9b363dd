//! In-process gateway - calls the backend directly on the blocking pool

use async_trait::async_trait;
use serde_json::Value;

use super::DataGateway;
use crate::backend::Backend;
use crate::error::{CoachError, Result};
use crate::models::{DailyProgress, DietPlan, Media, Session, Student, User, WorkoutPlan};

#[derive(Clone)]
pub struct LocalGateway {
    backend: Backend,
}

impl LocalGateway {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Backend) -> Result<T> + Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || f(&backend))
            .await
            .map_err(|e| CoachError::Storage(format!("backend task failed: {}", e)))?
    }
}

#[async_trait]
impl DataGateway for LocalGateway {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let (username, password) = (username.to_string(), password.to_string());
        self.run(move |b| b.login(&username, &password)).await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let token = token.to_string();
        self.run(move |b| b.logout(&token)).await
    }

    async fn profile(&self, user_id: &str) -> Result<User> {
        let id = user_id.to_string();
        self.run(move |b| b.get_user(&id)).await
    }

    async fn list_students(&self, trainer_id: &str) -> Result<Vec<Student>> {
        let id = trainer_id.to_string();
        self.run(move |b| b.list_students(&id)).await
    }

    async fn upsert_student(&self, student: Student) -> Result<Student> {
        self.run(move |b| b.upsert_student(student)).await
    }

    async fn update_student(&self, id: &str, patch: Value) -> Result<Student> {
        let id = id.to_string();
        self.run(move |b| b.update_student(&id, &patch)).await
    }

    async fn remove_student(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run(move |b| b.remove_student(&id)).await
    }

    async fn list_workouts(&self, student_id: &str) -> Result<Vec<WorkoutPlan>> {
        let id = student_id.to_string();
        self.run(move |b| b.list_workouts(&id)).await
    }

    async fn upsert_workout(&self, plan: WorkoutPlan) -> Result<WorkoutPlan> {
        self.run(move |b| b.upsert_workout(plan)).await
    }

    async fn update_workout(&self, id: &str, patch: Value) -> Result<WorkoutPlan> {
        let id = id.to_string();
        self.run(move |b| b.update_workout(&id, &patch)).await
    }

    async fn remove_workout(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run(move |b| b.remove_workout(&id)).await
    }

    async fn list_diets(&self, student_id: &str) -> Result<Vec<DietPlan>> {
        let id = student_id.to_string();
        self.run(move |b| b.list_diets(&id)).await
    }

    async fn upsert_diet(&self, plan: DietPlan) -> Result<DietPlan> {
        self.run(move |b| b.upsert_diet(plan)).await
    }

    async fn update_diet(&self, id: &str, patch: Value) -> Result<DietPlan> {
        let id = id.to_string();
        self.run(move |b| b.update_diet(&id, &patch)).await
    }

    async fn remove_diet(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run(move |b| b.remove_diet(&id)).await
    }

    async fn list_progress(&self, student_id: &str) -> Result<Vec<DailyProgress>> {
        let id = student_id.to_string();
        self.run(move |b| b.list_progress(&id)).await
    }

    async fn upsert_progress(&self, entry: DailyProgress) -> Result<DailyProgress> {
        self.run(move |b| b.upsert_progress(entry)).await
    }

    async fn list_media(&self, student_id: &str) -> Result<Vec<Media>> {
        let id = student_id.to_string();
        self.run(move |b| b.list_media(&id)).await
    }

    async fn upsert_media(&self, media: Media) -> Result<Media> {
        self.run(move |b| b.upsert_media(media)).await
    }

    async fn remove_media(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.run(move |b| b.remove_media(&id)).await
    }
}
