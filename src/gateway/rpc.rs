//! Gateway to the local typed RPC server

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{transport_error, DataGateway};
use crate::error::{CoachError, Result};
use crate::models::{DailyProgress, DietPlan, Media, Session, Student, User, WorkoutPlan};
use crate::rpc::{RpcCall, RpcResponse};

pub struct RpcGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl RpcGateway {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/rpc", base_url.trim_end_matches('/')),
        }
    }

    async fn call<T: DeserializeOwned>(&self, call: RpcCall) -> Result<T> {
        let method = call.method();
        debug!("RPC {}", method);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&call)
            .send()
            .await
            .map_err(|e| transport_error(&self.endpoint, e))?;
        let status = response.status();

        // Errors come back as JSON bodies too, so the status alone isn't enough
        let body: RpcResponse = response.json().await.map_err(|e| {
            warn!("{} returned a non-RPC body (status {}): {}", method, status, e);
            CoachError::BackendUnavailable("backend returned a non-JSON response".to_string())
        })?;
        let value = body.into_result()?;

        serde_json::from_value(value).map_err(|e| {
            warn!("{} returned an unexpected result shape: {}", method, e);
            CoachError::BackendUnavailable("backend returned an unexpected response".to_string())
        })
    }
}

#[async_trait]
impl DataGateway for RpcGateway {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn login(&self, username: &str, password: &str) -> Result<Session> {
        self.call(RpcCall::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let _: Value = self
            .call(RpcCall::Logout {
                token: token.to_string(),
            })
            .await?;
        Ok(())
    }

    async fn profile(&self, user_id: &str) -> Result<User> {
        self.call(RpcCall::GetUser {
            id: user_id.to_string(),
        })
        .await
    }

    async fn list_students(&self, trainer_id: &str) -> Result<Vec<Student>> {
        self.call(RpcCall::ListStudents {
            trainer_id: trainer_id.to_string(),
        })
        .await
    }

    async fn upsert_student(&self, student: Student) -> Result<Student> {
        self.call(RpcCall::UpsertStudent { student }).await
    }

    async fn update_student(&self, id: &str, patch: Value) -> Result<Student> {
        self.call(RpcCall::UpdateStudent {
            id: id.to_string(),
            patch,
        })
        .await
    }

    async fn remove_student(&self, id: &str) -> Result<()> {
        let _: Value = self.call(RpcCall::RemoveStudent { id: id.to_string() }).await?;
        Ok(())
    }

    async fn list_workouts(&self, student_id: &str) -> Result<Vec<WorkoutPlan>> {
        self.call(RpcCall::ListWorkouts {
            student_id: student_id.to_string(),
        })
        .await
    }

    async fn upsert_workout(&self, plan: WorkoutPlan) -> Result<WorkoutPlan> {
        self.call(RpcCall::UpsertWorkout { plan }).await
    }

    async fn update_workout(&self, id: &str, patch: Value) -> Result<WorkoutPlan> {
        self.call(RpcCall::UpdateWorkout {
            id: id.to_string(),
            patch,
        })
        .await
    }

    async fn remove_workout(&self, id: &str) -> Result<()> {
        let _: Value = self.call(RpcCall::RemoveWorkout { id: id.to_string() }).await?;
        Ok(())
    }

    async fn list_diets(&self, student_id: &str) -> Result<Vec<DietPlan>> {
        self.call(RpcCall::ListDiets {
            student_id: student_id.to_string(),
        })
        .await
    }

    async fn upsert_diet(&self, plan: DietPlan) -> Result<DietPlan> {
        self.call(RpcCall::UpsertDiet { plan }).await
    }

    async fn update_diet(&self, id: &str, patch: Value) -> Result<DietPlan> {
        self.call(RpcCall::UpdateDiet {
            id: id.to_string(),
            patch,
        })
        .await
    }

    async fn remove_diet(&self, id: &str) -> Result<()> {
        let _: Value = self.call(RpcCall::RemoveDiet { id: id.to_string() }).await?;
        Ok(())
    }

    async fn list_progress(&self, student_id: &str) -> Result<Vec<DailyProgress>> {
        self.call(RpcCall::ListProgress {
            student_id: student_id.to_string(),
        })
        .await
    }

    async fn upsert_progress(&self, entry: DailyProgress) -> Result<DailyProgress> {
        self.call(RpcCall::UpsertProgress { entry }).await
    }

    async fn list_media(&self, student_id: &str) -> Result<Vec<Media>> {
        self.call(RpcCall::ListMedia {
            student_id: student_id.to_string(),
        })
        .await
    }

    async fn upsert_media(&self, media: Media) -> Result<Media> {
        self.call(RpcCall::UpsertMedia { media }).await
    }

    async fn remove_media(&self, id: &str) -> Result<()> {
        let _: Value = self.call(RpcCall::RemoveMedia { id: id.to_string() }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{backend, diet_for, seed_trainer, student_for, workout_for};
    use crate::server::tests::spawn_server;
    use serde_json::json;

    #[tokio::test]
    async fn test_roundtrip_through_server() {
        let backend = backend();
        let trainer = seed_trainer(&backend);
        let url = spawn_server(backend).await;
        let gateway = RpcGateway::new(&url);

        let session = gateway.login("coach", "secret123").await.unwrap();
        assert_eq!(session.user, trainer);

        let student = gateway.upsert_student(student_for(&trainer.id, "Ana")).await.unwrap();
        let plan = gateway.upsert_workout(workout_for(&student.id, 3, 3)).await.unwrap();
        assert_eq!(gateway.list_workouts(&student.id).await.unwrap(), vec![plan]);

        let diet = gateway.upsert_diet(diet_for(&student.id)).await.unwrap();
        assert_eq!(gateway.list_diets(&student.id).await.unwrap(), vec![diet]);

        gateway.logout(&session.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_errors_keep_their_kind() {
        let backend = backend();
        seed_trainer(&backend);
        let url = spawn_server(backend).await;
        let gateway = RpcGateway::new(&url);

        assert!(matches!(
            gateway.login("coach", "nope-nope").await,
            Err(CoachError::InvalidCredentials)
        ));
        let err = gateway
            .update_workout("w_missing", json!({"name": "x"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            gateway.list_diets("").await,
            Err(CoachError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = RpcGateway::new(&format!("http://{}", addr));
        let err = gateway.list_students("u_1").await.unwrap_err();
        assert!(matches!(err, CoachError::BackendUnavailable(_)));
        assert!(err.to_string().starts_with("Backend unavailable"));
    }
}
