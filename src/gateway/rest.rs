//! Gateway to a hosted REST data store (PostgREST-style API)
//!
//! Rows are filtered with `?field=eq.value`, writes ask for the affected rows
//! back with `Prefer: return=representation`. Derived fields (diet totals,
//! progress keys) are computed here because the store won't do it.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{transport_error, DataGateway};
use crate::config::CloudConfig;
use crate::error::{CoachError, Result};
use crate::models::{
    apply_patch, from_document, new_id, Collection, DailyProgress, DietPlan, Entity, Media,
    Session, SessionOrigin, Student, User, WorkoutPlan,
};

pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
}

impl RestGateway {
    pub fn new(cloud: &CloudConfig, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), cloud, token)
    }

    pub fn with_client(client: reqwest::Client, cloud: &CloudConfig, token: Option<String>) -> Self {
        Self {
            client,
            base_url: cloud.url.trim_end_matches('/').to_string(),
            api_key: cloud.api_key.clone(),
            token,
        }
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.name())
    }

    /// Signed-out requests authenticate with the API key alone
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder, target: &str) -> Result<Value> {
        let response = builder.send().await.map_err(|e| transport_error(target, e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error(target, e))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            warn!("Non-JSON response from {}: {}", target, e);
            CoachError::BackendUnavailable("backend returned a non-JSON response".to_string())
        })
    }

    async fn select<E: Entity>(&self, field: &str, value: &str) -> Result<Vec<E>> {
        let url = self.table_url(E::COLLECTION);
        let builder = self
            .request(Method::GET, &url)
            .query(&[(field, format!("eq.{}", value))]);
        rows(self.send(builder, &url).await?)
    }

    async fn insert<E: Entity>(&self, mut entity: E, id_prefix: &str) -> Result<E> {
        if entity.id().trim().is_empty() {
            entity.set_id(new_id(id_prefix));
        }
        entity.normalize();
        entity.validate()?;

        let url = self.table_url(E::COLLECTION);
        let builder = self
            .request(Method::POST, &url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&entity);
        let stored: Vec<E> = rows(self.send(builder, &url).await?)?;
        debug!("Upserted {} {} in cloud store", E::COLLECTION.kind(), entity.id());
        Ok(stored.into_iter().next().unwrap_or(entity))
    }

    /// Merge locally so derived fields stay consistent, then PATCH the result
    async fn update<E: Entity>(&self, id: &str, patch: Value) -> Result<E> {
        let current: E = self
            .select("id", id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoachError::not_found(E::COLLECTION.kind(), id))?;
        let merged = apply_patch(&current, &patch)?;

        let url = self.table_url(E::COLLECTION);
        let builder = self
            .request(Method::PATCH, &url)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&merged);
        let updated: Vec<E> = rows(self.send(builder, &url).await?)?;
        // Empty representation: the row vanished between our read and write
        updated
            .into_iter()
            .next()
            .ok_or_else(|| CoachError::not_found(E::COLLECTION.kind(), id))
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<()> {
        let url = self.table_url(E::COLLECTION);
        let builder = self
            .request(Method::DELETE, &url)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let deleted: Vec<Value> = rows(self.send(builder, &url).await?)?;
        if deleted.is_empty() {
            return Err(CoachError::not_found(E::COLLECTION.kind(), id));
        }
        Ok(())
    }
}

fn rows<E: serde::de::DeserializeOwned>(value: Value) -> Result<Vec<E>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.into_iter().map(from_document).collect(),
        other => Err(CoachError::BackendUnavailable(format!(
            "expected a list of rows, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn status_error(status: StatusCode, body: &str) -> CoachError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoachError::Unauthenticated,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            CoachError::Validation(message)
        }
        _ => {
            warn!("Cloud store answered {}: {}", status, message);
            CoachError::BackendUnavailable(format!("cloud store answered {}", status))
        }
    }
}

#[async_trait]
impl DataGateway for RestGateway {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&json!({"email": username, "password": password}))
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(CoachError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(status_error(status, &response.text().await.unwrap_or_default()));
        }
        let token: TokenResponse = response.json().await.map_err(|e| {
            warn!("Unexpected token response: {}", e);
            CoachError::BackendUnavailable("backend returned an unexpected response".to_string())
        })?;

        // Profiles are readable with the fresh token only
        let authed = RestGateway {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: Some(token.access_token.clone()),
        };
        let user = authed.profile(&token.user.id).await?;
        info!("Signed in to cloud store as '{}'", user.username);

        Ok(Session {
            token: token.access_token,
            user,
            origin: SessionOrigin::Cloud,
        })
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let builder = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(token);
        self.send(builder, &url).await?;
        Ok(())
    }

    async fn profile(&self, user_id: &str) -> Result<User> {
        let url = self.table_url(Collection::Users);
        let builder = self
            .request(Method::GET, &url)
            .query(&[("id", format!("eq.{}", user_id))]);
        let users: Vec<User> = rows(self.send(builder, &url).await?)?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| CoachError::not_found(Collection::Users.kind(), user_id))
    }

    async fn list_students(&self, trainer_id: &str) -> Result<Vec<Student>> {
        self.select("trainerId", trainer_id).await
    }

    async fn upsert_student(&self, student: Student) -> Result<Student> {
        self.insert(student, "s").await
    }

    async fn update_student(&self, id: &str, patch: Value) -> Result<Student> {
        self.update(id, patch).await
    }

    async fn remove_student(&self, id: &str) -> Result<()> {
        self.delete::<Student>(id).await
    }

    async fn list_workouts(&self, student_id: &str) -> Result<Vec<WorkoutPlan>> {
        self.select("studentId", student_id).await
    }

    async fn upsert_workout(&self, plan: WorkoutPlan) -> Result<WorkoutPlan> {
        self.insert(plan, "w").await
    }

    async fn update_workout(&self, id: &str, patch: Value) -> Result<WorkoutPlan> {
        self.update(id, patch).await
    }

    async fn remove_workout(&self, id: &str) -> Result<()> {
        self.delete::<WorkoutPlan>(id).await
    }

    async fn list_diets(&self, student_id: &str) -> Result<Vec<DietPlan>> {
        self.select("studentId", student_id).await
    }

    async fn upsert_diet(&self, plan: DietPlan) -> Result<DietPlan> {
        self.insert(plan, "d").await
    }

    async fn update_diet(&self, id: &str, patch: Value) -> Result<DietPlan> {
        self.update(id, patch).await
    }

    async fn remove_diet(&self, id: &str) -> Result<()> {
        self.delete::<DietPlan>(id).await
    }

    async fn list_progress(&self, student_id: &str) -> Result<Vec<DailyProgress>> {
        let mut entries: Vec<DailyProgress> = self.select("studentId", student_id).await?;
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    async fn upsert_progress(&self, entry: DailyProgress) -> Result<DailyProgress> {
        self.insert(entry, "p").await
    }

    async fn list_media(&self, student_id: &str) -> Result<Vec<Media>> {
        self.select("studentId", student_id).await
    }

    async fn upsert_media(&self, media: Media) -> Result<Media> {
        self.insert(media, "m").await
    }

    async fn remove_media(&self, id: &str) -> Result<()> {
        self.delete::<Media>(id).await
    }
}
