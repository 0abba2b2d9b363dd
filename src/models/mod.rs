//! Data model - users, students, plans, daily progress and media
//!
//! Every record is stored as a JSON document with camelCase fields.

pub mod diet;
pub mod workout;

use chrono::{DateTime, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoachError, Result};

pub use diet::{DietPlan, Direction, Food, Ingredient, Macros, Meal};
pub use workout::{Exercise, WorkoutPlan, WorkoutSet};

/// Document collections of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Students,
    Workouts,
    Diets,
    Progress,
    Media,
}

impl Collection {
    pub fn all() -> &'static [Collection] {
        &[
            Collection::Users,
            Collection::Students,
            Collection::Workouts,
            Collection::Diets,
            Collection::Progress,
            Collection::Media,
        ]
    }

    /// Name used for file keys, table rows and REST paths
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Students => "students",
            Collection::Workouts => "workouts",
            Collection::Diets => "diets",
            Collection::Progress => "progress",
            Collection::Media => "media",
        }
    }

    /// Field that links a document to its owner, used by `list`
    pub fn owner_field(&self) -> Option<&'static str> {
        match self {
            Collection::Users => None,
            Collection::Students => Some("trainerId"),
            Collection::Workouts
            | Collection::Diets
            | Collection::Progress
            | Collection::Media => Some("studentId"),
        }
    }

    /// Singular, human-readable record kind for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Students => "student",
            Collection::Workouts => "workout plan",
            Collection::Diets => "diet plan",
            Collection::Progress => "progress entry",
            Collection::Media => "media",
        }
    }
}

/// A record that lives in one store collection
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Shape checks beyond what deserialization already enforces
    fn validate(&self) -> Result<()>;

    /// Recompute derived fields before every write
    fn normalize(&mut self) {}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainer,
    Student,
}

/// User profile as seen by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    /// Student record owned by a student account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

/// Where a session was issued
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
    /// Local RPC server (or in-process backend)
    Local,
    /// Hosted REST store
    Cloud,
}

/// Authenticated session handed to clients after login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
    pub origin: SessionOrigin,
}

/// User as persisted, with credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(flatten)]
    pub profile: User,
    pub password_hash: String,
}

impl Entity for UserRecord {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.profile.id
    }

    fn set_id(&mut self, id: String) {
        self.profile.id = id;
    }

    fn validate(&self) -> Result<()> {
        require_id("user", &self.profile.id)?;
        if self.profile.username.trim().is_empty() {
            return Err(CoachError::validation("username must not be empty"));
        }
        if self.profile.role == Role::Student && self.profile.student_id.is_none() {
            return Err(CoachError::validation("student accounts need a studentId"));
        }
        Ok(())
    }
}

/// Student on a trainer's roster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub id: String,
    pub trainer_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entity for Student {
    const COLLECTION: Collection = Collection::Students;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        require_id("student", &self.id)?;
        require_id("trainerId", &self.trainer_id)?;
        if self.name.trim().is_empty() {
            return Err(CoachError::validation("student name must not be empty"));
        }
        Ok(())
    }
}

/// One day's completion summary for a student
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    /// Always `<studentId>:<date>`
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub workout_completed: bool,
    #[serde(default)]
    pub meals_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DailyProgress {
    pub fn new(student_id: &str, date: NaiveDate) -> Self {
        Self {
            id: Self::key(student_id, date),
            student_id: student_id.to_string(),
            date,
            workout_completed: false,
            meals_completed: 0,
            weight_kg: None,
            notes: None,
        }
    }

    /// Composite key: one record per (student, date)
    pub fn key(student_id: &str, date: NaiveDate) -> String {
        format!("{}:{}", student_id, date.format("%Y-%m-%d"))
    }
}

impl Entity for DailyProgress {
    const COLLECTION: Collection = Collection::Progress;

    fn id(&self) -> &str {
        &self.id
    }

    // The key is derived, an assigned id is ignored
    fn set_id(&mut self, _id: String) {
        self.normalize();
    }

    fn validate(&self) -> Result<()> {
        require_id("studentId", &self.student_id)?;
        if let Some(w) = self.weight_kg {
            if !(w.is_finite() && w > 0.0) {
                return Err(CoachError::validation("weightKg must be a positive number"));
            }
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.id = Self::key(&self.student_id, self.date);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

/// Progress photo or exercise video reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    #[serde(default)]
    pub id: String,
    pub student_id: String,
    pub kind: MediaKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Entity for Media {
    const COLLECTION: Collection = Collection::Media;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        require_id("media", &self.id)?;
        require_id("studentId", &self.student_id)?;
        if self.url.trim().is_empty() {
            return Err(CoachError::validation("media url must not be empty"));
        }
        Ok(())
    }
}

/// Generate a short random id with a readable prefix
pub fn new_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix.to_lowercase())
}

pub(crate) fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoachError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Merge top-level fields of `patch` into a JSON object.
///
/// The `id` field can't be changed through a patch.
pub fn merge_object(doc: &mut Value, patch: &Value) -> Result<()> {
    let patch = patch
        .as_object()
        .ok_or_else(|| CoachError::validation("patch must be a JSON object"))?;
    let target = doc
        .as_object_mut()
        .ok_or_else(|| CoachError::validation("stored record is not a JSON object"))?;

    if let Some(new_id) = patch.get("id") {
        if target.get("id") != Some(new_id) {
            return Err(CoachError::validation("id cannot be changed by an update"));
        }
    }

    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

/// Apply a partial update to a typed record, re-deriving and re-validating it
pub fn apply_patch<E: Entity>(current: &E, patch: &Value) -> Result<E> {
    let mut doc = serde_json::to_value(current)?;
    merge_object(&mut doc, patch)?;
    let mut merged: E = from_document(doc)?;
    merged.normalize();
    merged.validate()?;
    Ok(merged)
}

/// Decode a document, reporting shape problems as validation errors
pub fn from_document<E: DeserializeOwned>(doc: Value) -> Result<E> {
    serde_json::from_value(doc).map_err(|e| CoachError::validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_student() -> Student {
        Student {
            id: "s_1".to_string(),
            trainer_id: "t_1".to_string(),
            name: "Ana".to_string(),
            email: None,
            goal: Some("hypertrophy".to_string()),
            age: Some(27),
            height_cm: None,
            weight_kg: Some(61.5),
            photo_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_collection_owner_fields() {
        assert_eq!(Collection::Users.owner_field(), None);
        assert_eq!(Collection::Students.owner_field(), Some("trainerId"));
        assert_eq!(Collection::Diets.owner_field(), Some("studentId"));
    }

    #[test]
    fn test_student_camel_case() {
        let value = serde_json::to_value(create_student()).unwrap();
        assert_eq!(value["trainerId"], "t_1");
        assert_eq!(value["weightKg"], 61.5);
        assert!(value.get("email").is_none());
    }

    #[test]
    fn test_apply_patch_merges_fields() {
        let student = create_student();
        let patched = apply_patch(&student, &json!({"goal": "cutting", "email": "a@b.c"})).unwrap();
        assert_eq!(patched.goal.as_deref(), Some("cutting"));
        assert_eq!(patched.email.as_deref(), Some("a@b.c"));
        assert_eq!(patched.name, "Ana");
    }

    #[test]
    fn test_apply_patch_null_clears_optional() {
        let student = create_student();
        let patched = apply_patch(&student, &json!({"goal": null})).unwrap();
        assert!(patched.goal.is_none());
    }

    #[test]
    fn test_apply_patch_rejects_id_change() {
        let student = create_student();
        let err = apply_patch(&student, &json!({"id": "s_2"})).unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
    }

    #[test]
    fn test_apply_patch_rejects_bad_shape() {
        let student = create_student();
        assert!(apply_patch(&student, &json!(["not", "an", "object"])).is_err());
        assert!(apply_patch(&student, &json!({"age": "old"})).is_err());
    }

    #[test]
    fn test_progress_key_is_composite() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let mut entry = DailyProgress::new("s_1", date);
        entry.id = "whatever".to_string();
        entry.normalize();
        assert_eq!(entry.id, "s_1:2024-03-09");
    }

    #[test]
    fn test_user_record_flattens_profile() {
        let record = UserRecord {
            profile: User {
                id: "u_1".to_string(),
                username: "coach".to_string(),
                name: "Coach".to_string(),
                role: Role::Trainer,
                student_id: None,
            },
            password_hash: "hash".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["username"], "coach");
        assert_eq!(value["role"], "trainer");
        assert_eq!(value["passwordHash"], "hash");
    }

    #[test]
    fn test_new_id_has_prefix() {
        let id = new_id("w");
        assert!(id.starts_with("w_"));
        assert_eq!(id.len(), 14);
    }
}
