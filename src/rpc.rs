//! Typed RPC protocol shared by the server and `RpcGateway`
//!
//! Request:  `{"method": "workouts.update", "params": {"id": "...", "patch": {...}}}`
//! Response: `{"result": ...}` or `{"error": {"code": "...", "message": "..."}}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Backend;
use crate::error::{CoachError, Result};
use crate::models::{DailyProgress, DietPlan, Media, Student, WorkoutPlan};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RpcCall {
    #[serde(rename = "auth.login")]
    Login { username: String, password: String },
    #[serde(rename = "auth.logout")]
    Logout { token: String },
    #[serde(rename = "auth.me")]
    Me { token: String },
    #[serde(rename = "users.get")]
    GetUser { id: String },

    #[serde(rename = "students.listByTrainer", rename_all = "camelCase")]
    ListStudents { trainer_id: String },
    #[serde(rename = "students.get")]
    GetStudent { id: String },
    #[serde(rename = "students.upsert")]
    UpsertStudent { student: Student },
    #[serde(rename = "students.update")]
    UpdateStudent { id: String, patch: Value },
    #[serde(rename = "students.remove")]
    RemoveStudent { id: String },

    #[serde(rename = "workouts.listByStudent", rename_all = "camelCase")]
    ListWorkouts { student_id: String },
    #[serde(rename = "workouts.upsert")]
    UpsertWorkout { plan: WorkoutPlan },
    #[serde(rename = "workouts.update")]
    UpdateWorkout { id: String, patch: Value },
    #[serde(rename = "workouts.remove")]
    RemoveWorkout { id: String },

    #[serde(rename = "diets.listByStudent", rename_all = "camelCase")]
    ListDiets { student_id: String },
    #[serde(rename = "diets.upsert")]
    UpsertDiet { plan: DietPlan },
    #[serde(rename = "diets.update")]
    UpdateDiet { id: String, patch: Value },
    #[serde(rename = "diets.remove")]
    RemoveDiet { id: String },

    #[serde(rename = "progress.listByStudent", rename_all = "camelCase")]
    ListProgress { student_id: String },
    #[serde(rename = "progress.upsert")]
    UpsertProgress { entry: DailyProgress },

    #[serde(rename = "media.listByStudent", rename_all = "camelCase")]
    ListMedia { student_id: String },
    #[serde(rename = "media.upsert")]
    UpsertMedia { media: Media },
    #[serde(rename = "media.remove")]
    RemoveMedia { id: String },
}

impl RpcCall {
    /// Method name for logs; never includes parameters (passwords, tokens)
    pub fn method(&self) -> &'static str {
        match self {
            RpcCall::Login { .. } => "auth.login",
            RpcCall::Logout { .. } => "auth.logout",
            RpcCall::Me { .. } => "auth.me",
            RpcCall::GetUser { .. } => "users.get",
            RpcCall::ListStudents { .. } => "students.listByTrainer",
            RpcCall::GetStudent { .. } => "students.get",
            RpcCall::UpsertStudent { .. } => "students.upsert",
            RpcCall::UpdateStudent { .. } => "students.update",
            RpcCall::RemoveStudent { .. } => "students.remove",
            RpcCall::ListWorkouts { .. } => "workouts.listByStudent",
            RpcCall::UpsertWorkout { .. } => "workouts.upsert",
            RpcCall::UpdateWorkout { .. } => "workouts.update",
            RpcCall::RemoveWorkout { .. } => "workouts.remove",
            RpcCall::ListDiets { .. } => "diets.listByStudent",
            RpcCall::UpsertDiet { .. } => "diets.upsert",
            RpcCall::UpdateDiet { .. } => "diets.update",
            RpcCall::RemoveDiet { .. } => "diets.remove",
            RpcCall::ListProgress { .. } => "progress.listByStudent",
            RpcCall::UpsertProgress { .. } => "progress.upsert",
            RpcCall::ListMedia { .. } => "media.listByStudent",
            RpcCall::UpsertMedia { .. } => "media.upsert",
            RpcCall::RemoveMedia { .. } => "media.remove",
        }
    }

    /// Parse a request body; shape errors become validation errors
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| CoachError::validation(e.to_string()))
    }

    /// Run the call against the backend and serialize its result
    pub fn execute(self, backend: &Backend) -> Result<Value> {
        let value = match self {
            RpcCall::Login { username, password } => to_json(backend.login(&username, &password)?)?,
            RpcCall::Logout { token } => to_json(backend.logout(&token)?)?,
            RpcCall::Me { token } => to_json(backend.session_user(&token)?)?,
            RpcCall::GetUser { id } => to_json(backend.get_user(&id)?)?,

            RpcCall::ListStudents { trainer_id } => to_json(backend.list_students(&trainer_id)?)?,
            RpcCall::GetStudent { id } => to_json(backend.get_student(&id)?)?,
            RpcCall::UpsertStudent { student } => to_json(backend.upsert_student(student)?)?,
            RpcCall::UpdateStudent { id, patch } => to_json(backend.update_student(&id, &patch)?)?,
            RpcCall::RemoveStudent { id } => to_json(backend.remove_student(&id)?)?,

            RpcCall::ListWorkouts { student_id } => to_json(backend.list_workouts(&student_id)?)?,
            RpcCall::UpsertWorkout { plan } => to_json(backend.upsert_workout(plan)?)?,
            RpcCall::UpdateWorkout { id, patch } => to_json(backend.update_workout(&id, &patch)?)?,
            RpcCall::RemoveWorkout { id } => to_json(backend.remove_workout(&id)?)?,

            RpcCall::ListDiets { student_id } => to_json(backend.list_diets(&student_id)?)?,
            RpcCall::UpsertDiet { plan } => to_json(backend.upsert_diet(plan)?)?,
            RpcCall::UpdateDiet { id, patch } => to_json(backend.update_diet(&id, &patch)?)?,
            RpcCall::RemoveDiet { id } => to_json(backend.remove_diet(&id)?)?,

            RpcCall::ListProgress { student_id } => to_json(backend.list_progress(&student_id)?)?,
            RpcCall::UpsertProgress { entry } => to_json(backend.upsert_progress(entry)?)?,

            RpcCall::ListMedia { student_id } => to_json(backend.list_media(&student_id)?)?,
            RpcCall::UpsertMedia { media } => to_json(backend.upsert_media(media)?)?,
            RpcCall::RemoveMedia { id } => to_json(backend.remove_media(&id)?)?,
        };
        Ok(value)
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RpcResponse {
    Result(Value),
    Error(RpcError),
}

impl RpcResponse {
    pub fn from_outcome(outcome: Result<Value>) -> Self {
        match outcome {
            Ok(value) => RpcResponse::Result(value),
            Err(err) => RpcResponse::Error(RpcError {
                code: err.code().to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            RpcResponse::Result(value) => Ok(value),
            RpcResponse::Error(err) => Err(CoachError::from_wire(&err.code, &err.message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{backend, seed_trainer, student_for};
    use serde_json::json;

    #[test]
    fn test_call_wire_format() {
        let call = RpcCall::ListWorkouts {
            student_id: "s_1".to_string(),
        };
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(
            value,
            json!({"method": "workouts.listByStudent", "params": {"studentId": "s_1"}})
        );
        assert_eq!(call.method(), "workouts.listByStudent");
    }

    #[test]
    fn test_parse_rejects_unknown_method_and_bad_params() {
        let err = RpcCall::parse(r#"{"method": "workouts.drop", "params": {}}"#).unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
        let err =
            RpcCall::parse(r#"{"method": "workouts.listByStudent", "params": {"id": 1}}"#).unwrap_err();
        assert!(matches!(err, CoachError::Validation(_)));
    }

    #[test]
    fn test_execute_upsert_and_list() {
        let backend = backend();
        let trainer = seed_trainer(&backend);
        let upsert = RpcCall::UpsertStudent {
            student: student_for(&trainer.id, "Ana"),
        };
        let stored = upsert.execute(&backend).unwrap();
        let list = RpcCall::ListStudents {
            trainer_id: trainer.id.clone(),
        }
        .execute(&backend)
        .unwrap();
        assert_eq!(list, json!([stored]));
    }

    #[test]
    fn test_response_roundtrip_error() {
        let response = RpcResponse::from_outcome(Err(CoachError::not_found("diet plan", "d_9")));
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["error"]["code"], "RESOURCE_NOT_FOUND");
        let back: RpcResponse = serde_json::from_value(wire).unwrap();
        assert!(back.into_result().unwrap_err().is_not_found());
    }

    #[test]
    fn test_response_result_shape() {
        let response = RpcResponse::from_outcome(Ok(json!([1, 2])));
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({"result": [1, 2]}));
    }
}
