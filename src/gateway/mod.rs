//! Remote data gateway - one storage port, several transports
//!
//! - `LocalGateway`: in-process backend
//! - `RpcGateway`: local typed RPC server over HTTP
//! - `RestGateway`: hosted REST store with bearer-token auth
//!
//! A `GatewayProvider` picks the implementation whenever the session
//! changes; call sites never branch on the transport.

pub mod local;
pub mod rest;
pub mod rpc;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{CloudConfig, Config};
use crate::error::{CoachError, Result};
use crate::models::{
    DailyProgress, DietPlan, Media, Session, SessionOrigin, Student, User, WorkoutPlan,
};

pub use local::LocalGateway;
pub use rest::RestGateway;
pub use rpc::RpcGateway;

/// Storage port used by the client state container
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Short transport name for logs
    fn name(&self) -> &'static str;

    async fn login(&self, username: &str, password: &str) -> Result<Session>;
    async fn logout(&self, token: &str) -> Result<()>;
    async fn profile(&self, user_id: &str) -> Result<User>;

    async fn list_students(&self, trainer_id: &str) -> Result<Vec<Student>>;
    async fn upsert_student(&self, student: Student) -> Result<Student>;
    async fn update_student(&self, id: &str, patch: Value) -> Result<Student>;
    async fn remove_student(&self, id: &str) -> Result<()>;

    async fn list_workouts(&self, student_id: &str) -> Result<Vec<WorkoutPlan>>;
    async fn upsert_workout(&self, plan: WorkoutPlan) -> Result<WorkoutPlan>;
    async fn update_workout(&self, id: &str, patch: Value) -> Result<WorkoutPlan>;
    async fn remove_workout(&self, id: &str) -> Result<()>;

    async fn list_diets(&self, student_id: &str) -> Result<Vec<DietPlan>>;
    async fn upsert_diet(&self, plan: DietPlan) -> Result<DietPlan>;
    async fn update_diet(&self, id: &str, patch: Value) -> Result<DietPlan>;
    async fn remove_diet(&self, id: &str) -> Result<()>;

    async fn list_progress(&self, student_id: &str) -> Result<Vec<DailyProgress>>;
    async fn upsert_progress(&self, entry: DailyProgress) -> Result<DailyProgress>;

    async fn list_media(&self, student_id: &str) -> Result<Vec<Media>>;
    async fn upsert_media(&self, media: Media) -> Result<Media>;
    async fn remove_media(&self, id: &str) -> Result<()>;
}

/// Chooses the gateway for a session state
pub trait GatewayProvider: Send + Sync {
    /// `None` = signed out; the returned gateway must at least support `login`
    fn gateway_for(&self, session: Option<&Session>) -> Arc<dyn DataGateway>;
}

/// Always the same gateway, whatever the session
pub struct StaticProvider {
    gateway: Arc<dyn DataGateway>,
}

impl StaticProvider {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }
}

impl GatewayProvider for StaticProvider {
    fn gateway_for(&self, _session: Option<&Session>) -> Arc<dyn DataGateway> {
        Arc::clone(&self.gateway)
    }
}

/// Cloud REST store for cloud sessions, local RPC server otherwise
pub struct ConfiguredProvider {
    client: reqwest::Client,
    rpc: Arc<RpcGateway>,
    cloud: Option<CloudConfig>,
}

impl ConfiguredProvider {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::new();
        Self {
            rpc: Arc::new(RpcGateway::with_client(client.clone(), &config.rpc_url)),
            cloud: config.cloud.clone(),
            client,
        }
    }
}

impl GatewayProvider for ConfiguredProvider {
    fn gateway_for(&self, session: Option<&Session>) -> Arc<dyn DataGateway> {
        let gateway: Arc<dyn DataGateway> = match (&self.cloud, session) {
            // signed out: sign in against the cloud when it's configured
            (Some(cloud), None) => Arc::new(RestGateway::with_client(self.client.clone(), cloud, None)),
            (Some(cloud), Some(s)) if s.origin == SessionOrigin::Cloud => Arc::new(
                RestGateway::with_client(self.client.clone(), cloud, Some(s.token.clone())),
            ),
            _ => self.rpc.clone(),
        };
        info!("Using {} gateway", gateway.name());
        gateway
    }
}

/// Wrap any transport failure; the cause only goes to the log
pub(crate) fn transport_error(target: &str, err: reqwest::Error) -> CoachError {
    warn!("Request to {} failed: {}", target, err);
    CoachError::BackendUnavailable(format!("could not reach {}", target))
}
