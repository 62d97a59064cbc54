//! Batch engine: session registry and per-session serialization
//!
//! Operations for one session never interleave; batches for distinct
//! sessions run concurrently.

use action_locator::Locator;
use action_primitives::ActionPrimitives;
use cartpilot_core_types::{CartItemRequest, Platform, SessionId};
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    errors::FlowError,
    executor::CartOrchestrator,
    recovery::RecoveryStrategy,
    types::{OperationOutcome, OrchestratorConfig},
};

/// A registered browser session
#[derive(Clone)]
struct SessionSlot {
    platform: Platform,
    primitives: Arc<dyn ActionPrimitives>,
    /// Held for the whole batch
    guard: Arc<Mutex<()>>,
}

/// One session's batch for `run_batches`
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub session_id: SessionId,
    pub requests: Vec<CartItemRequest>,
    pub config: OrchestratorConfig,
    pub cancel: CancellationToken,
}

impl BatchJob {
    pub fn new(
        session_id: SessionId,
        requests: Vec<CartItemRequest>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session_id,
            requests,
            config,
            cancel: CancellationToken::new(),
        }
    }
}

/// Entry point for running cart batches against registered sessions
#[derive(Clone)]
pub struct CartEngine {
    locator: Arc<dyn Locator>,
    recovery: Option<Arc<dyn RecoveryStrategy>>,
    sessions: Arc<DashMap<SessionId, SessionSlot>>,
}

impl CartEngine {
    pub fn new(locator: Arc<dyn Locator>) -> Self {
        Self {
            locator,
            recovery: None,
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn with_recovery(mut self, strategy: Arc<dyn RecoveryStrategy>) -> Self {
        self.recovery = Some(strategy);
        self
    }

    /// Register a session bound to one platform
    pub fn register_session(
        &self,
        session_id: SessionId,
        platform: Platform,
        primitives: Arc<dyn ActionPrimitives>,
    ) -> Result<(), FlowError> {
        if self.locator.profile(&platform).is_none() {
            return Err(FlowError::UnknownPlatform(platform.to_string()));
        }
        info!(session = %session_id, platform = %platform, "Session registered");
        self.sessions.insert(
            session_id,
            SessionSlot {
                platform,
                primitives,
                guard: Arc::new(Mutex::new(())),
            },
        );
        Ok(())
    }

    pub fn remove_session(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Run a batch to completion without external cancellation
    pub async fn run_batch(
        &self,
        session_id: &SessionId,
        requests: &[CartItemRequest],
        config: &OrchestratorConfig,
    ) -> Result<Vec<OperationOutcome>, FlowError> {
        self.run_batch_with_cancel(session_id, requests, config, CancellationToken::new())
            .await
    }

    /// Run a batch; `cancel` is checked between items
    pub async fn run_batch_with_cancel(
        &self,
        session_id: &SessionId,
        requests: &[CartItemRequest],
        config: &OrchestratorConfig,
        cancel: CancellationToken,
    ) -> Result<Vec<OperationOutcome>, FlowError> {
        config.validate()?;
        for request in requests {
            request.validate()?;
        }

        // Clone out of the map so no shard lock is held across an await
        let slot = self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FlowError::UnknownSession(session_id.to_string()))?;

        let orchestrator = CartOrchestrator::new(
            session_id.clone(),
            slot.primitives.clone(),
            self.locator.clone(),
            slot.platform.clone(),
            config.clone(),
        )?
        .with_recovery(self.recovery.clone());

        debug!(session = %session_id, "Waiting for session guard");
        let _guard = slot.guard.lock().await;
        Ok(orchestrator.run_batch(requests, &cancel).await)
    }

    /// Run batches for several sessions concurrently
    pub async fn run_batches(
        &self,
        jobs: Vec<BatchJob>,
    ) -> Vec<(SessionId, Result<Vec<OperationOutcome>, FlowError>)> {
        let runs = jobs.into_iter().map(|job| async move {
            let result = self
                .run_batch_with_cancel(&job.session_id, &job.requests, &job.config, job.cancel)
                .await;
            (job.session_id, result)
        });
        join_all(runs).await
    }
}
