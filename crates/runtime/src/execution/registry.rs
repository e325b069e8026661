//! Backend registry: owns every registered execution backend and its
//! circuit breaker, and routes tasks through the [`ProviderRouter`]
//! (spec §4.7).
//!
//! Grounded on the teacher's `routing/engine.rs` registry-plus-engine
//! split and its `Arc<RwLock<HashMap<...>>>` storage idiom.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::CircuitBreakerDefaults;
use crate::execution::backend::{ExecutionBackend, ExecutionTask, Handle};
use crate::execution::circuit_breaker::CircuitBreaker;
use crate::execution::router::{Candidate, ProviderRouter, RoutingConstraints};
use crate::types::{FailureClassification, RoutingError, RuntimeError, RuntimeResult};

struct Entry {
    backend: Arc<dyn ExecutionBackend>,
    breaker: Arc<CircuitBreaker>,
    priority: i32,
}

/// Owns every registered backend and dispatches work to the one the
/// router selects.
pub struct BackendRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    router: ProviderRouter,
    breaker_defaults: CircuitBreakerDefaults,
}

impl BackendRegistry {
    pub fn new(breaker_defaults: CircuitBreakerDefaults) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            router: ProviderRouter::new(),
            breaker_defaults,
        }
    }

    pub async fn register(&self, backend: Arc<dyn ExecutionBackend>, priority: i32) -> RuntimeResult<()> {
        backend.start().await?;
        let backend_id = backend.backend_id().to_string();
        self.entries.write().await.insert(
            backend_id,
            Entry {
                backend,
                breaker: Arc::new(CircuitBreaker::new(self.breaker_defaults)),
                priority,
            },
        );
        Ok(())
    }

    pub async fn unregister(&self, backend_id: &str) -> RuntimeResult<()> {
        let entry = self.entries.write().await.remove(backend_id);
        if let Some(entry) = entry {
            entry.backend.stop().await?;
        }
        Ok(())
    }

    /// Route `task` to an eligible backend and dispatch it, recording
    /// the dispatch outcome on that backend's circuit breaker.
    pub async fn route_task(
        &self,
        task: ExecutionTask,
        constraints: RoutingConstraints,
    ) -> RuntimeResult<Handle> {
        let entries = self.entries.read().await;

        let mut candidates = Vec::with_capacity(entries.len());
        for (backend_id, entry) in entries.iter() {
            candidates.push(Candidate {
                backend_id: backend_id.clone(),
                goal_types: entry.backend.capabilities().goal_types,
                priority: entry.priority,
                circuit_allowed: entry.breaker.allow().await,
            });
        }

        let chosen = self
            .router
            .select(&task.goal_type, &candidates, &constraints)
            .cloned();

        let Some(chosen) = chosen else {
            return Err(RoutingError::NoBackendAvailable {
                goal_type: task.goal_type,
            }
            .into());
        };

        let entry = entries
            .get(&chosen.backend_id)
            .ok_or_else(|| RoutingError::UnknownBackend {
                provider_id: chosen.backend_id.clone(),
            })?;

        self.router.record_route(&chosen.backend_id).await;

        let result = entry.backend.execute_task(task).await;
        match &result {
            Ok(_) => entry.breaker.record_outcome(true, None).await,
            Err(RuntimeError::Backend(backend_err)) => {
                entry
                    .breaker
                    .record_outcome(false, backend_err.classification())
                    .await;
            }
            Err(_) => {
                entry
                    .breaker
                    .record_outcome(false, Some(FailureClassification::Transient))
                    .await;
            }
        }
        result
    }

    pub async fn circuit_state(&self, backend_id: &str) -> Option<crate::execution::circuit_breaker::CircuitState> {
        let entries = self.entries.read().await;
        let entry = entries.get(backend_id)?;
        Some(entry.breaker.get_state().await)
    }

    pub async fn stop_all(&self) -> RuntimeResult<()> {
        let backend_ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        for backend_id in backend_ids {
            self.unregister(&backend_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::backend::{Capabilities, OutputEvent, TaskResult};
    use async_trait::async_trait;
    use tokio::sync::{mpsc, oneshot};

    struct StubBackend {
        id: String,
        goal_types: Vec<String>,
    }

    #[async_trait]
    impl ExecutionBackend for StubBackend {
        fn backend_id(&self) -> &str {
            &self.id
        }
        async fn start(&self) -> RuntimeResult<()> {
            Ok(())
        }
        async fn stop(&self) -> RuntimeResult<()> {
            Ok(())
        }
        async fn health_check(&self) -> RuntimeResult<()> {
            Ok(())
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                goal_types: self.goal_types.clone(),
                max_concurrency: 1,
                supports_cancellation: true,
            }
        }
        async fn execute_task(&self, task: ExecutionTask) -> RuntimeResult<Handle> {
            let (_event_tx, event_rx) = mpsc::channel::<OutputEvent>(4);
            let (cancel_tx, _cancel_rx) = oneshot::channel();
            let (result_tx, result_rx) = oneshot::channel();
            let _ = result_tx.send(TaskResult::Completed(serde_json::json!({"ok": true})));
            Ok(Handle::new(task.task_id, event_rx, cancel_tx, result_rx))
        }
    }

    fn task() -> ExecutionTask {
        ExecutionTask {
            task_id: "t1".to_string(),
            goal_type: "codegen".to_string(),
            input: serde_json::json!({}),
            max_turns: 4,
        }
    }

    #[tokio::test]
    async fn routes_to_the_only_matching_backend() {
        let registry = BackendRegistry::new(CircuitBreakerDefaults::default());
        registry
            .register(
                Arc::new(StubBackend {
                    id: "codegen-a".to_string(),
                    goal_types: vec!["codegen".to_string()],
                }),
                1,
            )
            .await
            .unwrap();

        let handle = registry
            .route_task(task(), RoutingConstraints::default())
            .await
            .unwrap();
        assert_eq!(handle.task_id, "t1");
    }

    #[tokio::test]
    async fn no_backend_available_errors() {
        let registry = BackendRegistry::new(CircuitBreakerDefaults::default());
        let err = registry
            .route_task(task(), RoutingConstraints::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Routing(RoutingError::NoBackendAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn unregister_stops_backend_and_removes_it() {
        let registry = BackendRegistry::new(CircuitBreakerDefaults::default());
        registry
            .register(
                Arc::new(StubBackend {
                    id: "codegen-a".to_string(),
                    goal_types: vec!["codegen".to_string()],
                }),
                1,
            )
            .await
            .unwrap();
        registry.unregister("codegen-a").await.unwrap();
        let err = registry
            .route_task(task(), RoutingConstraints::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Routing(RoutingError::NoBackendAvailable { .. })
        ));
    }
}
