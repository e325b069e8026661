//! Provider routing algorithm (spec §4.6).
//!
//! Grounded on the teacher's `routing/engine.rs` `DefaultRoutingEngine`:
//! an `Arc<RwLock<Stats>>` alongside a pure selection function, rather
//! than baking the algorithm into the registry itself.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Constraints a caller may place on routing (spec §4.6 step 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConstraints {
    pub preferred_backend_id: Option<String>,
    pub excluded_backend_ids: Vec<String>,
}

/// One backend's eligibility snapshot at routing time.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub backend_id: String,
    pub goal_types: Vec<String>,
    pub priority: i32,
    pub circuit_allowed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingStats {
    pub routed_total: u64,
    pub routed_by_backend: HashMap<String, u64>,
}

/// Stateless routing algorithm plus a running stats counter.
pub struct ProviderRouter {
    stats: Arc<RwLock<RoutingStats>>,
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(RoutingStats::default())),
        }
    }

    /// Select a backend for `goal_type` from `candidates`, honoring
    /// `constraints` (spec §4.6 steps 1-4):
    /// 1. Filter to backends whose `goal_types` include `goal_type`,
    ///    excluding any in `constraints.excluded_backend_ids`.
    /// 2. If `preferred_backend_id` is set and present in that set and
    ///    circuit-allowed, return it immediately.
    /// 3. Otherwise sort by `(circuit_allowed desc, priority asc,
    ///    backend_id asc)` and return the first.
    /// 4. If the filtered set is empty, return `None`.
    pub fn select<'a>(
        &self,
        goal_type: &str,
        candidates: &'a [Candidate],
        constraints: &RoutingConstraints,
    ) -> Option<&'a Candidate> {
        let mut eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|candidate| {
                candidate.goal_types.iter().any(|g| g == goal_type)
                    && !constraints.excluded_backend_ids.contains(&candidate.backend_id)
            })
            .collect();

        if eligible.is_empty() {
            return None;
        }

        if let Some(preferred) = &constraints.preferred_backend_id {
            if let Some(candidate) = eligible
                .iter()
                .find(|c| &c.backend_id == preferred && c.circuit_allowed)
            {
                return Some(candidate);
            }
        }

        eligible.sort_by(|a, b| {
            b.circuit_allowed
                .cmp(&a.circuit_allowed)
                .then(a.priority.cmp(&b.priority))
                .then(a.backend_id.cmp(&b.backend_id))
        });

        eligible.into_iter().next()
    }

    pub async fn record_route(&self, backend_id: &str) {
        let mut stats = self.stats.write().await;
        stats.routed_total += 1;
        *stats.routed_by_backend.entry(backend_id.to_string()).or_insert(0) += 1;
    }

    pub async fn stats(&self) -> RoutingStats {
        self.stats.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, priority: i32, allowed: bool) -> Candidate {
        Candidate {
            backend_id: id.to_string(),
            goal_types: vec!["codegen".to_string()],
            priority,
            circuit_allowed: allowed,
        }
    }

    #[test]
    fn prefers_lower_priority_when_all_allowed() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("b", 2, true), candidate("a", 1, true)];
        let chosen = router
            .select("codegen", &candidates, &RoutingConstraints::default())
            .unwrap();
        assert_eq!(chosen.backend_id, "a");
    }

    #[test]
    fn circuit_allowed_beats_lower_priority() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("closed-but-low-priority", 1, false), candidate("open", 2, true)];
        let chosen = router
            .select("codegen", &candidates, &RoutingConstraints::default())
            .unwrap();
        assert_eq!(chosen.backend_id, "open");
    }

    #[test]
    fn backend_id_breaks_ties() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("z", 1, true), candidate("a", 1, true)];
        let chosen = router
            .select("codegen", &candidates, &RoutingConstraints::default())
            .unwrap();
        assert_eq!(chosen.backend_id, "a");
    }

    #[test]
    fn preferred_backend_wins_if_circuit_allowed() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("a", 1, true), candidate("preferred", 5, true)];
        let constraints = RoutingConstraints {
            preferred_backend_id: Some("preferred".to_string()),
            excluded_backend_ids: vec![],
        };
        let chosen = router.select("codegen", &candidates, &constraints).unwrap();
        assert_eq!(chosen.backend_id, "preferred");
    }

    #[test]
    fn preferred_backend_skipped_if_circuit_not_allowed() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("a", 1, true), candidate("preferred", 5, false)];
        let constraints = RoutingConstraints {
            preferred_backend_id: Some("preferred".to_string()),
            excluded_backend_ids: vec![],
        };
        let chosen = router.select("codegen", &candidates, &constraints).unwrap();
        assert_eq!(chosen.backend_id, "a");
    }

    #[test]
    fn no_candidates_for_goal_type_returns_none() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("a", 1, true)];
        assert!(router
            .select("unsupported", &candidates, &RoutingConstraints::default())
            .is_none());
    }

    #[test]
    fn excluded_backend_is_never_selected() {
        let router = ProviderRouter::new();
        let candidates = vec![candidate("a", 1, true)];
        let constraints = RoutingConstraints {
            preferred_backend_id: None,
            excluded_backend_ids: vec!["a".to_string()],
        };
        assert!(router.select("codegen", &candidates, &constraints).is_none());
    }
}
