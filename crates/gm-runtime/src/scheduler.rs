//! Turn order for AI subordinates and their dispatch.

use crate::config::{AiDispatch, RuntimeConfig};
use crate::protocol::{resolve_actor, ActorOutcome, RoundState};
use futures::future::join_all;
use gm_ai::stages;
use gm_ai::GenerationBackend;
use gm_core::{Deltas, Role, RoundDocument};
use tracing::{debug, info};

pub struct ActorScheduler<'a> {
    backend: &'a dyn GenerationBackend,
    config: &'a RuntimeConfig,
}

impl<'a> ActorScheduler<'a> {
    pub fn new(backend: &'a dyn GenerationBackend, config: &'a RuntimeConfig) -> Self {
        Self { backend, config }
    }

    /// Subordinates that act after `position`; none unless it is the primary role.
    pub fn followers(&self, position: &str) -> Vec<&'a Role> {
        if self.config.roster.is_primary(position) {
            self.config.roster.subordinates()
        } else {
            Vec::new()
        }
    }

    /// Decision then resolution for one AI role.
    async fn run_one(&self, doc: &RoundDocument, state: &RoundState, role: &Role) -> ActorOutcome {
        let view = state.view(doc, self.config.history_window);
        let directive = stages::decide(self.backend, &self.config.limits, &view, role).await;
        debug!(game_id = %doc.game_id, position = %role.position, directive = %directive, "ai decision");
        resolve_actor(self.backend, &self.config.limits, &view, role, &directive).await
    }

    /// Every role against the same frozen `base`. Outcomes come back in
    /// roster order whatever order the calls finish in.
    pub async fn run_concurrent(
        &self,
        doc: &RoundDocument,
        base: &RoundState,
        roles: &[&Role],
    ) -> Vec<ActorOutcome> {
        join_all(roles.iter().map(|role| self.run_one(doc, base, role))).await
    }

    /// Resolve `roles` after the primary actor and fold them into `state` in
    /// roster order. Returns the per-actor applied changes.
    pub async fn run(
        &self,
        doc: &RoundDocument,
        state: &mut RoundState,
        roles: &[&Role],
    ) -> Vec<(String, Deltas)> {
        if roles.is_empty() {
            return Vec::new();
        }
        info!(game_id = %doc.game_id, actors = roles.len(), dispatch = ?self.config.ai_dispatch, "dispatching ai actors");
        let mut applied = Vec::with_capacity(roles.len());
        match self.config.ai_dispatch {
            AiDispatch::Concurrent => {
                let base = state.clone();
                for outcome in self.run_concurrent(doc, &base, roles).await {
                    let position = outcome.role.position.clone();
                    applied.push((position, state.fold(&self.config.schema, outcome)));
                }
            }
            AiDispatch::Sequential => {
                for role in roles {
                    let outcome = self.run_one(doc, state, role).await;
                    applied.push((role.position.clone(), state.fold(&self.config.schema, outcome)));
                }
            }
        }
        applied
    }
}
