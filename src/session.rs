//! Per-connection state.
//!
//! A [`Session`] lives exactly as long as the worker driving its
//! connection and is never shared between connections.

use crate::{auth::AuthBackend, entity_id::EntityUniqueId};
use std::sync::Arc;

/// Cosmetic identity of the local player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Skin {
    pub skin_uuid: String,
    pub skin_item_id: String,
}

pub struct Session<A> {
    /// Assigned by the server's `StartGame`; `None` until then.
    entity_unique_id: Option<EntityUniqueId>,
    /// Set once the integrity challenge has been answered. Never reset.
    check_num_passed: bool,
    skin: Skin,
    auth: Arc<A>,
}

impl<A> Session<A>
where
    A: AuthBackend,
{
    pub fn new(auth: Arc<A>) -> Self {
        Self {
            entity_unique_id: None,
            check_num_passed: false,
            skin: Skin::default(),
            auth,
        }
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn entity_unique_id(&self) -> Option<EntityUniqueId> {
        self.entity_unique_id
    }

    /// Records the local player's entity ID. Only the first call
    /// has an effect; returns whether the ID was recorded.
    pub fn record_entity_unique_id(&mut self, id: EntityUniqueId) -> bool {
        match self.entity_unique_id {
            None => {
                self.entity_unique_id = Some(id);
                true
            }
            Some(existing) => {
                if existing != id {
                    tracing::warn!(
                        "Ignoring entity unique ID {id:?}, already assigned {existing:?}"
                    );
                }
                false
            }
        }
    }

    /// Whether `id` refers to the local player. Always `false`
    /// before `StartGame` has been seen.
    pub fn is_local_player(&self, id: i64) -> bool {
        self.entity_unique_id == Some(EntityUniqueId::new(id))
    }

    pub fn check_num_passed(&self) -> bool {
        self.check_num_passed
    }

    pub fn mark_check_num_passed(&mut self) {
        self.check_num_passed = true;
    }

    pub fn player_skin(&self) -> &Skin {
        &self.skin
    }

    pub fn set_player_skin(&mut self, skin: Skin) {
        self.skin = skin;
    }
}
