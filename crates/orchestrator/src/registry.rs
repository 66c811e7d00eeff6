//! Local mirror of what has been created on the server.
//!
//! Two append-only logs, each behind its own lock. Locks are held only for
//! the push or the snapshot copy, never across a network call. Nothing is
//! ever removed: despawning an entity leaves its record in place, so the
//! registry is a creation log rather than a live view of the server.

use cubewright_core::{Entity, Link};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Mutex<Vec<Entity>>,
    links: Mutex<Vec<Link>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entity(&self, entity: Entity) {
        lock(&self.entities).push(entity);
    }

    pub fn record_link(&self, link: Link) {
        lock(&self.links).push(link);
    }

    /// Snapshot of every entity recorded so far, in creation order.
    pub fn all_entities(&self) -> Vec<Entity> {
        lock(&self.entities).clone()
    }

    /// Snapshot of every link recorded so far, in creation order.
    pub fn all_links(&self) -> Vec<Link> {
        lock(&self.links).clone()
    }

    pub fn entity_count(&self) -> usize {
        lock(&self.entities).len()
    }

    pub fn link_count(&self) -> usize {
        lock(&self.links).len()
    }

    /// First link, by creation order, with `entity` at either end.
    pub fn find_link_touching(&self, entity: &str) -> Option<Link> {
        let found = self
            .all_links()
            .into_iter()
            .find(|link| link.touches(entity));
        if found.is_none() {
            debug!(component = "registry", entity, "No link touches entity");
        }
        found
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
