//! Per-user actor routing.
//!
//! Maps each user id to a stable [`UserAgent`] instance behind a
//! `tokio::Mutex`. Holding the lock for the whole turn is what gives the
//! single-writer guarantee: at most one request mutates a user's state at
//! a time, while different users run in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::runtime::agent::UserAgent;

pub struct ActorMap {
    actors: Mutex<HashMap<String, Arc<tokio::sync::Mutex<UserAgent>>>>,
}

impl Default for ActorMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorMap {
    pub fn new() -> Self {
        Self {
            actors: Mutex::new(HashMap::new()),
        }
    }

    /// Stable user → actor routing. The actor is created lazily; its
    /// durable state loads on first use.
    pub fn get_or_create(&self, user_id: &str) -> Arc<tokio::sync::Mutex<UserAgent>> {
        let mut actors = self.actors.lock();
        actors
            .entry(user_id.to_owned())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(UserAgent::new(user_id))))
            .clone()
    }

    pub fn active_count(&self) -> usize {
        self.actors.lock().len()
    }

    /// Evict actors idle for longer than `idle_for`. An actor is only
    /// dropped when its lock is free, so a running turn is never lost;
    /// state was persisted at the end of its last chat.
    pub fn prune_idle(&self, idle_for: Duration) {
        let mut actors = self.actors.lock();
        actors.retain(|_, actor| match actor.try_lock() {
            Ok(agent) => agent.idle_since().map(|d| d < idle_for).unwrap_or(true),
            Err(_) => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_user_routes_to_same_actor() {
        let map = ActorMap::new();
        let a = map.get_or_create("u-1");
        let b = map.get_or_create("u-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(map.active_count(), 1);
    }

    #[test]
    fn different_users_get_different_actors() {
        let map = ActorMap::new();
        let a = map.get_or_create("u-1");
        let b = map.get_or_create("u-2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(map.active_count(), 2);
    }

    #[tokio::test]
    async fn turns_on_one_actor_are_serialized() {
        let map = Arc::new(ActorMap::new());
        let actor = map.get_or_create("u-1");

        let guard = actor.lock().await;

        let actor2 = map.get_or_create("u-1");
        let waiter = tokio::spawn(async move {
            let _g = actor2.lock().await;
            42
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn prune_skips_locked_actors() {
        let map = ActorMap::new();
        let actor = map.get_or_create("u-1");
        let _guard = actor.lock().await;

        map.prune_idle(Duration::from_secs(0));
        assert_eq!(map.active_count(), 1);
    }
}
