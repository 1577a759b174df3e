//! Single-flight coalescing of concurrent work for the same key.
//!
//! The first caller for a key becomes the leader and its work runs on a
//! spawned task; callers arriving while it runs await the same shared
//! result. The spawned task removes the key once the work (including any
//! cache write it performs) has finished, so an abandoned leader request
//! still completes and later callers find the stored value.

use std::{future::Future, hash::Hash, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

type SharedFlight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// The spawned task panicked or was cancelled by runtime shutdown.
#[derive(Debug, Clone, Copy, Error)]
#[error("in-flight work aborted before completing")]
pub struct FlightAborted;

pub struct SingleFlight<K, T, E> {
    inflight: Arc<DashMap<K, SharedFlight<T, E>>>,
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<FlightAborted> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or join the execution already in flight.
    ///
    /// `work` is only invoked when this caller is the leader.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> (Result<T, E>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (flight, role) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => (entry.get().clone(), Role::Follower),
            Entry::Vacant(entry) => {
                let guard = Departure {
                    inflight: Arc::clone(&self.inflight),
                    key: Some(key),
                };
                let task = work();
                let handle = tokio::spawn(async move {
                    let result = task.await;
                    drop(guard);
                    result
                });
                let flight: SharedFlight<T, E> = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(_) => Err(E::from(FlightAborted)),
                    }
                }
                .boxed()
                .shared();
                entry.insert(flight.clone());
                (flight, Role::Leader)
            }
        };

        (flight.await, role)
    }

    /// Number of keys with work currently running.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

/// Removes the key when the leader's task ends, including by panic.
struct Departure<K, T, E>
where
    K: Eq + Hash,
{
    inflight: Arc<DashMap<K, SharedFlight<T, E>>>,
    key: Option<K>,
}

impl<K, T, E> Drop for Departure<K, T, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.inflight.remove(&key);
        }
    }
}
