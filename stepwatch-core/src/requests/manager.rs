//! Shared table of installed event requests.
//!
//! `EventRequestManager` wraps the table in a single `Arc<Mutex<_>>`. Every
//! read or mutation of request state, including the count decrement done
//! by the matcher, happens while holding that one lock, so two candidate
//! events can never both observe the same remaining count.

use super::matcher::{matches, would_match};
use super::request::{EventRequest, RequestError};
use crate::events::Event;
use smallvec::SmallVec;
use std::sync::Arc;
use stepwatch_sdk::ids::{CorrelationToken, RequestId};
use stepwatch_sdk::objects::{FilterSpec, RequestKind, SuspendPolicy};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A request that fired for a candidate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredRequest {
    pub id: RequestId,
    pub token: CorrelationToken,
    pub suspend_policy: SuspendPolicy,
}

/// Cloneable handle to the request table.
#[derive(Clone, Default)]
pub struct EventRequestManager {
    inner: Arc<Mutex<RequestTable>>,
}

/// Installed requests in install order.
///
/// Stored as a `Vec` because a test step arms a handful of requests at most.
#[derive(Default)]
struct RequestTable {
    requests: Vec<EventRequest>,
}

impl RequestTable {
    fn get_mut(&mut self, id: RequestId) -> Result<&mut EventRequest, RequestError> {
        self.requests
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(RequestError::UnknownRequest(id))
    }
}

impl EventRequestManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an armed request and return its id.
    pub async fn install(&self, request: EventRequest) -> RequestId {
        let id = request.id();
        info!(
            request = %id,
            kind = %request.kind().event_kind(),
            token = %request.token(),
            "Installed event request"
        );
        self.inner.lock().await.requests.push(request);
        id
    }

    /// Arm and install in one step.
    pub async fn create(
        &self,
        kind: RequestKind,
        filters: impl IntoIterator<Item = FilterSpec>,
        token: CorrelationToken,
        suspend_policy: SuspendPolicy,
    ) -> Result<RequestId, RequestError> {
        let request = EventRequest::arm(kind, filters, token, suspend_policy)?;
        Ok(self.install(request).await)
    }

    /// Refine an installed request.
    pub async fn add_filter(&self, id: RequestId, spec: FilterSpec) -> Result<(), RequestError> {
        self.inner.lock().await.get_mut(id)?.add_filter(spec)
    }

    /// Disable a request so it never matches again.
    pub async fn disable(&self, id: RequestId) -> Result<(), RequestError> {
        self.inner.lock().await.get_mut(id)?.disable();
        debug!(request = %id, "Disabled event request");
        Ok(())
    }

    /// Remove a request from the table.
    pub async fn delete(&self, id: RequestId) -> Result<EventRequest, RequestError> {
        let mut table = self.inner.lock().await;
        let index = table
            .requests
            .iter()
            .position(|r| r.id() == id)
            .ok_or(RequestError::UnknownRequest(id))?;
        debug!(request = %id, "Deleted event request");
        Ok(table.requests.remove(index))
    }

    /// Remove every request.
    pub async fn clear(&self) {
        self.inner.lock().await.requests.clear();
    }

    pub async fn is_enabled(&self, id: RequestId) -> Result<bool, RequestError> {
        Ok(self.inner.lock().await.get_mut(id)?.is_enabled())
    }

    /// A copy of the current request state.
    pub async fn snapshot(&self, id: RequestId) -> Result<EventRequest, RequestError> {
        Ok(self.inner.lock().await.get_mut(id)?.clone())
    }

    /// Run the matcher for every enabled request of `set`, in set order.
    ///
    /// All requests are evaluated, so count filters advance for every
    /// request the event satisfies. The returned list keeps set order;
    /// the first entry is the winner.
    pub async fn evaluate(&self, set: &[RequestId], event: &Event) -> SmallVec<[FiredRequest; 2]> {
        let mut table = self.inner.lock().await;
        let mut fired = SmallVec::new();

        for id in set {
            let request = match table.get_mut(*id) {
                Ok(request) => request,
                Err(_) => {
                    warn!(request = %id, "Waiting on a request that is not installed");
                    continue;
                }
            };
            if matches(request, event) {
                fired.push(FiredRequest {
                    id: *id,
                    token: request.token().clone(),
                    suspend_policy: request.suspend_policy(),
                });
            }
        }

        fired
    }

    /// Ids of the requests of `set` that `event` would fire, in set order.
    /// Count state is left as it is.
    pub async fn would_fire(&self, set: &[RequestId], event: &Event) -> SmallVec<[RequestId; 2]> {
        let table = self.inner.lock().await;
        set.iter()
            .copied()
            .filter(|id| {
                table
                    .requests
                    .iter()
                    .any(|request| request.id() == *id && would_match(request, event))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use smallvec::smallvec;
    use stepwatch_sdk::ids::ThreadId;
    use stepwatch_sdk::objects::Location;

    fn step_event(thread: u64, class: &str) -> Event {
        Event::candidate(
            ThreadId(thread),
            EventPayload::Step {
                location: Location::new(class, "run", 1),
            },
            smallvec![],
        )
    }

    #[tokio::test]
    async fn test_evaluate_keeps_set_order() {
        let manager = EventRequestManager::new();
        let a = manager
            .create(RequestKind::step_into(ThreadId(1)), [], "A".into(), SuspendPolicy::All)
            .await
            .unwrap();
        let b = manager
            .create(RequestKind::step_into(ThreadId(1)), [], "B".into(), SuspendPolicy::All)
            .await
            .unwrap();

        let fired = manager.evaluate(&[b, a], &step_event(1, "T")).await;
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].id, b);
        assert_eq!(fired[1].token.as_str(), "A");
    }

    #[tokio::test]
    async fn test_unknown_ids_are_skipped() {
        let manager = EventRequestManager::new();
        let fired = manager.evaluate(&[RequestId::new()], &step_event(1, "T")).await;
        assert!(fired.is_empty());
        assert!(matches!(
            manager.disable(RequestId::new()).await,
            Err(RequestError::UnknownRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_add_filter_after_fire_is_rejected() {
        let manager = EventRequestManager::new();
        let id = manager
            .create(
                RequestKind::step_into(ThreadId(1)),
                [FilterSpec::Count(1)],
                "once".into(),
                SuspendPolicy::All,
            )
            .await
            .unwrap();
        assert_eq!(manager.evaluate(&[id], &step_event(1, "T")).await.len(), 1);
        assert!(!manager.is_enabled(id).await.unwrap());
        assert_eq!(
            manager.add_filter(id, FilterSpec::class("T")).await,
            Err(RequestError::AlreadyFired(id))
        );
    }

    #[tokio::test]
    async fn test_concurrent_evaluation_fires_count_once() {
        let manager = EventRequestManager::new();
        let id = manager
            .create(
                RequestKind::step_into(ThreadId(1)),
                [FilterSpec::Count(50)],
                "race".into(),
                SuspendPolicy::None,
            )
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..100 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager.evaluate(&[id], &step_event(1, "T")).await.len()
            }));
        }
        let mut total = 0;
        for task in tasks {
            total += task.await.unwrap();
        }
        assert_eq!(total, 1);
        assert_eq!(manager.snapshot(id).await.unwrap().remaining(), Some(0));
    }

    #[tokio::test]
    async fn test_would_fire_does_not_advance_count() {
        let manager = EventRequestManager::new();
        let id = manager
            .create(
                RequestKind::step_into(ThreadId(1)),
                [FilterSpec::Count(1)],
                "peek".into(),
                SuspendPolicy::None,
            )
            .await
            .unwrap();
        let event = step_event(1, "T");
        assert_eq!(manager.would_fire(&[id], &event).await.as_slice(), &[id]);
        assert_eq!(manager.would_fire(&[id], &event).await.as_slice(), &[id]);
        assert_eq!(manager.snapshot(id).await.unwrap().remaining(), Some(1));
        assert_eq!(manager.evaluate(&[id], &event).await.len(), 1);
        assert!(manager.would_fire(&[id], &event).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_request() {
        let manager = EventRequestManager::new();
        let id = manager
            .create(RequestKind::MethodEntry, [], "m".into(), SuspendPolicy::None)
            .await
            .unwrap();
        let removed = manager.delete(id).await.unwrap();
        assert_eq!(removed.token().as_str(), "m");
        assert!(manager.snapshot(id).await.is_err());
    }
}
