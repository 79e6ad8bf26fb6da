//! Event request state.

use smallvec::SmallVec;
use stepwatch_sdk::ids::{CorrelationToken, RequestId, ThreadId};
use stepwatch_sdk::objects::{ClassPattern, FilterSpec, RequestKind, SuspendPolicy};
use thiserror::Error;
use tracing::debug;

/// Errors raised while arming or refining requests.
///
/// These are contract violations by the caller, not runtime conditions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Filters that can never be satisfied together.
    #[error("invalid filter combination: {0}")]
    InvalidFilterCombination(String),

    /// A count filter of zero.
    #[error("count filter must be greater than zero")]
    InvalidCount,

    /// A class pattern with a misplaced wildcard.
    #[error("invalid class pattern `{0}`")]
    InvalidClassPattern(String),

    /// The request is disabled, either by firing or by the controller.
    #[error("request {0} has already fired")]
    AlreadyFired(RequestId),

    /// The id does not name an installed request.
    #[error("unknown request {0}")]
    UnknownRequest(RequestId),
}

/// A controller-owned description of which events to wait for.
///
/// Immutable after arming apart from refinements through
/// [`add_filter`](EventRequest::add_filter) and the enablement flag.
#[derive(Debug, Clone)]
pub struct EventRequest {
    id: RequestId,
    kind: RequestKind,
    /// Every filter in the order it was added.
    filters: SmallVec<[FilterSpec; 4]>,
    token: CorrelationToken,
    suspend_policy: SuspendPolicy,
    enabled: bool,
    class: Option<ClassPattern>,
    thread: Option<ThreadId>,
    remaining: Option<u32>,
}

impl EventRequest {
    /// Arm a new request. The request starts enabled.
    pub fn arm(
        kind: RequestKind,
        filters: impl IntoIterator<Item = FilterSpec>,
        token: CorrelationToken,
        suspend_policy: SuspendPolicy,
    ) -> Result<Self, RequestError> {
        let mut request = Self {
            id: RequestId::new(),
            kind,
            filters: SmallVec::new(),
            token,
            suspend_policy,
            enabled: true,
            class: None,
            thread: None,
            remaining: None,
        };

        for spec in filters {
            if let (FilterSpec::Thread(new), Some(existing)) = (&spec, request.thread) {
                if *new != existing {
                    return Err(RequestError::InvalidFilterCombination(format!(
                        "thread filters {existing} and {new} are mutually exclusive"
                    )));
                }
            }
            request.validate(&spec)?;
            request.apply(spec);
        }

        debug!(
            request = %request.id,
            kind = %request.kind.event_kind(),
            token = %request.token,
            filters = request.filters.len(),
            "Armed event request"
        );
        Ok(request)
    }

    /// Add or refine a filter.
    ///
    /// A second class or thread filter replaces the effective one; a second
    /// count filter restarts the shared counter at the new value.
    pub fn add_filter(&mut self, spec: FilterSpec) -> Result<(), RequestError> {
        if !self.enabled {
            return Err(RequestError::AlreadyFired(self.id));
        }
        self.validate(&spec)?;
        debug!(request = %self.id, filter = ?spec, "Refined event request");
        self.apply(spec);
        Ok(())
    }

    fn validate(&self, spec: &FilterSpec) -> Result<(), RequestError> {
        match spec {
            FilterSpec::Count(0) => Err(RequestError::InvalidCount),
            FilterSpec::Class(pattern) if !pattern.is_valid() => {
                Err(RequestError::InvalidClassPattern(pattern.to_string()))
            }
            FilterSpec::Thread(thread) => match self.kind.bound_thread() {
                Some(bound) if bound != *thread => {
                    Err(RequestError::InvalidFilterCombination(format!(
                        "thread filter {thread} conflicts with step thread {bound}"
                    )))
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn apply(&mut self, spec: FilterSpec) {
        match &spec {
            FilterSpec::Class(pattern) => self.class = Some(pattern.clone()),
            FilterSpec::Thread(thread) => self.thread = Some(*thread),
            FilterSpec::Count(count) => self.remaining = Some(*count),
        }
        self.filters.push(spec);
    }

    /// Disable the request. Disabled requests never match again.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    pub fn suspend_policy(&self) -> SuspendPolicy {
        self.suspend_policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The class pattern currently in effect.
    pub fn effective_class(&self) -> Option<&ClassPattern> {
        self.class.as_ref()
    }

    /// The thread restriction currently in effect, from a filter or from
    /// the kind itself.
    pub fn effective_thread(&self) -> Option<ThreadId> {
        self.thread.or_else(|| self.kind.bound_thread())
    }

    /// Matching occurrences still to be suppressed before the request fires.
    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub(crate) fn remaining_mut(&mut self) -> Option<&mut u32> {
        self.remaining.as_mut()
    }
}
