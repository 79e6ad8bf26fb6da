//! Filter evaluation.
//!
//! Class, thread and kind checks are pure. The count filter is the only
//! stateful part: it decrements once per otherwise-matching event and
//! disables the request when it reaches zero.

use super::request::EventRequest;
use crate::events::Event;
use stepwatch_sdk::objects::RequestKind;
use tracing::debug;

/// Evaluate `event` against `request`.
///
/// Returns true when the request fires. A disabled request returns false
/// without touching its state.
pub fn matches(request: &mut EventRequest, event: &Event) -> bool {
    if !request.is_enabled() || !passes_static_filters(request, event) {
        return false;
    }

    let id = request.id();
    let Some(remaining) = request.remaining_mut() else {
        return true;
    };

    // An enabled request with a counter always has remaining >= 1.
    *remaining = remaining.saturating_sub(1);
    if *remaining > 0 {
        debug!(request = %id, remaining = *remaining, "Suppressed event by count filter");
        return false;
    }

    request.disable();
    debug!(request = %id, "Count filter exhausted, request disabled");
    true
}

/// Whether `event` would make `request` fire, leaving its count untouched.
pub fn would_match(request: &EventRequest, event: &Event) -> bool {
    request.is_enabled()
        && passes_static_filters(request, event)
        && request.remaining().is_none_or(|remaining| remaining <= 1)
}

/// Kind, location, thread and class checks. Never mutates.
fn passes_static_filters(request: &EventRequest, event: &Event) -> bool {
    if request.kind().event_kind() != event.kind() {
        return false;
    }

    if let RequestKind::Breakpoint { location } = request.kind() {
        if location != event.payload.location() {
            return false;
        }
    }

    if let Some(thread) = request.effective_thread() {
        if thread != event.thread {
            return false;
        }
    }

    match request.effective_class() {
        Some(pattern) => pattern.matches(&event.declaring_type, &event.supertypes),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use smallvec::smallvec;
    use stepwatch_sdk::ids::{ThreadId, TypeName};
    use stepwatch_sdk::objects::{FilterSpec, Location, SuspendPolicy};

    fn step_event(thread: u64, class: &str) -> Event {
        Event::candidate(
            ThreadId(thread),
            EventPayload::Step {
                location: Location::new(class, "run", 10),
            },
            smallvec![],
        )
    }

    fn step_request(thread: u64, filters: Vec<FilterSpec>) -> EventRequest {
        EventRequest::arm(
            RequestKind::step_into(ThreadId(thread)),
            filters,
            "token".into(),
            SuspendPolicy::All,
        )
        .unwrap()
    }

    #[test]
    fn test_count_filter_fires_on_nth_event_only() {
        let mut request = step_request(1, vec![FilterSpec::Count(3)]);
        let event = step_event(1, "T11");
        assert!(!matches(&mut request, &event));
        assert!(!matches(&mut request, &event));
        assert!(matches(&mut request, &event));
        assert!(!request.is_enabled());
        for _ in 0..10 {
            assert!(!matches(&mut request, &event));
        }
        assert_eq!(request.remaining(), Some(0));
    }

    #[test]
    fn test_non_matching_events_do_not_consume_count() {
        let mut request = step_request(1, vec![FilterSpec::class("T11"), FilterSpec::Count(2)]);
        assert!(!matches(&mut request, &step_event(1, "T10")));
        assert!(!matches(&mut request, &step_event(2, "T11")));
        assert_eq!(request.remaining(), Some(2));
        assert!(!matches(&mut request, &step_event(1, "T11")));
        assert!(matches(&mut request, &step_event(1, "T11")));
    }

    #[test]
    fn test_would_match_leaves_count_alone() {
        let mut request = step_request(1, vec![FilterSpec::Count(2)]);
        let event = step_event(1, "T11");
        assert!(!would_match(&request, &event));
        assert!(!matches(&mut request, &event));
        assert!(would_match(&request, &event));
        assert!(would_match(&request, &event));
        assert_eq!(request.remaining(), Some(1));
        assert!(!would_match(&request, &step_event(2, "T11")));
    }

    #[test]
    fn test_request_without_count_fires_repeatedly() {
        let mut request = step_request(1, vec![FilterSpec::class("T11")]);
        let event = step_event(1, "T11");
        for _ in 0..5 {
            assert!(matches(&mut request, &event));
        }
        assert!(request.is_enabled());
    }

    #[test]
    fn test_class_filter_never_matches_other_types() {
        let mut request = step_request(1, vec![FilterSpec::class("T11")]);
        for class in ["T10", "T20", "T21", "T110"] {
            assert!(!matches(&mut request, &step_event(1, class)));
        }
    }

    #[test]
    fn test_class_filter_matches_subtypes() {
        let mut request = step_request(1, vec![FilterSpec::class("Base")]);
        let event = Event::candidate(
            ThreadId(1),
            EventPayload::Step {
                location: Location::new("Derived", "run", 3),
            },
            smallvec![TypeName::new("Base")],
        );
        assert!(matches(&mut request, &event));
    }

    #[test]
    fn test_refined_class_filter_uses_latest_pattern() {
        let mut request = step_request(2, vec![FilterSpec::class("T11"), FilterSpec::Count(1)]);
        request.add_filter(FilterSpec::class("T21")).unwrap();
        assert!(!matches(&mut request, &step_event(2, "T11")));
        assert!(request.is_enabled());
        assert!(matches(&mut request, &step_event(2, "T21")));
    }

    #[test]
    fn test_kind_must_agree() {
        let mut request = EventRequest::arm(
            RequestKind::MethodExit,
            [],
            "exit".into(),
            SuspendPolicy::None,
        )
        .unwrap();
        assert!(!matches(&mut request, &step_event(1, "T11")));
        let exit = Event::candidate(
            ThreadId(1),
            EventPayload::MethodExit {
                location: Location::new("T11", "run", 12),
                return_value: None,
            },
            smallvec![],
        );
        assert!(matches(&mut request, &exit));
    }

    #[test]
    fn test_breakpoint_matches_its_location_only() {
        let location = Location::new("T11", "methodForCommunication", 40);
        let mut request = EventRequest::arm(
            RequestKind::Breakpoint {
                location: location.clone(),
            },
            [],
            "bp".into(),
            SuspendPolicy::All,
        )
        .unwrap();
        let hit = Event::candidate(
            ThreadId(1),
            EventPayload::Breakpoint { location },
            smallvec![],
        );
        let miss = Event::candidate(
            ThreadId(1),
            EventPayload::Breakpoint {
                location: Location::new("T11", "methodForCommunication", 41),
            },
            smallvec![],
        );
        assert!(!matches(&mut request, &miss));
        assert!(matches(&mut request, &hit));
    }

    #[test]
    fn test_disabled_request_is_untouched() {
        let mut request = step_request(1, vec![FilterSpec::Count(2)]);
        request.disable();
        let event = step_event(1, "T11");
        for _ in 0..3 {
            assert!(!matches(&mut request, &event));
        }
        assert_eq!(request.remaining(), Some(2));
    }
}
