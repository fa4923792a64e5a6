//! Tests for session state, transitions and emission.

use super::*;
use crate::error::HandlerError;
use std::sync::Mutex;

/// Session wired to a bus whose handler records every event.
fn recorded_session(id: &str) -> (Session, Arc<Mutex<Vec<Event>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let bus = EventBus::new();
    let sink = events.clone();
    bus.add_handler(Arc::new(
        move |_: &Session, event: Event| -> Result<(), HandlerError> {
            sink.lock().unwrap().push(event);
            Ok(())
        },
    ));
    let session = Session::new(id);
    session.attach(bus);
    (session, events)
}

// =========================================================================
// State
// =========================================================================

#[test]
fn new_session_starts_unknown_and_not_alive() {
    let session = Session::new("1");
    assert_eq!(session.state(), State::Unknown);
    assert!(!session.alive());
    assert!(!session.active());
    assert!(!session.foreground());
    assert!(!session.locked());
    assert!(session.last_event().is_none());
}

#[test]
fn active_means_logged_in_regardless_of_focus() {
    assert!(State::Foreground.is_active());
    assert!(State::Background.is_active());
    assert!(!State::Opening.is_active());
    assert!(!State::Closing.is_active());
    assert!(!State::Unknown.is_active());
}

#[test]
fn state_parses_canonical_and_logind_names() {
    assert_eq!("foreground".parse::<State>(), Ok(State::Foreground));
    assert_eq!("active".parse::<State>(), Ok(State::Foreground));
    assert_eq!("ONLINE".parse::<State>(), Ok(State::Background));
    assert_eq!("closing".parse::<State>(), Ok(State::Closing));
    assert_eq!("opening".parse::<State>(), Ok(State::Opening));
    assert_eq!(
        "lingering".parse::<State>(),
        Err(ParseStateError("lingering".to_string()))
    );
}

#[test]
fn state_display_round_trips() {
    for state in [
        State::Opening,
        State::Foreground,
        State::Background,
        State::Closing,
        State::Unknown,
    ] {
        assert_eq!(state.to_string().parse::<State>(), Ok(state));
        assert_eq!(State::from_u8(state as u8), state);
    }
}

#[test]
fn out_of_range_state_byte_is_unknown() {
    assert_eq!(State::from_u8(200), State::Unknown);
}

// =========================================================================
// Transition table
// =========================================================================

#[test]
fn transition_table() {
    use State::*;
    assert_eq!(transition_event(Opening, Foreground), Some(Event::Logon));
    assert_eq!(transition_event(Opening, Background), Some(Event::Logon));
    assert_eq!(transition_event(Background, Foreground), Some(Event::Foreground));
    assert_eq!(transition_event(Foreground, Background), Some(Event::Background));
    assert_eq!(transition_event(Unknown, Foreground), Some(Event::Logon));
    assert_eq!(transition_event(Unknown, Background), Some(Event::Logon));
    assert_eq!(transition_event(Foreground, Closing), Some(Event::Logoff));
    assert_eq!(transition_event(Opening, Closing), Some(Event::Logoff));
    assert_eq!(transition_event(Unknown, Opening), None);
    assert_eq!(transition_event(Foreground, Unknown), None);
    assert_eq!(transition_event(Closing, Closing), None);
}

// =========================================================================
// set()
// =========================================================================

#[test]
fn set_same_state_emits_nothing() {
    let (session, events) = recorded_session("2");
    session.writer().initialize(State::Foreground, false);

    assert_eq!(session.writer().set(State::Foreground), None);
    assert_eq!(session.writer().set(State::Foreground), None);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn foreground_then_background_emits_exactly_two_events() {
    let (session, events) = recorded_session("3");
    session.writer().initialize(State::Background, false);

    session.writer().set(State::Foreground);
    session.writer().set(State::Foreground);
    session.writer().set(State::Background);
    session.writer().set(State::Background);

    assert_eq!(
        *events.lock().unwrap(),
        vec![Event::Foreground, Event::Background]
    );
    assert_eq!(session.state(), State::Background);
    assert!(session.active());
    assert!(!session.foreground());
}

#[test]
fn opening_completion_is_a_logon() {
    let (session, events) = recorded_session("4");
    session.writer().initialize(State::Opening, false);

    assert_eq!(session.writer().set(State::Foreground), Some(Event::Logon));
    assert_eq!(*events.lock().unwrap(), vec![Event::Logon]);
}

#[test]
fn unknown_session_becoming_readable_is_a_logon() {
    let (session, events) = recorded_session("4u");

    assert_eq!(session.writer().set(State::Background), Some(Event::Logon));
    assert_eq!(session.writer().set(State::Foreground), Some(Event::Foreground));
    assert_eq!(*events.lock().unwrap(), vec![Event::Logon, Event::Foreground]);
}

#[test]
fn closing_emits_logoff_once() {
    let (session, events) = recorded_session("5");
    session.writer().initialize(State::Background, false);

    session.writer().set(State::Closing);
    session.writer().set(State::Closing);

    assert_eq!(*events.lock().unwrap(), vec![Event::Logoff]);
}

#[test]
fn initialize_is_silent_and_marks_alive() {
    let (session, events) = recorded_session("6");
    session.writer().initialize(State::Foreground, true);

    assert!(session.alive());
    assert!(session.locked());
    assert_eq!(session.state(), State::Foreground);
    assert!(events.lock().unwrap().is_empty());

    session.writer().retire();
    assert!(!session.alive());
}

// =========================================================================
// Lock flag
// =========================================================================

#[test]
fn lock_changes_emit_lock_and_unlock() {
    let (session, events) = recorded_session("7");
    session.writer().initialize(State::Foreground, false);

    assert_eq!(session.writer().set_locked(false), None);
    assert_eq!(session.writer().set_locked(true), Some(Event::Lock));
    assert_eq!(session.writer().set_locked(true), None);
    assert_eq!(session.writer().set_locked(false), Some(Event::Unlock));

    assert_eq!(*events.lock().unwrap(), vec![Event::Lock, Event::Unlock]);
}

#[test]
fn handler_observes_updated_fields() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.add_handler(Arc::new(
        move |session: &Session, event: Event| -> Result<(), HandlerError> {
            sink.lock()
                .unwrap()
                .push((event, session.state(), session.locked()));
            Ok(())
        },
    ));
    let session = Session::new("8");
    session.attach(bus);
    session.writer().initialize(State::Background, false);

    session.writer().set(State::Foreground);
    session.writer().set_locked(true);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (Event::Foreground, State::Foreground, false),
            (Event::Lock, State::Foreground, true),
        ]
    );
}

// =========================================================================
// Emission bookkeeping and per-session handlers
// =========================================================================

#[test]
fn emit_records_last_event() {
    let (session, _events) = recorded_session("9");
    session.writer().emit(Event::Sleep);

    let last = session.last_event().expect("recorded");
    assert_eq!(last.event, Event::Sleep);
}

#[test]
fn per_session_handlers_run_before_bus_handlers() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let own = order.clone();
    let session = Session::new("10").with_handler(Arc::new(
        move |_: &Session, _: Event| -> Result<(), HandlerError> {
            own.lock().unwrap().push("session");
            Ok(())
        },
    ));
    let bus = EventBus::new();
    let shared = order.clone();
    bus.add_handler(Arc::new(
        move |_: &Session, _: Event| -> Result<(), HandlerError> {
            shared.lock().unwrap().push("bus");
            Ok(())
        },
    ));
    session.attach(bus);

    session.writer().emit(Event::Resume);

    assert_eq!(*order.lock().unwrap(), vec!["session", "bus"]);
}

#[test]
fn detached_session_emits_without_bus() {
    let session = Session::new("11");
    session.writer().emit(Event::Shutdown);
    assert_eq!(session.last_event().map(|l| l.event), Some(Event::Shutdown));
}

// =========================================================================
// Identity and attributes
// =========================================================================

#[test]
fn display_prefers_username() {
    let session = Session::new("c7");
    assert_eq!(session.to_string(), "c7");

    session.writer().update_attributes(SessionAttributes {
        username: Some("alice".to_string()),
        ..Default::default()
    });
    assert_eq!(session.to_string(), "alice");
}

#[test]
fn empty_username_falls_back_to_id() {
    let session = Session::new(SessionId::Handle(3)).with_attributes(SessionAttributes {
        username: Some(String::new()),
        ..Default::default()
    });
    assert_eq!(session.to_string(), "3");
}

#[test]
fn session_id_conversions() {
    assert_eq!(SessionId::from("c1"), SessionId::Name("c1".to_string()));
    assert_eq!(SessionId::from(5u32), SessionId::Handle(5));
    assert_eq!(SessionId::from(5u32).to_string(), "5");
}

#[test]
fn session_id_deserializes_numbers_and_strings() {
    let handle: SessionId = serde_json::from_str("2").expect("number");
    let name: SessionId = serde_json::from_str("\"c2\"").expect("string");
    assert_eq!(handle, SessionId::Handle(2));
    assert_eq!(name, SessionId::Name("c2".to_string()));
}

#[test]
fn attribute_queries() {
    let session = Session::new("12").with_attributes(SessionAttributes {
        username: Some("bob".to_string()),
        uid: Some(1001),
        classname: Some("user".to_string()),
        service: Some("sshd".to_string()),
        remote: true,
        system: false,
        platform: PlatformExtras::Logind {
            seat: None,
            bus_path: Some("/run/user/1001/bus".to_string()),
        },
        ..Default::default()
    });
    assert!(session.remote());
    assert!(!session.system());
    assert_eq!(session.classname().as_deref(), Some("user"));
    assert_eq!(session.service().as_deref(), Some("sshd"));
    assert_eq!(session.userid(), Some(1001));
    assert_eq!(session.username().as_deref(), Some("bob"));
    assert!(matches!(
        session.attributes().platform,
        PlatformExtras::Logind { .. }
    ));
}

#[test]
fn probe_reports_missing_class_and_service() {
    let session = Session::new("13");
    assert_eq!(
        session.session_class(),
        Err(ProbeError::Unavailable("classname"))
    );
    assert_eq!(
        session.session_service(),
        Err(ProbeError::Unavailable("service"))
    );
    assert_eq!(session.is_remote(), Ok(false));
    assert_eq!(session.display_name(), "13");
}

#[test]
fn debug_format_contains_id_and_state() {
    let session = Session::new("debug-me");
    let debug = format!("{:?}", session);
    assert!(debug.contains("debug-me"));
    assert!(debug.contains("Unknown"));
}

#[test]
fn concurrent_readers_see_consistent_states() {
    let session = Arc::new(Session::new("14"));
    session.writer().initialize(State::Background, false);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let session = session.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    let state = session.state();
                    assert!(matches!(state, State::Foreground | State::Background));
                }
            })
        })
        .collect();

    for i in 0..1000 {
        let next = if i % 2 == 0 {
            State::Foreground
        } else {
            State::Background
        };
        session.writer().set(next);
    }

    for reader in readers {
        reader.join().expect("reader panicked");
    }
}
