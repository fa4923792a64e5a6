//! Concurrent access tests for the Controller registry.

use super::*;
use crate::session::SessionId;

#[test]
fn test_concurrent_find_with_create_registers_once() {
    let controller = Controller::new(MemorySource::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let controller = controller.clone();
            std::thread::spawn(move || {
                for i in 0..50u32 {
                    controller.find(&SessionId::Handle(i), true);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(controller.size(), 50);
    let sessions = controller.sessions();
    assert!(sessions.iter().all(|s| s.alive()));
}

#[test]
fn test_concurrent_refresh_emits_each_logon_once() {
    let source = MemorySource::new();
    for i in 0..20u32 {
        source.insert(SessionId::Handle(i), user("u"), status(State::Foreground));
    }
    let controller = Controller::new(source);
    let recorder = Recorder::attach(&controller);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let controller = controller.clone();
            std::thread::spawn(move || controller.refresh().expect("refresh"))
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(controller.size(), 20);
    assert_eq!(recorder.count(Event::Logon), 20);
}

#[test]
fn test_readers_do_not_block_on_transitions() {
    let source = two_sessions();
    let controller = Controller::new(source.clone());
    controller.refresh().expect("refresh");
    let alice = controller.find(&SessionId::from("1"), false).expect("tracked");

    let reader = {
        let alice = Arc::clone(&alice);
        std::thread::spawn(move || {
            for _ in 0..1000 {
                let _ = (alice.active(), alice.locked(), alice.to_string());
            }
        })
    };
    for i in 0..100 {
        source
            .set_status(&SessionId::from("1"), status(State::Foreground).locked(i % 2 == 0))
            .expect("known");
        controller.refresh().expect("refresh");
    }
    reader.join().expect("reader panicked");

    assert!(alice.active());
}
