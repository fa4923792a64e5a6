//! End-to-end flow through the public API: configured alerts bound to a
//! controller fed by an in-memory session source.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use session_watch::alert::{AlertAction, AlertBinding, AlertFilter};
use session_watch::config::Config;
use session_watch::source::{MemorySource, SessionStatus};
use session_watch::{
    Controller, Event, HandlerError, SessionAttributes, SessionEvent, SessionId, State,
};
use tokio::sync::broadcast::Receiver;

const CONFIG: &str = r#"
[settings.alert-defaults]
allow-on-remote-session = false

[[alerts]]
name = "welcome"
event = "logon"
message = "Welcome ${username}"

[[alerts]]
name = "screen"
events = ["lock", "unlock"]
message = "${username} ${event} (${alertname})"
allow-on-remote-session = true
"#;

/// Collects expanded messages.
struct Collect {
    template: String,
    out: Arc<Mutex<Vec<String>>>,
}

impl AlertAction for Collect {
    fn activate(&self, expand: &dyn Fn(&str) -> String) -> Result<(), HandlerError> {
        self.out.lock().unwrap().push(expand(&self.template));
        Ok(())
    }

    fn deactivate(&self) {}
}

fn bind(controller: &Controller, config: &Config, out: &Arc<Mutex<Vec<String>>>) {
    for alert in &config.alerts {
        let filter = AlertFilter::from_config(alert, config.settings_for(alert))
            .expect("valid alert");
        let action = Collect {
            template: alert.message.clone(),
            out: out.clone(),
        };
        controller.add_handler(Arc::new(AlertBinding::new(filter, Arc::new(action))));
    }
}

fn user(name: &str, remote: bool) -> SessionAttributes {
    SessionAttributes {
        username: Some(name.to_string()),
        remote,
        ..SessionAttributes::default()
    }
}

async fn next_event(rx: &mut Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

#[tokio::test]
async fn alerts_follow_session_lifecycle() {
    let config: Config = toml::from_str(CONFIG).expect("valid config");
    let source = MemorySource::new();
    source.insert(
        "1",
        user("alice", false),
        SessionStatus::new(State::Foreground),
    );

    let controller = Controller::new(source.clone());
    let out = Arc::new(Mutex::new(Vec::new()));
    bind(&controller, &config, &out);
    let mut rx = controller.subscribe();

    controller.activate().await.expect("activate");
    let first = next_event(&mut rx).await;
    assert_eq!(first.event, Event::AlreadyActive);
    assert_eq!(first.session_name, "alice");

    // Remote logons are filtered out by the settings group.
    source.appear("2", user("bob", true), SessionStatus::new(State::Background));
    assert_eq!(next_event(&mut rx).await.event, Event::Logon);

    source.appear("3", user("carol", false), SessionStatus::new(State::Foreground));
    assert_eq!(next_event(&mut rx).await.event, Event::Logon);

    // The screen alert re-allows remote sessions with its own key.
    source
        .lock_session(&SessionId::from("2"), true)
        .expect("known session");
    let locked = next_event(&mut rx).await;
    assert_eq!(locked.event, Event::Lock);
    assert!(locked.locked);

    source
        .focus(&SessionId::from("2"), true)
        .expect("known session");
    let focused = next_event(&mut rx).await;
    assert_eq!(focused.event, Event::Foreground);
    assert_eq!(focused.state, State::Foreground);

    source.vanish(&SessionId::from("3"));
    assert_eq!(next_event(&mut rx).await.event, Event::Logoff);

    controller.deactivate().await.expect("deactivate");
    let mut still_active = Vec::new();
    for _ in 0..2 {
        let event = next_event(&mut rx).await;
        assert_eq!(event.event, Event::StillActive);
        still_active.push(event.session_name);
    }
    still_active.sort();
    assert_eq!(still_active, vec!["alice", "bob"]);
    assert_eq!(controller.size(), 0);

    assert_eq!(
        *out.lock().unwrap(),
        vec!["Welcome carol".to_string(), "bob lock (screen)".to_string()]
    );
}

#[tokio::test]
async fn refresh_catches_missed_notifications() {
    let source = MemorySource::new();
    let controller = Controller::builder(source.clone())
        .refresh_interval(Some(Duration::from_millis(20)))
        .build();
    let mut rx = controller.subscribe();
    controller.activate().await.expect("activate");

    // Inserted without a notification; only the periodic refresh sees it.
    source.insert("7", user("dora", false), SessionStatus::new(State::Foreground));

    let event = next_event(&mut rx).await;
    assert_eq!(event.event, Event::Logon);
    assert_eq!(event.session_id, SessionId::from("7"));
    assert_eq!(controller.size(), 1);

    controller.deactivate().await.expect("deactivate");
}
