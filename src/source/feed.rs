//! JSON Lines feed that drives a [`MemorySource`].
//!
//! An external bridge (a logind signal listener, a WTS hook, a test script)
//! writes one command per line:
//!
//! ```text
//! {"type":"appeared","id":"7","state":"active","attributes":{"username":"alice"}}
//! {"type":"lock","id":"7","locked":true}
//! {"type":"focus","id":"7","focused":false}
//! {"type":"removed","id":"7"}
//! {"type":"sleep"}
//! ```
//!
//! Blank lines are ignored. Malformed lines are logged and skipped.

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{MemorySource, Notification, SessionStatus};
use crate::error::SourceError;
use crate::session::{SessionAttributes, SessionId, State};

/// Errors from reading or applying feed lines.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Reading the input failed.
    #[error("failed to read feed input")]
    Io(#[from] std::io::Error),

    /// A line is not a valid command.
    #[error("invalid feed command on line {line}: {source}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The command refers to a session the source does not know.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// One feed line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedCommand {
    /// A session appeared (or was re-announced with new values).
    Appeared {
        /// Session id.
        id: SessionId,
        /// Lifecycle state.
        state: State,
        /// Screen lock.
        #[serde(default)]
        locked: bool,
        /// Identity and descriptive attributes.
        #[serde(default)]
        attributes: SessionAttributes,
    },
    /// A session went away.
    Removed {
        /// Session id.
        id: SessionId,
    },
    /// Focus moved to or away from a session.
    Focus {
        /// Session id.
        id: SessionId,
        /// `true` when the session gained the focus.
        focused: bool,
    },
    /// The screen lock of a session changed.
    Lock {
        /// Session id.
        id: SessionId,
        /// New lock state.
        locked: bool,
    },
    /// System is preparing to sleep.
    Sleep,
    /// System resumed.
    Resume,
    /// System is shutting down.
    Shutdown,
}

impl FeedCommand {
    /// Parses one line. `line` is only used for the error.
    pub fn parse(text: &str, line: usize) -> Result<Self, FeedError> {
        serde_json::from_str(text).map_err(|source| FeedError::Parse { line, source })
    }

    /// Updates the source and notifies its subscribers.
    pub fn apply(self, source: &MemorySource) -> Result<(), FeedError> {
        match self {
            FeedCommand::Appeared {
                id,
                state,
                locked,
                attributes,
            } => source.appear(id, attributes, SessionStatus { state, locked }),
            FeedCommand::Removed { id } => source.vanish(&id),
            FeedCommand::Focus { id, focused } => source.focus(&id, focused)?,
            FeedCommand::Lock { id, locked } => source.lock_session(&id, locked)?,
            FeedCommand::Sleep => {
                source.notify(Notification::SystemSleep);
            }
            FeedCommand::Resume => {
                source.notify(Notification::SystemResume);
            }
            FeedCommand::Shutdown => {
                source.notify(Notification::SystemShutdown);
            }
        }
        Ok(())
    }
}

/// Reads commands until end of input and applies them to `source`.
///
/// Returns the number of applied commands. Only I/O errors end the loop.
pub async fn run<R>(reader: R, source: &MemorySource) -> Result<usize, FeedError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0;
    let mut applied = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match FeedCommand::parse(trimmed, line_no).and_then(|cmd| cmd.apply(source)) {
            Ok(()) => applied += 1,
            Err(e) => tracing::warn!(error = %e, "skipping feed line"),
        }
    }

    tracing::debug!(applied, "feed input closed");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SessionSource;

    #[test]
    fn parses_every_command_kind() {
        let appeared = FeedCommand::parse(
            r#"{"type":"appeared","id":"7","state":"active","attributes":{"username":"alice","remote":true}}"#,
            1,
        )
        .expect("valid");
        match appeared {
            FeedCommand::Appeared {
                id,
                state,
                locked,
                attributes,
            } => {
                assert_eq!(id, SessionId::from("7"));
                assert_eq!(state, State::Foreground);
                assert!(!locked);
                assert_eq!(attributes.username.as_deref(), Some("alice"));
                assert!(attributes.remote);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert_eq!(
            FeedCommand::parse(r#"{"type":"removed","id":3}"#, 2).expect("valid"),
            FeedCommand::Removed {
                id: SessionId::Handle(3)
            }
        );
        assert_eq!(
            FeedCommand::parse(r#"{"type":"lock","id":"c1","locked":true}"#, 3).expect("valid"),
            FeedCommand::Lock {
                id: SessionId::from("c1"),
                locked: true
            }
        );
        assert_eq!(
            FeedCommand::parse(r#"{"type":"shutdown"}"#, 4).expect("valid"),
            FeedCommand::Shutdown
        );
    }

    #[test]
    fn parse_error_carries_the_line_number() {
        let err = FeedCommand::parse(r#"{"type":"reboot"}"#, 12).expect_err("unknown type");
        assert!(matches!(err, FeedError::Parse { line: 12, .. }));
        assert!(err.to_string().contains("line 12"));
    }

    #[tokio::test]
    async fn run_applies_lines_and_skips_garbage() {
        let source = MemorySource::new();
        let mut rx = source.subscribe().expect("subscribe");
        let input = concat!(
            "{\"type\":\"appeared\",\"id\":\"1\",\"state\":\"online\"}\n",
            "\n",
            "not json\n",
            "{\"type\":\"focus\",\"id\":\"404\",\"focused\":true}\n",
            "{\"type\":\"focus\",\"id\":\"1\",\"focused\":true}\n",
            "{\"type\":\"sleep\"}\n",
        );

        let applied = run(input.as_bytes(), &source).await.expect("in-memory input");

        assert_eq!(applied, 3);
        assert_eq!(source.len(), 1);
        assert_eq!(
            rx.try_recv().ok(),
            Some(Notification::SessionAppeared(SessionId::from("1")))
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(Notification::FocusChanged(SessionId::from("1"), true))
        );
        assert_eq!(rx.try_recv().ok(), Some(Notification::SystemSleep));
    }
}
