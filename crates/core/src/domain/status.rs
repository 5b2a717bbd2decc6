//! Notification lifecycle status
//!
//! ```text
//! New -> Process -> Sent
//!                -> Fail -> Sent
//!                        -> Dead
//! ```
//!
//! `Sent` and `Dead` are terminal. Nothing re-enters `New`.

use serde::{Deserialize, Serialize};

/// Notification status, persisted and carried on the wire as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    New,
    Process,
    Sent,
    Fail,
    Dead,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::New,
        Status::Process,
        Status::Sent,
        Status::Fail,
        Status::Dead,
    ];

    /// Integer code used by the store and the retry queue payload
    pub fn code(self) -> u8 {
        match self {
            Status::New => 1,
            Status::Process => 2,
            Status::Sent => 3,
            Status::Fail => 4,
            Status::Dead => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Status> {
        match code {
            1 => Some(Status::New),
            2 => Some(Status::Process),
            3 => Some(Status::Sent),
            4 => Some(Status::Fail),
            5 => Some(Status::Dead),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "New",
            Status::Process => "Process",
            Status::Sent => "Sent",
            Status::Fail => "Fail",
            Status::Dead => "Dead",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Sent | Status::Dead)
    }

    /// Whether `self -> next` is one of the lifecycle transitions.
    ///
    /// Re-recording the current status is not a transition; callers that
    /// want idempotent writes check `self == next` themselves.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::New, Status::Process)
                | (Status::Process, Status::Sent)
                | (Status::Process, Status::Fail)
                | (Status::Fail, Status::Sent)
                | (Status::Fail, Status::Dead)
        )
    }

    /// Statuses from which `self` may be entered
    pub fn predecessors(self) -> Vec<Status> {
        Status::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for Status {
    type Error = crate::domain::DomainError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Status::from_code(code).ok_or(crate::domain::DomainError::UnknownStatus(code))
    }
}

/// Label for a raw status code; unrecognized codes read as "Unknown"
pub fn status_label(code: u8) -> &'static str {
    Status::from_code(code).map_or("Unknown", Status::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::from_code(status.code()), Some(status));
        }
        assert_eq!(Status::New.code(), 1);
        assert_eq!(Status::Dead.code(), 5);
    }

    #[test]
    fn test_labels() {
        assert_eq!(status_label(1), "New");
        assert_eq!(status_label(2), "Process");
        assert_eq!(status_label(3), "Sent");
        assert_eq!(status_label(4), "Fail");
        assert_eq!(status_label(5), "Dead");
        assert_eq!(status_label(0), "Unknown");
        assert_eq!(status_label(42), "Unknown");
    }

    #[test]
    fn test_allowed_transitions() {
        assert!(Status::New.can_transition_to(Status::Process));
        assert!(Status::Process.can_transition_to(Status::Sent));
        assert!(Status::Process.can_transition_to(Status::Fail));
        assert!(Status::Fail.can_transition_to(Status::Sent));
        assert!(Status::Fail.can_transition_to(Status::Dead));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in Status::ALL {
            assert!(!Status::Sent.can_transition_to(next));
            assert!(!Status::Dead.can_transition_to(next));
        }
        assert!(Status::Sent.is_terminal());
        assert!(Status::Dead.is_terminal());
        assert!(!Status::Fail.is_terminal());
    }

    #[test]
    fn test_nothing_reenters_new() {
        assert!(Status::New.predecessors().is_empty());
    }

    #[test]
    fn test_predecessors() {
        assert_eq!(Status::Sent.predecessors(), vec![Status::Process, Status::Fail]);
        assert_eq!(Status::Dead.predecessors(), vec![Status::Fail]);
        assert_eq!(Status::Process.predecessors(), vec![Status::New]);
    }

    #[test]
    fn test_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Status::Fail).unwrap(), "4");
        let parsed: Status = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, Status::Sent);
        tokio_test::assert_err!(serde_json::from_str::<Status>("9"));
    }
}
