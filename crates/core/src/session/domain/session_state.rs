use std::fmt;

/// Lifecycle of a capture session.
///
/// `Idle → Running` on start, `Running → Capturing` on a still request and
/// back once the still is delivered, `Running | Capturing → Stopped` on stop
/// or a fatal device error. A stopped session only runs again on an explicit
/// start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Capturing,
    Stopped,
}

impl SessionState {
    /// Frames are being acquired and processed.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Running | SessionState::Capturing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Capturing => "capturing",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_and_capturing_are_active() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Running.is_active());
        assert!(SessionState::Capturing.is_active());
        assert!(!SessionState::Stopped.is_active());
    }
}
