//! Supervisor State Machine
//!
//! Each state names the phase the supervisor is currently driving:
//!
//! ```text
//! Init --Started--> LinkUp --LinkEstablished--> SessionUp --SessionEstablished--> Running
//!                     ^                            |  ^                              |
//!                     +---------LinkLost-----------+  +--------SessionLost-----------+
//!                     ^                                                              |
//!                     +--------------------------LinkLost----------------------------+
//! ```

use std::fmt;

/// Phase of the connection-and-command loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing driven yet
    Init,
    /// Bringing the link layer up
    LinkUp,
    /// Link is up, bringing the session up
    SessionUp,
    /// Both layers up, pumping messages
    Running,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Init => write!(f, "init"),
            SupervisorState::LinkUp => write!(f, "link-up"),
            SupervisorState::SessionUp => write!(f, "session-up"),
            SupervisorState::Running => write!(f, "running"),
        }
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Control loop started
    Started,
    /// Link association succeeded
    LinkEstablished,
    /// Link observed down by the per-cycle poll
    LinkLost,
    /// Session connected, announced and subscribed
    SessionEstablished,
    /// Session observed down before a pump, or the pump failed
    SessionLost,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and moved forward (or stayed put)
    Success(SupervisorState),
    /// A lower layer was lost; the supervisor fell back to re-drive it
    Regressed {
        from: SupervisorState,
        to: SupervisorState,
    },
    /// Transition was invalid from current state
    Invalid {
        from: SupervisorState,
        event: SupervisorEvent,
    },
}

/// The supervisor state machine
#[derive(Debug)]
pub struct SupervisorStateMachine {
    current_state: SupervisorState,
    link_drops: u32,
    session_drops: u32,
}

impl Default for SupervisorStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorStateMachine {
    /// Create a new state machine in Init state
    pub fn new() -> Self {
        Self {
            current_state: SupervisorState::Init,
            link_drops: 0,
            session_drops: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> SupervisorState {
        self.current_state
    }

    /// Number of link losses observed while the link was up
    pub fn link_drops(&self) -> u32 {
        self.link_drops
    }

    /// Number of session losses observed while running
    pub fn session_drops(&self) -> u32 {
        self.session_drops
    }

    /// Whether the session layer may be driven (the link is up)
    pub fn session_allowed(&self) -> bool {
        matches!(
            self.current_state,
            SupervisorState::SessionUp | SupervisorState::Running
        )
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SupervisorEvent) -> TransitionResult {
        use SupervisorEvent::*;
        use SupervisorState::*;

        let from = self.current_state;

        // Loss events regress to the phase that re-drives the lost layer
        match (from, event) {
            (SessionUp | Running, LinkLost) => {
                self.link_drops += 1;
                self.current_state = LinkUp;
                return TransitionResult::Regressed { from, to: LinkUp };
            }
            (Running, SessionLost) => {
                self.session_drops += 1;
                self.current_state = SessionUp;
                return TransitionResult::Regressed {
                    from,
                    to: SessionUp,
                };
            }
            _ => {}
        }

        match self.get_next_state(event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid { from, event },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: SupervisorEvent) -> Option<SupervisorState> {
        use SupervisorEvent::*;
        use SupervisorState::*;

        match (self.current_state, event) {
            (Init, Started) => Some(LinkUp),
            (LinkUp, LinkEstablished) => Some(SessionUp),
            (SessionUp, SessionEstablished) => Some(Running),

            // Repeated observations while already re-driving are no-ops
            (LinkUp, LinkLost) => Some(LinkUp),
            (SessionUp, SessionLost) => Some(SessionUp),

            _ => None,
        }
    }
}
