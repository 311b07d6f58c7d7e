use crate::error::VrError;
use crate::runtime::Runtime;
use log::{debug, info, warn};

/// Session lifecycle as seen by the backend. Frames are only requested while `Running`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Ready,
    Running,
    Stopping,
    Exited,
}

/// Session states a runtime reports
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuntimeSessionState {
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

/// Asynchronous notifications from the runtime
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    StateChanged(RuntimeSessionState),
    InstanceLossPending,
    TrackingLost,
    DeviceLost,
    EventsLost(u32),
}

/// Follows runtime events and begins or ends the session in response
#[derive(Debug)]
pub struct SessionTracker {
    state: SessionState,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// For runtimes that start rendering as soon as the session exists
    pub fn mark_running(&mut self) {
        self.transition(SessionState::Running);
    }

    pub fn reset(&mut self) {
        self.state = SessionState::NotStarted;
    }

    fn transition(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Handle every pending event. Returns `SessionEnded` on any loss or exit; the caller is
    /// responsible for tearing the session down.
    pub fn drain<R: Runtime + ?Sized>(&mut self, runtime: &mut R) -> Result<SessionState, VrError> {
        while let Some(event) = runtime.poll_event() {
            self.handle(runtime, event)?;
        }
        Ok(self.state)
    }

    fn handle<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        event: RuntimeEvent,
    ) -> Result<(), VrError> {
        match event {
            RuntimeEvent::StateChanged(state) => {
                debug!("Runtime entered state {:?}", state);
                match state {
                    RuntimeSessionState::Ready => {
                        self.transition(SessionState::Ready);
                        runtime.begin_session().map_err(|e| VrError::SessionEnded {
                            reason: "failed to begin the session".into(),
                            source: Some(e),
                        })?;
                        self.transition(SessionState::Running);
                    }
                    RuntimeSessionState::Stopping => {
                        self.transition(SessionState::Stopping);
                        runtime.end_session().map_err(|e| VrError::SessionEnded {
                            reason: "failed to end the session".into(),
                            source: Some(e),
                        })?;
                    }
                    RuntimeSessionState::Exiting => return Err(self.exit("runtime is exiting")),
                    RuntimeSessionState::LossPending => {
                        return Err(self.exit("session loss pending"))
                    }
                    _ => {}
                }
            }
            RuntimeEvent::InstanceLossPending => return Err(self.exit("instance loss pending")),
            RuntimeEvent::TrackingLost => return Err(self.exit("tracking lost")),
            RuntimeEvent::DeviceLost => return Err(self.exit("device lost")),
            RuntimeEvent::EventsLost(count) => warn!("Runtime lost {} events", count),
        }
        Ok(())
    }

    fn exit(&mut self, reason: &str) -> VrError {
        self.transition(SessionState::Exited);
        VrError::ended(reason)
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}
