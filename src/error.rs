use crate::frame_sync::FramePhase;
use crate::gpu::Extent;
use thiserror::Error;

/// Failure reported by a runtime, host renderer or interop collaborator
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The request exceeded a limit of the runtime; the caller may clamp and retry
    #[error("requested {requested} exceeds the runtime limit of {limit}")]
    ResourceLimit { requested: Extent, limit: Extent },
    /// Any other failed call
    #[error(transparent)]
    Call(#[from] anyhow::Error),
}

/// Errors surfaced to the host renderer.
///
/// `Unavailable` is never fatal: the host keeps rendering flat. `SessionEnded` means the session
/// has already been torn down and must be re-initialized explicitly. `Protocol` is a usage error
/// that leaves all state untouched.
#[derive(Debug, Error)]
pub enum VrError {
    #[error("VR unavailable: {0}")]
    Unavailable(String),

    #[error("VR session ended: {reason}")]
    SessionEnded {
        reason: String,
        #[source]
        source: Option<RuntimeError>,
    },

    #[error("cannot {op} while the frame is {phase:?}")]
    Protocol { op: &'static str, phase: FramePhase },
}

impl VrError {
    pub(crate) fn ended(reason: impl Into<String>) -> Self {
        VrError::SessionEnded {
            reason: reason.into(),
            source: None,
        }
    }

    /// Whether the host must fall back to flat rendering and re-initialize to use VR again
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, VrError::SessionEnded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_session_end_is_fatal() {
        assert!(VrError::ended("device lost").is_session_fatal());
        assert!(!VrError::Unavailable("no stereo".into()).is_session_fatal());
        let protocol = VrError::Protocol {
            op: "acquire",
            phase: FramePhase::Rendering,
        };
        assert!(!protocol.is_session_fatal());
        assert_eq!(
            protocol.to_string(),
            "cannot acquire while the frame is Rendering"
        );
    }

    #[test]
    fn resource_limit_message() {
        let err = RuntimeError::ResourceLimit {
            requested: Extent::new(8192, 4096),
            limit: Extent::new(4096, 4096),
        };
        assert_eq!(
            err.to_string(),
            "requested 8192x4096 exceeds the runtime limit of 4096x4096"
        );
    }
}
