use crate::error::VrError;
use crate::eye::{Eye, PerEye};

/// Where the current frame is in its acquire/render/submit cycle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    WaitingForFrame,
    FrameAcquired,
    Rendering,
    Submitted,
}

/// Timing and prediction data for exactly one frame
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FrameState {
    /// Runtime clock value at which the frame is expected to reach the eyes, in nanoseconds
    pub predicted_display_time: i64,
    /// Runtime hint; when false no images are acquired and an empty frame is submitted
    pub should_render: bool,
}

/// Enforces one frame in flight. Every transition checks the current phase and leaves the
/// cycle untouched when called out of order.
#[derive(Debug)]
pub struct FrameCycle {
    phase: FramePhase,
    state: Option<FrameState>,
    acquired: PerEye<Option<u32>>,
    translated: bool,
    frame_index: u64,
}

impl FrameCycle {
    pub fn new() -> Self {
        Self {
            phase: FramePhase::Idle,
            state: None,
            acquired: PerEye::default(),
            translated: false,
            frame_index: 0,
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Frames completed so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Timing of the frame in flight, if any
    pub fn state(&self) -> Option<&FrameState> {
        self.state.as_ref()
    }

    /// Image index held for `eye` in the frame in flight
    pub fn acquired(&self, eye: Eye) -> Option<u32> {
        self.acquired[eye]
    }

    /// Fails with `Protocol` unless the cycle is in `phase`
    pub fn ensure(&self, phase: FramePhase, op: &'static str) -> Result<(), VrError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(VrError::Protocol {
                op,
                phase: self.phase,
            })
        }
    }

    /// Idle → WaitingForFrame
    pub fn begin_wait(&mut self) -> Result<(), VrError> {
        self.ensure(FramePhase::Idle, "wait for a frame")?;
        self.phase = FramePhase::WaitingForFrame;
        Ok(())
    }

    /// Record the runtime's frame timing while waiting
    pub fn frame_ready(&mut self, state: FrameState) -> Result<(), VrError> {
        self.ensure(FramePhase::WaitingForFrame, "record frame timing")?;
        self.state = Some(state);
        Ok(())
    }

    /// Record the swapchain image held for `eye`. Each eye may be acquired once per frame.
    pub fn acquire(&mut self, eye: Eye, index: u32) -> Result<(), VrError> {
        self.ensure(FramePhase::WaitingForFrame, "acquire an image")?;
        if self.acquired[eye].is_some() {
            return Err(VrError::Protocol {
                op: "acquire an image twice",
                phase: self.phase,
            });
        }
        self.acquired[eye] = Some(index);
        Ok(())
    }

    /// WaitingForFrame → FrameAcquired
    pub fn finish_acquire(&mut self) -> Result<(), VrError> {
        self.ensure(FramePhase::WaitingForFrame, "finish acquiring")?;
        if self.state.is_none() {
            return Err(VrError::Protocol {
                op: "finish acquiring without frame timing",
                phase: self.phase,
            });
        }
        self.phase = FramePhase::FrameAcquired;
        Ok(())
    }

    /// FrameAcquired → Rendering
    pub fn begin_render(&mut self) -> Result<(), VrError> {
        self.ensure(FramePhase::FrameAcquired, "render")?;
        self.phase = FramePhase::Rendering;
        Ok(())
    }

    /// Note that the eye targets were copied into the swapchain. Idempotent within a frame.
    pub fn mark_translated(&mut self) -> Result<(), VrError> {
        self.ensure(FramePhase::Rendering, "present")?;
        self.translated = true;
        Ok(())
    }

    /// Rendering → Submitted
    pub fn submit(&mut self) -> Result<(), VrError> {
        self.ensure(FramePhase::Rendering, "submit")?;
        let should_render = self.state.map(|s| s.should_render).unwrap_or(false);
        if should_render && !self.translated {
            return Err(VrError::Protocol {
                op: "submit before present",
                phase: self.phase,
            });
        }
        self.phase = FramePhase::Submitted;
        Ok(())
    }

    /// Submitted → Idle. Returns the image indices that were held.
    pub fn release(&mut self) -> Result<PerEye<Option<u32>>, VrError> {
        self.ensure(FramePhase::Submitted, "release")?;
        let held = std::mem::replace(&mut self.acquired, PerEye::default());
        self.state = None;
        self.translated = false;
        self.frame_index += 1;
        self.phase = FramePhase::Idle;
        Ok(held)
    }

    /// Drop whatever frame was in flight; used when the session is torn down
    pub fn abandon(&mut self) {
        self.phase = FramePhase::Idle;
        self.state = None;
        self.acquired = PerEye::default();
        self.translated = false;
    }
}

impl Default for FrameCycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendering_state() -> FrameState {
        FrameState {
            predicted_display_time: 11_111_111,
            should_render: true,
        }
    }

    fn acquire_both(cycle: &mut FrameCycle) {
        cycle.begin_wait().unwrap();
        cycle.frame_ready(rendering_state()).unwrap();
        cycle.acquire(Eye::Left, 0).unwrap();
        cycle.acquire(Eye::Right, 0).unwrap();
        cycle.finish_acquire().unwrap();
    }

    #[test]
    fn full_cycle() {
        let mut cycle = FrameCycle::new();
        acquire_both(&mut cycle);
        cycle.begin_render().unwrap();
        cycle.mark_translated().unwrap();
        cycle.submit().unwrap();
        let held = cycle.release().unwrap();
        assert_eq!(held, PerEye::new(Some(0), Some(0)));
        assert_eq!(cycle.phase(), FramePhase::Idle);
        assert_eq!(cycle.frame_index(), 1);
        assert!(cycle.state().is_none());
    }

    #[test]
    fn second_acquire_of_an_eye_is_rejected() {
        let mut cycle = FrameCycle::new();
        cycle.begin_wait().unwrap();
        cycle.acquire(Eye::Left, 1).unwrap();
        let err = cycle.acquire(Eye::Left, 2).unwrap_err();
        assert!(matches!(err, VrError::Protocol { .. }));
        assert_eq!(cycle.acquired(Eye::Left), Some(1));
    }

    #[test]
    fn cannot_start_a_frame_before_the_last_one_is_released() {
        let mut cycle = FrameCycle::new();
        acquire_both(&mut cycle);
        assert!(cycle.begin_wait().is_err());
        cycle.begin_render().unwrap();
        assert!(cycle.begin_wait().is_err());
        cycle.mark_translated().unwrap();
        cycle.submit().unwrap();
        assert!(cycle.begin_wait().is_err());
        cycle.release().unwrap();
        cycle.begin_wait().unwrap();
    }

    #[test]
    fn submit_requires_present() {
        let mut cycle = FrameCycle::new();
        acquire_both(&mut cycle);
        cycle.begin_render().unwrap();
        assert!(cycle.submit().is_err());
        assert_eq!(cycle.phase(), FramePhase::Rendering);
    }

    #[test]
    fn skipped_frames_submit_without_present() {
        let mut cycle = FrameCycle::new();
        cycle.begin_wait().unwrap();
        cycle
            .frame_ready(FrameState {
                predicted_display_time: 5,
                should_render: false,
            })
            .unwrap();
        cycle.finish_acquire().unwrap();
        cycle.begin_render().unwrap();
        cycle.submit().unwrap();
        assert_eq!(cycle.release().unwrap(), PerEye::new(None, None));
    }

    #[test]
    fn abandon_resets() {
        let mut cycle = FrameCycle::new();
        acquire_both(&mut cycle);
        cycle.abandon();
        assert_eq!(cycle.phase(), FramePhase::Idle);
        assert_eq!(cycle.acquired(Eye::Right), None);
    }
}
