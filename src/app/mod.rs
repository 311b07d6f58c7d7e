//! Frame loop driving a host application through an `HmdBackend`, with a flat fallback when VR
//! is unavailable or the session ends.
mod target_time;
pub use target_time::TargetTime;

use crate::config::VrConfig;
use crate::error::VrError;
use crate::eye::PerEye;
use crate::eye_target::EyeRenderTarget;
use crate::gpu::{Framebuffer, FramebufferId};
use crate::host::HostRenderer;
use crate::{FrameInfo, FrameStart, HmdBackend};
use anyhow::Result;
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// The host side of the frame loop
pub trait App {
    /// Render both eyes for the given frame into the backend's eye targets
    fn render_eyes(
        &mut self,
        host: &mut dyn HostRenderer,
        eyes: &PerEye<EyeRenderTarget>,
        frame: &FrameInfo,
    ) -> Result<()>;

    /// Render one frame to the host's own output
    fn render_flat(&mut self, host: &mut dyn HostRenderer) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after this many frames; run until interrupted if `None`
    pub frames: Option<u64>,
    /// Sleep between polls while the session is not running
    pub paused_backoff: Duration,
    /// Frame rate of the flat fallback
    pub flat_fps: u64,
    /// Copy each submitted frame to the host's output
    pub mirror: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            frames: None,
            paused_backoff: Duration::from_millis(100),
            flat_fps: 60,
            mirror: true,
        }
    }
}

/// How a run ended. `frames` counts frames handed to the runtime or rendered flat.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { frames: u64 },
    Interrupted { frames: u64 },
    /// VR stopped working; the remaining frames were rendered flat
    FellBackToFlat { reason: String, frames: u64 },
}

/// Flag cleared by Ctrl-C
pub fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Relaxed);
    })?;
    Ok(running)
}

fn done(options: &RunOptions, frames: u64) -> bool {
    options.frames.map_or(false, |limit| frames >= limit)
}

/// Render one VR frame. `Ok(false)` means the session is paused and no frame was produced.
fn vr_frame<B: HmdBackend + ?Sized>(
    app: &mut dyn App,
    backend: &mut B,
    host: &mut dyn HostRenderer,
    config: &mut VrConfig,
    options: &RunOptions,
) -> Result<bool, VrError> {
    let frame = match backend.frame_start(host, config)? {
        FrameStart::Render(frame) => frame,
        FrameStart::Skipped => return Ok(true),
        FrameStart::Paused => return Ok(false),
    };
    let eyes = *backend.begin_render()?;
    if let Err(e) = app.render_eyes(host, &eyes, &frame) {
        return Err(VrError::SessionEnded {
            reason: format!("host rendering failed: {:#}", e),
            source: None,
        });
    }
    backend.present(host)?;
    backend.frame_end(host)?;
    if options.mirror {
        let screen = Framebuffer {
            id: FramebufferId(0),
            extent: host.output_extent(),
        };
        if let Err(e) = backend.mirror(host, screen) {
            warn!("Mirror failed: {}", e);
        }
    }
    Ok(true)
}

fn flat_frames(
    app: &mut dyn App,
    host: &mut dyn HostRenderer,
    options: &RunOptions,
    running: &AtomicBool,
    mut frames: u64,
    reason: String,
) -> Result<RunOutcome> {
    warn!("Falling back to flat rendering: {}", reason);
    let mut pacer = TargetTime::new(options.flat_fps);
    while running.load(Ordering::Relaxed) && !done(options, frames) {
        pacer.start_frame();
        app.render_flat(host)?;
        frames += 1;
        pacer.end_frame();
    }
    Ok(RunOutcome::FellBackToFlat { reason, frames })
}

/// Enable the backend at the configured scale and drive frames until the frame limit is hit or
/// `running` is cleared. VR failures that leave no session switch to flat rendering; frame
/// protocol misuse is returned as an error.
pub fn run<B: HmdBackend + ?Sized>(
    app: &mut dyn App,
    backend: &mut B,
    host: &mut dyn HostRenderer,
    config: &mut VrConfig,
    options: &RunOptions,
    running: &AtomicBool,
) -> Result<RunOutcome> {
    if let Err(e) = backend.enable(host, config.render_scale.get()) {
        return flat_frames(app, host, options, running, 0, e.to_string());
    }
    info!("VR enabled on the {:?} backend", backend.kind());

    let mut frames = 0;
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("Requesting exit");
            backend.disable(host);
            return Ok(RunOutcome::Interrupted { frames });
        }
        if done(options, frames) {
            backend.disable(host);
            return Ok(RunOutcome::Completed { frames });
        }

        match vr_frame(app, backend, host, config, options) {
            Ok(true) => frames += 1,
            Ok(false) => std::thread::sleep(options.paused_backoff),
            Err(e @ VrError::Protocol { .. }) => {
                backend.disable(host);
                return Err(e.into());
            }
            Err(e) => {
                backend.disable(host);
                return flat_frames(app, host, options, running, frames, e.to_string());
            }
        }
    }
}
