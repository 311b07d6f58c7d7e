//! xrbridge. Lets a renderer drive either a vendor HMD SDK or an OpenXR runtime through one
//! interface: negotiate per-eye render targets, then start, present and submit stereo frames on
//! the runtime's clock. Runtimes, the host renderer and the GL/D3D interop device are supplied
//! by the caller through traits.
extern crate openxr as xr;
pub mod app;
mod config;
mod error;
mod eye;
mod eye_target;
pub mod fov;
mod frame_sync;
pub mod gpu;
pub mod hardware_query;
mod host;
pub mod interop;
pub mod mock;
mod rift;
pub mod runtime;
pub mod session;
mod swapchain_images;
pub mod tracking;
mod vr;

pub use config::{ConfigChanges, Tunable, VrConfig};
pub use error::{RuntimeError, VrError};
pub use eye::{Eye, PerEye};
pub use eye_target::EyeRenderTarget;
pub use frame_sync::{FrameCycle, FramePhase, FrameState};
pub use host::{FramebufferBinding, HostRenderer};
pub use rift::RiftBackend;
pub use runtime::{Runtime, View};
pub use session::SessionState;
pub use swapchain_images::SwapchainImageSet;
pub use vr::xr_runtime::{XrGraphics, XrRuntime};
pub use vr::{xr_prelude, OpenXrBackend};

use fov::CombinedFov;
use gpu::Framebuffer;
use interop::InteropDevice;
use tracking::Pose;

/// Which runtime family drives the headset. Chosen once at startup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Rift,
    OpenXr,
}

/// View parameters for renderers that are not stereo aware
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct ViewState {
    pub combined: CombinedFov,
    /// Host output width over panel width
    pub pixel_scale: f32,
}

/// What the host needs to know to render the current frame
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameInfo {
    pub predicted_display_time: i64,
    /// Per-eye pose and FOV at the predicted display time
    pub views: PerEye<View>,
    /// Head pose at the predicted display time
    pub head: Pose,
    /// Blend weight towards greyscale, applied by the backend when presenting
    pub desaturation: f32,
    pub view: ViewState,
}

/// Result of `frame_start`
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FrameStart {
    /// Render into the eye targets, then `present` and `frame_end`
    Render(FrameInfo),
    /// The runtime asked for no rendering this frame; an empty frame was already submitted
    Skipped,
    /// The session is not running; try again later
    Paused,
}

/// Trait all backends implement. One frame goes `frame_start` → `begin_render` → host renders
/// → `present` → `frame_end`.
pub trait HmdBackend {
    fn kind(&self) -> BackendKind;

    /// Negotiate with the runtime, create the session and allocate eye targets at
    /// `pixel_scale` times the recommended size. Calling it again with the same inputs
    /// reallocates nothing.
    fn enable(
        &mut self,
        host: &mut dyn HostRenderer,
        pixel_scale: f32,
    ) -> Result<&PerEye<EyeRenderTarget>, VrError>;

    /// Release swapchains, interop handles, eye targets and the session. Safe to call at any
    /// point, including after a failed `enable`.
    fn disable(&mut self, host: &mut dyn HostRenderer);

    /// Apply configuration changes and block until the runtime wants a frame
    fn frame_start(
        &mut self,
        host: &mut dyn HostRenderer,
        config: &mut VrConfig,
    ) -> Result<FrameStart, VrError>;

    /// Eye targets to render into for the acquired frame
    fn begin_render(&mut self) -> Result<&PerEye<EyeRenderTarget>, VrError>;

    /// Copy the eye targets into the acquired swapchain images
    fn present(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError>;

    /// Hand the frame to the compositor and release the swapchain images
    fn frame_end(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError>;

    /// Draw what the headset shows into a host framebuffer
    fn mirror(
        &mut self,
        host: &mut dyn HostRenderer,
        destination: Framebuffer,
    ) -> Result<(), RuntimeError>;

    fn eye_targets(&self) -> &PerEye<EyeRenderTarget>;
    fn view_state(&self) -> Option<ViewState>;
    fn session_state(&self) -> SessionState;
    fn frame_phase(&self) -> FramePhase;
}

/// The backend picked at startup
pub enum Backend<R: Runtime, I: InteropDevice> {
    Rift(RiftBackend<R>),
    OpenXr(OpenXrBackend<R, I>),
}

impl<R: Runtime, I: InteropDevice> Backend<R, I> {
    /// `interop` is only used by the OpenXR backend, and only when the runtime lacks OpenGL
    pub fn new(kind: BackendKind, runtime: R, interop: I) -> Self {
        match kind {
            BackendKind::Rift => Backend::Rift(RiftBackend::new(runtime)),
            BackendKind::OpenXr => Backend::OpenXr(OpenXrBackend::new(runtime, interop)),
        }
    }

    pub fn runtime(&self) -> &R {
        match self {
            Backend::Rift(b) => b.runtime(),
            Backend::OpenXr(b) => b.runtime(),
        }
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        match self {
            Backend::Rift(b) => b.runtime_mut(),
            Backend::OpenXr(b) => b.runtime_mut(),
        }
    }

    fn inner(&self) -> &dyn HmdBackend {
        match self {
            Backend::Rift(b) => b,
            Backend::OpenXr(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn HmdBackend {
        match self {
            Backend::Rift(b) => b,
            Backend::OpenXr(b) => b,
        }
    }
}

impl<R: Runtime, I: InteropDevice> HmdBackend for Backend<R, I> {
    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn enable(
        &mut self,
        host: &mut dyn HostRenderer,
        pixel_scale: f32,
    ) -> Result<&PerEye<EyeRenderTarget>, VrError> {
        self.inner_mut().enable(host, pixel_scale)
    }

    fn disable(&mut self, host: &mut dyn HostRenderer) {
        self.inner_mut().disable(host)
    }

    fn frame_start(
        &mut self,
        host: &mut dyn HostRenderer,
        config: &mut VrConfig,
    ) -> Result<FrameStart, VrError> {
        self.inner_mut().frame_start(host, config)
    }

    fn begin_render(&mut self) -> Result<&PerEye<EyeRenderTarget>, VrError> {
        self.inner_mut().begin_render()
    }

    fn present(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        self.inner_mut().present(host)
    }

    fn frame_end(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        self.inner_mut().frame_end(host)
    }

    fn mirror(
        &mut self,
        host: &mut dyn HostRenderer,
        destination: Framebuffer,
    ) -> Result<(), RuntimeError> {
        self.inner_mut().mirror(host, destination)
    }

    fn eye_targets(&self) -> &PerEye<EyeRenderTarget> {
        self.inner().eye_targets()
    }

    fn view_state(&self) -> Option<ViewState> {
        self.inner().view_state()
    }

    fn session_state(&self) -> SessionState {
        self.inner().session_state()
    }

    fn frame_phase(&self) -> FramePhase {
        self.inner().frame_phase()
    }
}

pub(crate) const ENGINE_NAME: &str = "xrbridge";
