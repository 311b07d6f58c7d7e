//! The runtime service a backend drives: a vendor SDK or an OpenXR runtime.
use crate::error::{RuntimeError, VrError};
use crate::eye::{Eye, PerEye};
use crate::fov::FovTangents;
use crate::frame_sync::FrameState;
use crate::gpu::{ColorFormat, Extent, ImageHandle, TextureId, Viewport};
use crate::hardware_query::{GraphicsBinding, RuntimeCapabilities};
use crate::session::RuntimeEvent;
use crate::tracking::{CameraFrustum, Pose, PoseSample};
use log::warn;
use nalgebra::Vector3;

/// Runtime-assigned swapchain name
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SwapchainId(pub u64);

/// Which of the runtime's FOV presets to use
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FovKind {
    Default,
    Max,
}

/// Located view of one eye at a display time
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct View {
    pub pose: Pose,
    pub fov: FovTangents,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SwapchainUsage {
    pub sampled: bool,
    pub color_attachment: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub extent: Extent,
    pub format: ColorFormat,
    pub usage: SwapchainUsage,
    pub sample_count: u32,
    pub face_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
}

impl SwapchainDesc {
    /// Single-sampled, single-layer color swapchain that can be rendered to and sampled from
    pub fn color(extent: Extent, format: ColorFormat) -> Self {
        Self {
            extent,
            format,
            usage: SwapchainUsage {
                sampled: true,
                color_attachment: true,
            },
            sample_count: 1,
            face_count: 1,
            array_size: 1,
            mip_count: 1,
        }
    }
}

/// A freshly created swapchain and the images it owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub id: SwapchainId,
    /// Size the runtime actually allocated
    pub extent: Extent,
    pub images: Vec<ImageHandle>,
}

/// One eye of the projection layer
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerView {
    pub swapchain: SwapchainId,
    pub image_index: u32,
    pub viewport: Viewport,
    pub pose: Pose,
    pub fov: FovTangents,
}

/// Everything handed to the compositor at the end of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSubmission {
    pub display_time: i64,
    /// `None` submits an empty frame
    pub views: Option<PerEye<LayerView>>,
    /// Ask the compositor to fade the edges of the distorted image
    pub fade_edges: bool,
}

impl FrameSubmission {
    pub fn layer_count(&self) -> usize {
        if self.views.is_some() {
            1
        } else {
            0
        }
    }
}

/// Runtime service. Every call is synchronous; `wait_frame` and `acquire_image` may block.
pub trait Runtime {
    fn capabilities(&mut self) -> Result<RuntimeCapabilities, RuntimeError>;

    fn create_session(&mut self, binding: GraphicsBinding) -> Result<(), RuntimeError>;
    fn destroy_session(&mut self);
    fn begin_session(&mut self) -> Result<(), RuntimeError>;
    fn end_session(&mut self) -> Result<(), RuntimeError>;
    /// Next pending event, without blocking
    fn poll_event(&mut self) -> Option<RuntimeEvent>;

    /// Native resolution of the whole panel
    fn display_resolution(&self) -> Extent;
    fn max_swapchain_extent(&self) -> Extent;
    fn eye_fov(&self, eye: Eye, kind: FovKind) -> FovTangents;
    /// Translation from the head origin to the eye, in meters
    fn eye_to_head(&self, eye: Eye) -> Vector3<f32>;
    /// Eye buffer size at one render pixel per display pixel for the given FOV
    fn recommended_eye_size(&self, eye: Eye, fov: &FovTangents) -> Extent;
    /// External positional-tracking camera, if any
    fn camera_frustum(&self) -> Option<CameraFrustum>;
    /// Texture the runtime keeps a copy of the distorted output in
    fn mirror_texture(&self) -> Option<TextureId> {
        None
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainInfo, RuntimeError>;
    fn destroy_swapchain(&mut self, id: SwapchainId);

    /// Block until the compositor wants the next frame
    fn wait_frame(&mut self) -> Result<FrameState, RuntimeError>;
    fn begin_frame(&mut self) -> Result<(), RuntimeError>;
    /// Acquire and wait for the next image of a swapchain
    fn acquire_image(&mut self, id: SwapchainId) -> Result<u32, RuntimeError>;
    fn release_image(&mut self, id: SwapchainId) -> Result<(), RuntimeError>;
    /// Eye poses and FOVs at `display_time`, in a LOCAL (seated, head-origin) reference space
    fn locate_views(&mut self, display_time: i64) -> Result<PerEye<View>, RuntimeError>;
    fn tracking_state(&mut self, display_time: i64) -> Result<PoseSample, RuntimeError>;
    fn submit_frame(&mut self, frame: &FrameSubmission) -> Result<(), RuntimeError>;
}

/// Create a swapchain; if it exceeds a runtime limit, clamp to that limit and try once more.
/// A second failure means VR is unavailable at this size.
pub fn create_swapchain_clamped<R: Runtime + ?Sized>(
    runtime: &mut R,
    desc: &SwapchainDesc,
) -> Result<SwapchainInfo, VrError> {
    match runtime.create_swapchain(desc) {
        Ok(info) => Ok(info),
        Err(RuntimeError::ResourceLimit { requested, limit }) => {
            warn!(
                "Swapchain of {} exceeds the runtime limit {}, clamping",
                requested, limit
            );
            let clamped = SwapchainDesc {
                extent: desc.extent.clamped_to(limit),
                ..*desc
            };
            runtime
                .create_swapchain(&clamped)
                .map_err(|e| VrError::Unavailable(format!("cannot allocate swapchain: {}", e)))
        }
        Err(e) => Err(VrError::Unavailable(format!(
            "cannot allocate swapchain: {}",
            e
        ))),
    }
}
