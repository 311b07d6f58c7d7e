//! Deterministic stand-ins for the runtime, the host renderer and the interop device. They keep
//! enough bookkeeping to catch misuse and to let tests inspect what a backend did.
use crate::app::TargetTime;
use crate::error::RuntimeError;
use crate::eye::{Eye, PerEye};
use crate::fov::FovTangents;
use crate::frame_sync::FrameState;
use crate::gpu::{BlitOptions, ColorFormat, Extent, FramebufferId, ImageHandle};
use crate::gpu::{RenderTarget, TextureId, Viewport};
use crate::hardware_query::{BlendMode, GraphicsApis, GraphicsBinding, HostCapabilities};
use crate::hardware_query::{RuntimeCapabilities, ViewConfiguration};
use crate::host::{FramebufferBinding, HostRenderer};
use crate::interop::{InteropDevice, SharedTexture};
use crate::runtime::{FovKind, FrameSubmission, Runtime, SwapchainDesc, SwapchainId};
use crate::runtime::{SwapchainInfo, View};
use crate::session::{RuntimeEvent, RuntimeSessionState};
use crate::tracking::{CameraFrustum, Pose, PoseSample, TrackingStatus};
use anyhow::{anyhow, bail};
use nalgebra::{UnitQuaternion, Vector3};
use slotmap::{new_key_type, Key, KeyData, SlotMap};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

new_key_type! {
    struct SwapchainKey;
}

fn key(id: SwapchainId) -> SwapchainKey {
    KeyData::from_ffi(id.0).into()
}

fn id(key: SwapchainKey) -> SwapchainId {
    SwapchainId(key.data().as_ffi())
}

const DEFAULT_LOG_LIMIT: usize = 4096;

/// Append to a bounded log, dropping the oldest half once `limit` is reached
fn record<T>(log: &mut Vec<T>, entry: T, limit: usize) {
    if log.len() >= limit.max(2) {
        let stale = log.len() / 2;
        log.drain(..stale);
    }
    log.push(entry);
}

/// Runtime calls, in the order they were made
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateSession(GraphicsBinding),
    BeginSession,
    EndSession,
    DestroySession,
    CreateSwapchain(Extent),
    DestroySwapchain(SwapchainId),
    WaitFrame,
    BeginFrame,
    Acquire(SwapchainId, u32),
    Release(SwapchainId),
    Submit { layers: usize },
}

/// A runtime call that fails once on its next invocation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MockFailure {
    WaitFrame,
    Acquire,
    Submit,
    CreateSwapchain,
    EndSession,
}

#[derive(Debug)]
struct MockSwapchain {
    extent: Extent,
    images: Vec<ImageHandle>,
    next: u32,
    held: Option<u32>,
}

/// Scriptable runtime
pub struct MockRuntime {
    capabilities: RuntimeCapabilities,
    pub panel: Extent,
    pub max_extent: Extent,
    pub image_count: u32,
    /// Eye buffer size at the default FOV
    pub recommended: Extent,
    pub default_fov: FovTangents,
    pub max_fov: FovTangents,
    pub ipd: f32,
    pub camera: Option<CameraFrustum>,
    pub tracking: PoseSample,
    /// Emit a ready event as soon as a session is created
    pub ready_on_create: bool,
    /// `should_render` of upcoming frames; true once exhausted
    pub render_pattern: VecDeque<bool>,
    pub fail_next: Option<MockFailure>,
    pub mirror: Option<TextureId>,
    events: VecDeque<RuntimeEvent>,
    session: Option<GraphicsBinding>,
    running: bool,
    swapchains: SlotMap<SwapchainKey, MockSwapchain>,
    next_image: u64,
    display_time: i64,
    frame_nanos: i64,
    pacer: Option<TargetTime>,
    /// Entries kept in the call and submission logs before the oldest half is dropped
    pub log_limit: usize,
    calls: Vec<MockCall>,
    submissions: Vec<FrameSubmission>,
}

impl MockRuntime {
    fn with_capabilities(capabilities: RuntimeCapabilities) -> Self {
        Self {
            capabilities,
            panel: Extent::new(1920, 1080),
            max_extent: Extent::new(4096, 4096),
            image_count: 3,
            recommended: Extent::new(1182, 1464),
            default_fov: FovTangents::new(1.0, 1.0, 1.0, 1.0),
            max_fov: FovTangents::new(1.3, 1.3, 1.2, 1.2),
            ipd: 0.064,
            camera: None,
            tracking: PoseSample::default(),
            ready_on_create: false,
            render_pattern: VecDeque::new(),
            fail_next: None,
            mirror: None,
            events: VecDeque::new(),
            session: None,
            running: false,
            swapchains: SlotMap::with_key(),
            next_image: 1,
            display_time: 0,
            frame_nanos: 11_111_111,
            pacer: None,
            log_limit: DEFAULT_LOG_LIMIT,
            calls: Vec::new(),
            submissions: Vec::new(),
        }
    }

    /// A vendor-SDK style runtime: native OpenGL, an external tracking camera, no session events
    pub fn rift() -> Self {
        let mut this = Self::with_capabilities(RuntimeCapabilities {
            runtime_name: "Mock vendor runtime".into(),
            system_name: "Mock HMD DK2".into(),
            graphics: GraphicsApis {
                opengl: true,
                d3d11: false,
            },
            view_configurations: vec![ViewConfiguration::PrimaryStereo],
            blend_modes: vec![BlendMode::Opaque],
        });
        this.camera = Some(CameraFrustum {
            h_fov_radians: 74.0f32.to_radians(),
            v_fov_radians: 54.0f32.to_radians(),
            near: 0.4,
            far: 2.5,
        });
        this.tracking = PoseSample {
            head: Pose::new(
                Vector3::new(0.0, 0.0, -1.0),
                UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::PI),
            ),
            camera: Some(Pose::default()),
            status: TrackingStatus {
                camera_connected: true,
                position_locked: true,
            },
        };
        this
    }

    /// An OpenXR style runtime accepting the given graphics APIs
    pub fn openxr(graphics: GraphicsApis) -> Self {
        let mut this = Self::with_capabilities(RuntimeCapabilities {
            runtime_name: "Mock OpenXR runtime".into(),
            system_name: "Mock headset".into(),
            graphics,
            view_configurations: vec![
                ViewConfiguration::PrimaryMono,
                ViewConfiguration::PrimaryStereo,
            ],
            blend_modes: vec![BlendMode::Opaque],
        });
        this.ready_on_create = true;
        this
    }

    /// Sleep in `wait_frame` so frames arrive at `fps`
    pub fn paced(mut self, fps: u64) -> Self {
        let pacer = TargetTime::new(fps);
        self.frame_nanos = pacer.frame_nanos();
        self.pacer = Some(pacer);
        self
    }

    pub fn push_event(&mut self, event: RuntimeEvent) {
        self.events.push_back(event);
    }

    fn call(&mut self, call: MockCall) {
        record(&mut self.calls, call, self.log_limit);
    }

    pub fn count(&self, f: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|c| f(c)).count()
    }

    pub fn submissions(&self) -> &[FrameSubmission] {
        &self.submissions
    }

    pub fn live_swapchains(&self) -> usize {
        self.swapchains.len()
    }

    pub fn swapchain_extent(&self, id: SwapchainId) -> Option<Extent> {
        self.swapchains.get(key(id)).map(|s| s.extent)
    }

    pub fn session(&self) -> Option<GraphicsBinding> {
        self.session
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn fail(&mut self, call: MockFailure) -> Result<(), RuntimeError> {
        if self.fail_next == Some(call) {
            self.fail_next = None;
            return Err(anyhow!("injected {:?} failure", call).into());
        }
        Ok(())
    }

    fn require_session(&self) -> Result<(), RuntimeError> {
        if self.session.is_none() {
            return Err(anyhow!("no session").into());
        }
        Ok(())
    }

    fn require_running(&self) -> Result<(), RuntimeError> {
        if !self.running {
            return Err(anyhow!("session not running").into());
        }
        Ok(())
    }

    fn swapchain(&mut self, id: SwapchainId) -> Result<&mut MockSwapchain, RuntimeError> {
        self.swapchains
            .get_mut(key(id))
            .ok_or_else(|| anyhow!("unknown swapchain {:?}", id).into())
    }

    fn fov(&self, kind: FovKind) -> FovTangents {
        match kind {
            FovKind::Default => self.default_fov,
            FovKind::Max => self.max_fov,
        }
    }

    fn check_submission(&self, frame: &FrameSubmission) -> anyhow::Result<()> {
        if let Some(views) = &frame.views {
            for (eye, view) in views.iter() {
                let chain = match self.swapchains.get(key(view.swapchain)) {
                    Some(chain) => chain,
                    None => bail!("{:?} eye submits unknown swapchain", eye),
                };
                if view.image_index as usize >= chain.images.len() {
                    bail!("{:?} eye submits image {} out of range", eye, view.image_index);
                }
                let right = view.viewport.x.saturating_add(view.viewport.width);
                let bounds = Viewport::full(chain.extent);
                if right > bounds.width || view.viewport.height > bounds.height {
                    bail!("{:?} eye viewport exceeds its swapchain", eye);
                }
            }
        }
        Ok(())
    }
}

impl Runtime for MockRuntime {
    fn capabilities(&mut self) -> Result<RuntimeCapabilities, RuntimeError> {
        Ok(self.capabilities.clone())
    }

    fn create_session(&mut self, binding: GraphicsBinding) -> Result<(), RuntimeError> {
        self.call(MockCall::CreateSession(binding));
        if self.session.is_some() {
            return Err(anyhow!("session already exists").into());
        }
        self.session = Some(binding);
        if self.ready_on_create {
            self.push_event(RuntimeEvent::StateChanged(RuntimeSessionState::Ready));
        }
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.call(MockCall::DestroySession);
        self.session = None;
        self.running = false;
        self.events.clear();
    }

    fn begin_session(&mut self) -> Result<(), RuntimeError> {
        self.call(MockCall::BeginSession);
        self.require_session()?;
        self.running = true;
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), RuntimeError> {
        self.call(MockCall::EndSession);
        self.fail(MockFailure::EndSession)?;
        self.require_running()?;
        self.running = false;
        Ok(())
    }

    fn poll_event(&mut self) -> Option<RuntimeEvent> {
        self.events.pop_front()
    }

    fn display_resolution(&self) -> Extent {
        self.panel
    }

    fn max_swapchain_extent(&self) -> Extent {
        self.max_extent
    }

    fn eye_fov(&self, _eye: Eye, kind: FovKind) -> FovTangents {
        self.fov(kind)
    }

    fn eye_to_head(&self, eye: Eye) -> Vector3<f32> {
        let half = self.ipd * 0.5;
        match eye {
            Eye::Left => Vector3::new(half, 0.0, 0.0),
            Eye::Right => Vector3::new(-half, 0.0, 0.0),
        }
    }

    fn recommended_eye_size(&self, _eye: Eye, fov: &FovTangents) -> Extent {
        let base = self.default_fov;
        let width_ratio = (fov.left + fov.right) / (base.left + base.right);
        let height_ratio = (fov.up + fov.down) / (base.up + base.down);
        let width = self.recommended.width as f32 * width_ratio;
        let height = self.recommended.height as f32 * height_ratio;
        Extent::new(width.round() as u32, height.round() as u32)
    }

    fn camera_frustum(&self) -> Option<CameraFrustum> {
        self.camera
    }

    fn mirror_texture(&self) -> Option<TextureId> {
        self.mirror
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainInfo, RuntimeError> {
        self.call(MockCall::CreateSwapchain(desc.extent));
        self.require_session()?;
        if !desc.extent.fits_within(self.max_extent) {
            return Err(RuntimeError::ResourceLimit {
                requested: desc.extent,
                limit: self.max_extent,
            });
        }
        self.fail(MockFailure::CreateSwapchain)?;
        let first = self.next_image;
        self.next_image += self.image_count as u64;
        let images: Vec<_> = (first..self.next_image).map(ImageHandle).collect();
        let key = self.swapchains.insert(MockSwapchain {
            extent: desc.extent,
            images: images.clone(),
            next: 0,
            held: None,
        });
        Ok(SwapchainInfo {
            id: id(key),
            extent: desc.extent,
            images,
        })
    }

    fn destroy_swapchain(&mut self, id: SwapchainId) {
        self.call(MockCall::DestroySwapchain(id));
        self.swapchains.remove(key(id));
    }

    fn wait_frame(&mut self) -> Result<FrameState, RuntimeError> {
        self.call(MockCall::WaitFrame);
        self.fail(MockFailure::WaitFrame)?;
        self.require_running()?;
        if let Some(pacer) = &mut self.pacer {
            pacer.wait_next();
        }
        self.display_time += self.frame_nanos;
        Ok(FrameState {
            predicted_display_time: self.display_time,
            should_render: self.render_pattern.pop_front().unwrap_or(true),
        })
    }

    fn begin_frame(&mut self) -> Result<(), RuntimeError> {
        self.call(MockCall::BeginFrame);
        self.require_running()
    }

    fn acquire_image(&mut self, id: SwapchainId) -> Result<u32, RuntimeError> {
        self.call(MockCall::Acquire(id, 0));
        self.fail(MockFailure::Acquire)?;
        let chain = self.swapchain(id)?;
        if chain.held.is_some() {
            return Err(anyhow!("swapchain {:?} image acquired twice", id).into());
        }
        let index = chain.next;
        chain.next = (chain.next + 1) % chain.images.len() as u32;
        chain.held = Some(index);
        if let Some(MockCall::Acquire(_, recorded)) = self.calls.last_mut() {
            *recorded = index;
        }
        Ok(index)
    }

    fn release_image(&mut self, id: SwapchainId) -> Result<(), RuntimeError> {
        self.call(MockCall::Release(id));
        let chain = self.swapchain(id)?;
        if chain.held.take().is_none() {
            return Err(anyhow!("swapchain {:?} released without an acquire", id).into());
        }
        Ok(())
    }

    fn locate_views(&mut self, _display_time: i64) -> Result<PerEye<View>, RuntimeError> {
        self.require_running()?;
        let head = self.tracking.head;
        let fov = self.default_fov;
        Ok(PerEye::from_fn(|eye| {
            let offset = head.orientation * -self.eye_to_head(eye);
            View {
                pose: Pose::new(head.position + offset, head.orientation),
                fov,
            }
        }))
    }

    fn tracking_state(&mut self, _display_time: i64) -> Result<PoseSample, RuntimeError> {
        self.require_running()?;
        Ok(self.tracking)
    }

    fn submit_frame(&mut self, frame: &FrameSubmission) -> Result<(), RuntimeError> {
        self.call(MockCall::Submit {
            layers: frame.layer_count(),
        });
        self.fail(MockFailure::Submit)?;
        self.require_running()?;
        self.check_submission(frame)?;
        record(&mut self.submissions, frame.clone(), self.log_limit);
        Ok(())
    }
}

/// One recorded blit
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BlitRecord {
    pub into: FramebufferBinding,
    pub source: TextureId,
    pub viewport: Viewport,
    pub options: BlitOptions,
}

/// Host renderer that records what it was asked to draw
pub struct MockHost {
    pub capabilities: HostCapabilities,
    pub output: Extent,
    targets: BTreeMap<u32, RenderTarget>,
    next_name: u32,
    created: usize,
    bound: Option<FramebufferBinding>,
    /// Entries kept in `clears` and `blits` before the oldest half is dropped
    pub log_limit: usize,
    pub clears: Vec<FramebufferBinding>,
    pub blits: Vec<BlitRecord>,
}

impl MockHost {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            output: Extent::new(1280, 720),
            targets: BTreeMap::new(),
            next_name: 1,
            created: 0,
            bound: None,
            log_limit: DEFAULT_LOG_LIMIT,
            clears: Vec::new(),
            blits: Vec::new(),
        }
    }

    /// Render targets created over the host's lifetime
    pub fn created_targets(&self) -> usize {
        self.created
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }
}

impl HostRenderer for MockHost {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn output_extent(&self) -> Extent {
        self.output
    }

    fn create_render_target(
        &mut self,
        extent: Extent,
        format: ColorFormat,
    ) -> Result<RenderTarget, RuntimeError> {
        if extent.width == 0 || extent.height == 0 {
            return Err(anyhow!("empty render target {}", extent).into());
        }
        let name = self.next_name;
        self.next_name += 1;
        let target = RenderTarget {
            framebuffer: FramebufferId(name),
            color: TextureId(name),
            extent,
            format,
        };
        self.targets.insert(name, target);
        self.created += 1;
        Ok(target)
    }

    fn destroy_render_target(&mut self, target: RenderTarget) {
        self.targets.remove(&target.framebuffer.0);
        if let Some(FramebufferBinding::Target(fb)) = self.bound {
            if fb == target.framebuffer {
                self.bound = None;
            }
        }
    }

    fn bind(&mut self, binding: FramebufferBinding) -> Result<(), RuntimeError> {
        if let FramebufferBinding::Target(fb) = binding {
            if !self.targets.contains_key(&fb.0) {
                return Err(anyhow!("bind of destroyed target {:?}", fb).into());
            }
        }
        self.bound = Some(binding);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RuntimeError> {
        let bound = self.bound.ok_or_else(|| anyhow!("clear with nothing bound"))?;
        record(&mut self.clears, bound, self.log_limit);
        Ok(())
    }

    fn blit(
        &mut self,
        source: TextureId,
        viewport: Viewport,
        options: &BlitOptions,
    ) -> Result<(), RuntimeError> {
        let into = self.bound.ok_or_else(|| anyhow!("blit with nothing bound"))?;
        let blit = BlitRecord {
            into,
            source,
            viewport,
            options: *options,
        };
        record(&mut self.blits, blit, self.log_limit);
        Ok(())
    }
}

/// Interop device that tracks registrations and lock ownership
#[derive(Debug, Default)]
pub struct MockInterop {
    open: bool,
    registered: BTreeMap<u64, ImageHandle>,
    locked: BTreeSet<u64>,
    next_handle: u64,
    /// Swapchain images the flip pass drew into
    pub flips: Vec<ImageHandle>,
    /// Fail registration once this many textures are registered
    pub fail_register_after: Option<usize>,
}

impl MockInterop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_locked(&self, handle: u64) -> bool {
        self.locked.contains(&handle)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }
}

impl InteropDevice for MockInterop {
    fn open(&mut self, flip_shader: &str) -> Result<(), RuntimeError> {
        if !flip_shader.contains("SV_VertexID") {
            return Err(anyhow!("flip shader failed to compile").into());
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn register(
        &mut self,
        image: ImageHandle,
        _extent: Extent,
    ) -> Result<SharedTexture, RuntimeError> {
        if !self.open {
            return Err(anyhow!("interop device is not open").into());
        }
        if let Some(limit) = self.fail_register_after {
            if self.registered.len() >= limit {
                return Err(anyhow!("out of interop handles").into());
            }
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.registered.insert(handle, image);
        Ok(SharedTexture {
            gl_texture: TextureId(5000 + handle as u32),
            handle,
        })
    }

    fn unregister(&mut self, shared: SharedTexture) {
        self.locked.remove(&shared.handle);
        self.registered.remove(&shared.handle);
    }

    fn lock(&mut self, shared: &SharedTexture) -> Result<(), RuntimeError> {
        if !self.registered.contains_key(&shared.handle) {
            return Err(anyhow!("lock of unregistered texture").into());
        }
        if !self.locked.insert(shared.handle) {
            return Err(anyhow!("texture locked twice").into());
        }
        Ok(())
    }

    fn unlock(&mut self, shared: &SharedTexture) -> Result<(), RuntimeError> {
        if !self.locked.remove(&shared.handle) {
            return Err(anyhow!("unlock of a texture that is not locked").into());
        }
        Ok(())
    }

    fn flip_blit(
        &mut self,
        shared: &SharedTexture,
        target: ImageHandle,
        _extent: Extent,
    ) -> Result<(), RuntimeError> {
        if self.locked.contains(&shared.handle) {
            return Err(anyhow!("flip while GL still owns the texture").into());
        }
        self.flips.push(target);
        Ok(())
    }
}
