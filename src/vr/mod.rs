//! OpenXR backend. One swapchain per eye, images dictated by the runtime's acquire call. When the
//! runtime only takes D3D11 textures, each image is reached through a GL/D3D interop
//! intermediate plus a flip pass.
pub mod xr_prelude;
pub mod xr_runtime;

use crate::config::VrConfig;
use crate::error::{RuntimeError, VrError};
use crate::eye::{Eye, PerEye};
use crate::eye_target::EyeRenderTarget;
use crate::fov::{self, CombinedFov};
use crate::frame_sync::{FrameCycle, FramePhase, FrameState};
use crate::gpu::{BlitOptions, ColorFormat, Extent, Framebuffer, Viewport};
use crate::hardware_query::{probe, GraphicsBinding, Requirements};
use crate::host::{FramebufferBinding, HostRenderer};
use crate::interop::{InteropDevice, InteropImages, FLIP_SHADER_SOURCE};
use crate::runtime::{create_swapchain_clamped, FovKind, FrameSubmission, LayerView, Runtime};
use crate::runtime::{SwapchainDesc, View};
use crate::session::{SessionState, SessionTracker};
use crate::swapchain_images::SwapchainImageSet;
use crate::{BackendKind, FrameInfo, FrameStart, HmdBackend, ViewState};
use log::{debug, error, info, warn};

const EYE_FORMAT: ColorFormat = ColorFormat::Rgba8;
const SWAPCHAIN_FORMAT: ColorFormat = ColorFormat::Srgb8Alpha8;

/// Swapchain of one eye, plus its interop intermediates when the binding needs them
struct EyeSwapchain {
    images: SwapchainImageSet,
    shared: Option<InteropImages>,
    /// Extent asked for; the runtime may have granted less
    requested: Extent,
}

/// VR capable OpenXR backend
pub struct OpenXrBackend<R: Runtime, I: InteropDevice> {
    runtime: R,
    interop: I,
    binding: Option<GraphicsBinding>,
    session: SessionTracker,
    session_created: bool,
    interop_open: bool,
    eyes: PerEye<EyeRenderTarget>,
    swapchains: PerEye<Option<EyeSwapchain>>,
    cycle: FrameCycle,
    frame: Option<(FrameState, PerEye<View>)>,
    view: Option<ViewState>,
    render_scale: f32,
    gamma: f32,
}

impl<R: Runtime, I: InteropDevice> OpenXrBackend<R, I> {
    pub fn new(runtime: R, interop: I) -> Self {
        Self {
            runtime,
            interop,
            binding: None,
            session: SessionTracker::new(),
            session_created: false,
            interop_open: false,
            eyes: PerEye::default(),
            swapchains: PerEye::new(None, None),
            cycle: FrameCycle::new(),
            frame: None,
            view: None,
            render_scale: 1.0,
            gamma: 1.0,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn interop(&self) -> &I {
        &self.interop
    }

    fn negotiate(&mut self, host: &dyn HostRenderer) -> Result<GraphicsBinding, VrError> {
        if let Some(binding) = self.binding {
            return Ok(binding);
        }
        let caps = self
            .runtime
            .capabilities()
            .map_err(|e| VrError::Unavailable(format!("cannot query the runtime: {}", e)))?;
        info!("Loaded OpenXR runtime: {}", caps.runtime_name);
        let binding = probe(&caps, &host.capabilities(), Requirements::default()).into_result()?;
        self.binding = Some(binding);
        Ok(binding)
    }

    fn start_session(&mut self, binding: GraphicsBinding) -> Result<(), VrError> {
        if self.session_created {
            return Ok(());
        }
        if binding == GraphicsBinding::D3d11Interop && !self.interop_open {
            self.interop.open(FLIP_SHADER_SOURCE).map_err(|e| {
                VrError::Unavailable(format!("cannot open the interop device: {}", e))
            })?;
            self.interop_open = true;
        }
        self.runtime
            .create_session(binding)
            .map_err(|e| VrError::Unavailable(format!("cannot create a session: {}", e)))?;
        self.session_created = true;
        Ok(())
    }

    fn destroy_swapchain(&mut self, eye: Eye) {
        if let Some(mut chain) = self.swapchains[eye].take() {
            if let Some(shared) = &mut chain.shared {
                shared.unregister_all(&mut self.interop);
            }
            self.runtime.destroy_swapchain(chain.images.id);
        }
    }

    fn create_swapchain(&mut self, size: Extent) -> Result<EyeSwapchain, VrError> {
        let desc = SwapchainDesc::color(size, SWAPCHAIN_FORMAT);
        let info = create_swapchain_clamped(&mut self.runtime, &desc)?;
        let shared = if self.binding == Some(GraphicsBinding::D3d11Interop) {
            match InteropImages::register_all(&mut self.interop, &info.images, info.extent) {
                Ok(shared) => Some(shared),
                Err(e) => {
                    self.runtime.destroy_swapchain(info.id);
                    return Err(VrError::Unavailable(format!(
                        "cannot share swapchain images with GL: {}",
                        e
                    )));
                }
            }
        } else {
            None
        };
        Ok(EyeSwapchain {
            images: SwapchainImageSet::new(info.id, info.extent, info.images),
            shared,
            requested: size,
        })
    }

    fn configure(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        for &eye in &Eye::ALL {
            let fov = self.runtime.eye_fov(eye, FovKind::Default);
            self.eyes[eye].set_fov(fov);
            self.eyes[eye].view_offset = fov::view_offset(self.runtime.eye_to_head(eye));

            let size = self
                .runtime
                .recommended_eye_size(eye, &fov)
                .scaled(self.render_scale);
            let unchanged = matches!(&self.swapchains[eye], Some(chain) if chain.requested == size);
            if !unchanged {
                self.destroy_swapchain(eye);
                let chain = self.create_swapchain(size)?;
                info!(
                    "{:?} eye swapchain of {} with {} images",
                    eye,
                    chain.images.extent,
                    chain.images.len()
                );
                self.swapchains[eye] = Some(chain);
            }

            let granted = match &self.swapchains[eye] {
                Some(chain) => chain.images.extent,
                None => size,
            };
            let reallocated = self.eyes[eye]
                .resize(host, size.clamped_to(granted), EYE_FORMAT)
                .map_err(|e| VrError::Unavailable(format!("cannot allocate eye buffer: {}", e)))?;
            if reallocated {
                debug!("Set {:?} eye buffer to {}", eye, size.clamped_to(granted));
            }
        }
        self.update_view(host);
        Ok(())
    }

    fn update_view(&mut self, host: &dyn HostRenderer) {
        let panel = self.runtime.display_resolution();
        self.view = Some(ViewState {
            combined: CombinedFov::from_eyes(&self.eyes.map(|_, t| t.fov)),
            pixel_scale: host.output_extent().width as f32 / panel.width.max(1) as f32,
        });
    }

    fn apply_config(
        &mut self,
        host: &mut dyn HostRenderer,
        config: &mut VrConfig,
    ) -> Result<(), VrError> {
        let changes = config.take_changes();
        self.gamma = config.gamma;
        if changes.max_fov == Some(true) {
            debug!("Runtime decides the FOV; ignoring max FOV");
        }
        if let Some(scale) = changes.render_scale {
            if scale != self.render_scale {
                self.render_scale = scale;
                self.configure(host)?;
            }
        }
        Ok(())
    }

    fn fail(&mut self, host: &mut dyn HostRenderer, op: &str, source: RuntimeError) -> VrError {
        error!("{} failed: {}", op, source);
        self.disable(host);
        VrError::SessionEnded {
            reason: format!("{} failed", op),
            source: Some(source),
        }
    }

    fn abort(&mut self, host: &mut dyn HostRenderer, err: VrError) -> VrError {
        if !matches!(err, VrError::Protocol { .. }) {
            self.disable(host);
        }
        err
    }

    fn wait(&mut self) -> Result<FrameState, RuntimeError> {
        let state = self.runtime.wait_frame()?;
        self.runtime.begin_frame()?;
        Ok(state)
    }

    fn submit_empty(&mut self, state: FrameState) -> Result<(), VrError> {
        self.cycle.finish_acquire()?;
        self.cycle.begin_render()?;
        self.cycle.submit()?;
        self.runtime
            .submit_frame(&FrameSubmission {
                display_time: state.predicted_display_time,
                views: None,
                fade_edges: false,
            })
            .map_err(|e| VrError::SessionEnded {
                reason: "submitting an empty frame failed".into(),
                source: Some(e),
            })?;
        self.cycle.release()?;
        Ok(())
    }

    /// Acquire one image per eye and lock its intermediate for GL
    fn acquire_images(&mut self) -> Result<(), VrError> {
        for &eye in &Eye::ALL {
            let chain = match &mut self.swapchains[eye] {
                Some(chain) => chain,
                None => return Err(VrError::ended("swapchain missing")),
            };
            let index = self
                .runtime
                .acquire_image(chain.images.id)
                .map_err(|e| VrError::SessionEnded {
                    reason: "acquiring a swapchain image failed".into(),
                    source: Some(e),
                })?;
            chain.images.mark_acquired(index)?;
            self.cycle.acquire(eye, index)?;
            if let Some(shared) = &mut chain.shared {
                shared
                    .lock(&mut self.interop, index)
                    .map_err(|e| VrError::SessionEnded {
                        reason: "locking an interop image failed".into(),
                        source: Some(e),
                    })?;
            }
        }
        Ok(())
    }

    fn copy_to_swapchains(&mut self, host: &mut dyn HostRenderer) -> Result<(), RuntimeError> {
        let options = BlitOptions {
            flip_y: false,
            gamma: Some(self.gamma),
            desaturate: 0.0,
        };
        for &eye in &Eye::ALL {
            let (chain, target) = match (&mut self.swapchains[eye], &self.eyes[eye].target) {
                (Some(chain), Some(target)) => (chain, target),
                _ => continue,
            };
            let (index, image) = match chain.images.current() {
                Some(current) => current,
                None => continue,
            };
            let viewport = Viewport::full(target.extent);
            match &mut chain.shared {
                Some(shared) => {
                    let texture = shared.gl_texture(index).ok_or_else(|| {
                        anyhow::format_err!("no interop texture for image {}", index)
                    })?;
                    host.bind(FramebufferBinding::Shared(texture))?;
                    host.blit(target.color, viewport, &options)?;
                    shared.flip(&mut self.interop, index)?;
                }
                None => {
                    host.bind(FramebufferBinding::SwapchainImage(image))?;
                    host.blit(target.color, viewport, &options)?;
                }
            }
        }
        Ok(())
    }

    /// Release the images and hand the projection layer to the compositor
    fn submit(&mut self, state: FrameState, views: PerEye<View>) -> Result<(), RuntimeError> {
        let mut layer = Vec::with_capacity(2);
        for &eye in &Eye::ALL {
            let chain = match &mut self.swapchains[eye] {
                Some(chain) => chain,
                None => return Err(anyhow::format_err!("{:?} eye swapchain missing", eye).into()),
            };
            let index = match chain.images.release() {
                Some(index) => index,
                None => return Err(anyhow::format_err!("{:?} eye holds no image", eye).into()),
            };
            self.runtime.release_image(chain.images.id)?;
            if let Some(shared) = &mut chain.shared {
                shared.retire(index);
            }
            let extent = self.eyes[eye].extent().unwrap_or(chain.images.extent);
            layer.push(LayerView {
                swapchain: chain.images.id,
                image_index: index,
                viewport: Viewport::full(extent),
                pose: views[eye].pose,
                fov: views[eye].fov,
            });
        }
        self.runtime.submit_frame(&FrameSubmission {
            display_time: state.predicted_display_time,
            views: Some(PerEye::new(layer[0], layer[1])),
            fade_edges: false,
        })
    }
}

impl<R: Runtime, I: InteropDevice> HmdBackend for OpenXrBackend<R, I> {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenXr
    }

    fn enable(
        &mut self,
        host: &mut dyn HostRenderer,
        pixel_scale: f32,
    ) -> Result<&PerEye<EyeRenderTarget>, VrError> {
        let binding = self.negotiate(host)?;
        self.render_scale = pixel_scale;
        if let Err(e) = self.start_session(binding).and_then(|_| self.configure(host)) {
            self.disable(host);
            return Err(e);
        }
        Ok(&self.eyes)
    }

    fn disable(&mut self, host: &mut dyn HostRenderer) {
        self.cycle.abandon();
        self.frame = None;
        for &eye in &Eye::ALL {
            self.destroy_swapchain(eye);
            self.eyes[eye].release(host);
        }
        if self.session_created {
            if self.session.is_running() {
                if let Err(e) = self.runtime.end_session() {
                    warn!("Ending the session failed: {}", e);
                }
            }
            self.runtime.destroy_session();
            self.session_created = false;
            info!("OpenXR session destroyed");
        }
        self.session.reset();
        if self.interop_open {
            self.interop.close();
            self.interop_open = false;
        }
        self.view = None;
    }

    fn frame_start(
        &mut self,
        host: &mut dyn HostRenderer,
        config: &mut VrConfig,
    ) -> Result<FrameStart, VrError> {
        if !self.session_created {
            return Err(VrError::Unavailable("VR is not enabled".into()));
        }
        self.cycle.ensure(FramePhase::Idle, "start a frame")?;
        if let Err(e) = self.session.drain(&mut self.runtime) {
            return Err(self.abort(host, e));
        }
        if !self.session.is_running() {
            return Ok(FrameStart::Paused);
        }
        if let Err(e) = self.apply_config(host, config) {
            return Err(self.abort(host, e));
        }

        self.cycle.begin_wait()?;
        let state = match self.wait() {
            Ok(state) => state,
            Err(e) => return Err(self.fail(host, "waiting for a frame", e)),
        };
        self.cycle.frame_ready(state)?;
        if !state.should_render {
            return match self.submit_empty(state) {
                Ok(()) => Ok(FrameStart::Skipped),
                Err(e) => Err(self.abort(host, e)),
            };
        }

        let time = state.predicted_display_time;
        let views = match self.runtime.locate_views(time) {
            Ok(views) => views,
            Err(e) => return Err(self.fail(host, "locating views", e)),
        };
        for (eye, view) in views.iter() {
            self.eyes[eye].set_fov(view.fov);
        }
        self.update_view(host);

        if let Err(e) = self.acquire_images() {
            warn!("Acquiring swapchain images failed: {}", e);
            return Err(self.abort(host, e));
        }
        self.cycle.finish_acquire()?;
        self.frame = Some((state, views));

        let head = views[Eye::Left].pose;
        Ok(FrameStart::Render(FrameInfo {
            predicted_display_time: time,
            views,
            head,
            desaturation: 0.0,
            view: self.view.unwrap_or_default(),
        }))
    }

    fn begin_render(&mut self) -> Result<&PerEye<EyeRenderTarget>, VrError> {
        self.cycle.begin_render()?;
        Ok(&self.eyes)
    }

    fn present(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        self.cycle.ensure(FramePhase::Rendering, "present")?;
        if let Err(e) = self.copy_to_swapchains(host) {
            return Err(self.fail(host, "copying to the swapchain", e));
        }
        self.cycle.mark_translated()
    }

    fn frame_end(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        self.cycle.ensure(FramePhase::Rendering, "submit")?;
        for &eye in &Eye::ALL {
            if let (Some(chain), Some(index)) = (&self.swapchains[eye], self.cycle.acquired(eye)) {
                if let Some(shared) = &chain.shared {
                    shared.check_flipped(index)?;
                }
            }
        }
        let (state, views) = match self.frame {
            Some(frame) => frame,
            None => return Err(self.abort(host, VrError::ended("no frame in flight"))),
        };
        self.cycle.submit()?;

        if let Err(e) = self.submit(state, views) {
            return Err(self.fail(host, "ending the frame", e));
        }
        self.frame = None;
        self.cycle.release()?;
        Ok(())
    }

    fn mirror(
        &mut self,
        host: &mut dyn HostRenderer,
        destination: Framebuffer,
    ) -> Result<(), RuntimeError> {
        host.bind(FramebufferBinding::Destination(destination))?;
        host.clear()?;
        for (eye, target) in self.eyes.iter() {
            if let Some(target) = &target.target {
                let viewport = Viewport::half(destination.extent, eye.index());
                host.blit(target.color, viewport, &BlitOptions::default())?;
            }
        }
        Ok(())
    }

    fn eye_targets(&self) -> &PerEye<EyeRenderTarget> {
        &self.eyes
    }

    fn view_state(&self) -> Option<ViewState> {
        self.view
    }

    fn session_state(&self) -> SessionState {
        self.session.state()
    }

    fn frame_phase(&self) -> FramePhase {
        self.cycle.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware_query::{GraphicsApis, HostCapabilities};
    use crate::mock::{MockCall, MockFailure, MockHost, MockInterop, MockRuntime};
    use crate::session::{RuntimeEvent, RuntimeSessionState};

    type Backend = OpenXrBackend<MockRuntime, MockInterop>;

    const GL_ONLY: GraphicsApis = GraphicsApis {
        opengl: true,
        d3d11: false,
    };
    const D3D_ONLY: GraphicsApis = GraphicsApis {
        opengl: false,
        d3d11: true,
    };

    fn host(dx_interop: bool) -> MockHost {
        MockHost::new(HostCapabilities {
            dx_interop,
            float_textures: false,
        })
    }

    fn backend(graphics: GraphicsApis) -> Backend {
        OpenXrBackend::new(MockRuntime::openxr(graphics), MockInterop::new())
    }

    fn render(backend: &mut Backend, host: &mut MockHost, config: &mut VrConfig) -> FrameStart {
        let start = backend.frame_start(host, config).unwrap();
        if let FrameStart::Render(_) = start {
            backend.begin_render().unwrap();
            backend.present(host).unwrap();
            backend.frame_end(host).unwrap();
        }
        start
    }

    #[test]
    fn session_begins_on_ready() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        assert_eq!(backend.session_state(), SessionState::NotStarted);
        assert!(!backend.runtime().is_running());

        let mut config = VrConfig::default();
        assert!(matches!(render(&mut backend, &mut host, &mut config), FrameStart::Render(_)));
        assert_eq!(backend.session_state(), SessionState::Running);
        assert_eq!(backend.runtime().count(|c| *c == MockCall::BeginSession), 1);
    }

    #[test]
    fn one_swapchain_per_eye() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        let eyes = *backend.enable(&mut host, 1.5).unwrap();
        assert_eq!(eyes[Eye::Left].extent(), Some(Extent::new(1773, 2196)));
        assert_eq!(backend.runtime().live_swapchains(), 2);
        assert_eq!(backend.runtime().session(), Some(GraphicsBinding::OpenGl));
    }

    #[test]
    fn frame_acquires_and_releases_each_eye() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = VrConfig::default();
        for _ in 0..3 {
            render(&mut backend, &mut host, &mut config);
        }
        let runtime = backend.runtime();
        assert_eq!(runtime.count(|c| matches!(c, MockCall::Acquire(..))), 6);
        assert_eq!(runtime.count(|c| matches!(c, MockCall::Release(_))), 6);
        let last = runtime.submissions().last().unwrap();
        let views = last.views.unwrap();
        assert_eq!(views[Eye::Right].image_index, 2);
        assert_ne!(views[Eye::Left].swapchain, views[Eye::Right].swapchain);
        assert!(matches!(host.blits[0].into, FramebufferBinding::SwapchainImage(_)));
        assert!(!host.blits[0].options.flip_y);
    }

    #[test]
    fn not_rendering_submits_an_empty_frame() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        backend.runtime_mut().render_pattern.push_back(false);
        let start = render(&mut backend, &mut host, &mut VrConfig::default());
        assert_eq!(start, FrameStart::Skipped);
        let runtime = backend.runtime();
        assert_eq!(runtime.count(|c| matches!(c, MockCall::Acquire(..))), 0);
        assert_eq!(runtime.submissions()[0].layer_count(), 0);
    }

    #[test]
    fn stopping_pauses_and_exiting_ends() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = VrConfig::default();
        render(&mut backend, &mut host, &mut config);

        backend
            .runtime_mut()
            .push_event(RuntimeEvent::StateChanged(RuntimeSessionState::Stopping));
        assert_eq!(
            backend.frame_start(&mut host, &mut config).unwrap(),
            FrameStart::Paused
        );
        assert_eq!(backend.session_state(), SessionState::Stopping);
        assert!(!backend.runtime().is_running());

        backend
            .runtime_mut()
            .push_event(RuntimeEvent::StateChanged(RuntimeSessionState::Exiting));
        let err = backend.frame_start(&mut host, &mut config).unwrap_err();
        assert!(err.is_session_fatal());
        assert_eq!(backend.runtime().live_swapchains(), 0);
        assert_eq!(host.live_targets(), 0);
    }

    #[test]
    fn lost_events_are_not_fatal() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        backend.runtime_mut().push_event(RuntimeEvent::EventsLost(3));
        let start = render(&mut backend, &mut host, &mut VrConfig::default());
        assert!(matches!(start, FrameStart::Render(_)));
    }

    #[test]
    fn interop_path_flips_every_image() {
        let mut host = host(true);
        let mut backend = backend(D3D_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        assert_eq!(backend.runtime().session(), Some(GraphicsBinding::D3d11Interop));
        assert!(backend.interop().is_open());
        assert_eq!(backend.interop().registered_count(), 6);

        let mut config = VrConfig::default();
        render(&mut backend, &mut host, &mut config);
        assert_eq!(backend.interop().flips.len(), 2);
        assert!(matches!(host.blits[0].into, FramebufferBinding::Shared(_)));

        backend.disable(&mut host);
        assert!(!backend.interop().is_open());
        assert_eq!(backend.interop().registered_count(), 0);
    }

    #[test]
    fn interop_submit_without_flip_is_rejected() {
        let mut host = host(true);
        let mut backend = backend(D3D_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = VrConfig::default();
        backend.frame_start(&mut host, &mut config).unwrap();
        backend.begin_render().unwrap();
        let err = backend.frame_end(&mut host).unwrap_err();
        assert!(matches!(err, VrError::Protocol { .. }));
        assert_eq!(backend.frame_phase(), FramePhase::Rendering);
        backend.present(&mut host).unwrap();
        backend.frame_end(&mut host).unwrap();
    }

    #[test]
    fn d3d_runtime_without_interop_is_unavailable() {
        let mut host = host(false);
        let mut backend = backend(D3D_ONLY);
        let err = backend.enable(&mut host, 1.0).unwrap_err();
        assert!(matches!(err, VrError::Unavailable(_)));
        assert!(!err.is_session_fatal());
        assert!(backend.runtime().session().is_none());
    }

    #[test]
    fn acquire_failure_ends_the_session() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        backend.runtime_mut().fail_next = Some(MockFailure::Acquire);
        let err = backend
            .frame_start(&mut host, &mut VrConfig::default())
            .unwrap_err();
        assert!(err.is_session_fatal());
        assert_eq!(backend.frame_phase(), FramePhase::Idle);
        assert!(backend.runtime().session().is_none());
    }

    #[test]
    fn disable_then_enable_gives_the_same_targets() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        let first = backend.enable(&mut host, 1.25).unwrap().map(|_, t| t.extent());
        backend.disable(&mut host);
        backend.disable(&mut host);
        let second = backend.enable(&mut host, 1.25).unwrap().map(|_, t| t.extent());
        assert_eq!(first, second);
        assert_eq!(backend.runtime().live_swapchains(), 2);
    }

    #[test]
    fn swapchain_limit_clamps_each_eye() {
        let mut host = host(false);
        let mut runtime = MockRuntime::openxr(GL_ONLY);
        runtime.max_extent = Extent::new(1024, 1024);
        let mut backend = OpenXrBackend::new(runtime, MockInterop::new());
        let eyes = *backend.enable(&mut host, 1.0).unwrap();
        for (_, eye) in eyes.iter() {
            assert_eq!(eye.extent(), Some(Extent::new(1024, 1024)));
        }
        assert_eq!(backend.runtime().live_swapchains(), 2);

        render(&mut backend, &mut host, &mut VrConfig::default());
        let views = backend.runtime().submissions()[0].views.unwrap();
        assert_eq!(views[Eye::Left].viewport.width, 1024);
        assert_eq!(views[Eye::Right].viewport.height, 1024);
    }

    #[test]
    fn swapchain_failure_after_clamping_tears_down() {
        let mut host = host(true);
        let mut runtime = MockRuntime::openxr(D3D_ONLY);
        runtime.max_extent = Extent::new(1024, 1024);
        runtime.fail_next = Some(MockFailure::CreateSwapchain);
        let mut backend = OpenXrBackend::new(runtime, MockInterop::new());
        let err = backend.enable(&mut host, 1.0).unwrap_err();
        assert!(matches!(err, VrError::Unavailable(_)));
        assert!(backend.runtime().session().is_none());
        assert_eq!(backend.runtime().live_swapchains(), 0);
        assert_eq!(host.live_targets(), 0);
        assert!(!backend.interop().is_open());
        assert_eq!(backend.interop().registered_count(), 0);
    }

    #[test]
    fn unbounded_scale_is_clamped_to_the_runtime_limit() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        let eyes = *backend.enable(&mut host, f32::INFINITY).unwrap();
        assert_eq!(eyes[Eye::Right].extent(), Some(Extent::new(4096, 4096)));
        assert_eq!(backend.runtime().live_swapchains(), 2);
        let start = render(&mut backend, &mut host, &mut VrConfig::default());
        assert!(matches!(start, FrameStart::Render(_)));
    }

    #[test]
    fn failed_end_still_destroys_the_session() {
        let mut host = host(false);
        let mut backend = backend(GL_ONLY);
        backend.enable(&mut host, 1.0).unwrap();
        render(&mut backend, &mut host, &mut VrConfig::default());
        backend.runtime_mut().fail_next = Some(MockFailure::EndSession);
        backend.disable(&mut host);
        assert_eq!(backend.runtime().count(|c| *c == MockCall::EndSession), 1);
        assert!(backend.runtime().session().is_none());
        assert_eq!(backend.session_state(), SessionState::NotStarted);
        assert_eq!(host.live_targets(), 0);
    }
}
