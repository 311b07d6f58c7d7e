//! Vendor SDK backend. Both eyes share one swap texture set, tiled side by side, and the engine
//! picks which image to write round-robin.
use crate::config::VrConfig;
use crate::error::{RuntimeError, VrError};
use crate::eye::{Eye, PerEye};
use crate::eye_target::EyeRenderTarget;
use crate::fov::{self, CombinedFov};
use crate::frame_sync::{FrameCycle, FramePhase, FrameState};
use crate::gpu::{BlitOptions, ColorFormat, Extent, Framebuffer, Viewport};
use crate::hardware_query::{probe, GraphicsBinding, Requirements};
use crate::host::{FramebufferBinding, HostRenderer};
use crate::runtime::{create_swapchain_clamped, FovKind, FrameSubmission, LayerView, Runtime};
use crate::runtime::{SwapchainDesc, View};
use crate::session::{SessionState, SessionTracker};
use crate::swapchain_images::SwapchainImageSet;
use crate::tracking::{PoseSample, TrackingLossBounds, TrackingLossEstimator};
use crate::{BackendKind, FrameInfo, FrameStart, HmdBackend, ViewState};
use log::{debug, error, info, warn};

/// Eye targets are plain 8-bit; the swap set is sRGB so the compositor sees linear values
const EYE_FORMAT: ColorFormat = ColorFormat::Rgba8;
const SWAP_FORMAT: ColorFormat = ColorFormat::Srgb8;

/// Per-frame data kept between `frame_start` and `frame_end`
struct RiftFrame {
    state: FrameState,
    views: PerEye<View>,
    desaturation: f32,
}

pub struct RiftBackend<R: Runtime> {
    runtime: R,
    binding: Option<GraphicsBinding>,
    session: SessionTracker,
    session_created: bool,
    eyes: PerEye<EyeRenderTarget>,
    swap: Option<SwapchainImageSet>,
    /// Extent asked for when the swap set was created; may be larger than what was granted
    swap_request: Extent,
    cycle: FrameCycle,
    estimator: Option<TrackingLossEstimator>,
    frame: Option<RiftFrame>,
    view: Option<ViewState>,
    render_scale: f32,
    max_fov: bool,
    fade_edges: bool,
    tracking_fade: bool,
    gamma: f32,
}

impl<R: Runtime> RiftBackend<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            binding: None,
            session: SessionTracker::new(),
            session_created: false,
            eyes: PerEye::default(),
            swap: None,
            swap_request: Extent::default(),
            cycle: FrameCycle::new(),
            estimator: None,
            frame: None,
            view: None,
            render_scale: 1.0,
            max_fov: false,
            fade_edges: true,
            tracking_fade: true,
            gamma: 1.0,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    fn negotiate(&mut self, host: &dyn HostRenderer) -> Result<GraphicsBinding, VrError> {
        if let Some(binding) = self.binding {
            return Ok(binding);
        }
        let caps = self
            .runtime
            .capabilities()
            .map_err(|e| VrError::Unavailable(format!("cannot query the runtime: {}", e)))?;
        let requirements = Requirements {
            float_textures: true,
        };
        let binding = probe(&caps, &host.capabilities(), requirements).into_result()?;
        info!("Headset: {}", caps.system_name);
        self.binding = Some(binding);
        Ok(binding)
    }

    fn start_session(&mut self, binding: GraphicsBinding) -> Result<(), VrError> {
        if self.session_created {
            return Ok(());
        }
        self.runtime
            .create_session(binding)
            .map_err(|e| VrError::Unavailable(format!("cannot create a session: {}", e)))?;
        self.session_created = true;
        // The vendor runtime has no ready handshake; the session runs as soon as it exists
        self.runtime
            .begin_session()
            .map_err(|e| VrError::Unavailable(format!("cannot begin the session: {}", e)))?;
        self.session.mark_running();

        self.estimator = self.runtime.camera_frustum().map(|frustum| {
            debug!("Tracking camera frustum {:?}", frustum);
            TrackingLossEstimator::new(&frustum, TrackingLossBounds::default())
        });
        Ok(())
    }

    /// (Re)negotiate FOV, eye target sizes and the swap set
    fn configure(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        let kind = if self.max_fov {
            FovKind::Max
        } else {
            FovKind::Default
        };
        for (eye, target) in self.eyes.iter_mut() {
            target.set_fov(self.runtime.eye_fov(eye, kind));
            target.view_offset = fov::view_offset(self.runtime.eye_to_head(eye));
        }

        let scale = self.render_scale;
        let runtime = &self.runtime;
        let mut sizes = PerEye::from_fn(|eye| {
            runtime
                .recommended_eye_size(eye, &self.eyes[eye].fov)
                .scaled(scale)
        });

        let request = Extent::side_by_side(sizes[Eye::Left], sizes[Eye::Right]);
        if self.swap.is_none() || request != self.swap_request {
            if let Some(old) = self.swap.take() {
                self.runtime.destroy_swapchain(old.id);
            }
            let desc = SwapchainDesc::color(request, SWAP_FORMAT);
            let info = create_swapchain_clamped(&mut self.runtime, &desc)?;
            info!("Swap texture set of {} with {} images", info.extent, info.images.len());
            self.swap = Some(SwapchainImageSet::new(info.id, info.extent, info.images));
            self.swap_request = request;
        }

        if let Some(swap) = &self.swap {
            let half = Extent::new(swap.extent.width / 2, swap.extent.height);
            sizes = sizes.map(|_, size| size.clamped_to(half));
            let panel = self.runtime.display_resolution();
            let ratio = (swap.extent.width as f32 / panel.width as f32
                + swap.extent.height as f32 / panel.height as f32)
                / 2.0;
            debug!("Render target scale {:.2}", ratio);
        }

        for (eye, target) in self.eyes.iter_mut() {
            let reallocated = target
                .resize(host, sizes[eye], EYE_FORMAT)
                .map_err(|e| VrError::Unavailable(format!("cannot allocate eye buffer: {}", e)))?;
            if reallocated {
                debug!("Set {:?} eye buffer to {}", eye, sizes[eye]);
            }
        }

        let panel = self.runtime.display_resolution();
        self.view = Some(ViewState {
            combined: CombinedFov::from_eyes(&self.eyes.map(|_, t| t.fov)),
            pixel_scale: host.output_extent().width as f32 / panel.width.max(1) as f32,
        });
        Ok(())
    }

    fn apply_config(
        &mut self,
        host: &mut dyn HostRenderer,
        config: &mut VrConfig,
    ) -> Result<(), VrError> {
        let changes = config.take_changes();
        self.gamma = config.gamma;
        if let Some(fade) = changes.distortion_fade {
            self.fade_edges = fade;
        }
        if let Some(fade) = changes.tracking_loss_fade {
            self.tracking_fade = fade;
        }
        if let Some(max_fov) = changes.max_fov {
            self.max_fov = max_fov;
        }
        if let Some(scale) = changes.render_scale {
            self.render_scale = scale;
        }
        if changes.affects_targets() {
            self.configure(host)?;
        }
        Ok(())
    }

    fn desaturation(&self, sample: &PoseSample) -> f32 {
        match (&self.estimator, self.tracking_fade) {
            (Some(estimator), true) => estimator.desaturation(sample),
            _ => 0.0,
        }
    }

    /// Tear everything down after a runtime failure and report the session as ended
    fn fail(&mut self, host: &mut dyn HostRenderer, op: &str, source: RuntimeError) -> VrError {
        error!("{} failed: {}", op, source);
        self.disable(host);
        VrError::SessionEnded {
            reason: format!("{} failed", op),
            source: Some(source),
        }
    }

    /// Tear down and pass the error on; usage errors leave everything as it was
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
                fade_edges: self.fade_edges,
            })
            .map_err(|e| VrError::SessionEnded {
                reason: "submitting an empty frame failed".into(),
                source: Some(e),
            })?;
        self.cycle.release()?;
        Ok(())
    }

    fn copy_to_swap(
        &mut self,
        host: &mut dyn HostRenderer,
        desaturation: f32,
    ) -> Result<(), RuntimeError> {
        let swap = match &self.swap {
            Some(swap) => swap,
            None => return Ok(()),
        };
        let (_, image) = match swap.current() {
            Some(current) => current,
            None => return Ok(()),
        };
        host.bind(FramebufferBinding::SwapchainImage(image))?;
        host.clear()?;
        let options = BlitOptions {
            flip_y: true,
            gamma: Some(self.gamma),
            desaturate: desaturation,
        };
        for (eye, target) in self.eyes.iter() {
            if let Some(target) = &target.target {
                host.blit(target.color, Viewport::half(swap.extent, eye.index()), &options)?;
            }
        }
        Ok(())
    }
}

impl<R: Runtime> HmdBackend for RiftBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Rift
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
        if let Some(swap) = self.swap.take() {
            self.runtime.destroy_swapchain(swap.id);
        }
        self.swap_request = Extent::default();
        for (_, target) in self.eyes.iter_mut() {
            target.release(host);
        }
        if self.session_created {
            if self.session.is_running() {
                if let Err(e) = self.runtime.end_session() {
                    warn!("Ending the session failed: {}", e);
                }
            }
            self.runtime.destroy_session();
            self.session_created = false;
            info!("Vendor session destroyed");
        }
        self.session.reset();
        self.estimator = None;
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
        let located = self
            .runtime
            .tracking_state(time)
            .and_then(|sample| Ok((sample, self.runtime.locate_views(time)?)));
        let (sample, views) = match located {
            Ok(located) => located,
            Err(e) => return Err(self.fail(host, "sampling tracking", e)),
        };
        let desaturation = self.desaturation(&sample);

        let index = match self.swap.as_mut().map(|swap| swap.next_round_robin()) {
            Some(Ok(index)) => index,
            Some(Err(e)) => return Err(self.abort(host, e)),
            None => return Err(self.abort(host, VrError::ended("swap texture set missing"))),
        };
        for &eye in &Eye::ALL {
            self.cycle.acquire(eye, index)?;
        }
        self.cycle.finish_acquire()?;

        self.frame = Some(RiftFrame {
            state,
            views,
            desaturation,
        });
        Ok(FrameStart::Render(FrameInfo {
            predicted_display_time: time,
            views,
            head: sample.head,
            desaturation,
            view: self.view.unwrap_or_default(),
        }))
    }

    fn begin_render(&mut self) -> Result<&PerEye<EyeRenderTarget>, VrError> {
        self.cycle.begin_render()?;
        Ok(&self.eyes)
    }

    fn present(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        self.cycle.ensure(FramePhase::Rendering, "present")?;
        let desaturation = self.frame.as_ref().map(|f| f.desaturation).unwrap_or(0.0);
        if let Err(e) = self.copy_to_swap(host, desaturation) {
            return Err(self.fail(host, "copying to the swap texture set", e));
        }
        self.cycle.mark_translated()
    }

    fn frame_end(&mut self, host: &mut dyn HostRenderer) -> Result<(), VrError> {
        self.cycle.ensure(FramePhase::Rendering, "submit")?;
        let index = match self.cycle.acquired(Eye::Left) {
            Some(index) => index,
            None => return Err(self.abort(host, VrError::ended("no image acquired"))),
        };
        let (swap, frame) = match (&self.swap, &self.frame) {
            (Some(swap), Some(frame)) => (swap, frame),
            _ => return Err(self.abort(host, VrError::ended("no frame in flight"))),
        };
        let submission = FrameSubmission {
            display_time: frame.state.predicted_display_time,
            views: Some(PerEye::from_fn(|eye| LayerView {
                swapchain: swap.id,
                image_index: index,
                viewport: Viewport::half(swap.extent, eye.index()),
                pose: frame.views[eye].pose,
                fov: self.eyes[eye].fov,
            })),
            fade_edges: self.fade_edges,
        };
        self.cycle.submit()?;

        if let Err(e) = self.runtime.submit_frame(&submission) {
            return Err(self.fail(host, "submitting the frame", e));
        }
        if let Some(swap) = &mut self.swap {
            swap.release();
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
        if let Some(texture) = self.runtime.mirror_texture() {
            let options = BlitOptions {
                flip_y: true,
                ..BlitOptions::default()
            };
            return host.blit(texture, Viewport::full(destination.extent), &options);
        }
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
    use crate::hardware_query::HostCapabilities;
    use crate::mock::{MockCall, MockFailure, MockHost, MockRuntime};
    use crate::session::RuntimeEvent;

    fn host() -> MockHost {
        MockHost::new(HostCapabilities {
            dx_interop: false,
            float_textures: true,
        })
    }

    fn config(scale: f32) -> VrConfig {
        let mut config = VrConfig::default();
        config.render_scale.set(scale);
        config
    }

    fn run_frame(
        backend: &mut RiftBackend<MockRuntime>,
        host: &mut MockHost,
        config: &mut VrConfig,
    ) -> FrameInfo {
        let info = match backend.frame_start(host, config).unwrap() {
            FrameStart::Render(info) => info,
            other => panic!("expected a frame, got {:?}", other),
        };
        backend.begin_render().unwrap();
        backend.present(host).unwrap();
        backend.frame_end(host).unwrap();
        info
    }

    #[test]
    fn enable_sizes_targets_from_the_recommendation() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        let eyes = backend.enable(&mut host, 1.0).unwrap();
        assert_eq!(eyes[Eye::Left].extent(), Some(Extent::new(1182, 1464)));
        assert_eq!(eyes[Eye::Right].extent(), Some(Extent::new(1182, 1464)));
        assert_eq!(eyes[Eye::Left].view_offset.x, -0.032);

        let runtime = backend.runtime();
        assert!(runtime.is_running());
        let side_by_side = Extent::new(2364, 1464);
        assert_eq!(
            runtime.count(|c| matches!(c, MockCall::CreateSwapchain(e) if *e == side_by_side)),
            1
        );
    }

    #[test]
    fn float_targets_are_required() {
        let mut host = MockHost::new(HostCapabilities::default());
        let mut backend = RiftBackend::new(MockRuntime::rift());
        assert!(matches!(
            backend.enable(&mut host, 1.0),
            Err(VrError::Unavailable(_))
        ));
        assert!(backend.runtime().session().is_none());
    }

    #[test]
    fn swap_images_rotate_and_eyes_land_in_their_half() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = config(1.0);
        let eyes = *backend.eye_targets();

        for _ in 0..4 {
            run_frame(&mut backend, &mut host, &mut config);
        }
        let indices: Vec<u32> = backend
            .runtime()
            .submissions()
            .iter()
            .map(|s| s.views.unwrap()[Eye::Left].image_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);

        let last = &host.blits[host.blits.len() - 2..];
        assert_eq!(last[0].source, eyes[Eye::Left].target.unwrap().color);
        assert_eq!(last[0].viewport.x, 0);
        assert_eq!(last[1].source, eyes[Eye::Right].target.unwrap().color);
        assert_eq!(last[1].viewport.x, 1182);
        assert!(last[1].options.flip_y);
    }

    #[test]
    fn unchanged_config_does_not_reallocate() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = config(1.0);
        run_frame(&mut backend, &mut host, &mut config);
        run_frame(&mut backend, &mut host, &mut config);
        assert_eq!(host.created_targets(), 2);
        assert_eq!(
            backend.runtime().count(|c| matches!(c, MockCall::CreateSwapchain(_))),
            1
        );

        config.max_fov.set(true);
        run_frame(&mut backend, &mut host, &mut config);
        assert_eq!(host.created_targets(), 4);
        assert_eq!(host.live_targets(), 2);
        let fov = backend.eye_targets()[Eye::Left].fov;
        assert_eq!(fov, backend.runtime().max_fov);
    }

    #[test]
    fn oversized_swap_set_is_clamped() {
        let mut host = host();
        let mut runtime = MockRuntime::rift();
        runtime.max_extent = Extent::new(2048, 2048);
        let mut backend = RiftBackend::new(runtime);
        let eyes = backend.enable(&mut host, 1.0).unwrap();
        assert_eq!(eyes[Eye::Left].extent(), Some(Extent::new(1024, 1464)));
        assert_eq!(backend.runtime().live_swapchains(), 1);
    }

    #[test]
    fn unbounded_scale_is_clamped_to_the_runtime_limit() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        let eyes = *backend.enable(&mut host, f32::INFINITY).unwrap();
        assert_eq!(eyes[Eye::Left].extent(), Some(Extent::new(2048, 4096)));
        assert_eq!(eyes[Eye::Right].extent(), Some(Extent::new(2048, 4096)));
        assert_eq!(backend.runtime().live_swapchains(), 1);

        let mut config = config(f32::INFINITY);
        run_frame(&mut backend, &mut host, &mut config);
        let views = backend.runtime().submissions()[0].views.unwrap();
        assert_eq!(views[Eye::Right].viewport.x, 2048);
    }

    #[test]
    fn clamping_fails_once_then_unavailable() {
        let mut host = host();
        let mut runtime = MockRuntime::rift();
        runtime.max_extent = Extent::new(2048, 2048);
        runtime.fail_next = Some(MockFailure::CreateSwapchain);
        let mut backend = RiftBackend::new(runtime);
        assert!(matches!(
            backend.enable(&mut host, 1.0),
            Err(VrError::Unavailable(_))
        ));
        assert_eq!(host.live_targets(), 0);
        assert!(backend.runtime().session().is_none());
    }

    #[test]
    fn tracking_loss_desaturates_unless_disabled() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = config(1.0);
        assert_eq!(run_frame(&mut backend, &mut host, &mut config).desaturation, 0.0);

        backend.runtime_mut().tracking.status.position_locked = false;
        let info = run_frame(&mut backend, &mut host, &mut config);
        assert_eq!(info.desaturation, 1.0);
        assert_eq!(host.blits.last().unwrap().options.desaturate, 1.0);

        config.tracking_loss_fade.set(false);
        assert_eq!(run_frame(&mut backend, &mut host, &mut config).desaturation, 0.0);
    }

    #[test]
    fn device_loss_ends_the_session() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        backend.runtime_mut().push_event(RuntimeEvent::DeviceLost);
        let err = backend.frame_start(&mut host, &mut config(1.0)).unwrap_err();
        assert!(err.is_session_fatal());
        assert_eq!(host.live_targets(), 0);
        assert_eq!(backend.runtime().live_swapchains(), 0);
        assert!(backend.runtime().session().is_none());
    }

    #[test]
    fn failed_end_still_destroys_the_session() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        backend.runtime_mut().fail_next = Some(MockFailure::EndSession);
        backend.disable(&mut host);
        assert_eq!(backend.runtime().count(|c| *c == MockCall::EndSession), 1);
        assert!(backend.runtime().session().is_none());
        assert_eq!(backend.runtime().live_swapchains(), 0);
    }

    #[test]
    fn submit_failure_tears_down() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = config(1.0);
        backend.frame_start(&mut host, &mut config).unwrap();
        backend.begin_render().unwrap();
        backend.present(&mut host).unwrap();
        backend.runtime_mut().fail_next = Some(MockFailure::Submit);
        let err = backend.frame_end(&mut host).unwrap_err();
        assert!(matches!(err, VrError::SessionEnded { source: Some(_), .. }));
        assert_eq!(backend.frame_phase(), FramePhase::Idle);
        assert!(backend.eye_targets()[Eye::Left].target.is_none());
    }

    #[test]
    fn out_of_order_calls_are_rejected_without_side_effects() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        let mut config = config(1.0);
        backend.frame_start(&mut host, &mut config).unwrap();
        assert!(matches!(
            backend.frame_start(&mut host, &mut config),
            Err(VrError::Protocol { .. })
        ));
        assert!(matches!(backend.present(&mut host), Err(VrError::Protocol { .. })));
        backend.begin_render().unwrap();
        assert!(matches!(backend.frame_end(&mut host), Err(VrError::Protocol { .. })));
        assert_eq!(backend.frame_phase(), FramePhase::Rendering);
        backend.present(&mut host).unwrap();
        backend.frame_end(&mut host).unwrap();
    }

    #[test]
    fn skipped_frames_submit_no_layers() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        backend.runtime_mut().render_pattern.push_back(false);
        let start = backend.frame_start(&mut host, &mut config(1.0)).unwrap();
        assert_eq!(start, FrameStart::Skipped);
        let submissions = backend.runtime().submissions();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].views.is_none());
    }

    #[test]
    fn view_state_reports_pixel_scale() {
        let mut host = host();
        let mut backend = RiftBackend::new(MockRuntime::rift());
        backend.enable(&mut host, 1.0).unwrap();
        let view = backend.view_state().unwrap();
        assert_eq!(view.pixel_scale, 1280.0 / 1920.0);
        assert!((view.combined.x_degrees - 90.0).abs() < 1e-3);
    }
}
