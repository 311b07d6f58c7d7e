use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use xrbridge::app::{self, App, RunOptions, RunOutcome};
use xrbridge::gpu::Extent;
use xrbridge::hardware_query::{GraphicsApis, HostCapabilities};
use xrbridge::mock::{MockCall, MockHost, MockInterop, MockRuntime};
use xrbridge::{Backend, BackendKind, Eye, EyeRenderTarget, FrameInfo, FrameStart};
use xrbridge::{HmdBackend, HostRenderer, PerEye, SessionState, VrConfig};

#[derive(Default)]
struct Recorder {
    frames: Vec<FrameInfo>,
    sizes: Vec<PerEye<Option<Extent>>>,
}

impl App for Recorder {
    fn render_eyes(
        &mut self,
        _host: &mut dyn HostRenderer,
        eyes: &PerEye<EyeRenderTarget>,
        frame: &FrameInfo,
    ) -> Result<()> {
        self.frames.push(*frame);
        self.sizes.push(eyes.map(|_, e| e.extent()));
        Ok(())
    }

    fn render_flat(&mut self, _host: &mut dyn HostRenderer) -> Result<()> {
        Ok(())
    }
}

fn host() -> MockHost {
    MockHost::new(HostCapabilities {
        dx_interop: true,
        float_textures: true,
    })
}

fn options(frames: u64) -> RunOptions {
    RunOptions {
        frames: Some(frames),
        paused_backoff: Duration::from_millis(1),
        flat_fps: 1000,
        mirror: true,
    }
}

fn gl_openxr() -> MockRuntime {
    MockRuntime::openxr(GraphicsApis {
        opengl: true,
        d3d11: true,
    })
}

fn run_frames(
    backend: &mut Backend<MockRuntime, MockInterop>,
    host: &mut MockHost,
    frames: u64,
) -> Recorder {
    let mut app = Recorder::default();
    let running = AtomicBool::new(true);
    let outcome = app::run(
        &mut app,
        backend,
        host,
        &mut VrConfig::default(),
        &options(frames),
        &running,
    )
    .unwrap();
    assert_eq!(outcome, RunOutcome::Completed { frames });
    app
}

#[test]
fn both_backends_submit_every_frame() {
    for &(kind, runtime) in &[
        (BackendKind::Rift, MockRuntime::rift as fn() -> MockRuntime),
        (BackendKind::OpenXr, gl_openxr),
    ] {
        let mut host = host();
        let mut backend = Backend::new(kind, runtime(), MockInterop::new());
        let app = run_frames(&mut backend, &mut host, 8);
        assert_eq!(app.frames.len(), 8);
        assert_eq!(backend.runtime().submissions().len(), 8);
        assert!(backend
            .runtime()
            .submissions()
            .iter()
            .all(|s| s.layer_count() == 1));

        let times: Vec<i64> = app.frames.iter().map(|f| f.predicted_display_time).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]), "{:?}", kind);
        assert_eq!(backend.runtime().live_swapchains(), 0);
        assert_eq!(host.live_targets(), 0);
    }
}

#[test]
fn skipped_frames_submit_no_layers() {
    let mut host = host();
    let mut runtime = gl_openxr();
    runtime.render_pattern.extend(vec![true, false, false, true]);
    let mut backend = Backend::new(BackendKind::OpenXr, runtime, MockInterop::new());
    let app = run_frames(&mut backend, &mut host, 4);
    assert_eq!(app.frames.len(), 2);
    let layers: Vec<usize> = backend
        .runtime()
        .submissions()
        .iter()
        .map(|s| s.layer_count())
        .collect();
    assert_eq!(layers, vec![1, 0, 0, 1]);
}

#[test]
fn re_enabling_with_the_same_scale_keeps_sizes() {
    let mut host = host();
    let mut backend = Backend::new(BackendKind::Rift, MockRuntime::rift(), MockInterop::new());
    let first = run_frames(&mut backend, &mut host, 2);
    let second = run_frames(&mut backend, &mut host, 2);
    assert_eq!(first.sizes, second.sizes);
    assert_eq!(
        first.sizes[0][Eye::Left],
        Some(Extent::new(1182, 1464))
    );
}

#[test]
fn render_scale_change_reallocates_once() {
    let mut host = host();
    let mut backend = Backend::new(BackendKind::OpenXr, gl_openxr(), MockInterop::new());
    let mut config = VrConfig::default();
    backend.enable(&mut host, 1.0).unwrap();
    let swapchains_before = backend
        .runtime()
        .count(|c| matches!(c, MockCall::CreateSwapchain(_)));

    config.render_scale.set(0.5);
    for _ in 0..3 {
        match backend.frame_start(&mut host, &mut config).unwrap() {
            FrameStart::Render(_) => {
                backend.begin_render().unwrap();
                backend.present(&mut host).unwrap();
                backend.frame_end(&mut host).unwrap();
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    let created = backend
        .runtime()
        .count(|c| matches!(c, MockCall::CreateSwapchain(_)));
    assert_eq!(created - swapchains_before, 2);
    assert_eq!(
        backend.eye_targets()[Eye::Right].extent(),
        Some(Extent::new(591, 732))
    );
    assert_eq!(backend.session_state(), SessionState::Running);
}

#[test]
fn interop_runtime_runs_through_the_flip_pass() {
    let mut host = host();
    let runtime = MockRuntime::openxr(GraphicsApis {
        opengl: false,
        d3d11: true,
    });
    let mut backend = Backend::new(BackendKind::OpenXr, runtime, MockInterop::new());
    let app = run_frames(&mut backend, &mut host, 3);
    assert_eq!(app.frames.len(), 3);
    match &backend {
        Backend::OpenXr(inner) => {
            assert_eq!(inner.interop().flips.len(), 6);
            assert!(!inner.interop().is_open());
        }
        Backend::Rift(_) => unreachable!(),
    }
}

#[test]
fn long_runs_keep_mock_logs_bounded() {
    let mut host = host();
    host.log_limit = 64;
    let mut runtime = gl_openxr();
    runtime.log_limit = 64;
    let mut backend = Backend::new(BackendKind::OpenXr, runtime, MockInterop::new());
    let app = run_frames(&mut backend, &mut host, 500);
    assert_eq!(app.frames.len(), 500);

    let submissions = backend.runtime().submissions();
    assert!(submissions.len() <= 64);
    assert_eq!(
        submissions.last().map(|s| s.display_time),
        app.frames.last().map(|f| f.predicted_display_time)
    );
    assert!(backend.runtime().count(|_| true) <= 64);
    assert!(host.blits.len() <= 64 && host.clears.len() <= 64);
}
