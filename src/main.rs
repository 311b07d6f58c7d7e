use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use xrbridge::app::{self, App, RunOptions, RunOutcome};
use xrbridge::gpu::{Framebuffer, FramebufferId};
use xrbridge::hardware_query::{self, GraphicsApis, HostCapabilities, Requirements};
use xrbridge::mock::{MockHost, MockInterop, MockRuntime};
use xrbridge::{xr_prelude, Backend, BackendKind, EyeRenderTarget, FrameInfo};
use xrbridge::{FramebufferBinding, HostRenderer, PerEye, VrConfig};

#[derive(Debug, Parser)]
#[command(
    name = "xrbridge",
    version,
    about = "Stereo frame submission for Rift and OpenXR runtimes"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query the installed OpenXR runtime and report whether it can drive this host
    Probe {
        #[arg(long, default_value = "xrbridge")]
        app_name: String,
        /// Assume the host GL driver supports NV_DX_interop2
        #[arg(long)]
        dx_interop: bool,
    },
    /// Run the frame loop against a simulated headset
    Demo {
        #[arg(long, value_enum, default_value_t = BackendArg::Openxr)]
        backend: BackendArg,
        /// Eye buffer resolution relative to the runtime's recommendation
        #[arg(long, default_value_t = 1.0, value_parser = render_scale)]
        scale: f32,
        /// Use the runtime's maximum FOV (Rift only)
        #[arg(long)]
        max_fov: bool,
        /// Stop after this many frames; runs until Ctrl-C otherwise
        #[arg(long)]
        frames: Option<u64>,
        #[arg(long)]
        no_tracking_fade: bool,
        #[arg(long)]
        no_distortion_fade: bool,
        /// Simulated display refresh rate
        #[arg(long, default_value_t = 90)]
        fps: u64,
        /// Simulate a D3D11-only OpenXR runtime, reached through GL interop
        #[arg(long)]
        interop: bool,
    },
}

fn render_scale(arg: &str) -> Result<f32, String> {
    let scale: f32 = arg.parse().map_err(|e| format!("{}", e))?;
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(format!("{} is not a positive finite scale", arg))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Rift,
    Openxr,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Rift => BackendKind::Rift,
            BackendArg::Openxr => BackendKind::OpenXr,
        }
    }
}

/// Clears each eye and logs where the head is
#[derive(Default)]
struct ClearEyes {
    vr_frames: u64,
    flat_frames: u64,
}

impl App for ClearEyes {
    fn render_eyes(
        &mut self,
        host: &mut dyn HostRenderer,
        eyes: &PerEye<EyeRenderTarget>,
        frame: &FrameInfo,
    ) -> Result<()> {
        for (_, eye) in eyes.iter() {
            if let Some(target) = eye.target {
                host.bind(FramebufferBinding::Target(target.framebuffer))?;
                host.clear()?;
            }
        }
        debug!(
            "Frame at {} ns, head at {:?}, desaturation {:.2}",
            frame.predicted_display_time, frame.head.position, frame.desaturation
        );
        self.vr_frames += 1;
        Ok(())
    }

    fn render_flat(&mut self, host: &mut dyn HostRenderer) -> Result<()> {
        let screen = Framebuffer {
            id: FramebufferId(0),
            extent: host.output_extent(),
        };
        host.bind(FramebufferBinding::Destination(screen))?;
        host.clear()?;
        self.flat_frames += 1;
        Ok(())
    }
}

fn probe(app_name: &str, dx_interop: bool) -> Result<()> {
    let installed = xr_prelude::query_installed_runtime(app_name)?;
    let caps = &installed.capabilities;
    println!("Runtime: {}", caps.runtime_name);
    println!("System: {}", caps.system_name);
    println!(
        "Graphics: OpenGL {}, D3D11 {}",
        caps.graphics.opengl, caps.graphics.d3d11
    );
    println!("View configurations: {:?}", caps.view_configurations);
    println!("Blend modes: {:?}", caps.blend_modes);
    if let Some(recommended) = installed.recommended {
        for (eye, size) in recommended.iter() {
            println!("{:?} eye: {}", eye, size);
        }
    }
    println!("Max swapchain: {}", installed.max_swapchain);

    let host = HostCapabilities {
        dx_interop,
        float_textures: true,
    };
    let result = hardware_query::probe(caps, &host, Requirements::default());
    match (result.binding, result.reason) {
        (Some(binding), _) => println!("Supported, using {:?}", binding),
        (None, reason) => println!("Unsupported: {}", reason.unwrap_or_default()),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn demo(
    backend: BackendArg,
    scale: f32,
    max_fov: bool,
    frames: Option<u64>,
    tracking_fade: bool,
    distortion_fade: bool,
    fps: u64,
    interop: bool,
) -> Result<()> {
    let runtime = match backend {
        BackendArg::Rift => MockRuntime::rift(),
        BackendArg::Openxr => MockRuntime::openxr(GraphicsApis {
            opengl: !interop,
            d3d11: true,
        }),
    }
    .paced(fps);
    let mut host = MockHost::new(HostCapabilities {
        dx_interop: true,
        float_textures: true,
    });
    let mut backend = Backend::new(backend.into(), runtime, MockInterop::new());

    let mut config = VrConfig::default();
    config.render_scale.set(scale);
    config.max_fov.set(max_fov);
    config.tracking_loss_fade.set(tracking_fade);
    config.distortion_fade.set(distortion_fade);

    let options = RunOptions {
        frames,
        ..RunOptions::default()
    };
    let running = app::interrupt_flag()?;
    let mut app = ClearEyes::default();
    let outcome = app::run(
        &mut app,
        &mut backend,
        &mut host,
        &mut config,
        &options,
        &running,
    )?;
    match outcome {
        RunOutcome::Completed { frames } => info!("Submitted {} frames", frames),
        RunOutcome::Interrupted { frames } => info!("Interrupted after {} frames", frames),
        RunOutcome::FellBackToFlat { reason, frames } => {
            info!("VR stopped ({}), {} frames in total", reason, frames)
        }
    }
    info!(
        "{} stereo frames, {} flat frames, {} submissions",
        app.vr_frames,
        app.flat_frames,
        backend.runtime().submissions().len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    match Cli::parse().command {
        Command::Probe {
            app_name,
            dx_interop,
        } => probe(&app_name, dx_interop),
        Command::Demo {
            backend,
            scale,
            max_fov,
            frames,
            no_tracking_fade,
            no_distortion_fade,
            fps,
            interop,
        } => demo(
            backend,
            scale,
            max_fov,
            frames,
            !no_tracking_fade,
            !no_distortion_fade,
            fps,
            interop,
        ),
    }
}
