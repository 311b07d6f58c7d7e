//! `Runtime` over a live OpenXR instance. The host creates its graphics context first and hands
//! over the matching session create info; the session itself is created when the backend asks.
use super::xr_prelude::{self, InstalledRuntime};
use crate::error::RuntimeError;
use crate::eye::{Eye, PerEye};
use crate::fov::FovTangents;
use crate::frame_sync::FrameState;
use crate::gpu::{ColorFormat, Extent, ImageHandle, Viewport};
use crate::hardware_query::{GraphicsBinding, RuntimeCapabilities};
use crate::runtime::{FovKind, FrameSubmission, Runtime, SwapchainDesc, SwapchainId};
use crate::runtime::{SwapchainInfo, View};
use crate::session::{RuntimeEvent, RuntimeSessionState};
use crate::tracking::{CameraFrustum, Pose, PoseSample, TrackingStatus};
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};
use slotmap::{new_key_type, Key, KeyData, SlotMap};

const GL_RGBA8: u32 = 0x8058;
const GL_SRGB8: u32 = 0x8C41;
const GL_SRGB8_ALPHA8: u32 = 0x8C43;

/// Graphics APIs a session can be created for
pub trait XrGraphics: xr::Graphics {
    const BINDING: GraphicsBinding;
    /// Turn on the extension this API needs
    fn enable(extensions: &mut xr::ExtensionSet);
    fn format(format: ColorFormat) -> Self::Format;
    fn image_handle(image: &Self::SwapchainImage) -> ImageHandle;
}

impl XrGraphics for xr::OpenGL {
    const BINDING: GraphicsBinding = GraphicsBinding::OpenGl;

    fn enable(extensions: &mut xr::ExtensionSet) {
        extensions.khr_opengl_enable = true;
    }

    fn format(format: ColorFormat) -> u32 {
        match format {
            ColorFormat::Rgba8 => GL_RGBA8,
            ColorFormat::Srgb8 => GL_SRGB8,
            ColorFormat::Srgb8Alpha8 => GL_SRGB8_ALPHA8,
        }
    }

    fn image_handle(image: &u32) -> ImageHandle {
        ImageHandle(u64::from(*image))
    }
}

#[cfg(windows)]
impl XrGraphics for xr::D3D11 {
    const BINDING: GraphicsBinding = GraphicsBinding::D3d11Interop;

    fn enable(extensions: &mut xr::ExtensionSet) {
        extensions.khr_d3d11_enable = true;
    }

    // DXGI_FORMAT_R8G8B8A8_UNORM and DXGI_FORMAT_R8G8B8A8_UNORM_SRGB
    fn format(format: ColorFormat) -> u32 {
        match format {
            ColorFormat::Rgba8 => 28,
            ColorFormat::Srgb8 | ColorFormat::Srgb8Alpha8 => 29,
        }
    }

    fn image_handle(image: &Self::SwapchainImage) -> ImageHandle {
        ImageHandle(*image as usize as u64)
    }
}

new_key_type! {
    struct SwapchainKey;
}

fn key(id: SwapchainId) -> SwapchainKey {
    KeyData::from_ffi(id.0).into()
}

fn xr_call<T>(result: xr::Result<T>) -> Result<T, RuntimeError> {
    Ok(result.map_err(anyhow::Error::from)?)
}

/// Everything that only exists while a session does
struct LiveSession<G: xr::Graphics> {
    session: xr::Session<G>,
    waiter: xr::FrameWaiter,
    stream: xr::FrameStream<G>,
    local: xr::Space,
    view: xr::Space,
    swapchains: SlotMap<SwapchainKey, xr::Swapchain<G>>,
}

fn live<G: xr::Graphics>(
    live: &mut Option<LiveSession<G>>,
) -> Result<&mut LiveSession<G>, RuntimeError> {
    live.as_mut().ok_or_else(|| anyhow!("no session").into())
}

impl<G: xr::Graphics> LiveSession<G> {
    fn swapchain(&mut self, id: SwapchainId) -> Result<&mut xr::Swapchain<G>, RuntimeError> {
        self.swapchains
            .get_mut(key(id))
            .ok_or_else(|| anyhow!("unknown swapchain {:?}", id).into())
    }
}

/// OpenXR runtime for sessions of graphics API `G`
pub struct XrRuntime<G: XrGraphics> {
    instance: xr::Instance,
    system: xr::SystemId,
    session_info: G::SessionCreateInfo,
    installed: InstalledRuntime,
    live: Option<LiveSession<G>>,
    /// Last located FOV per eye; unit tangents until the first frame
    fov: PerEye<FovTangents>,
    /// Last located head-to-eye offsets
    eye_offsets: PerEye<Vector3<f32>>,
    events: xr::EventDataBuffer,
}

impl<G: XrGraphics> XrRuntime<G> {
    /// Load the runtime and find the headset. `session_info` must describe the host's current
    /// graphics context and stay valid for as long as this runtime lives.
    pub fn new(application_name: &str, session_info: G::SessionCreateInfo) -> Result<Self> {
        let entry = xr_prelude::load_openxr()?;
        let mut graphics = xr_prelude::available_graphics(&entry.enumerate_extensions()?);
        graphics.opengl &= G::BINDING == GraphicsBinding::OpenGl;
        graphics.d3d11 &= G::BINDING == GraphicsBinding::D3d11Interop;
        if !graphics.opengl && !graphics.d3d11 {
            return Err(anyhow!("runtime has no {:?} support", G::BINDING));
        }

        let mut extensions = xr::ExtensionSet::default();
        G::enable(&mut extensions);
        let instance = xr_prelude::create_instance(&entry, application_name, &extensions)?;
        let system = instance.system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)?;
        let installed = xr_prelude::describe_system(&instance, system, graphics)?;

        Ok(Self {
            instance,
            system,
            session_info,
            installed,
            live: None,
            fov: PerEye::from_fn(|_| FovTangents::new(1.0, 1.0, 1.0, 1.0)),
            eye_offsets: PerEye::default(),
            events: xr::EventDataBuffer::new(),
        })
    }
}

impl<G: XrGraphics> Runtime for XrRuntime<G> {
    fn capabilities(&mut self) -> Result<RuntimeCapabilities, RuntimeError> {
        Ok(self.installed.capabilities.clone())
    }

    fn create_session(&mut self, binding: GraphicsBinding) -> Result<(), RuntimeError> {
        if binding != G::BINDING {
            let err = anyhow!("{:?} session requested from a {:?} runtime", binding, G::BINDING);
            return Err(err.into());
        }
        if self.live.is_some() {
            return Err(anyhow!("session already exists").into());
        }
        // Runtimes reject sessions whose graphics requirements were never queried
        xr_call(self.instance.graphics_requirements::<G>(self.system))?;
        let (session, waiter, stream) = xr_call(unsafe {
            self.instance.create_session::<G>(self.system, &self.session_info)
        })?;
        let local = xr_call(
            session.create_reference_space(xr::ReferenceSpaceType::LOCAL, xr::Posef::IDENTITY),
        )?;
        let view = xr_call(
            session.create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY),
        )?;
        info!("Created OpenXR session");
        self.live = Some(LiveSession {
            session,
            waiter,
            stream,
            local,
            view,
            swapchains: SlotMap::with_key(),
        });
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.live = None;
        self.eye_offsets = PerEye::default();
    }

    fn begin_session(&mut self) -> Result<(), RuntimeError> {
        let live = live(&mut self.live)?;
        xr_call(live.session.begin(xr::ViewConfigurationType::PRIMARY_STEREO))?;
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), RuntimeError> {
        xr_call(live(&mut self.live)?.session.end())?;
        Ok(())
    }

    fn poll_event(&mut self) -> Option<RuntimeEvent> {
        loop {
            let event = match self.instance.poll_event(&mut self.events) {
                Ok(Some(event)) => event,
                Ok(None) => return None,
                Err(e) => {
                    warn!("Polling OpenXR events failed: {}", e);
                    return None;
                }
            };
            let mapped = match event {
                xr::Event::SessionStateChanged(e) => {
                    debug!("OpenXR entered state {:?}", e.state());
                    session_state(e.state()).map(RuntimeEvent::StateChanged)
                }
                xr::Event::InstanceLossPending(_) => Some(RuntimeEvent::InstanceLossPending),
                xr::Event::EventsLost(e) => Some(RuntimeEvent::EventsLost(e.lost_event_count())),
                _ => None,
            };
            if mapped.is_some() {
                return mapped;
            }
        }
    }

    fn display_resolution(&self) -> Extent {
        match &self.installed.recommended {
            Some(sizes) => Extent::side_by_side(sizes[Eye::Left], sizes[Eye::Right]),
            None => Extent::default(),
        }
    }

    fn max_swapchain_extent(&self) -> Extent {
        self.installed.max_swapchain
    }

    fn eye_fov(&self, eye: Eye, _kind: FovKind) -> FovTangents {
        self.fov[eye]
    }

    fn eye_to_head(&self, eye: Eye) -> Vector3<f32> {
        self.eye_offsets[eye]
    }

    fn recommended_eye_size(&self, eye: Eye, _fov: &FovTangents) -> Extent {
        self.installed
            .recommended
            .map(|sizes| sizes[eye])
            .unwrap_or_default()
    }

    fn camera_frustum(&self) -> Option<CameraFrustum> {
        None
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainInfo, RuntimeError> {
        let limit = self.installed.max_swapchain;
        if !desc.extent.fits_within(limit) {
            return Err(RuntimeError::ResourceLimit {
                requested: desc.extent,
                limit,
            });
        }
        let live = live(&mut self.live)?;
        let mut usage_flags = xr::SwapchainUsageFlags::EMPTY;
        if desc.usage.sampled {
            usage_flags |= xr::SwapchainUsageFlags::SAMPLED;
        }
        if desc.usage.color_attachment {
            usage_flags |= xr::SwapchainUsageFlags::COLOR_ATTACHMENT;
        }
        let swapchain = xr_call(live.session.create_swapchain(&xr::SwapchainCreateInfo {
            create_flags: xr::SwapchainCreateFlags::EMPTY,
            usage_flags,
            format: G::format(desc.format),
            sample_count: desc.sample_count,
            width: desc.extent.width,
            height: desc.extent.height,
            face_count: desc.face_count,
            array_size: desc.array_size,
            mip_count: desc.mip_count,
        }))?;
        let images = xr_call(swapchain.enumerate_images())?
            .iter()
            .map(G::image_handle)
            .collect();
        let key = live.swapchains.insert(swapchain);
        Ok(SwapchainInfo {
            id: SwapchainId(key.data().as_ffi()),
            extent: desc.extent,
            images,
        })
    }

    fn destroy_swapchain(&mut self, id: SwapchainId) {
        if let Some(live) = &mut self.live {
            live.swapchains.remove(key(id));
        }
    }

    fn wait_frame(&mut self) -> Result<FrameState, RuntimeError> {
        let state = xr_call(live(&mut self.live)?.waiter.wait())?;
        Ok(FrameState {
            predicted_display_time: state.predicted_display_time.as_nanos(),
            should_render: state.should_render,
        })
    }

    fn begin_frame(&mut self) -> Result<(), RuntimeError> {
        xr_call(live(&mut self.live)?.stream.begin())
    }

    fn acquire_image(&mut self, id: SwapchainId) -> Result<u32, RuntimeError> {
        let swapchain = live(&mut self.live)?.swapchain(id)?;
        let index = xr_call(swapchain.acquire_image())?;
        xr_call(swapchain.wait_image(xr::Duration::INFINITE))?;
        Ok(index)
    }

    fn release_image(&mut self, id: SwapchainId) -> Result<(), RuntimeError> {
        xr_call(live(&mut self.live)?.swapchain(id)?.release_image())
    }

    fn locate_views(&mut self, display_time: i64) -> Result<PerEye<View>, RuntimeError> {
        let live = live(&mut self.live)?;
        let time = xr::Time::from_nanos(display_time);
        let (_, views) = xr_call(live.session.locate_views(
            xr::ViewConfigurationType::PRIMARY_STEREO,
            time,
            &live.local,
        ))?;
        let views = match views.as_slice() {
            [left, right, ..] => PerEye::new(view(left), view(right)),
            _ => return Err(anyhow!("runtime located {} views", views.len()).into()),
        };
        let head = pose(&xr_call(live.view.locate(&live.local, time))?.pose);

        for (eye, located) in views.iter() {
            self.fov[eye] = located.fov;
            self.eye_offsets[eye] = eye_to_head(&head, &located.pose);
        }
        Ok(views)
    }

    fn tracking_state(&mut self, display_time: i64) -> Result<PoseSample, RuntimeError> {
        let live = live(&mut self.live)?;
        let time = xr::Time::from_nanos(display_time);
        let location = xr_call(live.view.locate(&live.local, time))?;
        Ok(PoseSample {
            head: pose(&location.pose),
            camera: None,
            status: TrackingStatus {
                camera_connected: false,
                position_locked: location
                    .location_flags
                    .contains(xr::SpaceLocationFlags::POSITION_TRACKED),
            },
        })
    }

    fn submit_frame(&mut self, frame: &FrameSubmission) -> Result<(), RuntimeError> {
        let LiveSession {
            stream,
            swapchains,
            local,
            ..
        } = live(&mut self.live)?;
        let time = xr::Time::from_nanos(frame.display_time);
        let views = match &frame.views {
            Some(views) => views,
            None => return xr_call(stream.end(time, xr::EnvironmentBlendMode::OPAQUE, &[])),
        };

        let mut projection_views = Vec::with_capacity(2);
        for (eye, layer) in views.iter() {
            let swapchain = swapchains
                .get(key(layer.swapchain))
                .ok_or_else(|| anyhow!("{:?} eye submits unknown swapchain", eye))?;
            projection_views.push(
                xr::CompositionLayerProjectionView::new()
                    .pose(posef(&layer.pose))
                    .fov(fovf(&layer.fov))
                    .sub_image(
                        xr::SwapchainSubImage::new()
                            .swapchain(swapchain)
                            .image_array_index(0)
                            .image_rect(rect(layer.viewport)),
                    ),
            );
        }
        xr_call(stream.end(
            time,
            xr::EnvironmentBlendMode::OPAQUE,
            &[&xr::CompositionLayerProjection::new()
                .space(local)
                .views(&projection_views)],
        ))
    }
}

fn session_state(state: xr::SessionState) -> Option<RuntimeSessionState> {
    Some(match state {
        xr::SessionState::IDLE => RuntimeSessionState::Idle,
        xr::SessionState::READY => RuntimeSessionState::Ready,
        xr::SessionState::SYNCHRONIZED => RuntimeSessionState::Synchronized,
        xr::SessionState::VISIBLE => RuntimeSessionState::Visible,
        xr::SessionState::FOCUSED => RuntimeSessionState::Focused,
        xr::SessionState::STOPPING => RuntimeSessionState::Stopping,
        xr::SessionState::LOSS_PENDING => RuntimeSessionState::LossPending,
        xr::SessionState::EXITING => RuntimeSessionState::Exiting,
        _ => return None,
    })
}

fn pose(pose: &xr::Posef) -> Pose {
    let q = pose.orientation;
    let orientation = Unit::try_new(Quaternion::new(q.w, q.x, q.y, q.z), f32::EPSILON)
        .unwrap_or_else(UnitQuaternion::identity);
    let p = pose.position;
    Pose::new(Vector3::new(p.x, p.y, p.z), orientation)
}

fn posef(pose: &Pose) -> xr::Posef {
    let q = pose.orientation.coords;
    let p = pose.position;
    xr::Posef {
        orientation: xr::Quaternionf {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        },
        position: xr::Vector3f {
            x: p.x,
            y: p.y,
            z: p.z,
        },
    }
}

fn fovf(fov: &FovTangents) -> xr::Fovf {
    let [angle_left, angle_right, angle_up, angle_down] = fov.angles();
    xr::Fovf {
        angle_left,
        angle_right,
        angle_up,
        angle_down,
    }
}

fn view(view: &xr::View) -> View {
    let fov = view.fov;
    View {
        pose: pose(&view.pose),
        fov: FovTangents::from_angles(
            fov.angle_left,
            fov.angle_right,
            fov.angle_up,
            fov.angle_down,
        ),
    }
}

/// Head-frame offset in the form `Runtime::eye_to_head` reports it
fn eye_to_head(head: &Pose, eye: &Pose) -> Vector3<f32> {
    head.orientation.inverse() * (head.position - eye.position)
}

fn rect(viewport: Viewport) -> xr::Rect2Di {
    xr::Rect2Di {
        offset: xr::Offset2Di {
            x: viewport.x,
            y: viewport.y,
        },
        extent: xr::Extent2Di {
            width: viewport.width,
            height: viewport.height,
        },
    }
}
