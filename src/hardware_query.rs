use crate::error::VrError;
use log::{info, warn};

/// Graphics APIs a runtime can accept swapchain images from
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct GraphicsApis {
    pub opengl: bool,
    pub d3d11: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewConfiguration {
    PrimaryMono,
    PrimaryStereo,
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    Additive,
    AlphaBlend,
}

/// Everything the runtime reports about itself before a session exists
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeCapabilities {
    pub runtime_name: String,
    /// Product name of the head-mounted display
    pub system_name: String,
    pub graphics: GraphicsApis,
    pub view_configurations: Vec<ViewConfiguration>,
    pub blend_modes: Vec<BlendMode>,
}

/// What the host renderer can do
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct HostCapabilities {
    /// The GL driver can share textures with a D3D11 device (NV_DX_interop2)
    pub dx_interop: bool,
    /// Floating point render targets are available
    pub float_textures: bool,
}

/// How swapchain images get from the host renderer to the runtime
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GraphicsBinding {
    /// The runtime consumes GL textures directly
    OpenGl,
    /// The runtime consumes D3D11 textures; the host renders into shared intermediates
    D3d11Interop,
}

/// Extra requirements a backend puts on top of the common ones
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Requirements {
    pub float_textures: bool,
}

/// Outcome of capability negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub supported: bool,
    pub binding: Option<GraphicsBinding>,
    /// Why the runtime was rejected
    pub reason: Option<String>,
}

impl Probe {
    fn accept(binding: GraphicsBinding) -> Self {
        Self {
            supported: true,
            binding: Some(binding),
            reason: None,
        }
    }

    fn reject(reason: &str) -> Self {
        Self {
            supported: false,
            binding: None,
            reason: Some(reason.to_string()),
        }
    }

    /// The chosen binding, or `VrError::Unavailable` with the rejection reason
    pub fn into_result(self) -> Result<GraphicsBinding, VrError> {
        match (self.supported, self.binding) {
            (true, Some(binding)) => Ok(binding),
            _ => Err(VrError::Unavailable(
                self.reason
                    .unwrap_or_else(|| "no usable graphics binding".to_string()),
            )),
        }
    }
}

/// Decide whether the runtime can drive opaque stereo rendering with this host, and how
pub fn probe(
    runtime: &RuntimeCapabilities,
    host: &HostCapabilities,
    requirements: Requirements,
) -> Probe {
    info!(
        "Negotiating with runtime {} ({})",
        runtime.runtime_name, runtime.system_name
    );

    let graphics = runtime.graphics;
    let result = if !graphics.opengl && !graphics.d3d11 {
        Probe::reject("runtime has support for neither OpenGL nor D3D11")
    } else if !graphics.opengl && !host.dx_interop {
        Probe::reject("OpenGL driver does not support NV_DX_interop2")
    } else if !runtime
        .view_configurations
        .contains(&ViewConfiguration::PrimaryStereo)
    {
        Probe::reject("system does not support VR")
    } else if !runtime.blend_modes.contains(&BlendMode::Opaque) {
        Probe::reject("system does not support opaque rendering")
    } else if requirements.float_textures && !host.float_textures {
        Probe::reject("renderer does not support floating point render targets")
    } else if graphics.opengl {
        Probe::accept(GraphicsBinding::OpenGl)
    } else {
        Probe::accept(GraphicsBinding::D3d11Interop)
    };

    match (&result.binding, &result.reason) {
        (Some(binding), _) => info!("Using graphics binding {:?}", binding),
        (None, Some(reason)) => warn!("VR unavailable: {}", reason),
        _ => {}
    }
    result
}
