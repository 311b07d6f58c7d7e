use crate::eye::PerEye;
use crate::gpu::Extent;
use crate::hardware_query::{BlendMode, GraphicsApis, RuntimeCapabilities, ViewConfiguration};
use anyhow::{bail, format_err, Result};
use log::info;

/// What the installed OpenXR runtime reports about itself and its headset
#[derive(Debug, Clone)]
pub struct InstalledRuntime {
    pub capabilities: RuntimeCapabilities,
    /// Recommended per-eye image size of the stereo view configuration
    pub recommended: Option<PerEye<Extent>>,
    pub max_swapchain: Extent,
}

/// Load the OpenXR loader from the system's default location
pub fn load_openxr() -> Result<xr::Entry> {
    unsafe { xr::Entry::load() }
        .map_err(|e| format_err!("couldn't find the OpenXR loader: {:?}", e))
}

/// Graphics extensions the loader offers. D3D11 only exists on Windows.
pub(crate) fn available_graphics(available: &xr::ExtensionSet) -> GraphicsApis {
    GraphicsApis {
        opengl: available.khr_opengl_enable,
        #[cfg(windows)]
        d3d11: available.khr_d3d11_enable,
        #[cfg(not(windows))]
        d3d11: false,
    }
}

pub(crate) fn create_instance(
    entry: &xr::Entry,
    application_name: &str,
    extensions: &xr::ExtensionSet,
) -> Result<xr::Instance> {
    let instance = entry.create_instance(
        &xr::ApplicationInfo {
            application_name,
            application_version: 0,
            engine_name: crate::ENGINE_NAME,
            engine_version: 0,
        },
        extensions,
        &[],
    )?;
    let instance_props = instance.properties()?;
    info!(
        "Loaded OpenXR runtime: {} {}",
        instance_props.runtime_name, instance_props.runtime_version
    );
    Ok(instance)
}

pub(crate) fn view_configuration(ty: xr::ViewConfigurationType) -> ViewConfiguration {
    match ty {
        xr::ViewConfigurationType::PRIMARY_MONO => ViewConfiguration::PrimaryMono,
        xr::ViewConfigurationType::PRIMARY_STEREO => ViewConfiguration::PrimaryStereo,
        _ => ViewConfiguration::Other,
    }
}

pub(crate) fn blend_mode(mode: xr::EnvironmentBlendMode) -> Option<BlendMode> {
    match mode {
        xr::EnvironmentBlendMode::OPAQUE => Some(BlendMode::Opaque),
        xr::EnvironmentBlendMode::ADDITIVE => Some(BlendMode::Additive),
        xr::EnvironmentBlendMode::ALPHA_BLEND => Some(BlendMode::AlphaBlend),
        _ => None,
    }
}

fn image_rect(view: &xr::ViewConfigurationView) -> Extent {
    Extent::new(
        view.recommended_image_rect_width,
        view.recommended_image_rect_height,
    )
}

/// Read what `system` supports. `graphics` are the APIs enabled on `instance`.
pub(crate) fn describe_system(
    instance: &xr::Instance,
    system: xr::SystemId,
    graphics: GraphicsApis,
) -> Result<InstalledRuntime> {
    let instance_props = instance.properties()?;
    let system_props = instance.system_properties(system)?;
    info!("Headset: {}", system_props.system_name);

    let view_types = instance.enumerate_view_configurations(system)?;
    if view_types.is_empty() {
        bail!("runtime reports no view configurations");
    }
    let stereo = xr::ViewConfigurationType::PRIMARY_STEREO;
    let (blend_modes, recommended) = if view_types.contains(&stereo) {
        let views = instance.enumerate_view_configuration_views(system, stereo)?;
        let recommended = match views.as_slice() {
            [left, right, ..] => Some(PerEye::new(image_rect(left), image_rect(right))),
            _ => None,
        };
        (
            instance.enumerate_environment_blend_modes(system, stereo)?,
            recommended,
        )
    } else {
        (Vec::new(), None)
    };

    let limits = system_props.graphics_properties;
    Ok(InstalledRuntime {
        capabilities: RuntimeCapabilities {
            runtime_name: instance_props.runtime_name,
            system_name: system_props.system_name,
            graphics,
            view_configurations: view_types.into_iter().map(view_configuration).collect(),
            blend_modes: blend_modes.into_iter().filter_map(blend_mode).collect(),
        },
        recommended,
        max_swapchain: Extent::new(
            limits.max_swapchain_image_width,
            limits.max_swapchain_image_height,
        ),
    })
}

/// Create a throwaway instance against the installed runtime and read its capabilities.
/// OpenGL is enabled when offered, D3D11 otherwise.
pub fn query_installed_runtime(application_name: &str) -> Result<InstalledRuntime> {
    let entry = load_openxr()?;
    let graphics = available_graphics(&entry.enumerate_extensions()?);

    let mut enabled_extensions = xr::ExtensionSet::default();
    enabled_extensions.khr_opengl_enable = graphics.opengl;
    #[cfg(windows)]
    {
        enabled_extensions.khr_d3d11_enable = !graphics.opengl && graphics.d3d11;
    }
    let instance = create_instance(&entry, application_name, &enabled_extensions)?;
    let system = instance.system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)?;
    describe_system(&instance, system, graphics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_configurations_map_to_ours() {
        assert_eq!(
            view_configuration(xr::ViewConfigurationType::PRIMARY_STEREO),
            ViewConfiguration::PrimaryStereo
        );
        assert_eq!(
            view_configuration(xr::ViewConfigurationType::PRIMARY_MONO),
            ViewConfiguration::PrimaryMono
        );
        assert_eq!(
            blend_mode(xr::EnvironmentBlendMode::OPAQUE),
            Some(BlendMode::Opaque)
        );
    }

    #[test]
    fn graphics_follow_the_offered_extensions() {
        let mut offered = xr::ExtensionSet::default();
        assert_eq!(available_graphics(&offered), GraphicsApis::default());
        offered.khr_opengl_enable = true;
        assert!(available_graphics(&offered).opengl);
        #[cfg(not(windows))]
        assert!(!available_graphics(&offered).d3d11);
    }
}
