use crate::error::RuntimeError;
use crate::fov::{EyeProjection, FovTangents};
use crate::gpu::{ColorFormat, Extent, RenderTarget};
use crate::host::{clear_render_target, HostRenderer};
use log::debug;
use nalgebra::Vector3;

/// Everything the host needs to render one eye
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct EyeRenderTarget {
    /// Engine-owned color/depth target; `None` while disabled
    pub target: Option<RenderTarget>,
    pub fov: FovTangents,
    pub projection: EyeProjection,
    /// Eye position relative to the head, in the host's convention
    pub view_offset: Vector3<f32>,
}

impl EyeRenderTarget {
    pub fn extent(&self) -> Option<Extent> {
        self.target.map(|t| t.extent)
    }

    pub fn set_fov(&mut self, fov: FovTangents) {
        self.fov = fov;
        self.projection = fov.projection();
    }

    /// Make sure the target is `extent` big. Nothing happens if it already is; otherwise the
    /// old target is destroyed and the new one cleared once. Returns whether it reallocated.
    pub(crate) fn resize(
        &mut self,
        host: &mut dyn HostRenderer,
        extent: Extent,
        format: ColorFormat,
    ) -> Result<bool, RuntimeError> {
        if self.extent() == Some(extent) {
            return Ok(false);
        }
        self.release(host);
        let target = host.create_render_target(extent, format)?;
        self.target = Some(target);
        clear_render_target(host, &target)?;
        Ok(true)
    }

    pub(crate) fn release(&mut self, host: &mut dyn HostRenderer) {
        if let Some(target) = self.target.take() {
            debug!("Destroying eye target of {}", target.extent);
            host.destroy_render_target(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware_query::HostCapabilities;
    use crate::mock::MockHost;

    #[test]
    fn resize_to_same_size_keeps_the_target() {
        let mut host = MockHost::new(HostCapabilities::default());
        let mut eye = EyeRenderTarget::default();
        assert!(eye.resize(&mut host, Extent::new(100, 80), ColorFormat::Rgba8).unwrap());
        let first = eye.target;
        assert!(!eye.resize(&mut host, Extent::new(100, 80), ColorFormat::Rgba8).unwrap());
        assert_eq!(eye.target, first);
        assert_eq!(host.created_targets(), 1);
        assert_eq!(host.clears.len(), 1);

        assert!(eye.resize(&mut host, Extent::new(120, 80), ColorFormat::Rgba8).unwrap());
        assert_eq!(host.created_targets(), 2);
        assert_eq!(host.live_targets(), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let mut host = MockHost::new(HostCapabilities::default());
        let mut eye = EyeRenderTarget::default();
        eye.resize(&mut host, Extent::new(10, 10), ColorFormat::Rgba8).unwrap();
        eye.release(&mut host);
        eye.release(&mut host);
        assert_eq!(host.live_targets(), 0);
        assert_eq!(eye.extent(), None);
    }
}
