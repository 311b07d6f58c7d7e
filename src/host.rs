use crate::error::RuntimeError;
use crate::gpu::{BlitOptions, ColorFormat, Extent, Framebuffer, FramebufferId, ImageHandle};
use crate::gpu::{RenderTarget, TextureId, Viewport};
use crate::hardware_query::HostCapabilities;

/// Where the next clear or blit lands
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramebufferBinding {
    /// An engine-owned eye target
    Target(FramebufferId),
    /// A runtime swapchain image the host can render to natively
    SwapchainImage(ImageHandle),
    /// Host-side name of an interop intermediate texture
    Shared(TextureId),
    /// A framebuffer supplied by the host, usually the window
    Destination(Framebuffer),
}

/// The engine's renderer, as far as the backends need it. Never creates windows or contexts.
pub trait HostRenderer {
    fn capabilities(&self) -> HostCapabilities;

    /// Size of the flat output the host draws to; used for the pixel scale
    fn output_extent(&self) -> Extent;

    fn create_render_target(
        &mut self,
        extent: Extent,
        format: ColorFormat,
    ) -> Result<RenderTarget, RuntimeError>;
    fn destroy_render_target(&mut self, target: RenderTarget);

    fn bind(&mut self, binding: FramebufferBinding) -> Result<(), RuntimeError>;
    /// Clear the bound framebuffer
    fn clear(&mut self) -> Result<(), RuntimeError>;
    /// Draw `source` over `viewport` of the bound framebuffer
    fn blit(
        &mut self,
        source: TextureId,
        viewport: Viewport,
        options: &BlitOptions,
    ) -> Result<(), RuntimeError>;
}

/// Bind an eye target and clear it
pub fn clear_render_target(
    host: &mut dyn HostRenderer,
    target: &RenderTarget,
) -> Result<(), RuntimeError> {
    host.bind(FramebufferBinding::Target(target.framebuffer))?;
    host.clear()
}
