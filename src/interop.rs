//! GL to D3D11 texture sharing for runtimes that only accept D3D11 swapchains.
//!
//! The host renders each eye into a GL texture that aliases an intermediate D3D11 texture. At
//! present time the intermediate is unlocked and copied into the runtime's swapchain image by a
//! full-screen triangle that mirrors it vertically, since GL and D3D disagree on where the first
//! row of a texture is.
use crate::error::{RuntimeError, VrError};
use crate::frame_sync::FramePhase;
use crate::gpu::{Extent, ImageHandle, TextureId};
use log::{debug, warn};

/// Vertex and pixel shader for the flip pass. Compiled by the interop device when it opens.
pub const FLIP_SHADER_SOURCE: &str = r#"
Texture2D source : register(t0);
SamplerState linear_clamp : register(s0);

struct VsOut {
    float4 position : SV_Position;
    float2 uv : TEXCOORD0;
};

VsOut vs_main(uint id : SV_VertexID) {
    VsOut o;
    float2 uv = float2((id << 1) & 2, id & 2);
    o.position = float4(uv * float2(2.0, -2.0) + float2(-1.0, 1.0), 0.0, 1.0);
    o.uv = float2(uv.x, 1.0 - uv.y);
    return o;
}

float4 ps_main(VsOut i) : SV_Target {
    return source.Sample(linear_clamp, i.uv);
}
"#;

/// A D3D11 texture registered with the host's GL context
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SharedTexture {
    /// Name the host binds to render into it
    pub gl_texture: TextureId,
    /// Device-side registration handle
    pub handle: u64,
}

/// The GL/D3D11 interop device
pub trait InteropDevice {
    /// Create the D3D11 device and compile the flip shader
    fn open(&mut self, flip_shader: &str) -> Result<(), RuntimeError>;
    fn close(&mut self);
    /// Create an intermediate texture for `image` and register it with GL
    fn register(&mut self, image: ImageHandle, extent: Extent)
        -> Result<SharedTexture, RuntimeError>;
    fn unregister(&mut self, shared: SharedTexture);
    /// Hand the intermediate to GL
    fn lock(&mut self, shared: &SharedTexture) -> Result<(), RuntimeError>;
    /// Hand the intermediate back to D3D
    fn unlock(&mut self, shared: &SharedTexture) -> Result<(), RuntimeError>;
    /// Draw the intermediate into `target`, mirrored vertically
    fn flip_blit(
        &mut self,
        shared: &SharedTexture,
        target: ImageHandle,
        extent: Extent,
    ) -> Result<(), RuntimeError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SlotState {
    /// Owned by D3D, contents already consumed
    Idle,
    /// Owned by GL for the host to render into
    Locked,
    /// Unlocked and copied into the swapchain image
    Flipped,
}

#[derive(Debug)]
struct Slot {
    shared: SharedTexture,
    image: ImageHandle,
    state: SlotState,
}

/// Intermediates for every image of one swapchain
#[derive(Debug)]
pub struct InteropImages {
    extent: Extent,
    slots: Vec<Slot>,
}

impl InteropImages {
    /// Register an intermediate for each image. On failure everything registered so far is
    /// unregistered again.
    pub fn register_all(
        device: &mut dyn InteropDevice,
        images: &[ImageHandle],
        extent: Extent,
    ) -> Result<Self, RuntimeError> {
        let mut this = Self {
            extent,
            slots: Vec::with_capacity(images.len()),
        };
        for &image in images {
            match device.register(image, extent) {
                Ok(shared) => this.slots.push(Slot {
                    shared,
                    image,
                    state: SlotState::Idle,
                }),
                Err(e) => {
                    this.unregister_all(device);
                    return Err(e);
                }
            }
        }
        debug!("Registered {} interop images of {}", this.slots.len(), extent);
        Ok(this)
    }

    pub fn unregister_all(&mut self, device: &mut dyn InteropDevice) {
        for slot in self.slots.drain(..) {
            if slot.state == SlotState::Locked {
                if let Err(e) = device.unlock(&slot.shared) {
                    warn!("Unlocking shared image {:?} failed: {}", slot.shared, e);
                }
            }
            device.unregister(slot.shared);
        }
    }

    fn slot(&mut self, index: u32) -> Result<&mut Slot, RuntimeError> {
        let count = self.slots.len();
        self.slots.get_mut(index as usize).ok_or_else(|| {
            RuntimeError::Call(anyhow::format_err!(
                "no interop image {} of {}",
                index,
                count
            ))
        })
    }

    /// Lock the intermediate of an acquired swapchain image for host rendering
    pub fn lock(
        &mut self,
        device: &mut dyn InteropDevice,
        index: u32,
    ) -> Result<TextureId, RuntimeError> {
        let slot = self.slot(index)?;
        device.lock(&slot.shared)?;
        slot.state = SlotState::Locked;
        Ok(slot.shared.gl_texture)
    }

    /// Host-side texture of the intermediate for `index`
    pub fn gl_texture(&self, index: u32) -> Option<TextureId> {
        self.slots.get(index as usize).map(|s| s.shared.gl_texture)
    }

    /// Unlock and run the flip pass into the swapchain image
    pub fn flip(&mut self, device: &mut dyn InteropDevice, index: u32) -> Result<(), RuntimeError> {
        let extent = self.extent;
        let slot = self.slot(index)?;
        if slot.state == SlotState::Locked {
            device.unlock(&slot.shared)?;
        }
        device.flip_blit(&slot.shared, slot.image, extent)?;
        slot.state = SlotState::Flipped;
        Ok(())
    }

    /// Rejects submission of an image whose flip pass has not run
    pub fn check_flipped(&self, index: u32) -> Result<(), VrError> {
        match self.slots.get(index as usize) {
            Some(slot) if slot.state == SlotState::Flipped => Ok(()),
            _ => Err(VrError::Protocol {
                op: "submit an interop image without the flip pass",
                phase: FramePhase::Rendering,
            }),
        }
    }

    /// Mark a submitted image as consumed
    pub fn retire(&mut self, index: u32) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            slot.state = SlotState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInterop;

    fn images() -> Vec<ImageHandle> {
        vec![ImageHandle(1), ImageHandle(2), ImageHandle(3)]
    }

    fn register(device: &mut MockInterop) -> InteropImages {
        InteropImages::register_all(device, &images(), Extent::new(8, 8)).unwrap()
    }

    #[test]
    fn flip_is_required_before_submit() {
        let mut device = MockInterop::new();
        device.open(FLIP_SHADER_SOURCE).unwrap();
        let mut shared = register(&mut device);

        shared.lock(&mut device, 1).unwrap();
        assert!(shared.check_flipped(1).is_err());
        shared.flip(&mut device, 1).unwrap();
        shared.check_flipped(1).unwrap();
        assert_eq!(device.flips, vec![ImageHandle(2)]);
        assert!(!device.is_locked(1));

        shared.retire(1);
        assert!(shared.check_flipped(1).is_err());
    }

    #[test]
    fn failed_registration_unwinds() {
        let mut device = MockInterop::new();
        device.open(FLIP_SHADER_SOURCE).unwrap();
        device.fail_register_after = Some(2);
        assert!(InteropImages::register_all(&mut device, &images(), Extent::new(8, 8)).is_err());
        assert_eq!(device.registered_count(), 0);
    }

    #[test]
    fn unregister_unlocks_first() {
        let mut device = MockInterop::new();
        device.open(FLIP_SHADER_SOURCE).unwrap();
        let mut shared = register(&mut device);
        shared.lock(&mut device, 0).unwrap();
        shared.unregister_all(&mut device);
        assert_eq!(device.registered_count(), 0);
        assert!(!device.is_locked(0));
    }

    #[test]
    fn unregister_survives_a_failed_unlock() {
        let mut device = MockInterop::new();
        device.open(FLIP_SHADER_SOURCE).unwrap();
        let mut shared = register(&mut device);
        shared.lock(&mut device, 2).unwrap();
        let texture = shared.slots[2].shared;
        device.unlock(&texture).unwrap();
        shared.unregister_all(&mut device);
        assert_eq!(device.registered_count(), 0);
    }
}
