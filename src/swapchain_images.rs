use crate::error::VrError;
use crate::frame_sync::FramePhase;
use crate::gpu::{Extent, ImageHandle};
use crate::runtime::SwapchainId;

/// Ring of runtime-owned images backing one swapchain
#[derive(Debug)]
pub struct SwapchainImageSet {
    pub id: SwapchainId,
    pub extent: Extent,
    images: Vec<ImageHandle>,
    /// Next index handed out by `next_round_robin`
    cursor: u32,
    /// Image currently on loan to the engine
    acquired: Option<u32>,
}

impl SwapchainImageSet {
    pub fn new(id: SwapchainId, extent: Extent, images: Vec<ImageHandle>) -> Self {
        Self {
            id,
            extent,
            images,
            cursor: 0,
            acquired: None,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Pick the next image in order, wrapping around. Used where the engine rather than the
    /// runtime chooses which image to write.
    pub fn next_round_robin(&mut self) -> Result<u32, VrError> {
        let index = self.cursor;
        self.mark_acquired(index)?;
        self.cursor = (self.cursor + 1) % self.images.len() as u32;
        Ok(index)
    }

    /// Record that `index` is on loan. Rejected while another image of this set is held.
    pub fn mark_acquired(&mut self, index: u32) -> Result<(), VrError> {
        if self.acquired.is_some() {
            return Err(VrError::Protocol {
                op: "acquire a second image from the same swapchain",
                phase: FramePhase::WaitingForFrame,
            });
        }
        if index as usize >= self.images.len() {
            return Err(VrError::ended(format!(
                "runtime returned image {} of a {}-image swapchain",
                index,
                self.images.len()
            )));
        }
        self.acquired = Some(index);
        Ok(())
    }

    /// Hand the held image back; returns its index
    pub fn release(&mut self) -> Option<u32> {
        self.acquired.take()
    }

    /// Index and handle of the image on loan, if any
    pub fn current(&self) -> Option<(u32, ImageHandle)> {
        self.acquired
            .map(|index| (index, self.images[index as usize]))
    }
}
