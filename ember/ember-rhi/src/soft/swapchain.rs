//! Synthetic swapchain: a ring of backbuffer textures in the `Present`
//! state. Presentation is recorded to the journal like any other command.

use std::any::Any;
use std::sync::Mutex;

use crate::info::SwapchainInfo;
use crate::resource::*;

use super::resource::{SoftFence, SoftTexture};
use super::{CommandRecord, Journal};

#[derive(Debug)]
pub struct SoftSwapchain {
    pub(super) id: ResourceId,
    pub(super) name: Mutex<String>,
    info: SwapchainInfo,
    images: Vec<TextureRef>,
    /// Index of the image currently being rendered.
    index: Mutex<u32>,
    journal: Journal,
}

impl SoftSwapchain {
    pub(super) fn new(
        id: ResourceId,
        info: SwapchainInfo,
        images: Vec<TextureRef>,
        journal: Journal,
    ) -> Self {
        let image_count = images.len() as u32;
        Self {
            id,
            name: Mutex::new(String::new()),
            info,
            images,
            // Starts on the last slot so the first acquire lands on image 0.
            index: Mutex::new(image_count.saturating_sub(1)),
            journal,
        }
    }
}

impl Resource for SoftSwapchain {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Swapchain
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> String {
        self.name.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_name(&self, name: &str) {
        *self.name.lock().unwrap_or_else(|e| e.into_inner()) = name.to_owned();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Swapchain for SoftSwapchain {
    fn info(&self) -> &SwapchainInfo {
        &self.info
    }

    fn current_frame_index(&self) -> u32 {
        *self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn texture(&self, index: u32) -> Option<TextureRef> {
        self.images.get(index as usize).cloned()
    }

    fn get_new_frame(
        &self,
        fence: Option<&FenceRef>,
        _signal_semaphore: Option<&SemaphoreRef>,
    ) -> Option<TextureRef> {
        if self.images.is_empty() {
            return None;
        }
        let current = {
            let mut index = self.index.lock().unwrap_or_else(|e| e.into_inner());
            *index = (*index + 1) % self.images.len() as u32;
            *index
        };
        // The image is available immediately on the software device.
        if let Some(fence) = fence {
            if let Some(fence) = fence.as_any().downcast_ref::<SoftFence>() {
                fence.signal();
            }
        }
        self.images.get(current as usize).cloned()
    }

    fn present(&self, _wait_semaphore: Option<&SemaphoreRef>) {
        let image_index = self.current_frame_index();
        // Presentation hands the image back; barrier inference relies on the
        // texture being left in the Present state by the graph.
        if let Some(image) = self.images.get(image_index as usize) {
            if let Some(texture) = image.as_any().downcast_ref::<SoftTexture>() {
                log::trace!("present image {} ({:?})", image_index, texture.current_state());
            }
        }
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CommandRecord::Present { image_index });
    }
}
