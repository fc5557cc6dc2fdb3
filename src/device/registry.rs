//! Framebuffer handle registry.
//!
//! Creating a driver framebuffer object per frame is expensive and the
//! driver may keep referencing a handle for a few frames after the commit
//! that replaced it. The registry amortizes creation across frames and
//! defers removal behind a ring of generations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::driver::{BufferAllocator, DrmMaster};
use crate::formats::drm_format;
use crate::layer::{Frame, LayerBuffer, RotatorMode};

/// Generations to keep a handle alive after it is logically dropped, when
/// the driver does not reference-count removal.
const UNREFERENCED_RMFB_DELAY: usize = 3;

pub(crate) struct FbRegistry {
    master: Arc<dyn DrmMaster>,
    allocator: Arc<dyn BufferAllocator>,
    /// One buffer-fd to fb-handle map per generation
    ring: Vec<HashMap<i32, u32>>,
    current: usize,
}

impl FbRegistry {
    pub fn new(master: Arc<dyn DrmMaster>, allocator: Arc<dyn BufferAllocator>) -> Self {
        let delay = if master.rmfb_ref_counted() {
            1
        } else {
            UNREFERENCED_RMFB_DELAY
        };
        FbRegistry {
            master,
            allocator,
            ring: vec![HashMap::new(); delay],
            current: 0,
        }
    }

    /// Ensures a framebuffer handle exists in the current generation for
    /// every buffer the frame scans out.
    ///
    /// For offline rotation the pipes fetch the rotator's output buffer
    /// instead of the layer's own; inline rotation fetches both.
    pub fn register(&mut self, frame: &Frame) {
        for (layer, config) in frame.layers.iter().zip(frame.configs.iter()) {
            match config.rotator.mode {
                RotatorMode::Offline => {
                    if let Some(output) = config.rotator.output_buffer.as_ref() {
                        self.map_buffer(output);
                    } else {
                        self.map_buffer(&layer.buffer);
                    }
                }
                RotatorMode::Inline => {
                    self.map_buffer(&layer.buffer);
                    if let Some(output) = config.rotator.output_buffer.as_ref() {
                        self.map_buffer(output);
                    }
                }
                RotatorMode::None => self.map_buffer(&layer.buffer),
            }
        }
    }

    /// Creation failure degrades this one buffer to unmapped; the plane
    /// wiring that depends on the handle is skipped at commit, the frame
    /// itself proceeds.
    fn map_buffer(&mut self, buffer: &LayerBuffer) {
        if self.ring[self.current].contains_key(&buffer.fd) {
            return;
        }
        let layout = match self.allocator.buffer_layout(buffer) {
            Ok(layout) => layout,
            Err(err) => {
                warn!(fd = buffer.fd, "failed to compute buffer layout: {}", err);
                return;
            }
        };
        debug_assert_eq!((layout.fourcc, layout.modifier), drm_format(buffer.format));
        match self.master.create_fb(&layout) {
            Ok(fb_id) => {
                trace!(fd = buffer.fd, fb_id, "created framebuffer handle");
                self.ring[self.current].insert(buffer.fd, fb_id);
            }
            Err(err) => {
                warn!(fd = buffer.fd, "failed to create framebuffer handle: {}", err);
            }
        }
    }

    /// Handle lookup in the current generation only.
    pub fn fb_id(&self, fd: i32) -> Option<u32> {
        self.ring[self.current].get(&fd).copied()
    }

    /// Advances to the next generation.
    pub fn next(&mut self) {
        self.current = (self.current + 1) % self.ring.len();
    }

    /// Releases every handle of the current generation with the driver.
    pub fn unregister(&mut self) {
        for (fd, fb_id) in self.ring[self.current].drain() {
            trace!(fd, fb_id, "removing framebuffer handle");
            if let Err(err) = self.master.remove_fb(fb_id) {
                warn!(fb_id, "failed to remove framebuffer handle: {}", err);
            }
        }
    }

    /// Drains all generations and resets to generation zero. Teardown only.
    pub fn clear(&mut self) {
        for _ in 0..self.ring.len() {
            self.unregister();
            self.next();
        }
        self.current = 0;
    }
}
