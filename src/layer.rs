//! Frame data model.
//!
//! A [`Frame`] is re-supplied by the caller every commit cycle. The
//! [`Resolver`](crate::resolver::Resolver) fills in one [`HwLayerConfig`] per
//! layer; the [`HwDevice`](crate::device::HwDevice) consumes them when
//! building the atomic transaction and writes the output fences back.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::utils::{Rect, Transform};

/// Pixel format of a [`LayerBuffer`].
///
/// The set is restricted to what the scanout hardware can fetch directly;
/// translation to a DRM fourcc plus modifier happens in
/// [`crate::formats::drm_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerFormat {
    Rgba8888,
    Rgba8888Ubwc,
    Bgra8888,
    Rgbx8888,
    Rgbx8888Ubwc,
    Bgrx8888,
    Rgb888,
    Rgb565,
    Bgr565Ubwc,
    Rgba1010102,
    Rgba1010102Ubwc,
    YCbCr420SemiPlanar,
    YCbCr420SpUbwc,
    YCrCb420SemiPlanar,
    YCbCr420P010,
    YCbCr420Tp10Ubwc,
    YCbCr422H2V1SemiPlanar,
    YCrCb420Planar,
}

impl LayerFormat {
    /// Universal bandwidth compression, a macro-tiled layout.
    pub fn is_ubwc(&self) -> bool {
        matches!(
            self,
            LayerFormat::Rgba8888Ubwc
                | LayerFormat::Rgbx8888Ubwc
                | LayerFormat::Bgr565Ubwc
                | LayerFormat::Rgba1010102Ubwc
                | LayerFormat::YCbCr420SpUbwc
                | LayerFormat::YCbCr420Tp10Ubwc
        )
    }

    /// Macro-tiled layouts forbid rotator-assisted downscale credit on
    /// hardware without decimation support.
    pub fn is_macro_tile(&self) -> bool {
        self.is_ubwc()
    }

    pub fn is_yuv(&self) -> bool {
        matches!(
            self,
            LayerFormat::YCbCr420SemiPlanar
                | LayerFormat::YCbCr420SpUbwc
                | LayerFormat::YCrCb420SemiPlanar
                | LayerFormat::YCbCr420P010
                | LayerFormat::YCbCr420Tp10Ubwc
                | LayerFormat::YCbCr422H2V1SemiPlanar
                | LayerFormat::YCrCb420Planar
        )
    }
}

bitflags::bitflags! {
    /// Properties of the memory backing a [`LayerBuffer`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BufferFlags: u32 {
        /// Protected content, fetched through the secure translation context
        const SECURE = 1 << 0;
        /// Secure camera stream
        const SECURE_CAMERA = 1 << 1;
        /// Secure display session, pipes bypass the non-secure blend stages
        const SECURE_DISPLAY = 1 << 2;
        /// Field-interlaced content
        const INTERLACE = 1 << 3;
    }
}

/// Opaque synchronization handle exchanged with the driver.
///
/// The caller waits on these before reusing buffers; this crate only moves
/// them around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncFence(pub i64);

/// Color metadata of a YUV buffer, used to pick the CSC matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorMetadata {
    pub primaries: ColorPrimaries,
    pub full_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorPrimaries {
    #[default]
    Bt601,
    Bt709,
    Bt2020,
}

/// An imported scanout buffer.
#[derive(Debug, Clone)]
pub struct LayerBuffer {
    /// Opaque buffer identity, keys the framebuffer registry
    pub fd: i32,
    /// Aligned width in pixels
    pub width: u32,
    /// Aligned height in pixels
    pub height: u32,
    pub format: LayerFormat,
    pub flags: BufferFlags,
    /// Signalled by the producer when the buffer is safe to read
    pub acquire_fence: Option<SyncFence>,
    /// Written back after commit, signalled when the hardware is done reading
    pub release_fence: Option<SyncFence>,
    pub color: ColorMetadata,
}

/// Blend equation applied at the mixer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blending {
    #[default]
    Premultiplied,
    Opaque,
    Coverage,
}

/// Constant-color override carried by a solid-fill layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolidFillInfo {
    /// Bits per color component; 0 means legacy 8-bit ARGB packing
    pub bit_depth: u32,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

/// One application-level compositing unit, valid for a single frame.
#[derive(Debug, Clone)]
pub struct Layer {
    pub buffer: LayerBuffer,
    /// Integral region of the buffer to fetch
    pub src_rect: Rect,
    /// Placement on the display
    pub dst_rect: Rect,
    pub transform: Transform,
    pub blending: Blending,
    /// 0..=255
    pub plane_alpha: u8,
    /// When set, the layer is a constant-color region and the buffer is only
    /// a placeholder
    pub solid_fill: Option<SolidFillInfo>,
}

bitflags::bitflags! {
    /// Flags on a pipe assignment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PipeFlags: u32 {
        /// Both rects of this layer land on the same hardware pipe
        const MULTI_RECT = 1 << 0;
        /// Multirect fetch runs both rects in the same cycle
        const MULTI_RECT_PARALLEL = 1 << 1;
    }
}

/// Sentinel for a pipe assignment the downstream allocator has not bound yet.
pub const PIPE_NEEDS_ASSIGNMENT: u32 = u32::MAX;

/// Opaque per-pipe scaler program, produced by an external scaler library.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScalerConfig {
    pub payload: Vec<u8>,
}

/// One hardware scaling/blending unit assignment.
#[derive(Debug, Clone, Default)]
pub struct HwPipeInfo {
    pub valid: bool,
    pub pipe_id: u32,
    pub src_roi: Rect,
    pub dst_roi: Rect,
    /// Region excluded from fetch, for overlap optimization
    pub excl_rect: Rect,
    pub z_order: u32,
    pub horizontal_decimation: u32,
    pub vertical_decimation: u32,
    pub flags: PipeFlags,
    pub scale_data: Option<ScalerConfig>,
    /// Tone-map feature ids to stage on this pipe's DGM block
    pub dgm_csc_features: Vec<u32>,
    /// Tone-map feature ids to stage on this pipe's VIG block
    pub vig_features: Vec<u32>,
}

impl HwPipeInfo {
    pub fn unassigned(src_roi: Rect, dst_roi: Rect, z_order: u32) -> Self {
        HwPipeInfo {
            valid: true,
            pipe_id: PIPE_NEEDS_ASSIGNMENT,
            src_roi,
            dst_roi,
            z_order,
            ..Default::default()
        }
    }
}

/// Rotator stage descriptor for one split half.
#[derive(Debug, Clone, Default)]
pub struct HwRotateInfo {
    pub valid: bool,
    pub pipe_id: u32,
    pub src_roi: Rect,
    pub dst_roi: Rect,
    pub downscale_x: f32,
    pub downscale_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotatorMode {
    #[default]
    None,
    /// Rotator writes to an intermediate buffer, pipes fetch the result
    Offline,
    /// Rotator sits inline in the fetch path
    Inline,
}

/// Rotator session for one layer.
///
/// Two descriptor slots exist for the two split halves, but only the left
/// slot is ever populated; the right slot is always reset. This is a
/// limitation of the current hardware generation, not an oversight.
#[derive(Debug, Clone, Default)]
pub struct HwRotatorSession {
    pub mode: RotatorMode,
    pub rotate_info: [HwRotateInfo; 2],
    /// Intermediate buffer the offline rotator writes into
    pub output_buffer: Option<LayerBuffer>,
}

/// Encoded solid-fill stage handed to the CRTC.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HwSolidFillStage {
    pub z_order: u32,
    pub roi: Rect,
    pub fill: SolidFillInfo,
    pub plane_alpha: u8,
    pub is_exclusion_rect: bool,
}

/// Per-layer aggregate the resolver produces and the commit stage consumes.
#[derive(Debug, Clone, Default)]
pub struct HwLayerConfig {
    pub left_pipe: HwPipeInfo,
    pub right_pipe: HwPipeInfo,
    pub use_right_pipe: bool,
    pub rotator: HwRotatorSession,
    pub use_solidfill_stage: bool,
    pub solidfill_stage: HwSolidFillStage,
}

impl HwLayerConfig {
    pub fn pipe_count(&self) -> u32 {
        self.left_pipe.valid as u32 + (self.use_right_pipe && self.right_pipe.valid) as u32
    }
}

/// Bandwidth and clock votes for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QosData {
    pub clock_hz: u64,
    pub core_ab_bps: u64,
    pub core_ib_bps: u64,
    pub llcc_ab_bps: u64,
    pub llcc_ib_bps: u64,
    pub dram_ab_bps: u64,
    pub dram_ib_bps: u64,
    pub rot_prefill_bw_bps: u64,
    pub rot_clock_hz: u64,
}

/// Destination-scaler program for one mixer, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DestScaleInfo {
    pub mixer_index: u32,
    pub payload: Vec<u8>,
}

/// One frame of composition work.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub layers: Vec<Layer>,
    /// One entry per layer, filled by the resolver
    pub configs: Vec<HwLayerConfig>,
    pub qos: QosData,
    /// Dirty regions on the left mixer, at most 4; empty means full frame
    pub left_frame_roi: SmallVec<[Rect; 4]>,
    /// Dirty regions on the right mixer under display split
    pub right_frame_roi: SmallVec<[Rect; 4]>,
    /// Destination-scaler programs keyed by mixer index
    pub dest_scale_info: HashMap<u32, DestScaleInfo>,
    /// Idle fallback timeout to program with this frame
    pub set_idle_time_ms: Option<u32>,
    /// Signalled when this frame leaves the display, written back by commit
    pub retire_fence: Option<SyncFence>,
}
