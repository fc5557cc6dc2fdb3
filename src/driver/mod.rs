//! External collaborator interfaces.
//!
//! Everything below the atomic-op boundary lives behind these traits: the
//! kernel ioctl plumbing, the transaction wire format, buffer-allocator
//! internals and color-management tables are supplied by the embedder.
//! Driver calls return [`io::Result`]; the device maps failures into
//! [`Error::Hardware`](crate::error::Error::Hardware) at the call site.

use std::io;

use drm_fourcc::DrmFourcc;

use crate::hw::HwTopology;
use crate::layer::{LayerBuffer, ScalerConfig, SyncFence};
use crate::utils::Rect;

/// Per-display registration handle issued by [`DisplayDriver::register_display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayToken {
    pub conn_id: u32,
    pub crtc_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayType {
    /// Built-in panel driven over DSI
    Peripheral,
    /// External display
    Tv,
    Virtual,
}

/// One raw display mode as enumerated by the connector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModeInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub h_front_porch: u32,
    pub h_back_porch: u32,
    pub h_pulse_width: u32,
    pub v_front_porch: u32,
    pub v_back_porch: u32,
    pub v_pulse_width: u32,
    pub clock_khz: u64,
    pub preferred: bool,
    pub topology: HwTopology,
}

/// Connector capabilities, queried once at device init.
#[derive(Debug, Clone, Default)]
pub struct ConnectorInfo {
    pub is_connected: bool,
    pub modes: Vec<ModeInfo>,
    pub mm_width: u32,
    pub mm_height: u32,
    pub panel_mode: crate::hw::PanelMode,
    pub partial_update: bool,
    pub roi_caps: crate::hw::RoiCaps,
    pub dynamic_fps: bool,
    pub min_fps: u32,
    pub max_fps: u32,
    pub is_primary: bool,
    pub is_pluggable: bool,
    pub orientation: crate::hw::PanelOrientation,
    pub hdr: crate::hw::HdrProperties,
    pub brightness_node: Option<std::path::PathBuf>,
    pub max_brightness: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    On,
    Doze,
    DozeSuspend,
    Off,
}

/// Blend equation names as the driver understands them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendType {
    Premultiplied,
    Opaque,
    Coverage,
}

/// Fetch translation context of a plane's framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureMode {
    NonSecure,
    Secure,
    /// Secure content addressed through the non-secure translation context
    SecureDirTranslation,
}

/// CRTC-wide security level. Ordering matters: the frame carries the
/// maximum over all pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SecurityLevel {
    #[default]
    SecureNonSecure,
    SecureOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiRectMode {
    None,
    Serial,
    Parallel,
}

/// Color-space conversion program selected for a YUV plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CscType {
    Yuv601Limited,
    Yuv601Full,
    Yuv709Limited,
    Yuv2020Limited,
    Yuv2020Full,
}

/// Integer rectangle as staged into the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrmRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl From<Rect> for DrmRect {
    fn from(rect: Rect) -> Self {
        DrmRect {
            left: rect.left as u32,
            top: rect.top as u32,
            right: rect.right as u32,
            bottom: rect.bottom as u32,
        }
    }
}

bitflags::bitflags! {
    /// Plane rotation property. The driver convention is counter-clockwise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RotationBits: u32 {
        const ROT_90 = 1 << 0;
        const FLIP_H = 1 << 1;
        const FLIP_V = 1 << 2;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SrcConfigFlags: u32 {
        const DEINTERLACE = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Behavior of [`AtomicTransaction::commit`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CommitFlags: u32 {
        /// Block until the driver has applied the state
        const SYNCHRONOUS = 1 << 0;
        /// Keep planes currently owned by this CRTC untouched
        const RETAIN_PLANES = 1 << 1;
    }
}

/// One solid-fill blend stage as staged on the CRTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolidFillConfig {
    pub z_order: u32,
    pub roi: DrmRect,
    /// Bits per component of the color words below; 0 means 8-bit
    pub color_bit_depth: u32,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
    pub plane_alpha: u8,
    pub is_exclusion_rect: bool,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DestScalerFlags: u32 {
        const ENABLE = 1 << 0;
        const SCALE_UPDATE = 1 << 1;
        const ENHANCER_UPDATE = 1 << 2;
        const PU_ENABLE = 1 << 3;
    }
}

/// Destination-scaler program for one layer mixer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DestScalerEntry {
    pub index: u32,
    pub flags: DestScalerFlags,
    pub lm_width: u32,
    pub lm_height: u32,
    /// Opaque scaler coefficients
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DestScalerConfig {
    pub entries: Vec<DestScalerEntry>,
}

/// Post-processing hardware block a feature payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpBlock {
    Dgm,
    Vig,
    Dspp,
}

/// Opaque post-processing feature payload built by the [`ColorManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpFeaturePayload {
    pub id: u32,
    pub payload: Vec<u8>,
}

/// One staged property assignment.
///
/// The pending transaction is an ordered multiset of these; the wire format
/// behind them is the driver's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicOp {
    PlaneSetAlpha { plane_id: u32, alpha: u8 },
    PlaneSetZOrder { plane_id: u32, z_order: u32 },
    PlaneSetBlendType { plane_id: u32, blend: BlendType },
    PlaneSetSrcRect { plane_id: u32, rect: DrmRect },
    PlaneSetDstRect { plane_id: u32, rect: DrmRect },
    PlaneSetExclRect { plane_id: u32, rect: DrmRect },
    PlaneSetRotation { plane_id: u32, rotation: RotationBits },
    PlaneSetHDecimation { plane_id: u32, factor: u32 },
    PlaneSetVDecimation { plane_id: u32, factor: u32 },
    PlaneSetFbSecureMode { plane_id: u32, mode: SecureMode },
    PlaneSetSrcConfig { plane_id: u32, flags: SrcConfigFlags },
    PlaneSetFbId { plane_id: u32, fb_id: u32 },
    PlaneSetCrtc { plane_id: u32, crtc_id: u32 },
    PlaneSetInputFence { plane_id: u32, fence: SyncFence },
    PlaneSetScalerConfig { plane_id: u32, config: ScalerConfig },
    PlaneSetCscConfig { plane_id: u32, csc: CscType },
    PlaneSetMultiRectMode { plane_id: u32, mode: MultiRectMode },
    PlaneSetRotationDstRect { plane_id: u32, rect: DrmRect },
    PlaneSetRotFbId { plane_id: u32, fb_id: u32 },
    PlaneSetPostProc { plane_id: u32, block: PpBlock, feature: PpFeaturePayload },
    CrtcSetMode { crtc_id: u32, mode: Option<ModeInfo> },
    CrtcSetActive { crtc_id: u32, active: bool },
    CrtcSetRoi { crtc_id: u32, rects: Vec<DrmRect> },
    CrtcSetCoreClk { crtc_id: u32, hz: u64 },
    CrtcSetCoreAb { crtc_id: u32, bps: u64 },
    CrtcSetCoreIb { crtc_id: u32, bps: u64 },
    CrtcSetLlccAb { crtc_id: u32, bps: u64 },
    CrtcSetLlccIb { crtc_id: u32, bps: u64 },
    CrtcSetDramAb { crtc_id: u32, bps: u64 },
    CrtcSetDramIb { crtc_id: u32, bps: u64 },
    CrtcSetRotPrefillBw { crtc_id: u32, bps: u64 },
    CrtcSetRotClk { crtc_id: u32, hz: u64 },
    CrtcSetSecurityLevel { crtc_id: u32, level: SecurityLevel },
    CrtcSetSolidfillStages { crtc_id: u32, stages: Vec<SolidFillConfig> },
    CrtcSetDestScalerConfig { crtc_id: u32, config: DestScalerConfig },
    CrtcGetReleaseFence { crtc_id: u32 },
    CrtcSetIdleTimeout { crtc_id: u32, timeout_ms: u32 },
    CrtcSetPostProc { crtc_id: u32, feature: PpFeaturePayload },
    ConnectorSetCrtc { conn_id: u32, crtc_id: u32 },
    ConnectorSetPowerMode { conn_id: u32, mode: PowerMode },
    ConnectorSetRoi { conn_id: u32, rects: Vec<DrmRect> },
    ConnectorGetRetireFence { conn_id: u32 },
    ConnectorSetAutorefresh { conn_id: u32, enable: bool },
}

/// Fences returned by a successful commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitFences {
    /// Signalled when the hardware stops reading the previous buffers
    pub release: Option<SyncFence>,
    /// Signalled when the committed frame leaves the display
    pub retire: Option<SyncFence>,
}

/// Framebuffer layout handed to [`DrmMaster::create_fb`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FbLayout {
    pub fd: i32,
    pub width: u32,
    pub height: u32,
    pub fourcc: DrmFourcc,
    pub modifier: u64,
    pub plane_count: u32,
    pub strides: [u32; 4],
    pub offsets: [u32; 4],
}

/// One display's pending atomic transaction.
///
/// The staged op list is cleared by the driver after every [`validate`] or
/// [`commit`], successful or not.
///
/// [`validate`]: AtomicTransaction::validate
/// [`commit`]: AtomicTransaction::commit
pub trait AtomicTransaction: Send {
    /// Stages one property assignment.
    fn perform(&mut self, op: AtomicOp);
    /// Dry-runs the staged state against the hardware.
    fn validate(&mut self) -> io::Result<()>;
    /// Submits the staged state.
    fn commit(&mut self, flags: CommitFlags) -> io::Result<CommitFences>;
}

/// Display manager: registration, connector queries, transaction creation.
pub trait DisplayDriver: Send + Sync {
    fn register_display(&self, display_type: DisplayType) -> io::Result<DisplayToken>;
    fn unregister_display(&self, token: DisplayToken);
    fn connector_info(&self, token: DisplayToken) -> io::Result<ConnectorInfo>;
    fn create_transaction(&self, token: DisplayToken) -> io::Result<Box<dyn AtomicTransaction>>;
}

/// Master handle owning framebuffer object lifetime.
pub trait DrmMaster: Send + Sync {
    fn create_fb(&self, layout: &FbLayout) -> io::Result<u32>;
    fn remove_fb(&self, fb_id: u32) -> io::Result<()>;
    /// `true` if the driver reference-counts removal, letting the registry
    /// collapse its deferred-release ring to a single generation.
    fn rmfb_ref_counted(&self) -> bool;
}

/// Computes stride/offset layouts for imported buffers.
pub trait BufferAllocator: Send + Sync {
    fn buffer_layout(&self, buffer: &LayerBuffer) -> io::Result<FbLayout>;
}

/// Builds opaque post-processing payloads; `None` means the block has no
/// update this frame.
pub trait ColorManager: Send + Sync {
    fn drm_feature(&self, block: PpBlock, feature_id: u32, disable: bool)
        -> Option<PpFeaturePayload>;
}
