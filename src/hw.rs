//! Hardware capability and per-display attribute types.

use std::path::PathBuf;

use crate::utils::Rect;

/// Static capabilities of the display controller, queried once at startup
/// and shared by every display instance.
#[derive(Debug, Clone)]
pub struct HwResourceInfo {
    /// Widest region a single pipe can fetch
    pub max_pipe_width: u32,
    /// Widest region a single display interface can drive
    pub max_interface_width: u32,
    /// Native downscale limit of the pipe scaler
    pub max_scale_down: u32,
    pub max_scale_up: u32,
    /// Pipes can skip fetch lines/columns to extend the downscale range
    pub has_decimation: bool,
    /// The rotator can downscale while rotating
    pub has_rotator_downscale: bool,
    /// Pipes can fetch split halves of one source independently
    pub is_src_split: bool,
    /// Source split is mandatory for every layer, not only oversized ones
    pub always_src_split: bool,
    pub has_qseed3: bool,
    pub num_solidfill_stages: u32,
    /// Blend stage reserved for the secure-display dim layer, if any
    pub secure_disp_blend_stage: Option<u32>,
    pub dest_scaler_count: u32,
    pub dest_scaler_max_input_width: u32,
    pub dest_scaler_max_scale_up: u32,
}

impl Default for HwResourceInfo {
    fn default() -> Self {
        HwResourceInfo {
            max_pipe_width: 2560,
            max_interface_width: 2048,
            max_scale_down: 4,
            max_scale_up: 20,
            has_decimation: true,
            has_rotator_downscale: true,
            is_src_split: true,
            always_src_split: false,
            has_qseed3: false,
            num_solidfill_stages: 0,
            secure_disp_blend_stage: None,
            dest_scaler_count: 0,
            dest_scaler_max_input_width: 0,
            dest_scaler_max_scale_up: 0,
        }
    }
}

/// Mixer/interface arrangement behind one connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HwTopology {
    #[default]
    Unknown,
    SingleLm,
    SingleLmDsc,
    DualLm,
    DualLmDsc,
    DualLmMerge,
    DualLmMergeDsc,
    DualLmDscMerge,
    PpSplit,
}

impl HwTopology {
    /// Number of layer mixers the topology spans.
    pub fn mixer_count(&self) -> u32 {
        match self {
            HwTopology::Unknown | HwTopology::SingleLm | HwTopology::SingleLmDsc => 1,
            _ => 2,
        }
    }
}

/// One display mode with derived attributes, one entry per enumerated mode.
#[derive(Debug, Clone, Default)]
pub struct HwDisplayAttributes {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub vsync_period_ns: u32,
    pub is_device_split: bool,
    /// Pixel column where the left mixer ends under display split
    pub split_left: u32,
    pub h_front_porch: u32,
    pub h_back_porch: u32,
    pub h_pulse_width: u32,
    pub v_front_porch: u32,
    pub v_back_porch: u32,
    pub v_pulse_width: u32,
    pub x_dpi: f32,
    pub y_dpi: f32,
    pub clock_khz: u64,
    pub topology: HwTopology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelMode {
    #[default]
    Video,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelOrientation {
    #[default]
    Normal,
    FlipHorizontal,
    FlipVertical,
    Rotate180,
}

/// HDR static metadata advertised by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HdrProperties {
    pub supported: bool,
    pub peak_luminance: f32,
    pub average_luminance: f32,
    pub blackness_level: f32,
    pub primaries: [(f32, f32); 3],
    pub white_point: (f32, f32),
}

/// Alignment and size constraints on partial-update regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoiCaps {
    pub count: u32,
    pub x_align: u32,
    pub y_align: u32,
    pub min_width: u32,
    pub min_height: u32,
    /// ROIs must span both halves identically under display split
    pub needs_merge: bool,
}

/// Panel properties independent of the active mode.
#[derive(Debug, Clone, Default)]
pub struct HwPanelInfo {
    pub mode: PanelMode,
    pub partial_update: bool,
    pub roi_caps: RoiCaps,
    pub dynamic_fps: bool,
    pub min_fps: u32,
    pub max_fps: u32,
    pub is_primary: bool,
    pub is_pluggable: bool,
    pub orientation: PanelOrientation,
    pub hdr: HdrProperties,
    /// Sysfs node for backlight control, if the panel exposes one
    pub brightness_path: Option<PathBuf>,
    pub max_brightness: u32,
}

/// Geometry of the blending stage, derived once per mode change.
///
/// Differs from the display resolution when a destination scaler sits
/// between the mixers and the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixerAttributes {
    pub width: u32,
    pub height: u32,
    pub split_left: u32,
}

/// Per-display session state the resolver works against.
#[derive(Debug, Clone, Default)]
pub struct DisplayResourceContext {
    pub display_attributes: HwDisplayAttributes,
    pub mixer_attributes: MixerAttributes,
}

impl DisplayResourceContext {
    /// Scissor of the full blending surface.
    pub fn mixer_scissor(&self) -> Rect {
        Rect::from_size(
            self.mixer_attributes.width as f32,
            self.mixer_attributes.height as f32,
        )
    }
}
