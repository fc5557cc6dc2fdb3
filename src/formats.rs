//! Translation from [`LayerFormat`] to the fourcc + modifier pair the driver
//! expects in a framebuffer layout.
//!
//! DRM fourcc codes name components in little-endian byte order, so the
//! RGBA-style names here map to their reversed fourcc counterparts.

use drm_fourcc::DrmFourcc;

use crate::layer::LayerFormat;

const fn fourcc_mod_code(vendor: u64, code: u64) -> u64 {
    (vendor << 56) | (code & 0x00ff_ffff_ffff_ffff)
}

const VENDOR_QCOM: u64 = 0x05;

/// Universal bandwidth compression
pub const MOD_QCOM_COMPRESSED: u64 = fourcc_mod_code(VENDOR_QCOM, 1);
/// 10-bit depth extension
pub const MOD_QCOM_DX: u64 = fourcc_mod_code(VENDOR_QCOM, 0x2);
/// Tightly packed 10-bit samples
pub const MOD_QCOM_TIGHT: u64 = fourcc_mod_code(VENDOR_QCOM, 0x4);

/// Returns the fourcc and layout modifier describing `format` on the wire.
pub fn drm_format(format: LayerFormat) -> (DrmFourcc, u64) {
    match format {
        LayerFormat::Rgba8888 => (DrmFourcc::Abgr8888, 0),
        LayerFormat::Rgba8888Ubwc => (DrmFourcc::Abgr8888, MOD_QCOM_COMPRESSED),
        LayerFormat::Bgra8888 => (DrmFourcc::Argb8888, 0),
        LayerFormat::Rgbx8888 => (DrmFourcc::Xbgr8888, 0),
        LayerFormat::Rgbx8888Ubwc => (DrmFourcc::Xbgr8888, MOD_QCOM_COMPRESSED),
        LayerFormat::Bgrx8888 => (DrmFourcc::Xrgb8888, 0),
        LayerFormat::Rgb888 => (DrmFourcc::Bgr888, 0),
        LayerFormat::Rgb565 => (DrmFourcc::Bgr565, 0),
        LayerFormat::Bgr565Ubwc => (DrmFourcc::Bgr565, MOD_QCOM_COMPRESSED),
        LayerFormat::Rgba1010102 => (DrmFourcc::Abgr2101010, 0),
        LayerFormat::Rgba1010102Ubwc => (DrmFourcc::Abgr2101010, MOD_QCOM_COMPRESSED),
        LayerFormat::YCbCr420SemiPlanar => (DrmFourcc::Nv12, 0),
        LayerFormat::YCbCr420SpUbwc => (DrmFourcc::Nv12, MOD_QCOM_COMPRESSED),
        LayerFormat::YCrCb420SemiPlanar => (DrmFourcc::Nv21, 0),
        LayerFormat::YCbCr420P010 => (DrmFourcc::Nv12, MOD_QCOM_DX),
        LayerFormat::YCbCr420Tp10Ubwc => (
            DrmFourcc::Nv12,
            MOD_QCOM_COMPRESSED | MOD_QCOM_DX | MOD_QCOM_TIGHT,
        ),
        LayerFormat::YCbCr422H2V1SemiPlanar => (DrmFourcc::Nv16, 0),
        LayerFormat::YCrCb420Planar => (DrmFourcc::Yvu420, 0),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vendor_bits_survive_combination() {
        let combined = MOD_QCOM_COMPRESSED | MOD_QCOM_DX | MOD_QCOM_TIGHT;
        assert_eq!(combined >> 56, VENDOR_QCOM);
        assert_eq!(combined & 0xff, 0x7);
    }

    #[test]
    fn ubwc_formats_carry_the_compressed_modifier() {
        let (fourcc, modifier) = drm_format(LayerFormat::Rgba8888Ubwc);
        assert_eq!(fourcc, DrmFourcc::Abgr8888);
        assert_eq!(modifier, MOD_QCOM_COMPRESSED);

        let (fourcc, modifier) = drm_format(LayerFormat::Rgba8888);
        assert_eq!(fourcc, DrmFourcc::Abgr8888);
        assert_eq!(modifier, 0);
    }
}
