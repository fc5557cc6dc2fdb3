//! Geometry/resource resolver.
//!
//! Maps each layer of a frame onto one or two hardware pipe assignments,
//! honoring pipe-width, scale and decimation limits, and decides when a
//! rotator stage has to run ahead of the pipes. Pure computation over the
//! display context, no device state.
//!
//! Every rejection fails the whole frame with
//! [`Error::NotSupported`](crate::error::Error::NotSupported); the caller
//! falls back to another composition path, there is no partial success.

use tracing::{debug, trace};

use crate::error::Error;
use crate::hw::{DisplayResourceContext, HwResourceInfo};
use crate::layer::{
    Frame, HwLayerConfig, HwPipeInfo, HwRotateInfo, HwRotatorSession, HwSolidFillStage,
    RotatorMode, PIPE_NEEDS_ASSIGNMENT,
};
use crate::utils::{Rect, Transform};

/// Extra downscale headroom granted when the rotator can pre-scale.
const MAX_ROTATOR_DOWNSCALE_RATIO: u32 = 4;

/// Accumulated rotator pre-downscale per axis, a power of two by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatorDownscale {
    pub x: f32,
    pub y: f32,
}

impl RotatorDownscale {
    const NONE: RotatorDownscale = RotatorDownscale { x: 1.0, y: 1.0 };

    fn needed(&self) -> bool {
        self.x > 1.0 || self.y > 1.0
    }
}

/// Result of bisecting a layer across two pipes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRects {
    pub left_src: Rect,
    pub left_dst: Rect,
    pub right_src: Rect,
    pub right_dst: Rect,
}

/// The geometry engine. Cheap to construct, holds only the capability
/// snapshot.
#[derive(Debug, Clone)]
pub struct Resolver {
    caps: HwResourceInfo,
}

impl Resolver {
    pub fn new(caps: HwResourceInfo) -> Self {
        Resolver { caps }
    }

    /// Resolves pipe assignments for every layer of `frame`, filling
    /// `frame.configs` in layer order. Returns the number of layers that
    /// need a rotator stage.
    pub fn config(&self, ctx: &DisplayResourceContext, frame: &mut Frame) -> Result<u32, Error> {
        let scissor = ctx.mixer_scissor();
        let mut rotate_count = 0u32;

        frame.configs.clear();
        frame.configs.resize(frame.layers.len(), HwLayerConfig::default());

        for (index, layer) in frame.layers.iter().enumerate() {
            let config = &mut frame.configs[index];
            let z_order = index as u32;

            if let Some(fill) = layer.solid_fill {
                if self.caps.num_solidfill_stages > 0 {
                    config.use_solidfill_stage = true;
                    config.solidfill_stage = HwSolidFillStage {
                        z_order,
                        roi: layer.dst_rect,
                        fill,
                        plane_alpha: layer.plane_alpha,
                        is_exclusion_rect: false,
                    };
                    continue;
                }
            }

            if !validate_dimensions(&layer.src_rect, &layer.dst_rect) {
                debug!(
                    layer = index,
                    src = ?layer.src_rect,
                    dst = ?layer.dst_rect,
                    "rejecting malformed layer rectangles"
                );
                return Err(Error::NotSupported);
            }

            let mut transform = layer.transform;
            let (mut src, dst) =
                crop_to_scissor(&scissor, &transform, layer.src_rect, layer.dst_rect);
            trace!(layer = index, crop = ?src, dst = ?dst, "cropped to display scissor");

            let downscale = self.validate_scaling(&src, &dst, transform.rotated90())?;

            if transform.rotated90() || downscale.needed() {
                config.rotator = rotation_config(&src, downscale);
                // the rotator output feeds the pipes as already rotated
                src = config.rotator.rotate_info[0].dst_roi;
                transform = Transform::IDENTITY;
                rotate_count += 1;
            }

            if self.caps.is_src_split {
                self.src_split_config(config, src, dst, transform.flip_horizontal)?;
            } else {
                self.display_split_config(ctx, config, &transform, src, dst)?;
            }

            for pipe in [&mut config.left_pipe, &mut config.right_pipe] {
                if !pipe.valid {
                    continue;
                }
                pipe.z_order = z_order;
                self.set_decimation_factor(pipe);
                trace!(layer = index, pipe = ?pipe, "pipe assignment");
            }
        }

        Ok(rotate_count)
    }

    /// Rejects scale ratios the pipes cannot reach and computes the rotator
    /// pre-downscale needed to bring the residual within the native range.
    fn validate_scaling(
        &self,
        crop: &Rect,
        dst: &Rect,
        rotated90: bool,
    ) -> Result<RotatorDownscale, Error> {
        let dst_width = dst.width();
        let dst_height = dst.height();
        if dst_width < 1.0 || dst_height < 1.0 {
            debug!(?dst, "destination collapsed below one pixel");
            return Err(Error::NotSupported);
        }

        let mut crop_width = crop.width();
        let mut crop_height = crop.height();
        if crop_width < 1.0 || crop_height < 1.0 {
            debug!(?crop, "source crop collapsed below one pixel");
            return Err(Error::NotSupported);
        }
        // rotation exchanges the width/height roles ahead of scaling
        if rotated90 {
            std::mem::swap(&mut crop_width, &mut crop_height);
        }

        let scale_x = crop_width / dst_width;
        let scale_y = crop_height / dst_height;
        self.validate_scale_factor(scale_x)?;
        self.validate_scale_factor(scale_y)?;

        if !self.caps.has_rotator_downscale {
            return Ok(RotatorDownscale::NONE);
        }
        Ok(RotatorDownscale {
            x: rotator_downscale(scale_x, self.caps.max_scale_down),
            y: rotator_downscale(scale_y, self.caps.max_scale_down),
        })
    }

    fn validate_scale_factor(&self, scale: f32) -> Result<(), Error> {
        if scale > 1.0 {
            // pre-scaling credit needs the rotator downscaler to take the
            // first bite and decimation to absorb the residual at the pipe
            let limit = if self.caps.has_rotator_downscale && self.caps.has_decimation {
                self.caps.max_scale_down * MAX_ROTATOR_DOWNSCALE_RATIO
            } else {
                self.caps.max_scale_down
            };
            if scale > limit as f32 {
                debug!(scale, limit, "downscale beyond hardware reach");
                return Err(Error::NotSupported);
            }
        } else if scale < 1.0 && (1.0 / scale) > self.caps.max_scale_up as f32 {
            debug!(scale, max_scale_up = self.caps.max_scale_up, "upscale beyond hardware reach");
            return Err(Error::NotSupported);
        }
        Ok(())
    }

    /// Pipe assignment on hardware whose pipes can fetch split halves of one
    /// source independently.
    fn src_split_config(
        &self,
        config: &mut HwLayerConfig,
        src: Rect,
        dst: Rect,
        flip_horizontal: bool,
    ) -> Result<(), Error> {
        let needs_split = src.width() >= self.caps.max_pipe_width as f32
            || dst.width() >= self.caps.max_interface_width as f32
            || self.caps.always_src_split;

        if needs_split {
            let split = split_rect(flip_horizontal, src, dst);
            config.left_pipe = HwPipeInfo::unassigned(split.left_src, split.left_dst, 0);
            config.right_pipe = HwPipeInfo::unassigned(split.right_src, split.right_dst, 0);
            config.use_right_pipe = true;
        } else {
            config.left_pipe = HwPipeInfo::unassigned(src, dst, 0);
            config.right_pipe = HwPipeInfo::default();
            config.use_right_pipe = false;
        }
        Ok(())
    }

    /// Pipe assignment on dual-mixer hardware without source split: the layer
    /// is cropped independently against each mixer half.
    fn display_split_config(
        &self,
        ctx: &DisplayResourceContext,
        config: &mut HwLayerConfig,
        transform: &Transform,
        src: Rect,
        dst: Rect,
    ) -> Result<(), Error> {
        let mixer = &ctx.mixer_attributes;
        let left_scissor = Rect::new(0.0, 0.0, mixer.split_left as f32, mixer.height as f32);
        let right_scissor = Rect::new(
            mixer.split_left as f32,
            0.0,
            mixer.width as f32,
            mixer.height as f32,
        );

        let (left_crop, left_dst) = crop_to_scissor(&left_scissor, transform, src, dst);
        let (right_crop, right_dst) = crop_to_scissor(&right_scissor, transform, src, dst);
        let left_valid = left_dst.has_width() && left_crop.has_width();
        let right_valid = right_dst.has_width() && right_crop.has_width();

        let max_pipe_width = self.caps.max_pipe_width as f32;
        if left_valid && left_crop.width() >= max_pipe_width {
            // both pipes are needed on the left, nothing may remain on the
            // right
            if right_valid {
                debug!(?left_crop, ?right_crop, "left half oversized with content on the right");
                return Err(Error::NotSupported);
            }
            let split = split_rect(transform.flip_horizontal, left_crop, left_dst);
            config.left_pipe = HwPipeInfo::unassigned(split.left_src, split.left_dst, 0);
            config.right_pipe = HwPipeInfo::unassigned(split.right_src, split.right_dst, 0);
            config.use_right_pipe = true;
            return Ok(());
        }
        if right_valid && right_crop.width() >= max_pipe_width {
            if left_valid {
                debug!(?left_crop, ?right_crop, "right half oversized with content on the left");
                return Err(Error::NotSupported);
            }
            let split = split_rect(transform.flip_horizontal, right_crop, right_dst);
            config.left_pipe = HwPipeInfo::unassigned(split.left_src, split.left_dst, 0);
            config.right_pipe = HwPipeInfo::unassigned(split.right_src, split.right_dst, 0);
            config.use_right_pipe = true;
            return Ok(());
        }

        match (left_valid, right_valid) {
            (true, true) => {
                config.left_pipe = HwPipeInfo::unassigned(left_crop, left_dst, 0);
                config.right_pipe = HwPipeInfo::unassigned(right_crop, right_dst, 0);
                config.use_right_pipe = true;
            }
            (true, false) => {
                config.left_pipe = HwPipeInfo::unassigned(left_crop, left_dst, 0);
                config.right_pipe = HwPipeInfo::default();
                config.use_right_pipe = false;
            }
            // the left pipe slot is always consumed first
            (false, true) => {
                config.left_pipe = HwPipeInfo::unassigned(right_crop, right_dst, 0);
                config.right_pipe = HwPipeInfo::default();
                config.use_right_pipe = false;
            }
            (false, false) => {
                debug!("layer fully clipped by both mixer halves");
                return Err(Error::NotSupported);
            }
        }
        Ok(())
    }

    /// Programs fetch decimation so the residual downscale fits the native
    /// scaler range.
    fn set_decimation_factor(&self, pipe: &mut HwPipeInfo) {
        pipe.horizontal_decimation =
            decimation_factor(&self.caps, pipe.src_roi.width(), pipe.dst_roi.width());
        pipe.vertical_decimation =
            decimation_factor(&self.caps, pipe.src_roi.height(), pipe.dst_roi.height());
    }
}

/// `true` if both rectangles are ordered and the source is on whole pixels.
pub fn validate_dimensions(src: &Rect, dst: &Rect) -> bool {
    src.is_integral() && src.is_ordered() && dst.is_ordered()
}

/// Clips `dst` to `scissor` and applies the equivalent fractional crop to
/// `crop`, relabeling the four cut fractions under flips and 90° rotation.
pub fn crop_to_scissor(
    scissor: &Rect,
    transform: &Transform,
    crop: Rect,
    dst: Rect,
) -> (Rect, Rect) {
    let width = dst.width();
    let height = dst.height();
    let mut left_cut = 0.0f32;
    let mut top_cut = 0.0f32;
    let mut right_cut = 0.0f32;
    let mut bottom_cut = 0.0f32;
    let mut clipped = dst;

    if dst.left < scissor.left {
        left_cut = (scissor.left - dst.left) / width;
        clipped.left = scissor.left;
    }
    if dst.top < scissor.top {
        top_cut = (scissor.top - dst.top) / height;
        clipped.top = scissor.top;
    }
    if dst.right > scissor.right {
        right_cut = (dst.right - scissor.right) / width;
        clipped.right = scissor.right;
    }
    if dst.bottom > scissor.bottom {
        bottom_cut = (dst.bottom - scissor.bottom) / height;
        clipped.bottom = scissor.bottom;
    }
    if left_cut == 0.0 && top_cut == 0.0 && right_cut == 0.0 && bottom_cut == 0.0 {
        return (crop, dst);
    }

    // a flip exchanges which source side the destination cut lands on
    if transform.flip_horizontal {
        std::mem::swap(&mut left_cut, &mut right_cut);
    }
    if transform.flip_vertical {
        std::mem::swap(&mut top_cut, &mut bottom_cut);
    }
    // a clockwise source rotation relabels the cuts anti-clockwise
    if transform.rotated90() {
        let (l, t, r, b) = (left_cut, top_cut, right_cut, bottom_cut);
        left_cut = t;
        top_cut = r;
        right_cut = b;
        bottom_cut = l;
    }

    let crop_width = crop.width();
    let crop_height = crop.height();
    let cropped = Rect {
        left: crop.left + crop_width * left_cut,
        top: crop.top + crop_height * top_cut,
        right: crop.right - crop_width * right_cut,
        bottom: crop.bottom - crop_height * bottom_cut,
    };
    (cropped, clipped)
}

/// Stages a single offline rotator pass for `src`.
///
/// The output rectangle swaps width and height (and divides by the
/// pre-downscale) because the pipes fetch the already-rotated result. Only
/// the left descriptor slot is populated; the right slot stays reset, one
/// rotator per layer is a limitation of the current hardware generation.
pub fn rotation_config(src: &Rect, downscale: RotatorDownscale) -> HwRotatorSession {
    let out_width = (src.height() / downscale.x).floor();
    let out_height = (src.width() / downscale.y).floor();
    HwRotatorSession {
        mode: RotatorMode::Offline,
        rotate_info: [
            HwRotateInfo {
                valid: true,
                pipe_id: PIPE_NEEDS_ASSIGNMENT,
                src_roi: *src,
                dst_roi: Rect::from_size(out_width, out_height),
                downscale_x: downscale.x,
                downscale_y: downscale.y,
            },
            HwRotateInfo::default(),
        ],
        output_buffer: None,
    }
}

/// Bisects source and destination at their width midpoints.
///
/// The halves are cut in unflipped coordinate space; under a horizontal flip
/// the destination pairing crosses, since flipping exchanges left and right
/// after the fact.
pub fn split_rect(flip_horizontal: bool, src: Rect, dst: Rect) -> SplitRects {
    let src_mid = (src.left + src.width() / 2.0).floor();
    let dst_mid = (dst.left + dst.width() / 2.0).floor();

    let src_left_half = Rect { right: src_mid, ..src };
    let src_right_half = Rect { left: src_mid, ..src };
    let dst_left_half = Rect { right: dst_mid, ..dst };
    let dst_right_half = Rect { left: dst_mid, ..dst };

    if flip_horizontal {
        SplitRects {
            left_src: src_left_half,
            left_dst: dst_right_half,
            right_src: src_right_half,
            right_dst: dst_left_half,
        }
    } else {
        SplitRects {
            left_src: src_left_half,
            left_dst: dst_left_half,
            right_src: src_right_half,
            right_dst: dst_right_half,
        }
    }
}

fn rotator_downscale(mut scale: f32, max_scale_down: u32) -> f32 {
    let mut downscale = 1.0f32;
    while scale > max_scale_down as f32 {
        scale /= 2.0;
        downscale *= 2.0;
    }
    downscale
}

fn decimation_factor(caps: &HwResourceInfo, src_dim: f32, dst_dim: f32) -> u32 {
    if !caps.has_decimation || dst_dim <= 0.0 {
        return 1;
    }
    let down = src_dim / dst_dim;
    let max = caps.max_scale_down as f32;
    if down <= max {
        return 1;
    }
    // round up to the next power of two so the residual fits the scaler
    let exp = (down.log2() - max.log2()).ceil() as u32;
    1 << exp
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layer::{Blending, BufferFlags, ColorMetadata, Layer, LayerBuffer, LayerFormat};

    fn buffer(width: u32, height: u32, format: LayerFormat) -> LayerBuffer {
        LayerBuffer {
            fd: 7,
            width,
            height,
            format,
            flags: BufferFlags::empty(),
            acquire_fence: None,
            release_fence: None,
            color: ColorMetadata::default(),
        }
    }

    fn layer(src: Rect, dst: Rect) -> Layer {
        Layer {
            buffer: buffer(src.right as u32, src.bottom as u32, LayerFormat::Rgba8888),
            src_rect: src,
            dst_rect: dst,
            transform: Transform::IDENTITY,
            blending: Blending::Premultiplied,
            plane_alpha: 255,
            solid_fill: None,
        }
    }

    fn context(width: u32, height: u32) -> DisplayResourceContext {
        let mut ctx = DisplayResourceContext::default();
        ctx.mixer_attributes.width = width;
        ctx.mixer_attributes.height = height;
        ctx.mixer_attributes.split_left = width / 2;
        ctx
    }

    #[test]
    fn dimension_validation() {
        let good_src = Rect::new(0.0, 0.0, 100.0, 50.0);
        let good_dst = Rect::new(0.0, 0.0, 200.0, 100.0);
        assert!(validate_dimensions(&good_src, &good_dst));
        assert!(!validate_dimensions(&Rect::new(0.5, 0.0, 100.0, 50.0), &good_dst));
        assert!(!validate_dimensions(&Rect::new(10.0, 0.0, 5.0, 50.0), &good_dst));
        assert!(!validate_dimensions(&good_src, &Rect::new(0.0, 80.0, 200.0, 50.0)));
    }

    #[test]
    fn crop_is_a_no_op_without_clipping() {
        let scissor = Rect::from_size(1920.0, 1080.0);
        let crop = Rect::new(0.0, 0.0, 400.0, 300.0);
        let dst = Rect::new(100.0, 100.0, 500.0, 400.0);
        let (new_crop, new_dst) = crop_to_scissor(&scissor, &Transform::IDENTITY, crop, dst);
        assert_eq!(new_crop, crop);
        assert_eq!(new_dst, dst);
    }

    #[test]
    fn crop_shrinks_proportionally() {
        let scissor = Rect::from_size(1920.0, 1080.0);
        let crop = Rect::new(0.0, 0.0, 400.0, 300.0);
        // hangs 200 of 400 pixels past the right edge
        let dst = Rect::new(1720.0, 0.0, 2120.0, 300.0);
        let (new_crop, new_dst) = crop_to_scissor(&scissor, &Transform::IDENTITY, crop, dst);
        assert_eq!(new_dst, Rect::new(1720.0, 0.0, 1920.0, 300.0));
        assert_eq!(new_crop, Rect::new(0.0, 0.0, 200.0, 300.0));
        assert!(new_crop.area() <= crop.area());
    }

    #[test]
    fn crop_relabels_cuts_under_horizontal_flip() {
        let scissor = Rect::from_size(1920.0, 1080.0);
        let crop = Rect::new(0.0, 0.0, 400.0, 300.0);
        let dst = Rect::new(1720.0, 0.0, 2120.0, 300.0);
        let flipped = Transform {
            flip_horizontal: true,
            ..Transform::IDENTITY
        };
        // the clipped right edge maps to the source's left side
        let (new_crop, _) = crop_to_scissor(&scissor, &flipped, crop, dst);
        assert_eq!(new_crop, Rect::new(200.0, 0.0, 400.0, 300.0));
    }

    #[test]
    fn crop_relabels_cuts_under_rotation() {
        let scissor = Rect::from_size(1920.0, 1080.0);
        let crop = Rect::new(0.0, 0.0, 300.0, 400.0);
        let dst = Rect::new(1720.0, 0.0, 2120.0, 300.0);
        let rotated = Transform {
            rotation: crate::utils::Rotation::Rot90,
            ..Transform::IDENTITY
        };
        // right cut (half the dst width) relabels anti-clockwise to the top
        let (new_crop, _) = crop_to_scissor(&scissor, &rotated, crop, dst);
        assert_eq!(new_crop, Rect::new(0.0, 200.0, 300.0, 400.0));
    }

    #[test]
    fn split_without_flip_tiles_in_order() {
        let src = Rect::new(0.0, 0.0, 100.0, 50.0);
        let dst = Rect::new(0.0, 0.0, 200.0, 100.0);
        let split = split_rect(false, src, dst);
        assert_eq!(split.left_src, Rect::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(split.left_dst, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(split.right_src, Rect::new(50.0, 0.0, 100.0, 50.0));
        assert_eq!(split.right_dst, Rect::new(100.0, 0.0, 200.0, 100.0));
        // the halves reconstruct the destination with no gap or overlap
        assert_eq!(split.left_dst.right, split.right_dst.left);
    }

    #[test]
    fn split_with_flip_crosses_destinations() {
        let src = Rect::new(0.0, 0.0, 100.0, 50.0);
        let dst = Rect::new(0.0, 0.0, 200.0, 100.0);
        let split = split_rect(true, src, dst);
        assert_eq!(split.left_src, Rect::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(split.left_dst, Rect::new(100.0, 0.0, 200.0, 100.0));
        assert_eq!(split.right_src, Rect::new(50.0, 0.0, 100.0, 50.0));
        assert_eq!(split.right_dst, Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn sub_pixel_destinations_are_rejected() {
        let resolver = Resolver::new(HwResourceInfo::default());
        let src = Rect::from_size(100.0, 100.0);
        let err = resolver
            .validate_scaling(&src, &Rect::from_size(100.0, 0.5), false)
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported));

        let dst = Rect::from_size(100.0, 100.0);
        let err = resolver
            .validate_scaling(&Rect::from_size(100.0, 0.0), &dst, false)
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported));
    }

    #[test]
    fn excessive_scaling_is_rejected() {
        let caps = HwResourceInfo {
            max_scale_down: 4,
            max_scale_up: 8,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);

        // 32x downscale exceeds 4 * rotator credit (4)
        assert!(matches!(
            resolver.validate_scaling(
                &Rect::from_size(3200.0, 3200.0),
                &Rect::from_size(100.0, 100.0),
                false
            ),
            Err(Error::NotSupported)
        ));

        // 10x upscale exceeds the limit of 8
        assert!(matches!(
            resolver.validate_scaling(
                &Rect::from_size(100.0, 100.0),
                &Rect::from_size(1000.0, 1000.0),
                false
            ),
            Err(Error::NotSupported)
        ));
    }

    #[test]
    fn downscale_credit_requires_rotator_and_decimation() {
        // 8x downscale against a native limit of 4
        let src = Rect::from_size(800.0, 800.0);
        let dst = Rect::from_size(100.0, 100.0);

        // no decimation stage to absorb the residual
        let resolver = Resolver::new(HwResourceInfo {
            max_scale_down: 4,
            has_decimation: false,
            ..Default::default()
        });
        assert!(matches!(
            resolver.validate_scaling(&src, &dst, false),
            Err(Error::NotSupported)
        ));

        // no rotator downscaler to take the first bite
        let resolver = Resolver::new(HwResourceInfo {
            max_scale_down: 4,
            has_rotator_downscale: false,
            ..Default::default()
        });
        assert!(matches!(
            resolver.validate_scaling(&src, &dst, false),
            Err(Error::NotSupported)
        ));

        // both stages present: the rotator halves the ratio into range
        let resolver = Resolver::new(HwResourceInfo {
            max_scale_down: 4,
            ..Default::default()
        });
        let downscale = resolver.validate_scaling(&src, &dst, false).unwrap();
        assert_eq!(downscale.x, 2.0);
        assert_eq!(downscale.y, 2.0);
    }

    #[test]
    fn rotator_pre_downscale_is_a_power_of_two() {
        let resolver = Resolver::new(HwResourceInfo {
            max_scale_down: 4,
            ..Default::default()
        });
        // 10x vertical downscale needs two halvings: residual 2.5 <= 4
        let downscale = resolver
            .validate_scaling(
                &Rect::from_size(100.0, 1000.0),
                &Rect::from_size(100.0, 100.0),
                false,
            )
            .unwrap();
        assert_eq!(downscale.x, 1.0);
        assert_eq!(downscale.y, 4.0);
    }

    #[test]
    fn display_split_splits_a_half_exactly_at_the_pipe_limit() {
        let caps = HwResourceInfo {
            is_src_split: false,
            max_pipe_width: 1280,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);
        let ctx = context(2560, 1600);
        // entirely on the left half, exactly as wide as one pipe can fetch
        let mut frame = Frame {
            layers: vec![layer(Rect::from_size(1280.0, 1600.0), Rect::from_size(1280.0, 1600.0))],
            ..Default::default()
        };
        resolver.config(&ctx, &mut frame).unwrap();

        let config = &frame.configs[0];
        assert!(config.use_right_pipe);
        assert_eq!(config.left_pipe.dst_roi, Rect::new(0.0, 0.0, 640.0, 1600.0));
        assert_eq!(config.right_pipe.dst_roi, Rect::new(640.0, 0.0, 1280.0, 1600.0));
    }

    #[test]
    fn decimation_rounds_up_to_power_of_two() {
        let caps = HwResourceInfo {
            max_scale_down: 4,
            ..Default::default()
        };
        assert_eq!(decimation_factor(&caps, 800.0, 100.0), 2);
        assert_eq!(decimation_factor(&caps, 400.0, 100.0), 1);
        assert_eq!(decimation_factor(&caps, 2000.0, 100.0), 8);
    }

    #[test]
    fn four_k_layer_splits_into_two_tiling_pipes() {
        let caps = HwResourceInfo {
            max_pipe_width: 2560,
            max_interface_width: 2048,
            is_src_split: true,
            has_rotator_downscale: false,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);
        let ctx = context(3840, 2160);
        let mut frame = Frame {
            layers: vec![layer(Rect::from_size(3840.0, 2160.0), Rect::from_size(3840.0, 2160.0))],
            ..Default::default()
        };
        let rotates = resolver.config(&ctx, &mut frame).unwrap();
        assert_eq!(rotates, 0);

        let config = &frame.configs[0];
        assert!(config.use_right_pipe);
        assert_eq!(config.left_pipe.dst_roi, Rect::new(0.0, 0.0, 1920.0, 2160.0));
        assert_eq!(config.right_pipe.dst_roi, Rect::new(1920.0, 0.0, 3840.0, 2160.0));
        assert_eq!(config.left_pipe.dst_roi.right, config.right_pipe.dst_roi.left);
        assert_eq!(config.pipe_count(), 2);
    }

    #[test]
    fn rotated_layer_allocates_an_offline_rotator() {
        let resolver = Resolver::new(HwResourceInfo::default());
        let ctx = context(1920, 1080);
        let mut l = layer(Rect::from_size(400.0, 200.0), Rect::from_size(200.0, 400.0));
        l.transform.rotation = crate::utils::Rotation::Rot90;
        let mut frame = Frame {
            layers: vec![l],
            ..Default::default()
        };
        let rotates = resolver.config(&ctx, &mut frame).unwrap();
        assert_eq!(rotates, 1);

        let config = &frame.configs[0];
        assert_eq!(config.rotator.mode, RotatorMode::Offline);
        assert!(config.rotator.rotate_info[0].valid);
        // right rotator slot is always reset
        assert!(!config.rotator.rotate_info[1].valid);
        // output swaps width and height
        assert_eq!(
            config.rotator.rotate_info[0].dst_roi,
            Rect::from_size(200.0, 400.0)
        );
        // pipes fetch the rotated output with an identity transform
        assert_eq!(config.left_pipe.src_roi, Rect::from_size(200.0, 400.0));
    }

    #[test]
    fn display_split_assigns_one_pipe_per_half() {
        let caps = HwResourceInfo {
            is_src_split: false,
            max_pipe_width: 2048,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);
        let ctx = context(2560, 1600);
        let mut frame = Frame {
            layers: vec![layer(Rect::from_size(2560.0, 1600.0), Rect::from_size(2560.0, 1600.0))],
            ..Default::default()
        };
        resolver.config(&ctx, &mut frame).unwrap();

        let config = &frame.configs[0];
        assert!(config.use_right_pipe);
        assert_eq!(config.left_pipe.dst_roi, Rect::new(0.0, 0.0, 1280.0, 1600.0));
        assert_eq!(config.right_pipe.dst_roi, Rect::new(1280.0, 0.0, 2560.0, 1600.0));
        assert_eq!(config.left_pipe.src_roi, Rect::new(0.0, 0.0, 1280.0, 1600.0));
        assert_eq!(config.right_pipe.src_roi, Rect::new(1280.0, 0.0, 2560.0, 1600.0));
    }

    #[test]
    fn display_split_right_only_content_uses_the_left_slot() {
        let caps = HwResourceInfo {
            is_src_split: false,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);
        let ctx = context(2560, 1600);
        let mut frame = Frame {
            layers: vec![layer(
                Rect::from_size(400.0, 400.0),
                Rect::new(1600.0, 0.0, 2000.0, 400.0),
            )],
            ..Default::default()
        };
        resolver.config(&ctx, &mut frame).unwrap();

        let config = &frame.configs[0];
        assert!(!config.use_right_pipe);
        assert!(config.left_pipe.valid);
        assert_eq!(config.left_pipe.dst_roi, Rect::new(1600.0, 0.0, 2000.0, 400.0));
        assert_eq!(config.pipe_count(), 1);
    }

    #[test]
    fn display_split_rejects_oversized_half_with_remainder() {
        let caps = HwResourceInfo {
            is_src_split: false,
            max_pipe_width: 1024,
            max_scale_down: 4,
            has_rotator_downscale: false,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);
        // left half is 2048 wide, exceeding 1024, while the right half still
        // has content
        let ctx = context(4096, 1600);
        let mut frame = Frame {
            layers: vec![layer(Rect::from_size(4096.0, 1600.0), Rect::from_size(4096.0, 1600.0))],
            ..Default::default()
        };
        assert!(matches!(
            resolver.config(&ctx, &mut frame),
            Err(Error::NotSupported)
        ));
    }

    #[test]
    fn solid_fill_layers_bypass_pipe_assignment() {
        let caps = HwResourceInfo {
            num_solidfill_stages: 4,
            ..Default::default()
        };
        let resolver = Resolver::new(caps);
        let ctx = context(1920, 1080);
        let mut l = layer(Rect::from_size(100.0, 100.0), Rect::from_size(100.0, 100.0));
        l.solid_fill = Some(crate::layer::SolidFillInfo {
            bit_depth: 8,
            red: 0,
            green: 0,
            blue: 0,
            alpha: 255,
        });
        let mut frame = Frame {
            layers: vec![l],
            ..Default::default()
        };
        resolver.config(&ctx, &mut frame).unwrap();

        let config = &frame.configs[0];
        assert!(config.use_solidfill_stage);
        assert!(!config.left_pipe.valid);
        assert_eq!(config.solidfill_stage.roi, Rect::from_size(100.0, 100.0));
    }
}
