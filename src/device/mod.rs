//! Per-display commit state machine.
//!
//! One [`HwDevice`] owns one display's atomic-transaction lifecycle:
//! validate-only dry runs, real commits with fence bookkeeping, power-state
//! transitions via synchronous null commits, and mode/refresh-rate changes.
//! Drive it from a single thread; independent displays may run in parallel
//! threads sharing the driver and master handles.

use std::io;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, instrument, warn};

use crate::driver::{
    AtomicOp, AtomicTransaction, BlendType, BufferAllocator, ColorManager, CommitFlags,
    ConnectorInfo, CscType, DestScalerConfig, DestScalerEntry, DestScalerFlags, DisplayDriver,
    DisplayToken, DisplayType, DrmMaster, DrmRect, ModeInfo, MultiRectMode, PowerMode, PpBlock,
    RotationBits, SecureMode, SecurityLevel, SolidFillConfig, SrcConfigFlags,
};
use crate::error::Error;
use crate::hw::{
    DisplayResourceContext, HwDisplayAttributes, HwPanelInfo, HwResourceInfo, MixerAttributes,
    PanelMode,
};
use crate::layer::{
    Blending, BufferFlags, ColorMetadata, ColorPrimaries, Frame, HwSolidFillStage, PipeFlags,
    RotatorMode, SyncFence, PIPE_NEEDS_ASSIGNMENT,
};
use crate::utils::Transform;

use self::registry::FbRegistry;

pub(crate) mod registry;

/// Display-type-specific behavior selected at construction.
///
/// Peripheral displays route their mixer output through destination
/// scalers; everything else shares the generic commit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceVariant {
    Generic,
    Peripheral,
}

/// The commit state machine for one display.
pub struct HwDevice {
    driver: Arc<dyn DisplayDriver>,
    color_mgr: Option<Arc<dyn ColorManager>>,
    token: DisplayToken,
    txn: Option<Box<dyn AtomicTransaction>>,
    connector_info: ConnectorInfo,
    display_attributes: Vec<HwDisplayAttributes>,
    current_mode_index: usize,
    /// Mode index a deferred refresh-rate switch will land on
    pending_mode_index: Option<usize>,
    /// The next commit must carry a CRTC mode change
    update_mode: bool,
    panel_info: HwPanelInfo,
    mixer_attributes: MixerAttributes,
    resolution_switch_enabled: bool,
    registry: FbRegistry,
    /// No commit has happened yet; the first one performs the initial
    /// pipeline setup and power-on
    first_cycle: bool,
    power_mode: PowerMode,
    autorefresh: bool,
    secure_display_active: bool,
    variant: DeviceVariant,
    caps: HwResourceInfo,
    span: tracing::Span,
}

impl HwDevice {
    /// Registers a display with the driver and queries its capabilities.
    ///
    /// Fails hard if the connector exposes no display modes.
    pub fn new(
        driver: Arc<dyn DisplayDriver>,
        master: Arc<dyn DrmMaster>,
        allocator: Arc<dyn BufferAllocator>,
        color_mgr: Option<Arc<dyn ColorManager>>,
        display_type: DisplayType,
        caps: HwResourceInfo,
    ) -> Result<Self, Error> {
        let token = driver
            .register_display(display_type)
            .map_err(|source| Error::Resources {
                errmsg: "failed to register the display",
                source,
            })?;
        let span = info_span!("hw_device", conn = token.conn_id, crtc = token.crtc_id);

        let init = (|| {
            let txn = driver
                .create_transaction(token)
                .map_err(|source| Error::Resources {
                    errmsg: "failed to create an atomic transaction",
                    source,
                })?;
            let connector_info =
                driver
                    .connector_info(token)
                    .map_err(|source| Error::Hardware {
                        errmsg: "failed to query connector info",
                        source,
                    })?;
            if connector_info.modes.is_empty() {
                return Err(Error::Hardware {
                    errmsg: "connector reported no display modes",
                    source: io::Error::from(io::ErrorKind::InvalidData),
                });
            }
            Ok((txn, connector_info))
        })();
        let (txn, connector_info) = match init {
            Ok(parts) => parts,
            Err(err) => {
                driver.unregister_display(token);
                return Err(err);
            }
        };

        let current_mode_index = connector_info
            .modes
            .iter()
            .position(|mode| mode.preferred)
            .unwrap_or(0);
        let display_attributes: Vec<_> = connector_info
            .modes
            .iter()
            .map(display_attributes_for_mode)
            .collect();
        let mixer_attributes = derive_mixer_attributes(&display_attributes[current_mode_index]);
        let panel_info = panel_info_from(&connector_info);
        let resolution_switch_enabled = connector_info.modes.len() > 1;
        let variant = match display_type {
            DisplayType::Peripheral => DeviceVariant::Peripheral,
            _ => DeviceVariant::Generic,
        };

        info!(
            parent: &span,
            modes = connector_info.modes.len(),
            mode = current_mode_index,
            "initialized display"
        );

        Ok(HwDevice {
            driver,
            color_mgr,
            token,
            txn: Some(txn),
            connector_info,
            display_attributes,
            current_mode_index,
            pending_mode_index: None,
            update_mode: false,
            panel_info,
            mixer_attributes,
            resolution_switch_enabled,
            registry: FbRegistry::new(master, allocator),
            first_cycle: true,
            power_mode: PowerMode::Off,
            autorefresh: false,
            secure_display_active: false,
            variant,
            caps,
            span,
        })
    }

    /// Dry-runs the resolved frame against the hardware.
    ///
    /// Buffer registration is symmetric: handles created for the dry run are
    /// released again regardless of the outcome.
    #[instrument(level = "trace", parent = &self.span, skip_all)]
    #[profiling::function]
    pub fn validate(&mut self, frame: &Frame) -> Result<(), Error> {
        self.registry.register(frame);
        let ops = self.build_frame_ops(frame, true);
        let result = match self.txn.as_mut() {
            Some(txn) => {
                for op in ops {
                    txn.perform(op);
                }
                txn.validate().map_err(|source| Error::Hardware {
                    errmsg: "atomic validation failed",
                    source,
                })
            }
            None => Err(Error::Undefined("validate without a transaction handle")),
        };
        self.registry.unregister();
        if result.is_err() {
            self.pending_mode_index = None;
        }
        result
    }

    /// Submits the resolved frame and distributes the returned fences.
    ///
    /// The release fence lands on every layer's input buffer (or on the
    /// rotator's output buffer when offline rotation was used), the retire
    /// fence on the frame.
    #[instrument(level = "trace", parent = &self.span, skip_all)]
    #[profiling::function]
    pub fn commit(&mut self, frame: &mut Frame) -> Result<(), Error> {
        self.registry.register(frame);
        let ops = self.build_frame_ops(frame, false);
        let result = {
            let txn = self
                .txn
                .as_mut()
                .ok_or(Error::Undefined("commit without a transaction handle"))?;
            for op in ops {
                txn.perform(op);
            }
            txn.commit(CommitFlags::empty())
        };
        // the previous generation goes out of scanout with this commit
        // whether it succeeded or not, rotate the registry either way
        self.registry.next();
        self.registry.unregister();
        let fences = match result {
            Ok(fences) => fences,
            Err(source) => {
                self.pending_mode_index = None;
                return Err(Error::Hardware {
                    errmsg: "atomic commit failed",
                    source,
                });
            }
        };

        for (layer, config) in frame.layers.iter_mut().zip(frame.configs.iter_mut()) {
            if config.rotator.mode == RotatorMode::Offline {
                if let Some(output) = config.rotator.output_buffer.as_mut() {
                    output.release_fence = fences.release;
                    continue;
                }
            }
            layer.buffer.release_fence = fences.release;
        }
        frame.retire_fence = fences.retire;

        if let Some(index) = self.pending_mode_index.take() {
            self.current_mode_index = index;
        }
        self.update_mode = false;
        self.first_cycle = false;
        self.power_mode = PowerMode::On;
        Ok(())
    }

    /// Translates the frame's pipe configs and qos data into staged ops.
    fn build_frame_ops(&self, frame: &Frame, validate: bool) -> Vec<AtomicOp> {
        let crtc_id = self.token.crtc_id;
        let conn_id = self.token.conn_id;
        let mut ops = Vec::new();
        let mut security = SecurityLevel::SecureNonSecure;
        let mut solid_fills = Vec::new();

        if self.first_cycle {
            // initial pipeline setup rides on the first real commit
            ops.push(AtomicOp::ConnectorSetCrtc { conn_id, crtc_id });
            ops.push(AtomicOp::ConnectorSetPowerMode {
                conn_id,
                mode: PowerMode::On,
            });
        }
        if self.first_cycle || self.update_mode || self.pending_mode_index.is_some() {
            let mode_index = self.pending_mode_index.unwrap_or(self.current_mode_index);
            ops.push(AtomicOp::CrtcSetMode {
                crtc_id,
                mode: Some(self.connector_info.modes[mode_index].clone()),
            });
            ops.push(AtomicOp::CrtcSetActive {
                crtc_id,
                active: true,
            });
        }

        for (layer, config) in frame.layers.iter().zip(frame.configs.iter()) {
            if config.use_solidfill_stage {
                solid_fills.push(solid_fill_config(&config.solidfill_stage));
                continue;
            }

            let (secure_mode, level) = secure_config(layer.buffer.flags);
            security = security.max(level);

            let offline = config.rotator.mode == RotatorMode::Offline;
            let scanout = if offline {
                config.rotator.output_buffer.as_ref().unwrap_or(&layer.buffer)
            } else {
                &layer.buffer
            };
            let Some(fb_id) = self.registry.fb_id(scanout.fd) else {
                // the registry already logged the failure; drop this plane
                debug!(fd = scanout.fd, "skipping plane wiring for unmapped buffer");
                continue;
            };

            let right_pipe = config.use_right_pipe.then_some(&config.right_pipe);
            for pipe in [Some(&config.left_pipe), right_pipe].into_iter().flatten() {
                if !pipe.valid {
                    continue;
                }
                let plane_id = pipe.pipe_id;
                if plane_id == PIPE_NEEDS_ASSIGNMENT {
                    warn!("pipe left unassigned by the allocator, dropping plane");
                    continue;
                }

                ops.push(AtomicOp::PlaneSetFbId { plane_id, fb_id });
                ops.push(AtomicOp::PlaneSetCrtc { plane_id, crtc_id });
                ops.push(AtomicOp::PlaneSetSrcRect {
                    plane_id,
                    rect: DrmRect::from(pipe.src_roi),
                });
                ops.push(AtomicOp::PlaneSetDstRect {
                    plane_id,
                    rect: DrmRect::from(pipe.dst_roi),
                });
                if pipe.excl_rect.area() > 0.0 {
                    ops.push(AtomicOp::PlaneSetExclRect {
                        plane_id,
                        rect: DrmRect::from(pipe.excl_rect),
                    });
                }
                ops.push(AtomicOp::PlaneSetZOrder {
                    plane_id,
                    z_order: pipe.z_order,
                });
                ops.push(AtomicOp::PlaneSetAlpha {
                    plane_id,
                    alpha: layer.plane_alpha,
                });
                ops.push(AtomicOp::PlaneSetBlendType {
                    plane_id,
                    blend: blend_type(layer.blending),
                });
                ops.push(AtomicOp::PlaneSetRotation {
                    plane_id,
                    rotation: rotation_bits(&layer.transform, config.rotator.mode),
                });
                ops.push(AtomicOp::PlaneSetHDecimation {
                    plane_id,
                    factor: pipe.horizontal_decimation,
                });
                ops.push(AtomicOp::PlaneSetVDecimation {
                    plane_id,
                    factor: pipe.vertical_decimation,
                });
                ops.push(AtomicOp::PlaneSetFbSecureMode {
                    plane_id,
                    mode: secure_mode,
                });
                // the offline rotator already weaves the fields together
                if layer.buffer.flags.contains(BufferFlags::INTERLACE) && !offline {
                    ops.push(AtomicOp::PlaneSetSrcConfig {
                        plane_id,
                        flags: SrcConfigFlags::DEINTERLACE,
                    });
                }
                if pipe.flags.contains(PipeFlags::MULTI_RECT) {
                    let mode = if pipe.flags.contains(PipeFlags::MULTI_RECT_PARALLEL) {
                        MultiRectMode::Parallel
                    } else {
                        MultiRectMode::Serial
                    };
                    ops.push(AtomicOp::PlaneSetMultiRectMode { plane_id, mode });
                }
                if let Some(scale_data) = pipe.scale_data.clone() {
                    ops.push(AtomicOp::PlaneSetScalerConfig {
                        plane_id,
                        config: scale_data,
                    });
                }
                if layer.buffer.format.is_yuv() {
                    ops.push(AtomicOp::PlaneSetCscConfig {
                        plane_id,
                        csc: csc_for(layer.buffer.color),
                    });
                }
                if config.rotator.mode == RotatorMode::Inline {
                    let rotate = &config.rotator.rotate_info[0];
                    if rotate.valid {
                        ops.push(AtomicOp::PlaneSetRotationDstRect {
                            plane_id,
                            rect: DrmRect::from(rotate.dst_roi),
                        });
                    }
                    if let Some(output) = config.rotator.output_buffer.as_ref() {
                        if let Some(rot_fb) = self.registry.fb_id(output.fd) {
                            ops.push(AtomicOp::PlaneSetRotFbId {
                                plane_id,
                                fb_id: rot_fb,
                            });
                        }
                    }
                }
                if !validate {
                    if let Some(fence) = layer.buffer.acquire_fence {
                        ops.push(AtomicOp::PlaneSetInputFence { plane_id, fence });
                    }
                }
                if let Some(color_mgr) = self.color_mgr.as_ref() {
                    for &feature_id in &pipe.dgm_csc_features {
                        if let Some(feature) = color_mgr.drm_feature(PpBlock::Dgm, feature_id, false)
                        {
                            ops.push(AtomicOp::PlaneSetPostProc {
                                plane_id,
                                block: PpBlock::Dgm,
                                feature,
                            });
                        }
                    }
                    for &feature_id in &pipe.vig_features {
                        if let Some(feature) = color_mgr.drm_feature(PpBlock::Vig, feature_id, false)
                        {
                            ops.push(AtomicOp::PlaneSetPostProc {
                                plane_id,
                                block: PpBlock::Vig,
                                feature,
                            });
                        }
                    }
                }
            }
        }

        let qos = &frame.qos;
        ops.push(AtomicOp::CrtcSetCoreClk {
            crtc_id,
            hz: qos.clock_hz,
        });
        ops.push(AtomicOp::CrtcSetCoreAb {
            crtc_id,
            bps: qos.core_ab_bps,
        });
        ops.push(AtomicOp::CrtcSetCoreIb {
            crtc_id,
            bps: qos.core_ib_bps,
        });
        ops.push(AtomicOp::CrtcSetLlccAb {
            crtc_id,
            bps: qos.llcc_ab_bps,
        });
        ops.push(AtomicOp::CrtcSetLlccIb {
            crtc_id,
            bps: qos.llcc_ib_bps,
        });
        ops.push(AtomicOp::CrtcSetDramAb {
            crtc_id,
            bps: qos.dram_ab_bps,
        });
        ops.push(AtomicOp::CrtcSetDramIb {
            crtc_id,
            bps: qos.dram_ib_bps,
        });
        ops.push(AtomicOp::CrtcSetRotPrefillBw {
            crtc_id,
            bps: qos.rot_prefill_bw_bps,
        });
        ops.push(AtomicOp::CrtcSetRotClk {
            crtc_id,
            hz: qos.rot_clock_hz,
        });

        if self.panel_info.partial_update {
            let (crtc_rects, conn_rects) = self.roi_rects(frame);
            ops.push(AtomicOp::CrtcSetRoi {
                crtc_id,
                rects: crtc_rects,
            });
            ops.push(AtomicOp::ConnectorSetRoi {
                conn_id,
                rects: conn_rects,
            });
        }

        ops.push(AtomicOp::CrtcSetSecurityLevel {
            crtc_id,
            level: security,
        });

        if self.caps.num_solidfill_stages > 0 {
            ops.push(AtomicOp::CrtcSetSolidfillStages {
                crtc_id,
                stages: solid_fills,
            });
        }

        if self.variant == DeviceVariant::Peripheral && !frame.dest_scale_info.is_empty() {
            ops.push(AtomicOp::CrtcSetDestScalerConfig {
                crtc_id,
                config: self.dest_scaler_config(frame),
            });
        }

        if self.panel_info.mode == PanelMode::Command {
            ops.push(AtomicOp::ConnectorSetAutorefresh {
                conn_id,
                enable: self.autorefresh,
            });
        }

        if !validate {
            if let Some(timeout_ms) = frame.set_idle_time_ms {
                ops.push(AtomicOp::CrtcSetIdleTimeout {
                    crtc_id,
                    timeout_ms,
                });
            }
            ops.push(AtomicOp::CrtcGetReleaseFence { crtc_id });
            ops.push(AtomicOp::ConnectorGetRetireFence { conn_id });
        }

        ops
    }

    /// Dirty regions for this frame, as (CRTC, connector) lists.
    ///
    /// The full-surface defaults differ: the CRTC region covers the mixer,
    /// the connector region the panel, and a destination scaler between the
    /// two makes the mixer the smaller of the pair.
    fn roi_rects(&self, frame: &Frame) -> (Vec<DrmRect>, Vec<DrmRect>) {
        let mut rects: Vec<DrmRect> = frame
            .left_frame_roi
            .iter()
            .chain(frame.right_frame_roi.iter())
            .map(|rect| DrmRect::from(*rect))
            .collect();
        rects.truncate(self.panel_info.roi_caps.count.max(1) as usize);
        if rects.is_empty() {
            (vec![self.full_mixer_rect()], vec![self.full_display_rect()])
        } else {
            (rects.clone(), rects)
        }
    }

    fn full_mixer_rect(&self) -> DrmRect {
        DrmRect {
            left: 0,
            top: 0,
            right: self.mixer_attributes.width,
            bottom: self.mixer_attributes.height,
        }
    }

    fn full_display_rect(&self) -> DrmRect {
        let attrs = &self.display_attributes[self.current_mode_index];
        DrmRect {
            left: 0,
            top: 0,
            right: attrs.width,
            bottom: attrs.height,
        }
    }

    fn dest_scaler_config(&self, frame: &Frame) -> DestScalerConfig {
        let mixers = self.display_attributes[self.current_mode_index]
            .topology
            .mixer_count();
        let lm_width = self.mixer_attributes.width / mixers;
        let mut entries: Vec<_> = frame
            .dest_scale_info
            .values()
            .map(|info| DestScalerEntry {
                index: info.mixer_index,
                flags: DestScalerFlags::ENABLE | DestScalerFlags::SCALE_UPDATE,
                lm_width,
                lm_height: self.mixer_attributes.height,
                payload: info.payload.clone(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.index);
        DestScalerConfig { entries }
    }

    /// CRTC/connector-only commit used for power transitions and flushes.
    fn null_commit(&mut self, ops: Vec<AtomicOp>, flags: CommitFlags) -> Result<Option<SyncFence>, Error> {
        let txn = self
            .txn
            .as_mut()
            .ok_or(Error::Undefined("null commit without a transaction handle"))?;
        for op in ops {
            txn.perform(op);
        }
        let fences = txn.commit(flags).map_err(|source| Error::Hardware {
            errmsg: "null commit failed",
            source,
        })?;
        Ok(fences.release)
    }

    /// The dim layer hiding non-secure content while a secure display
    /// session is active.
    fn dim_layer_stage(&self, z_order: u32) -> SolidFillConfig {
        SolidFillConfig {
            z_order,
            roi: self.full_mixer_rect(),
            color_bit_depth: 8,
            red: 0,
            green: 0,
            blue: 0,
            alpha: 255,
            plane_alpha: 255,
            is_exclusion_rect: false,
        }
    }

    fn power_ops(&self, active: bool, mode: PowerMode) -> Vec<AtomicOp> {
        let mut ops = vec![
            AtomicOp::CrtcSetActive {
                crtc_id: self.token.crtc_id,
                active,
            },
            AtomicOp::ConnectorSetPowerMode {
                conn_id: self.token.conn_id,
                mode,
            },
        ];
        if self.secure_display_active {
            if let Some(stage) = self.caps.secure_disp_blend_stage {
                ops.push(AtomicOp::CrtcSetSolidfillStages {
                    crtc_id: self.token.crtc_id,
                    stages: vec![self.dim_layer_stage(stage)],
                });
            }
        }
        ops
    }

    /// No-op on the first cycle; the first real commit powers the pipeline
    /// on as a side effect.
    pub fn power_on(&mut self) -> Result<Option<SyncFence>, Error> {
        if self.first_cycle {
            return Ok(None);
        }
        let ops = self.power_ops(true, PowerMode::On);
        let fence = self.null_commit(ops, CommitFlags::SYNCHRONOUS | CommitFlags::RETAIN_PLANES)?;
        self.power_mode = PowerMode::On;
        Ok(fence)
    }

    /// Powers the display down, resetting the partial-update region to the
    /// full frame first.
    pub fn power_off(&mut self) -> Result<(), Error> {
        let mut ops = Vec::new();
        if self.panel_info.partial_update {
            ops.push(AtomicOp::CrtcSetRoi {
                crtc_id: self.token.crtc_id,
                rects: vec![self.full_mixer_rect()],
            });
            ops.push(AtomicOp::ConnectorSetRoi {
                conn_id: self.token.conn_id,
                rects: vec![self.full_display_rect()],
            });
        }
        ops.extend(self.power_ops(false, PowerMode::Off));
        self.null_commit(ops, CommitFlags::SYNCHRONOUS | CommitFlags::RETAIN_PLANES)?;
        self.power_mode = PowerMode::Off;
        Ok(())
    }

    pub fn doze(&mut self) -> Result<Option<SyncFence>, Error> {
        let ops = self.power_ops(true, PowerMode::Doze);
        let fence = self.null_commit(ops, CommitFlags::SYNCHRONOUS | CommitFlags::RETAIN_PLANES)?;
        self.power_mode = PowerMode::Doze;
        Ok(fence)
    }

    pub fn doze_suspend(&mut self) -> Result<Option<SyncFence>, Error> {
        let ops = self.power_ops(true, PowerMode::DozeSuspend);
        let fence = self.null_commit(ops, CommitFlags::SYNCHRONOUS | CommitFlags::RETAIN_PLANES)?;
        self.power_mode = PowerMode::DozeSuspend;
        Ok(fence)
    }

    /// Withdraws every pipe from the display with a null commit.
    ///
    /// Runs synchronously while a secure display session is active so the
    /// pipes are provably gone before secure content starts.
    pub fn flush(&mut self) -> Result<(), Error> {
        let flags = if self.secure_display_active {
            CommitFlags::SYNCHRONOUS
        } else {
            CommitFlags::empty()
        };
        let ops = if self.secure_display_active {
            match self.caps.secure_disp_blend_stage {
                Some(stage) => vec![AtomicOp::CrtcSetSolidfillStages {
                    crtc_id: self.token.crtc_id,
                    stages: vec![self.dim_layer_stage(stage)],
                }],
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };
        self.null_commit(ops, flags)?;
        Ok(())
    }

    /// Tears the display down: detaches the connector, powers off, drains
    /// the framebuffer registry and releases the registration.
    pub fn deinit(mut self) {
        let ops = vec![
            AtomicOp::ConnectorSetCrtc {
                conn_id: self.token.conn_id,
                crtc_id: 0,
            },
            AtomicOp::ConnectorSetPowerMode {
                conn_id: self.token.conn_id,
                mode: PowerMode::Off,
            },
            AtomicOp::CrtcSetMode {
                crtc_id: self.token.crtc_id,
                mode: None,
            },
            AtomicOp::CrtcSetActive {
                crtc_id: self.token.crtc_id,
                active: false,
            },
        ];
        if let Err(err) = self.null_commit(ops, CommitFlags::SYNCHRONOUS) {
            error!(parent: &self.span, "teardown commit failed: {}", err);
        }
        self.registry.clear();
        self.txn = None;
        self.driver.unregister_display(self.token);
    }

    /// Switches the active mode. Takes effect with the next commit.
    pub fn set_display_attributes(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.display_attributes.len() {
            return Err(Error::Parameters("mode index out of range"));
        }
        if !self.resolution_switch_enabled {
            return Err(Error::NotSupported);
        }
        self.current_mode_index = index;
        self.pending_mode_index = None;
        self.mixer_attributes = derive_mixer_attributes(&self.display_attributes[index]);
        self.panel_info = panel_info_from(&self.connector_info);
        self.update_mode = true;
        debug!(parent: &self.span, mode = index, "mode switch staged");
        Ok(())
    }

    /// Schedules a refresh-rate switch to a mode with the current resolution.
    ///
    /// The mode object is swapped in at the next commit; the active-mode
    /// index is updated only after that commit succeeds.
    pub fn set_refresh_rate(&mut self, fps: u32) -> Result<(), Error> {
        if !self.panel_info.dynamic_fps {
            return Err(Error::NotSupported);
        }
        let current = &self.display_attributes[self.current_mode_index];
        if current.fps == fps {
            return Ok(());
        }
        let index = self
            .display_attributes
            .iter()
            .position(|attrs| {
                attrs.width == current.width && attrs.height == current.height && attrs.fps == fps
            })
            .ok_or(Error::NotSupported)?;
        self.pending_mode_index = Some(index);
        debug!(parent: &self.span, fps, mode = index, "refresh-rate switch staged");
        Ok(())
    }

    /// Reprograms the blending-surface geometry, only meaningful on displays
    /// with a destination scaler between the mixers and the interface.
    pub fn set_mixer_attributes(&mut self, mixer: MixerAttributes) -> Result<(), Error> {
        if self.variant != DeviceVariant::Peripheral || self.caps.dest_scaler_count == 0 {
            return Err(Error::NotSupported);
        }
        let display = &self.display_attributes[self.current_mode_index];
        if mixer.width == 0 || mixer.height == 0 {
            return Err(Error::Parameters("mixer dimensions must be non-zero"));
        }
        if mixer.width > display.width || mixer.height > display.height {
            // the destination scaler only scales up
            return Err(Error::NotSupported);
        }
        let display_aspect = display.width as f32 / display.height as f32;
        let mixer_aspect = mixer.width as f32 / mixer.height as f32;
        if (display_aspect - mixer_aspect).abs() > 0.01 {
            return Err(Error::NotSupported);
        }
        let max_input = self.caps.dest_scaler_max_input_width * self.caps.dest_scaler_count.max(1);
        if mixer.width > max_input {
            return Err(Error::NotSupported);
        }
        let scale = display.width as f32 / mixer.width as f32;
        if scale > self.caps.dest_scaler_max_scale_up as f32 {
            return Err(Error::NotSupported);
        }
        self.mixer_attributes = MixerAttributes {
            split_left: if display.is_device_split {
                mixer.width / 2
            } else {
                mixer.width
            },
            ..mixer
        };
        Ok(())
    }

    pub fn display_attributes(&self, index: usize) -> Result<&HwDisplayAttributes, Error> {
        self.display_attributes
            .get(index)
            .ok_or(Error::Parameters("mode index out of range"))
    }

    pub fn active_mode_index(&self) -> usize {
        self.current_mode_index
    }

    pub fn panel_info(&self) -> &HwPanelInfo {
        &self.panel_info
    }

    pub fn mixer_attributes(&self) -> MixerAttributes {
        self.mixer_attributes
    }

    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    /// Snapshot the resolver works against, derived once per mode change.
    pub fn resource_context(&self) -> DisplayResourceContext {
        DisplayResourceContext {
            display_attributes: self.display_attributes[self.current_mode_index].clone(),
            mixer_attributes: self.mixer_attributes,
        }
    }

    pub fn set_autorefresh(&mut self, enable: bool) {
        self.autorefresh = enable;
    }

    /// Marks a secure display session; null commits carry the dim layer and
    /// flushes run synchronously while it is active.
    pub fn set_secure_display(&mut self, active: bool) {
        self.secure_display_active = active;
    }

    /// Writes the backlight level through the panel's sysfs node.
    pub fn set_panel_brightness(&mut self, level: u32) -> Result<(), Error> {
        let path = self
            .panel_info
            .brightness_path
            .clone()
            .ok_or(Error::NotSupported)?;
        if level > self.panel_info.max_brightness {
            return Err(Error::Parameters("brightness level above panel maximum"));
        }
        std::fs::write(&path, level.to_string()).map_err(|source| Error::FileDescriptor {
            path,
            source,
        })
    }

    pub fn panel_brightness(&self) -> Result<u32, Error> {
        let path = self
            .panel_info
            .brightness_path
            .clone()
            .ok_or(Error::NotSupported)?;
        let raw = std::fs::read_to_string(&path).map_err(|source| Error::FileDescriptor {
            path: path.clone(),
            source,
        })?;
        raw.trim()
            .parse()
            .map_err(|_| Error::Undefined("brightness node contained no number"))
    }
}

/// Derives the per-mode attribute entry from a raw connector mode.
fn display_attributes_for_mode(mode: &ModeInfo) -> HwDisplayAttributes {
    let mixers = mode.topology.mixer_count();
    HwDisplayAttributes {
        width: mode.width,
        height: mode.height,
        fps: mode.fps,
        vsync_period_ns: if mode.fps > 0 {
            1_000_000_000 / mode.fps
        } else {
            0
        },
        is_device_split: mixers == 2,
        split_left: if mixers == 2 { mode.width / 2 } else { mode.width },
        h_front_porch: mode.h_front_porch,
        h_back_porch: mode.h_back_porch,
        h_pulse_width: mode.h_pulse_width,
        v_front_porch: mode.v_front_porch,
        v_back_porch: mode.v_back_porch,
        v_pulse_width: mode.v_pulse_width,
        x_dpi: 0.0,
        y_dpi: 0.0,
        clock_khz: mode.clock_khz,
        topology: mode.topology,
    }
}

fn derive_mixer_attributes(attrs: &HwDisplayAttributes) -> MixerAttributes {
    MixerAttributes {
        width: attrs.width,
        height: attrs.height,
        split_left: attrs.split_left,
    }
}

fn panel_info_from(info: &ConnectorInfo) -> HwPanelInfo {
    HwPanelInfo {
        mode: info.panel_mode,
        partial_update: info.partial_update,
        roi_caps: info.roi_caps,
        dynamic_fps: info.dynamic_fps,
        min_fps: info.min_fps,
        max_fps: info.max_fps,
        is_primary: info.is_primary,
        is_pluggable: info.is_pluggable,
        orientation: info.orientation,
        hdr: info.hdr,
        brightness_path: info.brightness_node.clone(),
        max_brightness: info.max_brightness,
    }
}

/// Translates the clockwise layer transform into the driver's
/// counter-clockwise rotation property.
///
/// 90° clockwise keeps the 90° bit and toggles the *other* flip: an
/// unflipped rotation maps to the bare bit, an existing horizontal flip
/// becomes a vertical one and vice versa. Offline rotation already applied
/// the transform in the rotator pass, so the plane gets none.
fn rotation_bits(transform: &Transform, mode: RotatorMode) -> RotationBits {
    if mode == RotatorMode::Offline {
        return RotationBits::empty();
    }
    let mut bits = RotationBits::empty();
    if transform.rotated90() {
        bits |= RotationBits::ROT_90;
        if transform.flip_horizontal {
            bits |= RotationBits::FLIP_V;
        }
        if transform.flip_vertical {
            bits |= RotationBits::FLIP_H;
        }
    } else {
        if transform.flip_horizontal {
            bits |= RotationBits::FLIP_H;
        }
        if transform.flip_vertical {
            bits |= RotationBits::FLIP_V;
        }
    }
    bits
}

/// Classifies a buffer's fetch translation context and the security level
/// it imposes on the CRTC.
///
/// Secure camera and secure display sessions fetch through stage-II-only
/// translation; only plain protected content uses the fully secure context.
fn secure_config(flags: BufferFlags) -> (SecureMode, SecurityLevel) {
    if !flags.contains(BufferFlags::SECURE) {
        return (SecureMode::NonSecure, SecurityLevel::SecureNonSecure);
    }
    if flags.contains(BufferFlags::SECURE_CAMERA) {
        return (SecureMode::SecureDirTranslation, SecurityLevel::SecureNonSecure);
    }
    if flags.contains(BufferFlags::SECURE_DISPLAY) {
        return (SecureMode::SecureDirTranslation, SecurityLevel::SecureOnly);
    }
    (SecureMode::Secure, SecurityLevel::SecureNonSecure)
}

fn blend_type(blending: Blending) -> BlendType {
    match blending {
        Blending::Premultiplied => BlendType::Premultiplied,
        Blending::Opaque => BlendType::Opaque,
        Blending::Coverage => BlendType::Coverage,
    }
}

/// Picks the CSC matrix from the buffer's color metadata.
fn csc_for(color: ColorMetadata) -> CscType {
    match (color.primaries, color.full_range) {
        (ColorPrimaries::Bt601, false) => CscType::Yuv601Limited,
        (ColorPrimaries::Bt601, true) => CscType::Yuv601Full,
        (ColorPrimaries::Bt709, _) => CscType::Yuv709Limited,
        (ColorPrimaries::Bt2020, false) => CscType::Yuv2020Limited,
        (ColorPrimaries::Bt2020, true) => CscType::Yuv2020Full,
    }
}

fn solid_fill_config(stage: &HwSolidFillStage) -> SolidFillConfig {
    SolidFillConfig {
        z_order: stage.z_order,
        roi: DrmRect::from(stage.roi),
        color_bit_depth: stage.fill.bit_depth,
        red: stage.fill.red,
        green: stage.fill.green,
        blue: stage.fill.blue,
        alpha: stage.fill.alpha,
        plane_alpha: stage.plane_alpha,
        is_exclusion_rect: stage.is_exclusion_rect,
    }
}
