#![warn(missing_debug_implementations, rust_2018_idioms)]

//! # drm-scanout
//!
//! Resource allocation and atomic-commit state machine for
//! display-controller scanout pipelines.
//!
//! Per frame, this crate decides how a list of application-supplied layers
//! maps onto a fixed set of hardware scaling/blending pipes and programs the
//! result transactionally through an atomic-commit style driver interface.
//! It covers three concerns:
//!
//! - [`resolver::Resolver`] validates each layer's crop and destination
//!   rectangles against display and hardware limits, splits oversized layers
//!   across two pipes, and stages a rotator pass when rotation or heavy
//!   downscaling requires one.
//! - The framebuffer handle registry inside [`device`] amortizes driver
//!   framebuffer creation across frames and defers removal behind a ring of
//!   generations.
//! - [`device::HwDevice`] owns one display's transaction lifecycle:
//!   validate/commit cycles with fence bookkeeping, mode and refresh-rate
//!   switching, power transitions, and teardown.
//!
//! The kernel ioctl surface, buffer allocator and color-management tables
//! stay behind the traits in [`driver`]; supply implementations of
//! [`driver::DisplayDriver`], [`driver::DrmMaster`] and
//! [`driver::BufferAllocator`] to drive real hardware.
//!
//! Each display is single-threaded: drive one [`device::HwDevice`] from one
//! thread at a time. Independent displays may run in parallel sharing the
//! driver and master handles.
//!
//! ## Logging
//!
//! This crate uses [`tracing`] for instrumentation; install a subscriber
//! such as `tracing-subscriber` to see the output.

pub mod device;
pub mod driver;
pub mod error;
pub mod formats;
pub mod hw;
pub mod layer;
pub mod resolver;
pub mod utils;

pub use crate::error::Error;
