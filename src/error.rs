use std::io;
use std::path::PathBuf;

/// Errors thrown by the [`Resolver`](crate::resolver::Resolver) and the
/// [`HwDevice`](crate::device::HwDevice).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A layer's geometry or scaling violates a hardware constraint.
    ///
    /// The whole frame must be recomposed through a fallback path (e.g. GPU
    /// composition); no partial configuration has been applied.
    #[error("Frame configuration is not supported by the scanout hardware")]
    NotSupported,
    /// A driver call failed.
    #[error("DRM access error: {errmsg} ({source})")]
    Hardware {
        /// Error message associated to the failed call
        errmsg: &'static str,
        /// Underlying driver error
        source: io::Error,
    },
    /// Allocation of a driver-side handle or session failed.
    #[error("Failed to allocate a driver resource: {errmsg} ({source})")]
    Resources {
        /// Error message associated to the failed allocation
        errmsg: &'static str,
        /// Underlying driver error
        source: io::Error,
    },
    /// Invalid caller input, e.g. an out-of-range mode index.
    #[error("Invalid parameter: {0}")]
    Parameters(&'static str),
    /// A sysfs node for an ancillary feature could not be opened.
    #[error("Failed to open `{path:?}` ({source})")]
    FileDescriptor {
        /// Path of the node
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// An internal invariant was violated, e.g. a missing transaction handle.
    #[error("Internal invariant violated: {0}")]
    Undefined(&'static str),
}
