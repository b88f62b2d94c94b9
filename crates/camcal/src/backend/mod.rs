//! Concrete [`VisionBackend`] implementations.
//!
//! [`NativeBackend`] is pure Rust and always compiled. With the `opencv`
//! feature the command-line tool delegates to OpenCV instead.

mod native;
#[cfg(feature = "opencv")]
mod opencv;

pub use self::native::{NativeBackend, NativeParams};
#[cfg(feature = "opencv")]
pub use self::opencv::OpenCvBackend;

use camcal_core::VisionBackend;

/// Backend used by the command-line tool.
#[cfg(feature = "opencv")]
pub fn default_backend() -> Box<dyn VisionBackend> {
    Box::new(OpenCvBackend::new())
}

/// Backend used by the command-line tool.
#[cfg(not(feature = "opencv"))]
pub fn default_backend() -> Box<dyn VisionBackend> {
    Box::new(NativeBackend::new())
}
