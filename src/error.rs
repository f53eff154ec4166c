//! Error taxonomy for the frame-pacing layer.
//!
//! Loss and fallback conditions (`TransientSurfaceLoss`,
//! `AllocationUnsupported`) are recovered internally and never interrupt
//! rendering. Usage defects (`ReentrantRender`, `NotYetDisplayable`,
//! `PhaseMismatch`) are reported to the caller immediately and never
//! retried or queued.

use crate::flip::PaintPhase;
use crate::host::DeviceImageId;

/// Errors reported by the frame-pacing and buffer-management layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Device-resident image contents were lost. Recovered automatically
    /// by regeneration; surfaces only as a diagnostic.
    #[error("device image contents lost")]
    TransientSurfaceLoss,

    /// The platform cannot provide the requested accelerated allocation.
    /// Recovered by falling back to a non-accelerated path.
    #[error("accelerated allocation unsupported: {0}")]
    AllocationUnsupported(String),

    /// A render was requested while one was already in flight.
    #[error("render already in flight")]
    ReentrantRender,

    /// Buffer construction was attempted before the window surface became
    /// visible on a display device. Retry after a visibility event.
    #[error("window surface not yet displayable")]
    NotYetDisplayable,

    /// A paint-protocol call arrived in the wrong phase.
    #[error("paint phase mismatch: expected {expected:?}, found {found:?}")]
    PhaseMismatch {
        expected: PaintPhase,
        found: PaintPhase,
    },

    /// Commit was requested for a frame whose drawing never completed.
    #[error("frame abandoned before completion")]
    IncompleteFrame,

    /// The host has no record of the given device image.
    #[error("unknown device image: {0:?}")]
    UnknownImage(DeviceImageId),

    /// Failure reported by the host windowing substrate.
    #[error("host error: {0}")]
    Host(String),

    /// The designated render thread is gone.
    #[error("render thread disconnected")]
    Disconnected,
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
