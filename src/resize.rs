//! Suppression of layout work during interactive resize gestures.
//!
//! Without freezing, every intermediate drag position triggers a full
//! re-layout and a swap-chain reallocation, which exhausts memory under
//! rapid dragging. Freezing bounds reallocation to one corrective pass per
//! gesture.

use log::debug;

use crate::geom::Extent;

/// Tracks an interactive resize gesture and decides when layout may run.
///
/// The `on_resize_*` methods return `Some(extent)` when the caller should
/// perform a layout/reallocation pass now, `None` when the pass is
/// suppressed.
#[derive(Debug, Default)]
pub struct ResizeFreeze {
    frozen: bool,
    pending: Option<Extent>,
    suppressed: u64,
}

impl ResizeFreeze {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A resize gesture began: disable dynamic layout.
    pub fn on_resize_start(&mut self) {
        self.frozen = true;
        self.pending = None;
        debug!("resize gesture started, layout frozen");
    }

    /// An intermediate size arrived. Frozen gestures only record it; a
    /// bare delta outside a gesture (hosts without start/end bracketing)
    /// applies immediately.
    pub fn on_resize_delta(&mut self, extent: Extent) -> Option<Extent> {
        if self.frozen {
            self.pending = Some(extent);
            self.suppressed += 1;
            None
        } else {
            Some(extent)
        }
    }

    /// The gesture ended: re-enable dynamic layout and report exactly one
    /// corrective pass at the true final size.
    pub fn on_resize_end(&mut self, extent: Extent) -> Option<Extent> {
        if self.frozen {
            debug!(
                "resize gesture ended at {}x{}, {} intermediate passes suppressed",
                extent.width, extent.height, self.suppressed
            );
        }
        self.frozen = false;
        self.pending = None;
        Some(extent)
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Latest size seen during the current gesture, if any.
    #[must_use]
    pub fn pending_extent(&self) -> Option<Extent> {
        self.pending
    }

    /// Total layout passes suppressed since construction.
    #[must_use]
    pub fn suppressed_passes(&self) -> u64 {
        self.suppressed
    }
}
