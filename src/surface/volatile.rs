//! Volatile device-resident surface with loss detection and regeneration.
//!
//! Device memory trades frequent-but-cheap validity checks for
//! rare-but-mandatory full repaints. A [`VolatileSurface`] therefore
//! re-checks validity on every use instead of caching it across frames;
//! stale or garbage pixels must never reach the screen.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{RenderError, RenderResult};
use crate::geom::{Color, Extent};
use crate::host::{Backing, DeviceImageId, DrawContext, ImageContents, WindowHost};

/// Content producer: draws the surface's full contents from scratch.
///
/// Invoked on creation and again whenever the device invalidates the
/// surface, so it must be deterministic for the contents to survive loss.
pub type SurfaceProducer = Arc<dyn Fn(&mut dyn DrawContext) -> RenderResult<()> + Send + Sync>;

/// Outcome of a validity check.
///
/// Callers treat `Restored` and `Reallocated` identically (both mean the
/// contents were regenerated); the distinction exists for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// Contents were already valid; nothing was done.
    Valid,
    /// Contents were lost but storage survived; repainted in place.
    Restored,
    /// Storage itself was destroyed; reallocated and repainted.
    Reallocated,
}

/// One device-resident image that detects content loss and regenerates
/// itself from its producer.
pub struct VolatileSurface {
    extent: Extent,
    image: DeviceImageId,
    backing: Backing,
    valid: bool,
    degraded: bool,
    degraded_logged: bool,
    degrade_ok: bool,
    producer: SurfaceProducer,
}

impl fmt::Debug for VolatileSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolatileSurface")
            .field("extent", &self.extent)
            .field("image", &self.image)
            .field("backing", &self.backing)
            .field("valid", &self.valid)
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl VolatileSurface {
    /// Allocate storage and paint the initial contents.
    ///
    /// Prefers device memory; if the host refuses and `degrade_ok` is set,
    /// falls back to system memory and marks the surface degraded.
    pub fn create(
        host: &mut dyn WindowHost,
        extent: Extent,
        producer: SurfaceProducer,
        degrade_ok: bool,
    ) -> RenderResult<Self> {
        if extent.is_empty() {
            return Err(RenderError::Host(format!(
                "surface extent must be positive, got {}x{}",
                extent.width, extent.height
            )));
        }

        let mut surface = Self {
            extent,
            image: DeviceImageId::new(0),
            backing: Backing::Device,
            valid: false,
            degraded: false,
            degraded_logged: false,
            degrade_ok,
            producer,
        };
        surface.image = surface.alloc(host)?;
        surface.repaint(host)?;
        surface.valid = true;
        Ok(surface)
    }

    /// Check device-side validity and regenerate contents if needed.
    ///
    /// Three outcomes: contents intact (no-op), contents lost but storage
    /// intact (restore + repaint), or storage destroyed (reallocate +
    /// repaint). The producer runs again for the latter two.
    pub fn ensure_valid(&mut self, host: &mut dyn WindowHost) -> RenderResult<Revalidation> {
        let outcome = match host.image_contents(self.image) {
            ImageContents::Intact if self.valid => return Ok(Revalidation::Valid),
            // Explicitly invalidated (e.g. whole-cache device-loss sweep):
            // storage is fine, contents are suspect.
            ImageContents::Intact => Revalidation::Restored,
            ImageContents::ContentsLost => {
                host.restore_image(self.image)?;
                Revalidation::Restored
            }
            ImageContents::StorageGone => {
                host.free_image(self.image);
                self.image = self.alloc(host)?;
                Revalidation::Reallocated
            }
        };

        self.repaint(host)?;
        self.valid = true;
        debug!(
            "surface {:?} revalidated: {:?} ({}x{})",
            self.image, outcome, self.extent.width, self.extent.height
        );
        Ok(outcome)
    }

    /// Revalidate, then hand the caller a drawing context on this surface.
    pub fn draw_into(
        &mut self,
        host: &mut dyn WindowHost,
        consumer: &mut dyn FnMut(&mut dyn DrawContext) -> RenderResult<()>,
    ) -> RenderResult<()> {
        self.ensure_valid(host)?;
        host.paint(self.image, consumer)
    }

    /// Force the next `ensure_valid` to regenerate contents even if the
    /// device still reports them intact.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Free the device storage. The surface must not be used afterwards.
    pub fn destroy(self, host: &mut dyn WindowHost) {
        host.free_image(self.image);
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Handle of the backing storage; blit sources use this.
    #[must_use]
    pub fn image_id(&self) -> DeviceImageId {
        self.image
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the surface fell back to non-accelerated storage.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Allocate storage with the current backing, degrading to system
    /// memory when the device refuses and policy allows.
    fn alloc(&mut self, host: &mut dyn WindowHost) -> RenderResult<DeviceImageId> {
        match host.alloc_image(self.extent, self.backing) {
            Ok(id) => Ok(id),
            Err(RenderError::AllocationUnsupported(reason)) if self.degrade_ok => {
                if !self.degraded_logged {
                    warn!(
                        "device allocation refused ({}), surface degraded to system memory",
                        reason
                    );
                    self.degraded_logged = true;
                }
                self.backing = Backing::System;
                self.degraded = true;
                host.alloc_image(self.extent, Backing::System)
            }
            Err(e) => Err(e),
        }
    }

    /// Clear and re-run the producer over the whole surface.
    fn repaint(&mut self, host: &mut dyn WindowHost) -> RenderResult<()> {
        let producer = Arc::clone(&self.producer);
        host.paint(self.image, &mut |ctx| {
            ctx.clear(Color::default());
            producer(ctx)
        })
    }
}
