//! Double-buffer flip protocol for the window surface.
//!
//! `Idle → Painting → Committing → Idle`, one paint in flight at a time.
//! The display only ever shows a fully-completed frame: a failed draw
//! abandons the frame without presenting, leaving the previous frame
//! visible.

use log::{debug, info, warn};

use crate::config::FrameConfig;
use crate::error::{RenderError, RenderResult};
use crate::geom::Extent;
use crate::host::{ImageContents, PaintFn, PresentStrategy, WindowHost};

/// Phase of the paint protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintPhase {
    #[default]
    Idle,
    Painting,
    Committing,
}

/// Owner of the window's hardware back/front buffers.
pub struct FlipBufferTarget {
    phase: PaintPhase,
    strategy: PresentStrategy,
    surface_count: usize,
    extent: Extent,
    /// Set once the draw callback has run to completion since `begin_paint`.
    painted: bool,
}

impl FlipBufferTarget {
    /// Negotiate capabilities and allocate the swap chain.
    ///
    /// Fails with [`RenderError::NotYetDisplayable`] until the window
    /// surface is realized on a display device; buffer acceleration is
    /// bound to that device, so constructing earlier cannot succeed. Retry
    /// after a visibility event.
    pub fn create(host: &mut dyn WindowHost, config: &FrameConfig) -> RenderResult<Self> {
        config.validate()?;
        if !host.is_displayable() {
            return Err(RenderError::NotYetDisplayable);
        }

        let caps = host.buffer_caps();
        let strategy = if !config.prefer_flip {
            info!("copy presentation selected by configuration");
            PresentStrategy::CopyBlit
        } else if caps.flip && caps.max_surfaces >= config.surface_count {
            PresentStrategy::Flip
        } else {
            // Same call sequence for callers, only a performance difference.
            info!(
                "flip unavailable (flip={}, max_surfaces={}), using copy fallback",
                caps.flip, caps.max_surfaces
            );
            PresentStrategy::CopyBlit
        };

        host.create_buffer_chain(config.surface_count, config.logical)?;
        info!(
            "flip target ready: {}x{}, {} surfaces, {:?}",
            config.logical.width, config.logical.height, config.surface_count, strategy
        );

        Ok(Self {
            phase: PaintPhase::Idle,
            strategy,
            surface_count: config.surface_count,
            extent: config.logical,
            painted: false,
        })
    }

    /// Start a paint: `Idle → Painting`.
    ///
    /// Reentrant calls are a programmer error, not a recoverable race; the
    /// controller is single-threaded by contract.
    pub fn begin_paint(&mut self) -> RenderResult<()> {
        match self.phase {
            PaintPhase::Idle => {
                self.phase = PaintPhase::Painting;
                self.painted = false;
                Ok(())
            }
            PaintPhase::Painting => Err(RenderError::ReentrantRender),
            PaintPhase::Committing => Err(RenderError::PhaseMismatch {
                expected: PaintPhase::Idle,
                found: PaintPhase::Committing,
            }),
        }
    }

    /// Run the draw callback against the back buffer.
    ///
    /// The back buffer is itself volatile; its contents state is checked
    /// and recovered before drawing. If the callback fails, the frame is
    /// abandoned: the phase returns to `Idle` and nothing is presented.
    pub fn paint_with(&mut self, host: &mut dyn WindowHost, f: PaintFn<'_>) -> RenderResult<()> {
        if self.phase != PaintPhase::Painting {
            return Err(RenderError::PhaseMismatch {
                expected: PaintPhase::Painting,
                found: self.phase,
            });
        }

        self.revalidate_back_buffer(host)?;
        let back = host
            .back_buffer()
            .ok_or_else(|| RenderError::Host("no back buffer in swap chain".into()))?;

        match host.paint(back, f) {
            Ok(()) => {
                self.painted = true;
                Ok(())
            }
            Err(e) => {
                self.phase = PaintPhase::Idle;
                self.painted = false;
                warn!("frame abandoned, draw failed: {}", e);
                Err(e)
            }
        }
    }

    /// Commit the completed frame: `Painting → Committing → Idle`.
    ///
    /// Presents by flipping buffer roles, or by blitting on hosts without
    /// flip semantics. Refuses to present a frame whose drawing never
    /// completed.
    pub fn commit(&mut self, host: &mut dyn WindowHost) -> RenderResult<()> {
        if self.phase != PaintPhase::Painting {
            return Err(RenderError::PhaseMismatch {
                expected: PaintPhase::Painting,
                found: self.phase,
            });
        }
        if !self.painted {
            self.phase = PaintPhase::Idle;
            return Err(RenderError::IncompleteFrame);
        }

        self.phase = PaintPhase::Committing;
        let result = host.present(self.strategy);
        self.phase = PaintPhase::Idle;
        self.painted = false;
        result
    }

    /// Abandon the current paint: return to `Idle` without presenting,
    /// discarding any drawing done since `begin_paint`.
    pub fn abandon(&mut self) {
        self.phase = PaintPhase::Idle;
        self.painted = false;
    }

    /// Rebuild the swap chain at a new size. One call per resize gesture,
    /// driven by the resize freeze's single corrective pass.
    pub fn resize(&mut self, host: &mut dyn WindowHost, extent: Extent) -> RenderResult<()> {
        if self.phase != PaintPhase::Idle {
            return Err(RenderError::PhaseMismatch {
                expected: PaintPhase::Idle,
                found: self.phase,
            });
        }
        if extent.is_empty() {
            return Err(RenderError::Host(format!(
                "resize extent must be positive, got {}x{}",
                extent.width, extent.height
            )));
        }
        host.destroy_buffer_chain();
        host.create_buffer_chain(self.surface_count, extent)?;
        self.extent = extent;
        info!("swap chain rebuilt at {}x{}", extent.width, extent.height);
        Ok(())
    }

    #[must_use]
    pub fn phase(&self) -> PaintPhase {
        self.phase
    }

    #[must_use]
    pub fn strategy(&self) -> PresentStrategy {
        self.strategy
    }

    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surface_count
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Recover the back buffer if the device invalidated it between frames.
    fn revalidate_back_buffer(&mut self, host: &mut dyn WindowHost) -> RenderResult<()> {
        let Some(back) = host.back_buffer() else {
            return Err(RenderError::Host("no back buffer in swap chain".into()));
        };
        match host.image_contents(back) {
            ImageContents::Intact => Ok(()),
            ImageContents::ContentsLost => {
                debug!("back buffer contents lost, restoring");
                host.restore_image(back)
            }
            ImageContents::StorageGone => {
                debug!("back buffer storage gone, rebuilding swap chain");
                host.destroy_buffer_chain();
                host.create_buffer_chain(self.surface_count, self.extent)
            }
        }
    }
}
