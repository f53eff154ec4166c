//! Frame pacing configuration.

use crate::error::{RenderError, RenderResult};
use crate::geom::Extent;

/// Configuration for the flip-buffer target and render gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Logical drawing size in pixels.
    pub logical: Extent,
    /// Number of buffers in the swap chain (front + backs), at least 2.
    pub surface_count: usize,
    /// Prefer page-flip presentation when the host supports it.
    pub prefer_flip: bool,
    /// Allow falling back to non-accelerated surfaces when device
    /// allocation is refused.
    pub allow_degraded: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            logical: Extent::new(320, 240),
            surface_count: 2,
            prefer_flip: true,
            allow_degraded: true,
        }
    }
}

impl FrameConfig {
    /// Create a configuration with the given logical size.
    #[must_use]
    pub fn new(logical: Extent) -> Self {
        Self {
            logical,
            ..Self::default()
        }
    }

    /// Set the swap-chain length.
    #[must_use]
    pub const fn with_surface_count(mut self, count: usize) -> Self {
        self.surface_count = count;
        self
    }

    /// Set flip preference.
    #[must_use]
    pub const fn with_prefer_flip(mut self, prefer: bool) -> Self {
        self.prefer_flip = prefer;
        self
    }

    /// Set whether degraded (non-accelerated) fallback is permitted.
    #[must_use]
    pub const fn with_allow_degraded(mut self, allow: bool) -> Self {
        self.allow_degraded = allow;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> RenderResult<()> {
        if self.logical.is_empty() {
            return Err(RenderError::Host(format!(
                "logical size must be positive, got {}x{}",
                self.logical.width, self.logical.height
            )));
        }
        if self.surface_count < 2 {
            return Err(RenderError::Host(format!(
                "surface count must be at least 2, got {}",
                self.surface_count
            )));
        }
        Ok(())
    }
}
