//! Host windowing-substrate boundary.
//!
//! The frame-pacing layer never talks to a window system directly. Everything
//! it needs from the host is expressed through two object-safe traits:
//! [`WindowHost`] for surface allocation, capability negotiation, and
//! presentation, and [`DrawContext`] for the primitive 2D drawing operations
//! a paint callback may issue. Host-originated notifications arrive as
//! [`HostNotice`] values fed to the render gate; there is no framework base
//! type to subclass and no default repaint path to inherit.

use crate::error::RenderResult;
use crate::geom::{Color, Extent, Point, Rect};

/// Type-safe handle for host-allocated pixel storage.
///
/// The storage behind a handle is opaque to this layer; only the host knows
/// whether it lives in device memory or system memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceImageId(pub u32);

impl DeviceImageId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Where an allocation's primary pixel copy lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backing {
    /// Accelerated device memory. May be refused, and contents may be lost
    /// asynchronously.
    #[default]
    Device,
    /// Plain system memory. Always available, never lost, not accelerated.
    System,
}

/// Result of a device-side contents check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageContents {
    /// Pixels are as last drawn.
    Intact,
    /// The allocation survives but its pixels are undefined; restore and
    /// repaint before use.
    ContentsLost,
    /// The allocation itself was destroyed; reallocate and repaint.
    StorageGone,
}

/// Buffer capabilities of the display device currently hosting the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCaps {
    /// Front/back buffers can live in accelerated memory.
    pub accelerated: bool,
    /// The host can swap buffer roles without copying pixels.
    pub flip: bool,
    /// Largest swap chain the host will provide.
    pub max_surfaces: usize,
}

impl Default for BufferCaps {
    fn default() -> Self {
        Self {
            accelerated: true,
            flip: true,
            max_surfaces: 2,
        }
    }
}

/// How a completed back buffer reaches the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStrategy {
    /// Swap front/back roles, no pixel copy.
    Flip,
    /// Copy the back buffer into the displayed surface. Functionally
    /// identical to `Flip`, only slower.
    CopyBlit,
}

/// Host-originated notification, delivered to [`crate::gate::RenderGate::notice`].
///
/// One variant per notification type; the gate decides what, if anything,
/// each one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostNotice {
    /// The host wants the window repainted (exposure, decoration change,
    /// scrollbar, focus). Always swallowed by the gate.
    RedrawRequested,
    /// An interactive resize gesture began.
    ResizeStart,
    /// An intermediate size during the gesture.
    ResizeDelta(Extent),
    /// The gesture ended at the given final size.
    ResizeEnd(Extent),
    /// The device/context holding cached surfaces was lost or replaced.
    DeviceLost,
    /// The window became (in)visible on a display device.
    VisibilityChanged(bool),
}

/// Primitive 2D immediate-mode drawing surface handed to paint callbacks.
pub trait DrawContext {
    /// Size of the surface being drawn.
    fn extent(&self) -> Extent;

    /// Fill the whole surface with one color.
    fn clear(&mut self, color: Color);

    /// Fill a rectangle, clipped to the surface.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw a line between two points, clipped to the surface.
    fn draw_line(&mut self, from: Point, to: Point, color: Color);

    /// Set a single pixel; out-of-bounds points are ignored.
    fn draw_point(&mut self, at: Point, color: Color);

    /// Copy another host image onto this surface at `at`, clipped.
    fn blit(&mut self, src: DeviceImageId, at: Point) -> RenderResult<()>;
}

/// Callback type for scoped drawing access.
pub type PaintFn<'a> = &'a mut dyn FnMut(&mut dyn DrawContext) -> RenderResult<()>;

/// The windowing substrate as seen by this layer.
///
/// All methods must be called from the designated render thread; the host
/// contract makes cross-thread use undefined, not merely racy.
pub trait WindowHost {
    /// Whether the window surface is realized on a display device. Buffer
    /// capability is bound to that device, so swap-chain construction
    /// before this returns true fails deterministically.
    fn is_displayable(&self) -> bool;

    /// Capabilities of the display device the window currently occupies.
    fn buffer_caps(&self) -> BufferCaps;

    /// Current logical drawing size of the window.
    fn logical_size(&self) -> Extent;

    /// Allocate pixel storage. `Backing::Device` may be refused with
    /// [`crate::error::RenderError::AllocationUnsupported`];
    /// `Backing::System` always succeeds.
    fn alloc_image(&mut self, extent: Extent, backing: Backing) -> RenderResult<DeviceImageId>;

    /// Release an allocation. Unknown ids are ignored.
    fn free_image(&mut self, id: DeviceImageId);

    /// Check whether the contents of an allocation survived since last use.
    fn image_contents(&self, id: DeviceImageId) -> ImageContents;

    /// Re-arm a `ContentsLost` allocation. Pixels are undefined until the
    /// caller repaints them.
    fn restore_image(&mut self, id: DeviceImageId) -> RenderResult<()>;

    /// Run `f` with drawing access to `target`.
    fn paint(&mut self, target: DeviceImageId, f: PaintFn<'_>) -> RenderResult<()>;

    /// Allocate the window's swap chain: `count` buffers of `extent`.
    /// Replaces any existing chain.
    fn create_buffer_chain(&mut self, count: usize, extent: Extent) -> RenderResult<()>;

    /// Tear down the swap chain, if any.
    fn destroy_buffer_chain(&mut self);

    /// The buffer currently being drawn, if a chain exists.
    fn back_buffer(&self) -> Option<DeviceImageId>;

    /// Make the completed back buffer visible.
    fn present(&mut self, strategy: PresentStrategy) -> RenderResult<()>;
}
