//! framegate: frame pacing and buffer management for 2D game loops.
//!
//! Sits between a real-time game loop and a windowing substrate it does
//! not control, and guarantees exactly one render per logical tick, at a
//! time chosen by the loop. Externally-triggered repaints are swallowed by
//! the [`gate::RenderGate`]; frames reach the display through the
//! double-buffered [`flip::FlipBufferTarget`]; reusable images live in a
//! [`surface::SurfaceCache`] of [`surface::VolatileSurface`]s that detect
//! device-side content loss and regenerate themselves; interactive resizes
//! are bounded to one layout pass per gesture by [`resize::ResizeFreeze`];
//! and [`dispatch::RenderHandle`] gives a game loop on another thread a
//! blocking, in-order path to the designated render thread.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flip;
pub mod gate;
pub mod geom;
pub mod host;
pub mod resize;
pub mod surface;

pub use config::FrameConfig;
pub use dispatch::RenderHandle;
pub use error::{RenderError, RenderResult};
pub use flip::{FlipBufferTarget, PaintPhase};
pub use gate::{FramePainter, RenderGate};
pub use geom::{Color, Extent, Point, Rect};
pub use host::{
    Backing, BufferCaps, DeviceImageId, DrawContext, HostNotice, ImageContents, PresentStrategy,
    WindowHost,
};
pub use resize::ResizeFreeze;
pub use surface::{Revalidation, SurfaceCache, SurfaceKey, SurfaceProducer, VolatileSurface};
