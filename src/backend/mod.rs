//! Host backends.
//!
//! `soft` is a pure in-memory host: the non-accelerated fallback path and
//! the test double for everything above it. The SDL2-backed host lives
//! behind the `backend_sdl2` feature.

pub mod soft;

#[cfg(feature = "backend_sdl2")]
pub mod sdl2;

pub use soft::SoftHost;
