//! Device-backed image caching with loss detection and regeneration.

pub mod cache;
pub mod volatile;

pub use cache::{SurfaceCache, SurfaceKey};
pub use volatile::{Revalidation, SurfaceProducer, VolatileSurface};
