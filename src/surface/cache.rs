//! Cache of volatile surfaces keyed by logical image identity.
//!
//! Keys are stable caller-chosen identifiers (a sprite id, a background
//! id), not pixel data. The cache holds at most one surface per key, so a
//! logical image is never allocated twice on the device. There is no
//! eviction: the working set is the finite collection of images a caller
//! registers, cleared explicitly on teardown or device-context loss.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::debug;

use crate::error::RenderResult;
use crate::geom::Extent;
use crate::host::WindowHost;
use crate::surface::volatile::{SurfaceProducer, VolatileSurface};

/// Stable identity of a logical image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceKey(pub u32);

impl SurfaceKey {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl From<u32> for SurfaceKey {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Mapping of logical image identity to one [`VolatileSurface`].
pub struct SurfaceCache {
    entries: HashMap<SurfaceKey, VolatileSurface>,
    degrade_ok: bool,
}

impl SurfaceCache {
    /// Create an empty cache. `degrade_ok` is handed to every surface it
    /// creates.
    #[must_use]
    pub fn new(degrade_ok: bool) -> Self {
        Self {
            entries: HashMap::new(),
            degrade_ok,
        }
    }

    /// Fetch the surface for `key`, creating it on first request.
    ///
    /// The returned surface has been revalidated: its contents are ready to
    /// blit. The same key always yields the same underlying surface until
    /// the cache is cleared.
    pub fn get_or_create(
        &mut self,
        host: &mut dyn WindowHost,
        key: SurfaceKey,
        extent: Extent,
        producer: SurfaceProducer,
    ) -> RenderResult<&mut VolatileSurface> {
        let surface = match self.entries.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("surface cache miss for key {}", key.id());
                let surface = VolatileSurface::create(host, extent, producer, self.degrade_ok)?;
                entry.insert(surface)
            }
        };
        surface.ensure_valid(host)?;
        Ok(surface)
    }

    /// Read-only lookup, without revalidation. Paint callbacks use this to
    /// resolve blit handles for surfaces prepared earlier in the frame.
    #[must_use]
    pub fn get(&self, key: SurfaceKey) -> Option<&VolatileSurface> {
        self.entries.get(&key)
    }

    /// Force every entry's next `ensure_valid` to regenerate. Called on a
    /// device/context change, where storage may survive but contents are
    /// untrustworthy.
    pub fn invalidate_all(&mut self) {
        for surface in self.entries.values_mut() {
            surface.invalidate();
        }
        debug!("invalidated {} cached surfaces", self.entries.len());
    }

    /// Free all device storage and empty the cache.
    pub fn clear(&mut self, host: &mut dyn WindowHost) {
        for (_, surface) in self.entries.drain() {
            surface.destroy(host);
        }
    }

    #[must_use]
    pub fn contains(&self, key: SurfaceKey) -> bool {
        self.entries.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
