//! Pure software window host.
//!
//! Backs every image with a `Vec<u32>` of 0xRRGGBBAA pixels and models the
//! swap chain, presentation, and device-loss behavior of an accelerated
//! host. Serves two roles: the non-accelerated rendering path, and the
//! fault-injectable double the test suite drives (`lose_image`,
//! `destroy_image`, `set_displayable`, `deny_device_alloc`).

use std::collections::HashMap;

use log::debug;

use crate::error::{RenderError, RenderResult};
use crate::geom::{Color, Extent, Point, Rect};
use crate::host::{
    Backing, BufferCaps, DeviceImageId, DrawContext, ImageContents, PaintFn, PresentStrategy,
    WindowHost,
};

/// Pixel pattern written over storage whose contents became undefined.
/// Anything showing this on screen is a missed revalidation.
const GARBAGE: u32 = 0xDEAD_BEEF;

struct SoftImage {
    extent: Extent,
    pixels: Vec<u32>,
    contents: ImageContents,
    backing: Backing,
}

impl SoftImage {
    fn new(extent: Extent, backing: Backing) -> Self {
        Self {
            extent,
            pixels: vec![0; extent.area()],
            contents: ImageContents::Intact,
            backing,
        }
    }
}

/// In-memory implementation of [`WindowHost`].
pub struct SoftHost {
    displayable: bool,
    caps: BufferCaps,
    logical: Extent,
    images: HashMap<DeviceImageId, SoftImage>,
    next_id: u32,
    chain: Vec<DeviceImageId>,
    back_index: usize,
    chain_extent: Extent,
    front: Vec<u32>,
    deny_device: bool,
    present_count: u64,
    chain_builds: u64,
    last_present: Option<PresentStrategy>,
}

impl SoftHost {
    /// Create a host with the given logical window size, displayable from
    /// the start.
    #[must_use]
    pub fn new(logical: Extent) -> Self {
        Self {
            displayable: true,
            caps: BufferCaps::default(),
            logical,
            images: HashMap::new(),
            next_id: 1,
            chain: Vec::new(),
            back_index: 0,
            chain_extent: Extent::default(),
            front: Vec::new(),
            deny_device: false,
            present_count: 0,
            chain_builds: 0,
            last_present: None,
        }
    }

    // --- fault injection and observation hooks -------------------------

    /// Simulate window (un)realization.
    pub fn set_displayable(&mut self, displayable: bool) {
        self.displayable = displayable;
    }

    /// Override the advertised buffer capabilities.
    pub fn set_caps(&mut self, caps: BufferCaps) {
        self.caps = caps;
    }

    /// Change the logical window size (as a host would during a resize).
    pub fn set_logical_size(&mut self, logical: Extent) {
        self.logical = logical;
    }

    /// Refuse future `Backing::Device` allocations. Window swap-chain
    /// buffers come from a separate pool and are unaffected.
    pub fn deny_device_alloc(&mut self, deny: bool) {
        self.deny_device = deny;
    }

    /// Simulate asynchronous content loss: storage survives, pixels become
    /// garbage.
    pub fn lose_image(&mut self, id: DeviceImageId) {
        if let Some(img) = self.images.get_mut(&id) {
            img.contents = ImageContents::ContentsLost;
            img.pixels.fill(GARBAGE);
        }
    }

    /// Simulate destruction of the allocation itself.
    pub fn destroy_image(&mut self, id: DeviceImageId) {
        if let Some(img) = self.images.get_mut(&id) {
            img.contents = ImageContents::StorageGone;
            img.pixels.clear();
        }
    }

    /// Pixels of a live image, or `None` if unknown or destroyed.
    #[must_use]
    pub fn image_pixels(&self, id: DeviceImageId) -> Option<&[u32]> {
        let img = self.images.get(&id)?;
        if img.contents == ImageContents::StorageGone {
            return None;
        }
        Some(&img.pixels)
    }

    /// Backing of a live allocation, or `None` if the id is unknown.
    #[must_use]
    pub fn image_backing(&self, id: DeviceImageId) -> Option<Backing> {
        self.images.get(&id).map(|img| img.backing)
    }

    /// The displayed front buffer.
    #[must_use]
    pub fn front_pixels(&self) -> &[u32] {
        &self.front
    }

    /// Number of completed presents.
    #[must_use]
    pub fn present_count(&self) -> u64 {
        self.present_count
    }

    /// Number of swap-chain (re)builds, for bounding reallocation in tests.
    #[must_use]
    pub fn chain_builds(&self) -> u64 {
        self.chain_builds
    }

    /// Strategy of the most recent present.
    #[must_use]
    pub fn last_present(&self) -> Option<PresentStrategy> {
        self.last_present
    }

    /// Number of live allocations (swap chain included).
    #[must_use]
    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    fn alloc_raw(&mut self, extent: Extent, backing: Backing) -> DeviceImageId {
        let id = DeviceImageId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.images.insert(id, SoftImage::new(extent, backing));
        id
    }
}

impl WindowHost for SoftHost {
    fn is_displayable(&self) -> bool {
        self.displayable
    }

    fn buffer_caps(&self) -> BufferCaps {
        self.caps
    }

    fn logical_size(&self) -> Extent {
        self.logical
    }

    fn alloc_image(&mut self, extent: Extent, backing: Backing) -> RenderResult<DeviceImageId> {
        if extent.is_empty() {
            return Err(RenderError::Host(format!(
                "image extent must be positive, got {}x{}",
                extent.width, extent.height
            )));
        }
        if backing == Backing::Device && (self.deny_device || !self.caps.accelerated) {
            return Err(RenderError::AllocationUnsupported(
                "device memory unavailable".into(),
            ));
        }
        Ok(self.alloc_raw(extent, backing))
    }

    fn free_image(&mut self, id: DeviceImageId) {
        self.images.remove(&id);
    }

    fn image_contents(&self, id: DeviceImageId) -> ImageContents {
        match self.images.get(&id) {
            Some(img) => img.contents,
            // A freed handle reads as destroyed storage.
            None => ImageContents::StorageGone,
        }
    }

    fn restore_image(&mut self, id: DeviceImageId) -> RenderResult<()> {
        let img = self
            .images
            .get_mut(&id)
            .ok_or(RenderError::UnknownImage(id))?;
        match img.contents {
            ImageContents::StorageGone => Err(RenderError::UnknownImage(id)),
            _ => {
                // Restored storage is writable but undefined until repainted.
                img.pixels.resize(img.extent.area(), GARBAGE);
                img.pixels.fill(GARBAGE);
                img.contents = ImageContents::Intact;
                Ok(())
            }
        }
    }

    fn paint(&mut self, target: DeviceImageId, f: PaintFn<'_>) -> RenderResult<()> {
        let mut img = self
            .images
            .remove(&target)
            .ok_or(RenderError::UnknownImage(target))?;
        if img.contents == ImageContents::StorageGone {
            self.images.insert(target, img);
            return Err(RenderError::UnknownImage(target));
        }

        let result = {
            let mut ctx = RasterContext {
                extent: img.extent,
                pixels: &mut img.pixels,
                images: &self.images,
            };
            f(&mut ctx)
        };
        self.images.insert(target, img);
        result
    }

    fn create_buffer_chain(&mut self, count: usize, extent: Extent) -> RenderResult<()> {
        if count < 2 {
            return Err(RenderError::Host(format!(
                "buffer chain needs at least 2 surfaces, got {}",
                count
            )));
        }
        if extent.is_empty() {
            return Err(RenderError::Host(format!(
                "chain extent must be positive, got {}x{}",
                extent.width, extent.height
            )));
        }
        self.destroy_buffer_chain();
        // Swap-chain buffers come from the window's own pool, so they are
        // unaffected by deny_device_alloc.
        for _ in 0..count {
            let id = self.alloc_raw(extent, Backing::Device);
            self.chain.push(id);
        }
        self.back_index = 0;
        self.chain_extent = extent;
        self.front = vec![0; extent.area()];
        self.chain_builds += 1;
        debug!(
            "buffer chain built: {} surfaces at {}x{}",
            count, extent.width, extent.height
        );
        Ok(())
    }

    fn destroy_buffer_chain(&mut self) {
        for id in std::mem::take(&mut self.chain) {
            self.images.remove(&id);
        }
        self.back_index = 0;
    }

    fn back_buffer(&self) -> Option<DeviceImageId> {
        self.chain.get(self.back_index).copied()
    }

    fn present(&mut self, strategy: PresentStrategy) -> RenderResult<()> {
        let back = self
            .back_buffer()
            .ok_or_else(|| RenderError::Host("present without a swap chain".into()))?;
        let img = self
            .images
            .get_mut(&back)
            .ok_or(RenderError::UnknownImage(back))?;

        match strategy {
            PresentStrategy::Flip => {
                // Role swap, no pixel copy: the old front contents end up
                // in the next back buffer, exactly like real page flipping.
                std::mem::swap(&mut self.front, &mut img.pixels);
                self.back_index = (self.back_index + 1) % self.chain.len();
            }
            PresentStrategy::CopyBlit => {
                self.front.clear();
                self.front.extend_from_slice(&img.pixels);
            }
        }
        self.present_count += 1;
        self.last_present = Some(strategy);
        Ok(())
    }
}

/// Software rasterizer over one image's pixels.
struct RasterContext<'a> {
    extent: Extent,
    pixels: &'a mut Vec<u32>,
    images: &'a HashMap<DeviceImageId, SoftImage>,
}

impl RasterContext<'_> {
    fn put(&mut self, x: i32, y: i32, word: u32) {
        if x < 0 || y < 0 || x >= self.extent.width || y >= self.extent.height {
            return;
        }
        self.pixels[y as usize * self.extent.width as usize + x as usize] = word;
    }
}

impl DrawContext for RasterContext<'_> {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn clear(&mut self, color: Color) {
        self.pixels.fill(color.to_rgba());
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let word = color.to_rgba();
        let x0 = rect.corner.x.max(0);
        let y0 = rect.corner.y.max(0);
        let x1 = (rect.corner.x + rect.extent.width).min(self.extent.width);
        let y1 = (rect.corner.y + rect.extent.height).min(self.extent.height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.pixels[y as usize * self.extent.width as usize + x as usize] = word;
            }
        }
    }

    fn draw_line(&mut self, from: Point, to: Point, color: Color) {
        // Bresenham.
        let word = color.to_rgba();
        let (mut x, mut y) = (from.x, from.y);
        let dx = (to.x - from.x).abs();
        let dy = -(to.y - from.y).abs();
        let sx = if from.x < to.x { 1 } else { -1 };
        let sy = if from.y < to.y { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, word);
            if x == to.x && y == to.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn draw_point(&mut self, at: Point, color: Color) {
        self.put(at.x, at.y, color.to_rgba());
    }

    fn blit(&mut self, src: DeviceImageId, at: Point) -> RenderResult<()> {
        let img = self
            .images
            .get(&src)
            .ok_or(RenderError::UnknownImage(src))?;
        if img.contents != ImageContents::Intact {
            // Blitting unrevalidated storage would put garbage on screen.
            return Err(RenderError::TransientSurfaceLoss);
        }
        for sy in 0..img.extent.height {
            let dy = at.y + sy;
            if dy < 0 || dy >= self.extent.height {
                continue;
            }
            for sx in 0..img.extent.width {
                let dx = at.x + sx;
                if dx < 0 || dx >= self.extent.width {
                    continue;
                }
                let word = img.pixels[sy as usize * img.extent.width as usize + sx as usize];
                self.pixels[dy as usize * self.extent.width as usize + dx as usize] = word;
            }
        }
        Ok(())
    }
}
