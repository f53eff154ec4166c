//! SDL2-backed window host.
//!
//! Image allocation, validity tracking, and rasterization are delegated to
//! the software host; SDL2 contributes the window, the accelerated
//! renderer, and presentation by streaming-texture upload. SDL reports
//! device-side loss through `RenderTargetsReset`/`RenderDeviceReset`
//! events, which surface here as content-loss and device-lost notices.
//!
//! SDL2 must be initialized and used on the main thread; with this backend
//! the designated render thread of the dispatch layer has to be that
//! thread.

use sdl2::event::{Event, WindowEvent};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureAccess};
use sdl2::video::Window;

use log::{debug, info};

use crate::backend::soft::SoftHost;
use crate::error::{RenderError, RenderResult};
use crate::geom::Extent;
use crate::host::{
    Backing, BufferCaps, DeviceImageId, HostNotice, ImageContents, PaintFn, PresentStrategy,
    WindowHost,
};

#[cfg(target_endian = "big")]
const PIXEL_FORMAT: PixelFormatEnum = PixelFormatEnum::RGBA8888;

#[cfg(target_endian = "little")]
const PIXEL_FORMAT: PixelFormatEnum = PixelFormatEnum::ABGR8888;

/// Window host backed by an SDL2 window and accelerated renderer.
pub struct SdlHost {
    /// Pixel bookkeeping and rasterization.
    soft: SoftHost,
    canvas: Canvas<Window>,
    event_pump: sdl2::EventPump,
    _sdl: sdl2::Sdl,
    _video: sdl2::VideoSubsystem,
}

impl SdlHost {
    /// Initialize SDL2, create the window and renderer.
    pub fn create(title: &str, logical: Extent) -> RenderResult<Self> {
        if logical.is_empty() {
            return Err(RenderError::Host(format!(
                "window size must be positive, got {}x{}",
                logical.width, logical.height
            )));
        }

        let sdl = sdl2::init().map_err(|e| RenderError::Host(format!("SDL2 init: {}", e)))?;
        let video = sdl
            .video()
            .map_err(|e| RenderError::Host(format!("video subsystem: {}", e)))?;
        info!("SDL2 video driver: {}", video.current_video_driver());

        let window = video
            .window(title, logical.width as u32, logical.height as u32)
            .position_centered()
            .build()
            .map_err(|e| RenderError::Host(format!("window creation: {}", e)))?;

        let event_pump = sdl
            .event_pump()
            .map_err(|e| RenderError::Host(format!("event pump: {}", e)))?;

        let canvas = window
            .into_canvas()
            .accelerated()
            .build()
            .map_err(|e| RenderError::Host(format!("renderer creation: {}", e)))?;
        info!("SDL2 renderer: {}", canvas.info().name);

        let mut soft = SoftHost::new(logical);
        soft.set_displayable(true);
        soft.set_caps(BufferCaps {
            accelerated: true,
            // SDL2's renderer abstracts presentation; buffer roles cannot
            // be swapped without a copy through a texture.
            flip: false,
            max_surfaces: 2,
        });

        Ok(Self {
            soft,
            canvas,
            event_pump,
            _sdl: sdl,
            _video: video,
        })
    }

    /// Drain pending SDL events into host notices for the render gate.
    ///
    /// Quit and input events are not this layer's business and are dropped;
    /// callers needing them should own the event pump themselves and feed
    /// the gate directly.
    pub fn pump_notices(&mut self) -> Vec<HostNotice> {
        let mut notices = Vec::new();
        for event in self.event_pump.poll_iter() {
            match event {
                Event::RenderTargetsReset { .. } | Event::RenderDeviceReset { .. } => {
                    debug!("SDL2 render targets reset");
                    notices.push(HostNotice::DeviceLost);
                }
                Event::Window { win_event, .. } => match win_event {
                    WindowEvent::Exposed => notices.push(HostNotice::RedrawRequested),
                    WindowEvent::SizeChanged(w, h) | WindowEvent::Resized(w, h) => {
                        self.soft.set_logical_size(Extent::new(w, h));
                        notices.push(HostNotice::ResizeDelta(Extent::new(w, h)));
                    }
                    WindowEvent::Shown => {
                        self.soft.set_displayable(true);
                        notices.push(HostNotice::VisibilityChanged(true));
                    }
                    WindowEvent::Hidden | WindowEvent::Minimized => {
                        notices.push(HostNotice::VisibilityChanged(false));
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        notices
    }

    fn upload_front(&mut self) -> RenderResult<()> {
        let extent = self.back_extent()?;
        let back = self
            .soft
            .back_buffer()
            .ok_or_else(|| RenderError::Host("present without a swap chain".into()))?;
        let pixels = self
            .soft
            .image_pixels(back)
            .ok_or(RenderError::UnknownImage(back))?;

        let mut bytes = Vec::with_capacity(pixels.len() * 4);
        for word in pixels {
            bytes.extend_from_slice(&word.to_be_bytes());
        }

        let texture_creator = self.canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture(
                PIXEL_FORMAT,
                TextureAccess::Streaming,
                extent.width as u32,
                extent.height as u32,
            )
            .map_err(|e| RenderError::Host(format!("frame texture: {}", e)))?;
        texture
            .update(None, &bytes, extent.width as usize * 4)
            .map_err(|e| RenderError::Host(format!("texture upload: {}", e)))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| RenderError::Host(format!("render copy: {}", e)))?;
        self.canvas.present();
        Ok(())
    }

    fn back_extent(&self) -> RenderResult<Extent> {
        let (w, h) = self.canvas.logical_size();
        if w == 0 || h == 0 {
            Ok(self.soft.logical_size())
        } else {
            Ok(Extent::new(w as i32, h as i32))
        }
    }
}

impl WindowHost for SdlHost {
    fn is_displayable(&self) -> bool {
        self.soft.is_displayable()
    }

    fn buffer_caps(&self) -> BufferCaps {
        self.soft.buffer_caps()
    }

    fn logical_size(&self) -> Extent {
        self.soft.logical_size()
    }

    fn alloc_image(&mut self, extent: Extent, backing: Backing) -> RenderResult<DeviceImageId> {
        self.soft.alloc_image(extent, backing)
    }

    fn free_image(&mut self, id: DeviceImageId) {
        self.soft.free_image(id);
    }

    fn image_contents(&self, id: DeviceImageId) -> ImageContents {
        self.soft.image_contents(id)
    }

    fn restore_image(&mut self, id: DeviceImageId) -> RenderResult<()> {
        self.soft.restore_image(id)
    }

    fn paint(&mut self, target: DeviceImageId, f: PaintFn<'_>) -> RenderResult<()> {
        self.soft.paint(target, f)
    }

    fn create_buffer_chain(&mut self, count: usize, extent: Extent) -> RenderResult<()> {
        self.soft.create_buffer_chain(count, extent)
    }

    fn destroy_buffer_chain(&mut self) {
        self.soft.destroy_buffer_chain();
    }

    fn back_buffer(&self) -> Option<DeviceImageId> {
        self.soft.back_buffer()
    }

    fn present(&mut self, _strategy: PresentStrategy) -> RenderResult<()> {
        // The copy through the streaming texture makes every present a
        // blit at the SDL level, whatever the negotiated strategy says.
        self.upload_front()?;
        self.soft.present(PresentStrategy::CopyBlit)
    }
}
