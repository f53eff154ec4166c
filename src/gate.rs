//! Render gate: the sole authority for redraw scheduling.
//!
//! The host's default behavior is to repaint on arbitrary system and input
//! events (exposure, decorations, focus). Interleaved with a game loop's
//! own renders, that doubles work and tears frames between two cadences.
//! The gate swallows every externally-triggered repaint and exposes exactly
//! one privileged entry point, [`RenderGate::render_now`], used only by the
//! game loop.

use log::{debug, error, trace};

use crate::config::FrameConfig;
use crate::error::{RenderError, RenderResult};
use crate::flip::{FlipBufferTarget, PaintPhase};
use crate::geom::Extent;
use crate::host::{DrawContext, HostNotice, WindowHost};
use crate::resize::ResizeFreeze;
use crate::surface::SurfaceCache;

/// The privileged frame painter installed into the gate's single callback
/// slot.
///
/// A frame renders in two steps that share one render tick:
/// `prepare` revalidates or creates the cached surfaces the frame will use
/// (it has host access for device allocation), then `paint` draws
/// primitives and blits into the back buffer, resolving blit handles
/// through the cache it prepared.
pub trait FramePainter {
    /// Revalidate or create cached surfaces for this frame.
    fn prepare(&mut self, host: &mut dyn WindowHost, cache: &mut SurfaceCache) -> RenderResult<()> {
        let _ = (host, cache);
        Ok(())
    }

    /// Draw the frame into the back buffer.
    fn paint(&mut self, ctx: &mut dyn DrawContext, cache: &SurfaceCache) -> RenderResult<()>;
}

impl<F> FramePainter for F
where
    F: FnMut(&mut dyn DrawContext, &SurfaceCache) -> RenderResult<()>,
{
    fn paint(&mut self, ctx: &mut dyn DrawContext, cache: &SurfaceCache) -> RenderResult<()> {
        self(ctx, cache)
    }
}

/// Render-scheduling controller owning the flip target, the surface cache,
/// and the resize freeze.
pub struct RenderGate {
    config: FrameConfig,
    target: Option<FlipBufferTarget>,
    cache: SurfaceCache,
    freeze: ResizeFreeze,
    painter: Box<dyn FramePainter>,
    suppressed_redraws: u64,
    frames_committed: u64,
}

impl RenderGate {
    /// Create a gate with the given painter.
    ///
    /// The flip target is constructed lazily: if the window is not yet
    /// displayable, construction is retried on the next visibility notice
    /// or render call.
    pub fn new(config: FrameConfig, painter: Box<dyn FramePainter>) -> RenderResult<Self> {
        config.validate()?;
        Ok(Self {
            cache: SurfaceCache::new(config.allow_degraded),
            config,
            target: None,
            freeze: ResizeFreeze::new(),
            painter,
            suppressed_redraws: 0,
            frames_committed: 0,
        })
    }

    /// Render the next completed frame. The single privileged entry point,
    /// called once per game tick, on the designated render thread.
    ///
    /// Synchronous: when this returns `Ok`, the frame has been committed to
    /// the display. Fails fast with [`RenderError::ReentrantRender`] if a
    /// frame is already in flight (the in-flight frame still completes) and
    /// with [`RenderError::NotYetDisplayable`] before the window is
    /// realized. Both are usage defects: debug builds abort on them via
    /// `debug_assert!`; release builds log at error level and skip the
    /// frame, never queue it.
    pub fn render_now(&mut self, host: &mut dyn WindowHost) -> RenderResult<()> {
        if self.target.is_none() {
            match FlipBufferTarget::create(host, &self.config) {
                Ok(target) => self.target = Some(target),
                Err(e) => {
                    error!("render skipped: {}", e);
                    debug_assert!(
                        !matches!(e, RenderError::NotYetDisplayable),
                        "render_now before the window surface is displayable"
                    );
                    return Err(e);
                }
            }
        }

        let Some(target) = self.target.as_mut() else {
            return Err(RenderError::NotYetDisplayable);
        };

        // Reentrancy is rejected before the painter runs, so a rejected
        // render leaves the surface cache untouched.
        debug_assert!(
            target.phase() == PaintPhase::Idle,
            "render_now called while a frame is in flight"
        );
        if let Err(e) = target.begin_paint() {
            error!("render rejected: {}", e);
            return Err(e);
        }

        if let Err(e) = self.painter.prepare(host, &mut self.cache) {
            if let Some(target) = self.target.as_mut() {
                target.abandon();
            }
            return Err(e);
        }

        let painter = &mut self.painter;
        let cache = &self.cache;
        let Some(target) = self.target.as_mut() else {
            return Err(RenderError::NotYetDisplayable);
        };
        target.paint_with(host, &mut |ctx| painter.paint(ctx, cache))?;
        target.commit(host)?;
        self.frames_committed += 1;
        Ok(())
    }

    /// Entry point for the host's default repaint machinery. Its entire
    /// contract is: do nothing, ever.
    pub fn suppressed_redraw(&mut self) {
        self.suppressed_redraws += 1;
        trace!("external redraw request swallowed");
    }

    /// Deliver a host notification.
    pub fn notice(&mut self, host: &mut dyn WindowHost, notice: HostNotice) -> RenderResult<()> {
        match notice {
            HostNotice::RedrawRequested => {
                self.suppressed_redraw();
                Ok(())
            }
            HostNotice::DeviceLost => {
                debug!("device/context lost, invalidating surface cache");
                self.cache.invalidate_all();
                Ok(())
            }
            HostNotice::ResizeStart => {
                self.freeze.on_resize_start();
                Ok(())
            }
            HostNotice::ResizeDelta(extent) => match self.freeze.on_resize_delta(extent) {
                Some(extent) => self.apply_resize(host, extent),
                None => Ok(()),
            },
            HostNotice::ResizeEnd(extent) => match self.freeze.on_resize_end(extent) {
                Some(extent) => self.apply_resize(host, extent),
                None => Ok(()),
            },
            HostNotice::VisibilityChanged(visible) => {
                if visible && self.target.is_none() {
                    match FlipBufferTarget::create(host, &self.config) {
                        Ok(target) => self.target = Some(target),
                        Err(RenderError::NotYetDisplayable) => {
                            debug!("target construction still deferred, window not displayable");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
        }
    }

    /// Free all device resources owned by the gate.
    pub fn shutdown(&mut self, host: &mut dyn WindowHost) {
        self.cache.clear(host);
        if self.target.take().is_some() {
            host.destroy_buffer_chain();
        }
    }

    /// The one corrective layout pass per resize gesture.
    fn apply_resize(&mut self, host: &mut dyn WindowHost, extent: Extent) -> RenderResult<()> {
        self.config.logical = extent;
        if let Some(target) = self.target.as_mut() {
            target.resize(host, extent)?;
        }
        Ok(())
    }

    /// Whether the flip target has been constructed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.target.is_some()
    }

    #[must_use]
    pub fn suppressed_redraws(&self) -> u64 {
        self.suppressed_redraws
    }

    #[must_use]
    pub fn frames_committed(&self) -> u64 {
        self.frames_committed
    }

    #[must_use]
    pub fn cache(&self) -> &SurfaceCache {
        &self.cache
    }

    #[must_use]
    pub fn cache_mut(&mut self) -> &mut SurfaceCache {
        &mut self.cache
    }

    #[must_use]
    pub fn target(&self) -> Option<&FlipBufferTarget> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn target_mut(&mut self) -> Option<&mut FlipBufferTarget> {
        self.target.as_mut()
    }

    #[must_use]
    pub fn freeze(&self) -> &ResizeFreeze {
        &self.freeze
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftHost;
    use crate::geom::Color;

    fn solid_painter(color: Color) -> Box<dyn FramePainter> {
        Box::new(move |ctx: &mut dyn DrawContext, _cache: &SurfaceCache| {
            ctx.clear(color);
            Ok(())
        })
    }

    #[test]
    fn test_render_now_commits_one_frame() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(7, 7, 7)),
        )
        .expect("gate");

        gate.render_now(&mut host).expect("render");
        assert_eq!(gate.frames_committed(), 1);
        assert_eq!(host.present_count(), 1);
        assert_eq!(host.front_pixels()[0], Color::rgb(7, 7, 7).to_rgba());
    }

    #[test]
    fn test_redraw_requests_are_swallowed() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");

        for _ in 0..10 {
            gate.notice(&mut host, HostNotice::RedrawRequested)
                .expect("notice");
        }
        assert_eq!(gate.suppressed_redraws(), 10);
        assert_eq!(host.present_count(), 0, "no redraw may reach the display");
    }

    #[test]
    fn test_target_defers_until_visibility() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        host.set_displayable(false);
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");
        assert!(!gate.is_ready());

        host.set_displayable(true);
        gate.notice(&mut host, HostNotice::VisibilityChanged(true))
            .expect("notice");
        assert!(gate.is_ready());
        gate.render_now(&mut host).expect("render after visibility");
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "displayable")]
    fn test_render_before_visibility_aborts_in_debug() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        host.set_displayable(false);
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");
        let _ = gate.render_now(&mut host);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_render_before_visibility_fails_in_release() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        host.set_displayable(false);
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");
        assert_eq!(
            gate.render_now(&mut host).err(),
            Some(RenderError::NotYetDisplayable)
        );
        assert!(!gate.is_ready());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "in flight")]
    fn test_reentrant_render_aborts_in_debug() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(3, 3, 3)),
        )
        .expect("gate");
        gate.render_now(&mut host).expect("first render");

        // Simulate a frame left in flight, as a reentrant host callback
        // would observe.
        gate.target_mut()
            .expect("target")
            .begin_paint()
            .expect("begin");
        let _ = gate.render_now(&mut host);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_reentrant_render_fails_fast_in_release() {
        use crate::surface::SurfaceKey;
        use std::sync::Arc;

        struct CountingPainter {
            prepares: u32,
        }
        impl FramePainter for CountingPainter {
            fn prepare(
                &mut self,
                host: &mut dyn WindowHost,
                cache: &mut SurfaceCache,
            ) -> RenderResult<()> {
                self.prepares += 1;
                cache.get_or_create(
                    host,
                    SurfaceKey::new(self.prepares),
                    Extent::new(2, 2),
                    Arc::new(|ctx| {
                        ctx.clear(Color::rgb(1, 1, 1));
                        Ok(())
                    }),
                )?;
                Ok(())
            }

            fn paint(
                &mut self,
                ctx: &mut dyn DrawContext,
                _cache: &SurfaceCache,
            ) -> RenderResult<()> {
                ctx.clear(Color::rgb(3, 3, 3));
                Ok(())
            }
        }

        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            Box::new(CountingPainter { prepares: 0 }),
        )
        .expect("gate");
        gate.render_now(&mut host).expect("first render");
        let cached = gate.cache().len();

        // Simulate a frame left in flight, as a reentrant host callback
        // would observe.
        gate.target_mut()
            .expect("target")
            .begin_paint()
            .expect("begin");
        assert_eq!(
            gate.render_now(&mut host).err(),
            Some(RenderError::ReentrantRender)
        );
        // The rejected render never ran the painter's prepare step.
        assert_eq!(gate.cache().len(), cached);

        // The in-flight frame still completes and commits normally.
        let target = gate.target_mut().expect("target");
        target
            .paint_with(&mut host, &mut |ctx| {
                ctx.clear(Color::rgb(4, 4, 4));
                Ok(())
            })
            .expect("paint");
        target.commit(&mut host).expect("commit");
        assert_eq!(host.present_count(), 2);
    }

    #[test]
    fn test_prepare_failure_abandons_frame() {
        struct FailingPrepare;
        impl FramePainter for FailingPrepare {
            fn prepare(
                &mut self,
                _host: &mut dyn WindowHost,
                _cache: &mut SurfaceCache,
            ) -> RenderResult<()> {
                Err(RenderError::Host("prepare fault".into()))
            }

            fn paint(
                &mut self,
                _ctx: &mut dyn DrawContext,
                _cache: &SurfaceCache,
            ) -> RenderResult<()> {
                Ok(())
            }
        }

        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            Box::new(FailingPrepare),
        )
        .expect("gate");

        assert!(gate.render_now(&mut host).is_err());
        assert_eq!(host.present_count(), 0);
        // The paint protocol is back at rest; a later good render would
        // not see a stuck phase.
        assert_eq!(gate.target().expect("target").phase(), PaintPhase::Idle);
    }

    #[test]
    fn test_device_lost_invalidates_cache() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");

        use crate::surface::SurfaceKey;
        use std::sync::Arc;
        gate.cache_mut()
            .get_or_create(
                &mut host,
                SurfaceKey::new(1),
                Extent::new(2, 2),
                Arc::new(|ctx| {
                    ctx.clear(Color::rgb(5, 5, 5));
                    Ok(())
                }),
            )
            .expect("surface");

        gate.notice(&mut host, HostNotice::DeviceLost).expect("notice");
        let surface = gate.cache().get(SurfaceKey::new(1)).expect("entry");
        assert!(!surface.is_valid());
    }

    #[test]
    fn test_resize_gesture_reallocates_once() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");
        gate.render_now(&mut host).expect("render");
        let builds_before = host.chain_builds();

        gate.notice(&mut host, HostNotice::ResizeStart).expect("start");
        for i in 1..=6 {
            gate.notice(&mut host, HostNotice::ResizeDelta(Extent::new(8 + i, 8)))
                .expect("delta");
        }
        assert_eq!(host.chain_builds(), builds_before, "no reallocation mid-gesture");

        gate.notice(&mut host, HostNotice::ResizeEnd(Extent::new(20, 16)))
            .expect("end");
        assert_eq!(host.chain_builds(), builds_before + 1);
        assert_eq!(gate.target().expect("target").extent(), Extent::new(20, 16));
    }

    #[test]
    fn test_shutdown_releases_resources() {
        let mut host = SoftHost::new(Extent::new(8, 8));
        let mut gate = RenderGate::new(
            FrameConfig::new(Extent::new(8, 8)),
            solid_painter(Color::rgb(1, 1, 1)),
        )
        .expect("gate");
        gate.render_now(&mut host).expect("render");
        assert!(host.live_images() > 0);

        gate.shutdown(&mut host);
        assert!(!gate.is_ready());
        assert_eq!(host.live_images(), 0);
    }
}
