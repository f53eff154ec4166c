//! Integration tests for frame pacing, buffer flipping, and surface
//! regeneration, driven through the software host.

use std::sync::Arc;

use rstest::rstest;

use framegate::backend::soft::SoftHost;
use framegate::{
    Color, DrawContext, Extent, FrameConfig, FramePainter, HostNotice, Point, Rect, RenderError,
    RenderGate, RenderHandle, Revalidation, SurfaceCache, SurfaceKey, VolatileSurface,
};

const SPRITE: SurfaceKey = SurfaceKey::new(1);

/// Painter that keeps one cached sprite and blits it each frame.
struct SpritePainter {
    frame: u32,
}

impl SpritePainter {
    fn new() -> Self {
        Self { frame: 0 }
    }
}

impl FramePainter for SpritePainter {
    fn prepare(
        &mut self,
        host: &mut dyn framegate::WindowHost,
        cache: &mut SurfaceCache,
    ) -> Result<(), RenderError> {
        cache.get_or_create(
            host,
            SPRITE,
            Extent::new(4, 4),
            Arc::new(|ctx| {
                ctx.clear(Color::rgb(0, 0, 0));
                ctx.fill_rect(
                    Rect::new(Point::new(1, 1), Extent::new(2, 2)),
                    Color::rgb(255, 128, 0),
                );
                Ok(())
            }),
        )?;
        Ok(())
    }

    fn paint(&mut self, ctx: &mut dyn DrawContext, cache: &SurfaceCache) -> Result<(), RenderError> {
        self.frame += 1;
        ctx.clear(Color::rgb(0, 0, 64));
        if let Some(sprite) = cache.get(SPRITE) {
            ctx.blit(sprite.image_id(), Point::new(2, 2))?;
        }
        Ok(())
    }
}

fn sprite_gate() -> RenderGate {
    RenderGate::new(
        FrameConfig::new(Extent::new(16, 16)),
        Box::new(SpritePainter::new()),
    )
    .expect("gate")
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(10)]
fn n_renders_produce_exactly_n_commits(#[case] n: usize) {
    let mut host = SoftHost::new(Extent::new(16, 16));
    let mut gate = sprite_gate();

    for i in 0..n {
        // External redraw requests interleaved between ticks must add
        // nothing.
        gate.notice(&mut host, HostNotice::RedrawRequested)
            .expect("notice");
        gate.render_now(&mut host).expect("render");
        gate.notice(&mut host, HostNotice::RedrawRequested)
            .expect("notice");
        assert_eq!(host.present_count(), (i + 1) as u64);
    }

    assert_eq!(gate.frames_committed(), n as u64);
    assert_eq!(host.present_count(), n as u64);
    assert_eq!(gate.suppressed_redraws(), 2 * n as u64);
}

#[test]
fn device_loss_regenerates_identical_content() {
    let mut host = SoftHost::new(Extent::new(16, 16));
    let mut gate = sprite_gate();

    gate.render_now(&mut host).expect("render");
    let sprite_id = gate.cache().get(SPRITE).expect("sprite").image_id();
    let original = host.image_pixels(sprite_id).expect("pixels").to_vec();
    let shown = host.front_pixels().to_vec();

    host.lose_image(sprite_id);
    gate.render_now(&mut host).expect("render after loss");

    let regenerated = host.image_pixels(sprite_id).expect("pixels").to_vec();
    assert_eq!(
        original, regenerated,
        "deterministic producer must regenerate pixel-identical content"
    );
    assert_eq!(
        host.front_pixels(),
        &shown[..],
        "the displayed frame must look the same after regeneration"
    );
}

#[test]
fn whole_cache_invalidation_on_device_lost_notice() {
    let mut host = SoftHost::new(Extent::new(16, 16));
    let mut gate = sprite_gate();

    gate.render_now(&mut host).expect("render");
    let before = host.front_pixels().to_vec();

    gate.notice(&mut host, HostNotice::DeviceLost).expect("notice");
    assert!(!gate.cache().get(SPRITE).expect("sprite").is_valid());

    gate.render_now(&mut host).expect("render after device loss");
    assert_eq!(host.front_pixels(), &before[..]);
}

#[test]
fn injected_draw_fault_never_reaches_display() {
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FaultyPainter {
        fail_next: Arc<AtomicBool>,
    }
    impl FramePainter for FaultyPainter {
        fn paint(
            &mut self,
            ctx: &mut dyn DrawContext,
            _cache: &SurfaceCache,
        ) -> Result<(), RenderError> {
            if self.fail_next.load(Ordering::Relaxed) {
                ctx.clear(Color::rgb(255, 0, 255));
                return Err(RenderError::Host("injected fault".into()));
            }
            ctx.clear(Color::rgb(0, 255, 0));
            Ok(())
        }
    }

    let fail_next = Arc::new(AtomicBool::new(false));
    let mut host = SoftHost::new(Extent::new(8, 8));
    let mut gate = RenderGate::new(
        FrameConfig::new(Extent::new(8, 8)),
        Box::new(FaultyPainter {
            fail_next: Arc::clone(&fail_next),
        }),
    )
    .expect("gate");

    gate.render_now(&mut host).expect("good frame");
    let shown = host.front_pixels().to_vec();
    assert_eq!(shown[0], Color::rgb(0, 255, 0).to_rgba());

    // The faulting frame is abandoned: no present, display unchanged even
    // though the draw callback scribbled on the back buffer.
    fail_next.store(true, Ordering::Relaxed);
    assert!(gate.render_now(&mut host).is_err());
    assert_eq!(host.present_count(), 1);
    assert_eq!(host.front_pixels(), &shown[..]);

    // The next good frame renders normally.
    fail_next.store(false, Ordering::Relaxed);
    gate.render_now(&mut host).expect("recovery frame");
    assert_eq!(host.present_count(), 2);
}

#[rstest]
#[case(1)]
#[case(4)]
#[case(12)]
fn resize_gesture_reallocates_at_most_once(#[case] deltas: usize) {
    let mut host = SoftHost::new(Extent::new(16, 16));
    let mut gate = sprite_gate();
    gate.render_now(&mut host).expect("render");
    let builds = host.chain_builds();

    gate.notice(&mut host, HostNotice::ResizeStart).expect("start");
    for i in 0..deltas {
        gate.notice(
            &mut host,
            HostNotice::ResizeDelta(Extent::new(16 + i as i32, 16)),
        )
        .expect("delta");
    }
    assert_eq!(host.chain_builds(), builds);

    gate.notice(&mut host, HostNotice::ResizeEnd(Extent::new(32, 24)))
        .expect("end");
    assert_eq!(host.chain_builds(), builds + 1);

    // Rendering continues at the new size.
    gate.render_now(&mut host).expect("render after resize");
    assert_eq!(host.front_pixels().len(), 32 * 24);
}

#[test]
fn cache_returns_same_surface_for_same_key() {
    let mut host = SoftHost::new(Extent::new(16, 16));
    let mut cache = SurfaceCache::new(true);
    let producer: framegate::SurfaceProducer = Arc::new(|ctx| {
        ctx.clear(Color::rgb(10, 10, 10));
        Ok(())
    });

    let first = cache
        .get_or_create(&mut host, SurfaceKey::new(9), Extent::new(4, 4), producer.clone())
        .expect("first")
        .image_id();
    let second = cache
        .get_or_create(&mut host, SurfaceKey::new(9), Extent::new(4, 4), producer)
        .expect("second")
        .image_id();
    assert_eq!(first, second);
    assert_eq!(host.live_images(), 1);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "in flight")]
fn reentrant_render_aborts_loudly_in_debug_builds() {
    let mut host = SoftHost::new(Extent::new(8, 8));
    let mut gate = sprite_gate();
    gate.render_now(&mut host).expect("warm up");

    gate.target_mut().expect("target").begin_paint().expect("begin");
    let _ = gate.render_now(&mut host);
}

#[cfg(not(debug_assertions))]
#[test]
fn reentrant_render_fails_and_in_flight_frame_completes() {
    let mut host = SoftHost::new(Extent::new(8, 8));
    let mut gate = sprite_gate();
    gate.render_now(&mut host).expect("warm up");

    gate.target_mut().expect("target").begin_paint().expect("begin");
    assert_eq!(
        gate.render_now(&mut host).err(),
        Some(RenderError::ReentrantRender)
    );

    let target = gate.target_mut().expect("target");
    target
        .paint_with(&mut host, &mut |ctx| {
            ctx.clear(Color::rgb(8, 8, 8));
            Ok(())
        })
        .expect("paint");
    target.commit(&mut host).expect("commit");
    assert_eq!(host.present_count(), 2);
    assert_eq!(host.front_pixels()[0], Color::rgb(8, 8, 8).to_rgba());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "displayable")]
fn render_before_visibility_aborts_loudly_in_debug_builds() {
    let mut host = SoftHost::new(Extent::new(8, 8));
    host.set_displayable(false);
    let mut gate = sprite_gate();
    let _ = gate.render_now(&mut host);
}

#[cfg(not(debug_assertions))]
#[test]
fn render_before_visibility_fails_in_release_builds() {
    let mut host = SoftHost::new(Extent::new(8, 8));
    host.set_displayable(false);
    let mut gate = sprite_gate();
    assert_eq!(
        gate.render_now(&mut host).err(),
        Some(RenderError::NotYetDisplayable)
    );
    assert_eq!(host.present_count(), 0);
}

#[test]
fn target_construction_waits_for_visibility() {
    let mut host = SoftHost::new(Extent::new(8, 8));
    host.set_displayable(false);
    let mut gate = sprite_gate();
    assert!(!gate.is_ready());

    host.set_displayable(true);
    gate.notice(&mut host, HostNotice::VisibilityChanged(true))
        .expect("notice");
    gate.render_now(&mut host).expect("render once visible");
    assert_eq!(host.present_count(), 1);
}

#[test]
fn degraded_surfaces_still_render_correctly() {
    let mut host = SoftHost::new(Extent::new(16, 16));
    host.deny_device_alloc(true);
    let mut gate = sprite_gate();

    gate.render_now(&mut host).expect("render degraded");
    let sprite = gate.cache().get(SPRITE).expect("sprite");
    assert!(sprite.is_degraded());
    // Blit output is identical, just unaccelerated.
    let shown = host.front_pixels();
    let w = 16usize;
    assert_eq!(shown[3 * w + 3], Color::rgb(255, 128, 0).to_rgba());
}

#[test]
fn storage_destruction_survives_a_frame() {
    let mut host = SoftHost::new(Extent::new(16, 16));
    let mut gate = sprite_gate();
    gate.render_now(&mut host).expect("render");

    let sprite_id = gate.cache().get(SPRITE).expect("sprite").image_id();
    host.destroy_image(sprite_id);
    gate.render_now(&mut host).expect("render after destruction");

    let sprite = gate.cache().get(SPRITE).expect("sprite");
    assert_ne!(sprite.image_id(), sprite_id, "storage must be reallocated");
    assert!(sprite.is_valid());
}

#[test]
fn game_loop_thread_blocks_until_each_frame_commits() {
    let handle = RenderHandle::spawn("render", || {
        let host = SoftHost::new(Extent::new(16, 16));
        let gate = RenderGate::new(
            FrameConfig::new(Extent::new(16, 16)),
            Box::new(SpritePainter::new()),
        )?;
        Ok((host, gate))
    })
    .expect("spawn");

    let loop_thread = std::thread::spawn(move || {
        for _ in 0..20 {
            handle.render_now().expect("render");
            handle.notice(HostNotice::RedrawRequested).expect("notice");
        }
        handle.shutdown();
    });
    loop_thread.join().expect("game loop thread");
}

#[test]
fn volatile_surface_distinguishes_restore_from_reallocate() {
    let mut host = SoftHost::new(Extent::new(8, 8));
    let producer: framegate::SurfaceProducer = Arc::new(|ctx| {
        ctx.clear(Color::rgb(77, 77, 77));
        Ok(())
    });
    let mut surface =
        VolatileSurface::create(&mut host, Extent::new(4, 4), producer, true).expect("create");

    host.lose_image(surface.image_id());
    assert_eq!(
        surface.ensure_valid(&mut host).expect("ensure"),
        Revalidation::Restored
    );

    host.destroy_image(surface.image_id());
    assert_eq!(
        surface.ensure_valid(&mut host).expect("ensure"),
        Revalidation::Reallocated
    );
}
