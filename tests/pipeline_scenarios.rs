use std::time::{Duration, Instant};

use eframe::egui::vec2;
use rstest::rstest;

use sentinel_renderer::channel::{read_updates, LatestSlot, ModeUpdate};
use sentinel_renderer::compositor::style_color;
use sentinel_renderer::field::{self, Particle, INIT_FRAMES};
use sentinel_renderer::frame::FrameContext;
use sentinel_renderer::{EntityPipeline, Mode, RendererConfig};

fn alert(timestamp: u64) -> ModeUpdate {
    ModeUpdate::new(Mode::Alert, 1.0, timestamp)
}

fn pipeline(t0: Instant) -> EntityPipeline {
    let config = RendererConfig {
        field_entries: 256,
        ..RendererConfig::default()
    };
    EntityPipeline::new(&config, 24, 16, t0)
}

#[test]
fn idle_to_alert_is_half_blended_halfway_through() {
    let t0 = Instant::now();
    let mut pipeline = pipeline(t0);
    pipeline.frame(t0);
    assert!(pipeline.observe(alert(1), t0));

    pipeline.frame(t0 + Duration::from_millis(375));
    let ctx = *pipeline.last_context().unwrap();
    assert_eq!((ctx.current_mode, ctx.target_mode), (Mode::Idle, Mode::Alert));
    assert!((ctx.blend_factor - 0.5).abs() < 1.0e-3, "blend {}", ctx.blend_factor);

    let rel = vec2(0.02, -0.01);
    let with_blend = |blend_factor| FrameContext { blend_factor, ..ctx };
    let from = style_color(&with_blend(0.0), rel);
    let to = style_color(&with_blend(1.0), rel);
    let mid = style_color(&ctx, rel);
    for i in 0..3 {
        let expected = from[i] + (to[i] - from[i]) * ctx.blend_factor;
        assert!((mid[i] - expected).abs() < 1.0e-5);
    }
}

#[test]
fn repeated_target_restarts_the_clock_once() {
    let t0 = Instant::now();
    let mut pipeline = pipeline(t0);
    assert!(pipeline.observe(alert(1), t0));
    assert!(!pipeline.observe(alert(2), t0 + Duration::from_millis(50)));

    pipeline.frame(t0 + Duration::from_millis(375));
    let blend = pipeline.transition().blend_factor();
    assert!((blend - 0.5).abs() < 1.0e-3, "blend {blend}");
}

#[tokio::test]
async fn malformed_message_leaves_transition_untouched() {
    let t0 = Instant::now();
    let at = |ms| t0 + Duration::from_millis(ms);
    let input = concat!(
        "{\"type\":\"state\",\"state\":\"curious\",\"intensity\":0.4,\"timestamp\":1}\n",
        "{\"type\":\"state\"}\n",
    );

    let slot = LatestSlot::new();
    assert_eq!(read_updates(input.as_bytes(), &slot).await, 1);

    let mut fed = pipeline(t0);
    let mut reference = pipeline(t0);
    fed.frame(at(0));
    reference.frame(at(0));

    let update = slot.take().unwrap();
    fed.observe(update, at(10));
    reference.observe(ModeUpdate::new(Mode::Curious, 0.4, 1), at(10));

    // The bad line produced nothing, so a later poll finds the slot empty.
    assert_eq!(slot.take(), None);
    for ms in [100, 200, 300] {
        fed.frame(at(ms));
        reference.frame(at(ms));
    }

    let state = *fed.transition().state();
    assert_eq!(state, *reference.transition().state());
    assert_eq!((state.current_mode, state.target_mode), (Mode::Idle, Mode::Curious));
    assert!(state.blend_factor > 0.0);
}

#[rstest]
#[case(Mode::Idle)]
#[case(Mode::Curious)]
#[case(Mode::Focused)]
#[case(Mode::Amused)]
#[case(Mode::Alert)]
#[case(Mode::Sleepy)]
fn entry_on_the_swarm_center_stays_finite(#[case] mode: Mode) {
    let at = vec2(0.1, -0.05);
    let entry = Particle {
        position: at,
        velocity: vec2(0.0, 0.0),
    };
    let prev = vec![entry; 128];
    assert_eq!(field::swarm_center(&prev), at);

    let mut next = prev.clone();
    let mut ctx = FrameContext::at_rest(mode, INIT_FRAMES + 3);
    ctx.goal = at;
    field::step(&prev, &mut next, &ctx, 21);
    for p in &next {
        assert!(p.velocity.x.is_finite() && p.velocity.y.is_finite(), "{mode}: {p:?}");
        assert!(p.position.x.is_finite() && p.position.y.is_finite());
    }
}

#[test]
fn long_run_through_every_mode_stays_in_display_range() {
    let t0 = Instant::now();
    let mut pipeline = pipeline(t0);
    let mut now = t0;
    for (i, mode) in Mode::ALL.into_iter().enumerate() {
        pipeline.observe(ModeUpdate::new(mode, 0.8, i as u64), now);
        for _ in 0..30 {
            now += Duration::from_millis(33);
            let image = pipeline.frame(now);
            assert!(image.iter().flatten().all(|c| (0.0..=1.0).contains(c)));
        }
    }
    let [w, h] = pipeline.render_dimensions();
    assert_eq!((w, h), (24, 16));
}

#[cfg(unix)]
#[test]
fn listener_delivers_socket_updates_to_the_slot() {
    use sentinel_renderer::channel::{ListenerConfig, ModeListener};
    use std::io::Write;
    use std::os::unix::net::UnixListener;

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("sentinel.sock");
    let server = UnixListener::bind(&socket_path).unwrap();

    let slot = LatestSlot::new();
    let listener = ModeListener::spawn(
        ListenerConfig {
            socket_path,
            reconnect_delay: Duration::from_millis(20),
        },
        slot.clone(),
    )
    .unwrap();

    let (mut stream, _) = server.accept().unwrap();
    stream
        .write_all(b"{\"type\":\"state\",\"state\":\"amused\",\"intensity\":0.6,\"timestamp\":9}\n")
        .unwrap();
    stream.flush().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let update = loop {
        if let Some(update) = slot.take() {
            break update;
        }
        assert!(Instant::now() < deadline, "no update arrived");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(update, ModeUpdate::new(Mode::Amused, 0.6, 9));
    drop(listener);
}

#[cfg(unix)]
#[test]
fn restarted_observer_with_an_earlier_clock_is_heard() {
    use sentinel_renderer::channel::{ListenerConfig, ModeListener};
    use std::io::Write;
    use std::os::unix::net::UnixListener;

    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("sentinel.sock");
    let server = UnixListener::bind(&socket_path).unwrap();

    let slot = LatestSlot::new();
    let listener = ModeListener::spawn(
        ListenerConfig {
            socket_path,
            reconnect_delay: Duration::from_millis(20),
        },
        slot.clone(),
    )
    .unwrap();

    let wait_for = |slot: &LatestSlot| {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(update) = slot.take() {
                return update;
            }
            assert!(Instant::now() < deadline, "no update arrived");
            std::thread::sleep(Duration::from_millis(10));
        }
    };

    let (mut first, _) = server.accept().unwrap();
    let line = concat!(
        "{\"type\":\"state\",\"state\":\"alert\",",
        "\"intensity\":1.0,\"timestamp\":1000000}\n",
    );
    first.write_all(line.as_bytes()).unwrap();
    assert_eq!(wait_for(&slot).timestamp, 1_000_000);
    drop(first);

    let (mut second, _) = server.accept().unwrap();
    let line = concat!(
        "{\"type\":\"state\",\"state\":\"sleepy\",",
        "\"intensity\":0.3,\"timestamp\":5}\n",
    );
    second.write_all(line.as_bytes()).unwrap();
    assert_eq!(wait_for(&slot), ModeUpdate::new(Mode::Sleepy, 0.3, 5));
    drop(listener);
}
