// crates/mediaplay-engine/tests/queue_and_clock_coordination.rs
//
// Multi-component integration checks that don't need a real media file: they
// drive the packet/frame queues and clocks the way a demuxer + presenter
// pair would, with synthetic data standing in for decoded packets/frames.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use mediaplay_engine::clock::Clock;
use mediaplay_engine::frame::{AudioPayload, Frame, FramePayload};
use mediaplay_engine::frame_queue::FrameQueue;
use mediaplay_engine::packet_queue::{GetOutcome, PacketQueue};
use mediaplay_engine::presenter_video::{RefreshOutcome, SyncType, VideoPresenter};

fn dummy_frame(pts: f64, serial: i64) -> Frame {
    Frame {
        payload: FramePayload::Audio(AudioPayload { samples: vec![], sample_rate: 44100, channels: 2, nb_samples: 0 }),
        pts,
        duration: 0.04,
        pos: 0,
        serial,
    }
}

/// Every blocked reader across an audio, video, and subtitle packet queue
/// wakes within one notification once abort is set on all three (property 5,
/// generalized from the single-queue unit test to the three-queue shape a
/// real session actually runs).
#[test]
fn abort_wakes_every_queue_without_consuming() {
    let audio = PacketQueue::new();
    let video = PacketQueue::new();
    let subtitle = PacketQueue::new();
    for q in [&audio, &video, &subtitle] {
        q.start(0);
        q.get(false); // drain each queue's start() sentinel
    }

    let handles: Vec<_> = [audio.clone(), video.clone(), subtitle.clone()]
        .into_iter()
        .map(|q| std::thread::spawn(move || q.get(true)))
        .collect();

    std::thread::sleep(std::time::Duration::from_millis(50));
    audio.abort();
    video.abort();
    subtitle.abort();

    for handle in handles {
        assert!(matches!(handle.join().unwrap(), GetOutcome::Aborted));
    }
    assert_eq!(audio.nb_packets(), 0);
    assert_eq!(video.nb_packets(), 0);
    assert_eq!(subtitle.nb_packets(), 0);
}

/// Property 8: two successive seeks to the same target must land the master
/// clock on the same value (within one frame duration). A seek is modeled
/// here as "bump the serial, then set the clock to the target pts" — exactly
/// what `Demuxer`'s seek handling and the first post-seek frame's
/// `Clock::set` do, without needing an actual decode.
#[test]
fn repeated_seek_to_same_target_is_idempotent() {
    let serial = Arc::new(AtomicI64::new(0));
    let epoch = Instant::now();

    let seek_once = |serial: &Arc<AtomicI64>| -> f64 {
        serial.fetch_add(1, Ordering::SeqCst);
        let mut clock = Clock::new(epoch, serial.clone());
        clock.set(12.5, serial.load(Ordering::SeqCst));
        clock.get()
    };

    let first = seek_once(&serial);
    let second = seek_once(&serial);
    assert!((first - second).abs() <= 0.04, "first={first} second={second}");
}

/// S5-shaped: pausing and waiting does not let the frame timer fall behind
/// by the paused duration, so the next delay computation isn't artificially
/// shortened. Mirrors `toggle_pause`'s `account_for_pause` call.
#[test]
fn pause_then_resume_credits_paused_wall_time_to_frame_timer() {
    let epoch = Instant::now();
    let pktq = PacketQueue::new();
    pktq.start(0);
    let fq = FrameQueue::new(pktq, 3, true);
    let mut presenter = VideoPresenter::new(fq.clone(), epoch, 10.0, false);

    let idx = fq.peek_writable().ok().unwrap();
    fq.write_slot(idx, dummy_frame(5.0, 1));
    fq.push();

    let mut vc = Clock::new(epoch, Arc::new(AtomicI64::new(0)));
    let mut ec = Clock::new(epoch, Arc::new(AtomicI64::new(0)));
    vc.set(5.0, 0);

    let before_pause = presenter.frame_timer_value();
    std::thread::sleep(std::time::Duration::from_millis(30));
    presenter.account_for_pause(vc.last_updated());
    assert!(presenter.frame_timer_value() > before_pause);

    match presenter.tick(SyncType::Video, &mut vc, 5.0, &mut ec, false) {
        RefreshOutcome::Present { remaining, .. } => assert!(remaining >= 0.0),
        RefreshOutcome::Wait { remaining } => assert!(remaining >= 0.0),
    }
}
