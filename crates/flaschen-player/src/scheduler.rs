//! Looping frame playback driven by a single owned timer task.
//!
//! Frame `i` is transmitted when its tick fires and held for its own delay,
//! measured from that tick, before frame `i + 1` fires; the sequence wraps
//! forever. A late tick never replays the frames it missed. Each tick checks,
//! under the scheduler lock, that its session is still the active one before
//! handing the frame to a send task owned by the session. Cancelling a
//! session aborts its timer and every send task it still owns, so once `play`
//! or `stop` returns no superseded send starts or resumes.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use flaschen_ops::EventBus;
use flaschen_transport::Transport;
use flaschen_types::{events::PlaybackEvent, frame::AnimationFrame, FlaschenError, Result};
use tokio::{
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Zero-delay frames are held for at least this long.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// `index` is the frame the pending timer will transmit next.
    Scheduled { session: Uuid, index: usize },
}

struct ActiveSession {
    id: Uuid,
    frame_count: usize,
    next_index: usize,
    timer: JoinHandle<()>,
    sends: Vec<JoinHandle<()>>,
}

impl ActiveSession {
    fn abort(self) {
        self.timer.abort();
        for send in self.sends {
            send.abort();
        }
    }
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveSession>,
}

type SharedSlot = Arc<Mutex<Slot>>;

pub struct PlaybackScheduler<T: Transport + 'static> {
    transport: Arc<T>,
    slot: SharedSlot,
    events: EventBus,
}

impl<T: Transport + 'static> PlaybackScheduler<T> {
    pub fn new(transport: Arc<T>, events: EventBus) -> Self {
        Self {
            transport,
            slot: SharedSlot::default(),
            events,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Slot>> {
        self.slot
            .lock()
            .map_err(|_| FlaschenError::Ops("playback scheduler lock poisoned".into()))
    }

    pub fn state(&self) -> SchedulerState {
        match self.lock() {
            Ok(slot) => match slot.active.as_ref() {
                Some(active) => SchedulerState::Scheduled {
                    session: active.id,
                    index: active.next_index,
                },
                None => SchedulerState::Idle,
            },
            Err(_) => SchedulerState::Idle,
        }
    }

    /// Supersedes any running session and starts looping `frames`, the first
    /// one immediately. Must be called from within a tokio runtime.
    pub fn play(&self, frames: Vec<AnimationFrame>) -> Result<Uuid> {
        let mut slot = self.lock()?;
        self.cancel(&mut slot);

        if frames.is_empty() {
            return Err(FlaschenError::EmptyAnimation);
        }

        let id = Uuid::new_v4();
        let frame_count = frames.len();
        let timer = tokio::spawn(run_session(
            Arc::clone(&self.slot),
            Arc::clone(&self.transport),
            self.events.clone(),
            id,
            frames.into(),
        ));
        slot.active = Some(ActiveSession {
            id,
            frame_count,
            next_index: 0,
            timer,
            sends: Vec::new(),
        });

        info!("Playback session {} started with {} frames", id, frame_count);
        self.events.publish(PlaybackEvent::session_started(id, frame_count));
        Ok(id)
    }

    /// Halts playback. A no-op when already idle.
    pub fn stop(&self) {
        match self.lock() {
            Ok(mut slot) => self.cancel(&mut slot),
            Err(err) => warn!("stop failed: {err}"),
        }
    }

    fn cancel(&self, slot: &mut Slot) {
        if let Some(active) = slot.active.take() {
            let id = active.id;
            let frame_count = active.frame_count;
            active.abort();
            info!(
                "Playback session {} stopped ({} frames)",
                id, frame_count
            );
            self.events.publish(PlaybackEvent::stopped(id));
        }
    }
}

impl<T: Transport + 'static> Drop for PlaybackScheduler<T> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            if let Some(active) = slot.active.take() {
                active.abort();
            }
        }
    }
}

fn hold_for(frame: &AnimationFrame) -> Duration {
    frame.delay().max(MIN_FRAME_DELAY)
}

async fn run_session<T: Transport + 'static>(
    slot: SharedSlot,
    transport: Arc<T>,
    events: EventBus,
    session: Uuid,
    frames: Arc<[AnimationFrame]>,
) {
    let mut index = 0;
    let mut deadline = Instant::now();
    loop {
        sleep_until(deadline).await;
        let fired = Instant::now();

        {
            let Ok(mut guard) = slot.lock() else {
                return;
            };
            let active = match guard.active.as_mut() {
                Some(active) if active.id == session => active,
                _ => return,
            };
            active.next_index = (index + 1) % frames.len();
            active.sends.retain(|send| !send.is_finished());
            active.sends.push(transmit(
                Arc::clone(&transport),
                events.clone(),
                session,
                Arc::clone(&frames),
                index,
            ));
        }

        deadline = fired + hold_for(&frames[index]);
        index = (index + 1) % frames.len();
    }
}

/// Sends on its own task so a slow endpoint never delays the next tick.
fn transmit<T: Transport + 'static>(
    transport: Arc<T>,
    events: EventBus,
    session: Uuid,
    frames: Arc<[AnimationFrame]>,
    index: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let datagram = frames[index].image.as_bytes();
        match transport.send(datagram).await {
            Ok(bytes) => {
                debug!("session {} frame {} sent ({} bytes)", session, index, bytes);
                events.publish(PlaybackEvent::frame_sent(session, index, bytes));
            }
            Err(err) => {
                warn!(
                    "session {} frame {} dropped sending to {}: {err}",
                    session,
                    index,
                    transport.target()
                );
                events.publish(PlaybackEvent::frame_dropped(
                    session,
                    index,
                    err.to_string(),
                ));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flaschen_transport::RecordingTransport;
    use flaschen_types::{
        events::EventKind,
        raster::{RasterBuffer, Rgb},
    };
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::{sync::Semaphore, time::sleep};

    fn solid(color: Rgb, delay_ms: u64) -> AnimationFrame {
        let mut image = RasterBuffer::create(2, 2, 5, 0, 0).expect("raster");
        for y in 0..2 {
            for x in 0..2 {
                image.plot(x, y, color);
            }
        }
        AnimationFrame::new(image, delay_ms)
    }

    const A: Rgb = Rgb::new(255, 0, 0);
    const B: Rgb = Rgb::new(0, 0, 255);
    const C: Rgb = Rgb::new(0, 255, 0);

    fn scheduler(transport: &RecordingTransport) -> PlaybackScheduler<RecordingTransport> {
        PlaybackScheduler::new(Arc::new(transport.clone()), EventBus::default())
    }

    /// First pixel colour and offset from `start` for each datagram.
    fn timeline(transport: &RecordingTransport, start: Instant) -> Vec<(Rgb, u64)> {
        let header_len = solid(A, 0).image.header_len();
        transport
            .datagrams()
            .into_iter()
            .map(|d| {
                let px = &d.payload[header_len..header_len + 3];
                (
                    Rgb::new(px[0], px[1], px[2]),
                    (d.sent_at - start).as_millis() as u64,
                )
            })
            .collect()
    }

    fn colors(transport: &RecordingTransport) -> Vec<Rgb> {
        let header_len = solid(A, 0).image.header_len();
        transport
            .datagrams()
            .iter()
            .map(|d| {
                let px = &d.payload[header_len..header_len + 3];
                Rgb::new(px[0], px[1], px[2])
            })
            .collect()
    }

    fn assert_near(actual: u64, expected: u64) {
        assert!(
            actual.abs_diff(expected) <= 5,
            "expected ~{expected}ms, got {actual}ms"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn loops_frames_using_each_frames_own_delay() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);
        let start = Instant::now();

        scheduler.play(vec![solid(A, 100), solid(B, 200)]).expect("play");
        sleep(Duration::from_millis(650)).await;
        scheduler.stop();

        let sent = timeline(&transport, start);
        let colors: Vec<Rgb> = sent.iter().map(|(c, _)| *c).collect();
        assert_eq!(colors, vec![A, B, A, B, A]);
        for ((_, at), expected) in sent.iter().zip([0, 100, 300, 400, 600]) {
            assert_near(*at, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_any_further_transmission() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);

        scheduler.play(vec![solid(A, 100), solid(B, 100)]).expect("play");
        sleep(Duration::from_millis(150)).await;
        scheduler.stop();
        let count = transport.len();
        assert_eq!(count, 2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.len(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_is_a_noop() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(transport.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_play_supersedes_first_session() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);

        let first = scheduler.play(vec![solid(A, 50), solid(B, 50)]).expect("first play");
        let second = scheduler.play(vec![solid(C, 80)]).expect("second play");
        assert_ne!(first, second);
        sleep(Duration::from_millis(500)).await;
        scheduler.stop();

        let sent = colors(&transport);
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|color| *color == C));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_frames_never_follow_the_new_first_frame() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);

        scheduler.play(vec![solid(A, 40), solid(B, 40)]).expect("first play");
        sleep(Duration::from_millis(130)).await;
        scheduler.play(vec![solid(C, 60)]).expect("second play");
        sleep(Duration::from_millis(400)).await;
        scheduler.stop();

        let sent = colors(&transport);
        let first_c = sent.iter().position(|c| *c == C).expect("new session transmitted");
        assert!(first_c > 0);
        assert!(sent[first_c..].iter().all(|c| *c == C));
    }

    #[tokio::test(start_paused = true)]
    async fn state_tracks_next_frame_index() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);
        let session = scheduler
            .play(vec![solid(A, 100), solid(B, 100), solid(C, 100)])
            .expect("play");

        sleep(Duration::from_millis(150)).await;
        assert_eq!(
            scheduler.state(),
            SchedulerState::Scheduled { session, index: 2 }
        );
        sleep(Duration::from_millis(100)).await;
        assert_eq!(
            scheduler.state(),
            SchedulerState::Scheduled { session, index: 0 }
        );
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_sequence_cancels_previous_session() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);
        scheduler.play(vec![solid(A, 100)]).expect("play");
        assert!(matches!(
            scheduler.play(Vec::new()),
            Err(FlaschenError::EmptyAnimation)
        ));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_do_not_stop_the_loop() {
        let events = EventBus::default();
        let mut stream = events.subscribe();
        let scheduler =
            PlaybackScheduler::new(Arc::new(RecordingTransport::failing()), events.clone());

        let session = scheduler.play(vec![solid(A, 100)]).expect("play");
        sleep(Duration::from_millis(250)).await;
        assert!(matches!(
            scheduler.state(),
            SchedulerState::Scheduled { session: s, .. } if s == session
        ));
        scheduler.stop();

        let mut dropped = 0;
        while let Some(event) = stream.next().await {
            match event.kind {
                EventKind::FrameDropped => dropped += 1,
                EventKind::Stopped => break,
                _ => {}
            }
        }
        assert_eq!(dropped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_frames_are_held_for_the_floor() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);
        scheduler.play(vec![solid(A, 0)]).expect("play");
        sleep(Duration::from_millis(35)).await;
        scheduler.stop();
        assert_eq!(transport.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn late_tick_does_not_replay_missed_frames() {
        let transport = RecordingTransport::new();
        let scheduler = scheduler(&transport);
        scheduler.play(vec![solid(A, 20)]).expect("play");
        sleep(Duration::from_millis(50)).await;
        let before = transport.len();
        assert_eq!(before, 3);

        // Jump the clock as a blocked runtime would; the pending tick fires late.
        tokio::time::advance(Duration::from_millis(400)).await;
        sleep(Duration::from_millis(5)).await;
        assert_eq!(transport.len(), before + 1);

        // The next frame is held for its full delay from the late tick.
        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.len(), before + 1);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.len(), before + 2);
        scheduler.stop();
    }

    /// Holds every send until the test hands out permits.
    struct GatedTransport {
        gate: Arc<Semaphore>,
        inner: RecordingTransport,
    }

    #[async_trait]
    impl Transport for GatedTransport {
        async fn send(&self, datagram: &[u8]) -> Result<usize> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| flaschen_transport::transport_error("gate closed"))?;
            self.inner.send(datagram).await
        }

        fn target(&self) -> String {
            self.inner.target()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_abandons_sends_still_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let recorder = RecordingTransport::new();
        let transport = GatedTransport {
            gate: Arc::clone(&gate),
            inner: recorder.clone(),
        };
        let scheduler = PlaybackScheduler::new(Arc::new(transport), EventBus::default());

        scheduler.play(vec![solid(A, 100)]).expect("play");
        sleep(Duration::from_millis(10)).await;
        scheduler.stop();
        gate.add_permits(8);
        sleep(Duration::from_millis(50)).await;
        assert!(recorder.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_play_abandons_sends_still_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let recorder = RecordingTransport::new();
        let transport = GatedTransport {
            gate: Arc::clone(&gate),
            inner: recorder.clone(),
        };
        let scheduler = PlaybackScheduler::new(Arc::new(transport), EventBus::default());

        scheduler.play(vec![solid(A, 100)]).expect("first play");
        sleep(Duration::from_millis(10)).await;
        scheduler.play(vec![solid(C, 100)]).expect("second play");
        gate.add_permits(8);
        sleep(Duration::from_millis(50)).await;
        scheduler.stop();
        assert_eq!(colors(&recorder), vec![C]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_cancels_its_timer() {
        let transport = RecordingTransport::new();
        {
            let scheduler = scheduler(&transport);
            scheduler.play(vec![solid(A, 100)]).expect("play");
            sleep(Duration::from_millis(50)).await;
        }
        let count = transport.len();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.len(), count);
    }
}
