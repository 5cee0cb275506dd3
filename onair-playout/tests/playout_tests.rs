//! Playout queue and decoder bridge integration tests
//!
//! A burst of enqueued tracks must come out as strictly sequential decodes,
//! each announced by exactly one `now-playing` event.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use onair_common::events::{EnqueueReason, OnAirEvent, QueueItem};
use onair_common::{EventBus, EventEnvelope};
use onair_playout::playout::{
    spawn_enqueue_listener, DecodeLauncher, DecoderBridge, PlayoutQueue,
};
use onair_playout::supervisor::CommandSpec;
use tokio::process::Child;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Launch record: which track, and how many now-playing events preceded it
#[derive(Debug, Clone)]
struct Launch {
    title: String,
    now_playing_since_last: usize,
    gate_held: bool,
}

/// Launcher running a short shell decode that detects overlapping runs
///
/// Each run creates `lock` while active; finding it already present means two
/// decodes overlapped and is written to `overlap`.
struct ProbeLauncher {
    workdir: PathBuf,
    queue: Arc<PlayoutQueue>,
    events: Mutex<broadcast::Receiver<EventEnvelope>>,
    launches: Mutex<Vec<Launch>>,
}

impl ProbeLauncher {
    fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }
}

impl DecodeLauncher for ProbeLauncher {
    fn launch(&self, item: &QueueItem, _pipe: &Path) -> onair_playout::Result<Child> {
        let mut now_playing = 0;
        let mut rx = self.events.lock().unwrap();
        while let Ok(envelope) = rx.try_recv() {
            if let OnAirEvent::NowPlaying { title, .. } = envelope.event {
                assert_eq!(title, item.title, "now-playing announced a different track");
                now_playing += 1;
            }
        }
        self.launches.lock().unwrap().push(Launch {
            title: item.title.clone(),
            now_playing_since_last: now_playing,
            gate_held: self.queue.is_playing(),
        });

        let lock = self.workdir.join("lock");
        let overlap = self.workdir.join("overlap");
        let script = format!(
            "if [ -e '{lock}' ]; then echo x >> '{overlap}'; fi; touch '{lock}'; sleep 0.05; rm -f '{lock}'",
            lock = lock.display(),
            overlap = overlap.display()
        );
        CommandSpec::new("sh", ["-c", script.as_str()]).spawn()
    }
}

fn track(title: &str) -> QueueItem {
    QueueItem::new(Uuid::new_v4(), title, "Test Artist", format!("/music/{}.flac", title))
}

#[tokio::test]
async fn test_burst_of_tracks_plays_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(256);
    let queue = Arc::new(PlayoutQueue::new());
    let cancel = CancellationToken::new();

    let launcher = Arc::new(ProbeLauncher {
        workdir: dir.path().to_path_buf(),
        queue: Arc::clone(&queue),
        events: Mutex::new(bus.subscribe()),
        launches: Mutex::new(Vec::new()),
    });

    let listener = spawn_enqueue_listener(&bus, Arc::clone(&queue), cancel.clone());
    let bridge = DecoderBridge::new(
        Arc::clone(&queue),
        launcher.clone(),
        bus.publisher("onair-playout"),
        dir.path().join("onair.pcm"),
        Duration::from_millis(10),
    )
    .spawn(cancel.clone());

    let titles: Vec<String> = (0..6).map(|i| format!("track-{}", i)).collect();
    let scheduler = bus.publisher("scheduler");
    for title in &titles {
        scheduler.publish(OnAirEvent::EnqueueTrack {
            track: track(title),
            reason: EnqueueReason::Automatic,
        });
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if launcher.launches().len() == titles.len() && !queue.is_playing() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let launches = launcher.launches();
    let launched: Vec<String> = launches.iter().map(|l| l.title.clone()).collect();
    assert_eq!(launched, titles, "launch order must follow enqueue order");
    for launch in &launches {
        assert_eq!(launch.now_playing_since_last, 1, "{:?}", launch);
        assert!(launch.gate_held, "{:?}", launch);
    }
    assert!(!dir.path().join("overlap").exists(), "two decodes overlapped");
    assert!(queue.is_empty());

    cancel.cancel();
    bridge.await.unwrap();
    listener.await.unwrap();
}

#[tokio::test]
async fn test_enqueue_never_waits_for_playout() {
    let queue = PlayoutQueue::new();
    assert!(queue.try_begin().is_none());
    queue.enqueue(track("in-flight"));
    let _playing = queue.try_begin().unwrap();

    let started = Instant::now();
    for i in 0..10_000 {
        queue.enqueue(track(&i.to_string()));
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(queue.len(), 10_000);
    assert!(queue.try_begin().is_none());
}

#[tokio::test]
async fn test_shutdown_kills_in_flight_decoder() {
    struct Sleeper;

    impl DecodeLauncher for Sleeper {
        fn launch(&self, _item: &QueueItem, _pipe: &Path) -> onair_playout::Result<Child> {
            CommandSpec::new("sleep", ["30"]).spawn()
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let bus = EventBus::new(16);
    let queue = Arc::new(PlayoutQueue::new());
    queue.enqueue(track("long"));
    let cancel = CancellationToken::new();

    let bridge = DecoderBridge::new(
        Arc::clone(&queue),
        Arc::new(Sleeper),
        bus.publisher("onair-playout"),
        dir.path().join("onair.pcm"),
        Duration::from_millis(10),
    );
    assert!(bridge.tick_once(&cancel));
    assert!(queue.is_playing());

    cancel.cancel();
    let deadline = Instant::now() + Duration::from_secs(2);
    while queue.is_playing() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!queue.is_playing());
}
