use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use once_cell::sync::Lazy;
use tracing::debug;

pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| Arc::new(Metrics::new()));

#[derive(Debug)]
pub struct Metrics {
    start: Instant,
    ready: AtomicBool,
    active_voice_calls: AtomicUsize,
    queued_tracks: AtomicUsize,
    tracks_played: AtomicU64,
    playback_failures: AtomicU64,
    queue_repairs: AtomicU64,
    reminders_fired: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            ready: AtomicBool::new(false),
            active_voice_calls: AtomicUsize::new(0),
            queued_tracks: AtomicUsize::new(0),
            tracks_played: AtomicU64::new(0),
            playback_failures: AtomicU64::new(0),
            queue_repairs: AtomicU64::new(0),
            reminders_fired: AtomicU64::new(0),
        }
    }

    pub fn set_ready(&self, v: bool) {
        self.ready.store(v, Ordering::Relaxed);
    }
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn inc_connections(&self) {
        self.active_voice_calls.fetch_add(1, Ordering::Relaxed);
    }
    pub fn dec_connections(&self) {
        let _ = self
            .active_voice_calls
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    pub fn inc_queue(&self, n: usize) {
        self.queued_tracks.fetch_add(n, Ordering::Relaxed);
    }
    pub fn dec_queue(&self, n: usize) {
        let _ = self
            .queued_tracks
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(n))
            });
    }

    pub fn inc_played(&self) {
        self.tracks_played.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_playback_failure(&self) {
        self.playback_failures.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_queue_repair(&self) {
        self.queue_repairs.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_reminder_fired(&self) {
        self.reminders_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start.elapsed().as_secs(),
            ready: self.is_ready(),
            active_voice_calls: self.active_voice_calls.load(Ordering::Relaxed),
            queued_tracks: self.queued_tracks.load(Ordering::Relaxed),
            tracks_played: self.tracks_played.load(Ordering::Relaxed),
            playback_failures: self.playback_failures.load(Ordering::Relaxed),
            queue_repairs: self.queue_repairs.load(Ordering::Relaxed),
            reminders_fired: self.reminders_fired.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub ready: bool,
    pub active_voice_calls: usize,
    pub queued_tracks: usize,
    pub tracks_played: u64,
    pub playback_failures: u64,
    pub queue_repairs: u64,
    pub reminders_fired: u64,
}

/// Periodically log a counter snapshot so playback health (including queue
/// self-repairs) is visible without an external metrics sink.
pub fn spawn_status_logger() {
    tokio::spawn(async {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            let s = METRICS.snapshot();
            debug!(
                uptime_secs = s.uptime_secs,
                ready = s.ready,
                voice_calls = s.active_voice_calls,
                queued = s.queued_tracks,
                played = s.tracks_played,
                playback_failures = s.playback_failures,
                queue_repairs = s.queue_repairs,
                reminders_fired = s.reminders_fired,
                "status"
            );
        }
    });
}
