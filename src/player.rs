use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{Result, anyhow};
use serenity::all::{ChannelId, Context as SerenityContext, GuildId, Http};
use serenity::async_trait;
use serenity::prelude::TypeMapKey;
use songbird::{
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
    tracks::TrackHandle,
};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info, warn};

use crate::metrics::METRICS;
use crate::queue::{QueueStore, Track};
use crate::voice::VoiceSessions;

/// Result of feeding a track into a guild's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Playback was idle; the track started rendering.
    Started,
    /// Something is already rendering; the track waits in line.
    Queued { position: usize },
    /// Playback was idle but nothing in the queue could be started.
    FailedToStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    NotConnected,
    /// Current render halted; its end event starts the next track.
    Skipped,
    /// Idle with queued tracks; the next one was kicked directly.
    Kicked,
    NothingQueued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotConnected,
    Stopped,
}

#[derive(Default)]
struct GuildSession {
    /// Set before an explicit stop halts the render. Completion callbacks
    /// check it so a racing end event cannot resurrect playback.
    stopping: AtomicBool,
    /// Serialization point for every playback transition in this guild.
    transition: TokioMutex<()>,
    /// Text channel for now-playing and failure notices.
    notify: StdMutex<Option<ChannelId>>,
}

/// The per-guild playback state machine. Owns the decision of when to
/// start, continue, or tear down playback. Command handlers and driver
/// callbacks both funnel through the guild's transition lock.
pub struct Player {
    voice: VoiceSessions,
    queues: QueueStore,
    sessions: StdMutex<HashMap<GuildId, Arc<GuildSession>>>,
}

/// Type-map key so handlers reach the shared player through `ctx.data`.
pub struct PlayerKey;

impl TypeMapKey for PlayerKey {
    type Value = Arc<Player>;
}

impl Player {
    pub fn new(songbird: Arc<Songbird>) -> Arc<Self> {
        Arc::new(Self {
            voice: VoiceSessions::new(songbird),
            queues: QueueStore::new(),
            sessions: StdMutex::new(HashMap::new()),
        })
    }

    pub async fn from_ctx(ctx: &SerenityContext) -> Result<Arc<Player>> {
        ctx.data
            .read()
            .await
            .get::<PlayerKey>()
            .cloned()
            .ok_or_else(|| anyhow!("player not initialized"))
    }

    pub fn voice(&self) -> &VoiceSessions {
        &self.voice
    }

    pub fn queues(&self) -> &QueueStore {
        &self.queues
    }

    fn session(&self, guild_id: GuildId) -> Arc<GuildSession> {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(guild_id)
            .or_default()
            .clone()
    }

    pub fn notify_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        *self
            .session(guild_id)
            .notify
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    fn set_notify_channel(&self, guild_id: GuildId, channel: ChannelId) {
        *self
            .session(guild_id)
            .notify
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(channel);
    }

    /// Append a track; when the session is idle, start playback right away
    /// instead of waiting for a separate kick.
    pub async fn enqueue(
        self: &Arc<Self>,
        http: &Arc<Http>,
        guild_id: GuildId,
        notify: ChannelId,
        track: Track,
    ) -> EnqueueOutcome {
        self.set_notify_channel(guild_id, notify);
        self.queues.enqueue(guild_id, track);

        let session = self.session(guild_id);
        let _transition = session.transition.lock().await;
        session.stopping.store(false, Ordering::Release);

        if self.voice.is_active(guild_id).await {
            return EnqueueOutcome::Queued {
                position: self.queues.len(guild_id),
            };
        }
        if self.advance_locked(http, guild_id, notify).await {
            EnqueueOutcome::Started
        } else {
            EnqueueOutcome::FailedToStart
        }
    }

    /// Advance after a track ended or an external event should kick the
    /// queue. Safe to call from any context; serialized per guild.
    pub async fn advance(self: &Arc<Self>, http: &Arc<Http>, guild_id: GuildId, notify: ChannelId) {
        let session = self.session(guild_id);
        let _transition = session.transition.lock().await;
        if session.stopping.load(Ordering::Acquire) {
            debug!("skipping advance for guild {guild_id}: stop in progress");
            return;
        }
        self.advance_locked(http, guild_id, notify).await;
    }

    /// Pops tracks until one starts or the queue drains. Caller holds the
    /// guild's transition lock; each iteration consumes a queued track, so
    /// the loop is bounded by queue length. Returns whether a track started.
    async fn advance_locked(
        self: &Arc<Self>,
        http: &Arc<Http>,
        guild_id: GuildId,
        notify: ChannelId,
    ) -> bool {
        loop {
            let Some(track) = self.queues.dequeue_front(guild_id) else {
                if self.voice.is_active(guild_id).await {
                    // Another path already started a track; nothing to do.
                    return false;
                }
                if self.voice.is_connected(guild_id) {
                    let _ = notify
                        .say(http, "📭 Queue finished, leaving the voice channel.")
                        .await;
                    if let Err(e) = self.voice.disconnect(guild_id).await {
                        warn!("disconnect after drained queue failed for guild {guild_id}: {e}");
                    }
                }
                return false;
            };

            match self.voice.play(guild_id, &track).await {
                Ok(handle) => {
                    self.attach_completion_events(http, guild_id, notify, &track, &handle);
                    METRICS.inc_played();
                    info!("now playing {:?} in guild {guild_id}", track.title);
                    let _ = notify
                        .say(http, format!("🎵 Now playing: **{}**", track.title))
                        .await;
                    return true;
                }
                Err(e) => {
                    warn!("failed to start {:?} in guild {guild_id}: {e}", track.title);
                    METRICS.inc_playback_failure();
                    let _ = notify
                        .say(
                            http,
                            format!("❌ Could not play **{}**, trying the next track.", track.title),
                        )
                        .await;
                }
            }
        }
    }

    /// One end notifier and one error notifier per play, sharing a
    /// fired-once flag: the controller sees exactly one completion per
    /// `play`, whichever event lands first.
    fn attach_completion_events(
        self: &Arc<Self>,
        http: &Arc<Http>,
        guild_id: GuildId,
        notify: ChannelId,
        track: &Track,
        handle: &TrackHandle,
    ) {
        let fired = Arc::new(AtomicBool::new(false));
        for (event, errored) in [(TrackEvent::End, false), (TrackEvent::Error, true)] {
            let notifier = TrackEndNotifier {
                player: Arc::clone(self),
                http: Arc::clone(http),
                guild_id,
                notify,
                title: track.title.clone(),
                errored,
                fired: Arc::clone(&fired),
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                error!("failed to register completion handler for guild {guild_id}: {e}");
            }
        }
    }

    /// Completion callback body: the sole trigger for steady-state advance.
    async fn on_track_end(
        self: &Arc<Self>,
        http: Arc<Http>,
        guild_id: GuildId,
        notify: ChannelId,
        errored: bool,
        title: &str,
    ) {
        if self.session(guild_id).stopping.load(Ordering::Acquire) {
            debug!("ignoring track end for guild {guild_id}: stop in progress");
            return;
        }
        if !self.voice.is_connected(guild_id) {
            return;
        }
        if errored {
            METRICS.inc_playback_failure();
            warn!("track {title:?} errored mid-stream in guild {guild_id}");
            let _ = notify
                .say(
                    &http,
                    format!("❌ Playback of **{title}** failed, trying the next track."),
                )
                .await;
        }
        self.advance(&http, guild_id, notify).await;
    }

    pub async fn skip(
        self: &Arc<Self>,
        http: &Arc<Http>,
        guild_id: GuildId,
        notify: ChannelId,
    ) -> SkipOutcome {
        if !self.voice.is_connected(guild_id) {
            return SkipOutcome::NotConnected;
        }
        self.set_notify_channel(guild_id, notify);
        if self.voice.is_playing(guild_id).await || self.voice.is_paused(guild_id).await {
            // The halted track's end event advances the queue.
            self.voice.stop_current(guild_id);
            return SkipOutcome::Skipped;
        }
        if self.queues.is_empty(guild_id) {
            return SkipOutcome::NothingQueued;
        }
        self.advance(http, guild_id, notify).await;
        SkipOutcome::Kicked
    }

    /// Clear the queue, halt the render, and leave the channel. The
    /// stopping flag goes up before the render is halted so the end event
    /// it triggers cannot advance.
    pub async fn stop(self: &Arc<Self>, guild_id: GuildId) -> StopOutcome {
        if !self.voice.is_connected(guild_id) {
            return StopOutcome::NotConnected;
        }
        let session = self.session(guild_id);
        session.stopping.store(true, Ordering::Release);
        let _transition = session.transition.lock().await;
        self.queues.clear(guild_id);
        self.voice.stop_current(guild_id);
        if let Err(e) = self.voice.disconnect(guild_id).await {
            warn!("disconnect on stop failed for guild {guild_id}: {e}");
        }
        // Late callbacks now observe the missing connection instead.
        session.stopping.store(false, Ordering::Release);
        StopOutcome::Stopped
    }
}

struct TrackEndNotifier {
    player: Arc<Player>,
    http: Arc<Http>,
    guild_id: GuildId,
    notify: ChannelId,
    title: String,
    errored: bool,
    fired: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            if self.fired.swap(true, Ordering::SeqCst) {
                return None;
            }
            self.player
                .on_track_end(
                    self.http.clone(),
                    self.guild_id,
                    self.notify,
                    self.errored,
                    &self.title,
                )
                .await;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_player() -> Arc<Player> {
        Player::new(Songbird::serenity())
    }

    fn test_http() -> Arc<Http> {
        Arc::new(Http::new(""))
    }

    fn track(title: &str) -> Track {
        Track {
            source_url: format!("https://audio.example/{title}"),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn skip_without_connection_reports_not_connected() {
        let player = test_player();
        let out = player
            .skip(&test_http(), GuildId::new(1), ChannelId::new(1))
            .await;
        assert_eq!(out, SkipOutcome::NotConnected);
    }

    #[tokio::test]
    async fn stop_without_connection_reports_not_connected() {
        let player = test_player();
        assert_eq!(player.stop(GuildId::new(1)).await, StopOutcome::NotConnected);
    }

    #[tokio::test]
    async fn callback_during_stop_does_not_advance() {
        let player = test_player();
        let guild = GuildId::new(9);
        player.queues().enqueue(guild, track("queued"));
        player.session(guild).stopping.store(true, Ordering::Release);

        // A completion callback racing the stop must leave the queue alone.
        player
            .advance(&test_http(), guild, ChannelId::new(1))
            .await;
        assert_eq!(player.queues().len(guild), 1);
    }

    #[tokio::test]
    async fn enqueue_remembers_the_notify_channel() {
        let player = test_player();
        let guild = GuildId::new(3);
        assert_eq!(player.notify_channel(guild), None);
        player
            .enqueue(&test_http(), guild, ChannelId::new(42), track("a"))
            .await;
        assert_eq!(player.notify_channel(guild), Some(ChannelId::new(42)));
    }
}
