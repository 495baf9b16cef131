use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use serenity::all::{ChannelId, GuildId};
use songbird::{
    Call, Songbird,
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
};
use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};

use crate::metrics::METRICS;
use crate::queue::Track;

static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("chime-bot/0.1")
        .build()
        .expect("client")
});

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("not connected to a voice channel")]
    NotConnected,
    #[error("failed to join voice channel: {0}")]
    Join(String),
    #[error("playback could not start: {0}")]
    PlaybackStart(String),
}

/// Owns the live voice connection per guild. Playback state is always
/// queried from the driver's track handle, never from a cached flag.
pub struct VoiceSessions {
    songbird: Arc<Songbird>,
    current: Mutex<HashMap<GuildId, TrackHandle>>,
}

impl VoiceSessions {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self {
            songbird,
            current: Mutex::new(HashMap::new()),
        }
    }

    /// Join `channel_id`, retrying with capped exponential backoff. When the
    /// bot already sits in another channel of the guild, this moves the
    /// existing session instead of acquiring a new one.
    pub async fn join_or_move(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<TokioMutex<Call>>, PlayerError> {
        let was_connected = if let Some(call) = self.songbird.get(guild_id) {
            let current = call.lock().await.current_channel();
            if current.map(|c| c.0.get()) == Some(channel_id.get()) {
                return Ok(call);
            }
            true
        } else {
            false
        };

        let mut attempts: u32 = 0;
        let max_attempts = 5;
        loop {
            match self.songbird.join(guild_id, channel_id).await {
                Ok(call) => {
                    if attempts > 0 {
                        info!(
                            "joined voice channel {channel_id} in guild {guild_id} after {} attempt(s)",
                            attempts + 1
                        );
                    }
                    if !was_connected {
                        METRICS.inc_connections();
                    }
                    return Ok(call);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        return Err(PlayerError::Join(format!(
                            "after {attempts} attempts: {e}"
                        )));
                    }
                    let delay_ms = std::cmp::min(5000, 1000 * 2u64.pow(attempts - 1));
                    warn!(
                        "voice join attempt {attempts} for guild {guild_id} failed: {e}; retrying in {delay_ms}ms"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.songbird.get(guild_id).is_some()
    }

    async fn play_mode(&self, guild_id: GuildId) -> Option<PlayMode> {
        let handle = self
            .current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&guild_id)
            .cloned()?;
        match handle.get_info().await {
            Ok(info) => Some(info.playing),
            Err(_) => {
                // Track is gone from the driver; drop the stale handle.
                self.forget_current(guild_id);
                None
            }
        }
    }

    pub async fn is_playing(&self, guild_id: GuildId) -> bool {
        matches!(self.play_mode(guild_id).await, Some(PlayMode::Play))
    }

    pub async fn is_paused(&self, guild_id: GuildId) -> bool {
        matches!(self.play_mode(guild_id).await, Some(PlayMode::Pause))
    }

    /// Rendering or paused mid-track.
    pub async fn is_active(&self, guild_id: GuildId) -> bool {
        matches!(
            self.play_mode(guild_id).await,
            Some(PlayMode::Play | PlayMode::Pause)
        )
    }

    /// Start rendering `track`. Returns once the source is confirmed
    /// playable; completion is reported only through the handle's
    /// end/error events.
    pub async fn play(&self, guild_id: GuildId, track: &Track) -> Result<TrackHandle, PlayerError> {
        let call = self
            .songbird
            .get(guild_id)
            .ok_or(PlayerError::NotConnected)?;
        let input = HttpRequest::new(HTTP.clone(), track.source_url.clone());
        let handle = call.lock().await.play_input(input.into());
        if let Err(e) = handle.make_playable_async().await {
            let _ = handle.stop();
            return Err(PlayerError::PlaybackStart(e.to_string()));
        }
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(guild_id, handle.clone());
        Ok(handle)
    }

    /// Halt the current render, if any. The track's end event still fires.
    pub fn stop_current(&self, guild_id: GuildId) {
        if let Some(handle) = self
            .current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&guild_id)
        {
            let _ = handle.stop();
        }
    }

    fn forget_current(&self, guild_id: GuildId) {
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&guild_id);
    }

    pub async fn disconnect(&self, guild_id: GuildId) -> Result<(), PlayerError> {
        self.forget_current(guild_id);
        if self.songbird.get(guild_id).is_some() {
            self.songbird
                .remove(guild_id)
                .await
                .map_err(|e| PlayerError::Join(e.to_string()))?;
            METRICS.dec_connections();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions() -> VoiceSessions {
        VoiceSessions::new(Songbird::serenity())
    }

    #[tokio::test]
    async fn queries_are_false_without_a_session() {
        let voice = sessions();
        let guild = GuildId::new(1);
        assert!(!voice.is_connected(guild));
        assert!(!voice.is_playing(guild).await);
        assert!(!voice.is_paused(guild).await);
        assert!(!voice.is_active(guild).await);
    }

    #[tokio::test]
    async fn play_without_a_session_is_not_connected() {
        let voice = sessions();
        let track = Track {
            source_url: "https://cdn.example/a.webm".into(),
            title: "A".into(),
        };
        let err = voice.play(GuildId::new(1), &track).await.unwrap_err();
        assert!(matches!(err, PlayerError::NotConnected));
    }

    #[tokio::test]
    async fn disconnect_when_not_connected_is_a_no_op() {
        let voice = sessions();
        assert!(voice.disconnect(GuildId::new(1)).await.is_ok());
    }
}
