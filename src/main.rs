use std::time::Duration;

use anyhow::Result;
use serenity::all::{
    ChannelId, ChannelType, Command as AppCommand, Context as SerenityContext, GatewayIntents,
    GuildId, Interaction, Permissions, Ready, VoiceState,
};
use serenity::async_trait;
use songbird::{Config as VoiceConfig, Songbird, driver::MixMode, serenity::SerenityInit};
use tracing::{error, info, warn};

mod clock;
mod commands;
mod database;
mod env;
mod metrics;
mod player;
mod queue;
mod reminders;
mod resolver;
mod voice;

use crate::metrics::METRICS;
use crate::player::{Player, PlayerKey};

/// Moved while idle with an empty queue: wait this long for someone to act
/// before leaving the channel, so transient reconnects don't flap.
const IDLE_MOVE_GRACE: Duration = Duration::from_secs(5);

struct Handler;

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, ctx: SerenityContext, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        // Log an invite URL with minimal required voice permissions
        let perms = Permissions::CONNECT | Permissions::SPEAK;
        if let Ok(app) = ctx.http.get_current_application_info().await {
            let invite = format!(
                "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot%20applications.commands",
                app.id,
                perms.bits()
            );
            info!(
                "Invite this bot: {} (app_id={}, user_id={})",
                invite, app.id, ready.user.id
            );
        }

        // Register global slash commands
        let mut defs = vec![
            commands::play::definition(),
            commands::next::definition(),
            commands::stop::definition(),
            commands::history::definition(),
            commands::reminder::definition(),
        ];
        defs.extend(commands::todo::definitions());
        defs.extend(commands::attendance::definitions());
        for def in defs {
            if let Err(e) = AppCommand::create_global_command(&ctx.http, def).await {
                error!("failed to register global command: {e:?}");
            }
        }

        // Re-arm persisted reminders exactly once, not on every reconnect.
        if !METRICS.is_ready() {
            reminders::restore_pending(ctx.http.clone());
        }
        METRICS.set_ready(true);
    }

    async fn interaction_create(&self, ctx: SerenityContext, interaction: Interaction) {
        if let Interaction::Command(cmd) = interaction {
            let name = cmd.data.name.clone();
            let result = match name.as_str() {
                "play" => commands::play::handle(&ctx, &cmd).await,
                "next" => commands::next::handle(&ctx, &cmd).await,
                "stop" => commands::stop::handle(&ctx, &cmd).await,
                "history" => commands::history::handle(&ctx, &cmd).await,
                "add" => commands::todo::handle_add(&ctx, &cmd).await,
                "list" => commands::todo::handle_list(&ctx, &cmd).await,
                "done" => commands::todo::handle_done(&ctx, &cmd).await,
                "delete" => commands::todo::handle_delete(&ctx, &cmd).await,
                "clear" => commands::todo::handle_clear(&ctx, &cmd).await,
                "dates" => commands::todo::handle_dates(&ctx, &cmd).await,
                "export_todos" => commands::todo::handle_export(&ctx, &cmd).await,
                "checkin" => commands::attendance::handle_checkin(&ctx, &cmd).await,
                "checkout" => commands::attendance::handle_checkout(&ctx, &cmd).await,
                "attendance" => commands::attendance::handle_history(&ctx, &cmd).await,
                "export_attendance" => commands::attendance::handle_export(&ctx, &cmd).await,
                "reminder" => commands::reminder::handle(&ctx, &cmd).await,
                _ => Ok(()),
            };
            if let Err(why) = result {
                error!("/{name} failed: {why:?}");
            }
        }
    }

    /// The bot being moved between voice channels while idle either resumes
    /// a pending queue or, if there is nothing to play, leaves after a
    /// short grace period.
    async fn voice_state_update(&self, ctx: SerenityContext, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id {
            return;
        }
        let moved = old.as_ref().and_then(|o| o.channel_id).is_some() && new.channel_id.is_some();
        if !moved {
            return;
        }
        let Some(guild_id) = new.guild_id else { return };

        let player = match Player::from_ctx(&ctx).await {
            Ok(player) => player,
            Err(e) => {
                warn!("voice state update without player: {e}");
                return;
            }
        };
        if player.voice().is_active(guild_id).await {
            return;
        }

        if !player.queues().is_empty(guild_id) {
            // Same effect as a completion callback: restart the queue.
            let channel = player
                .notify_channel(guild_id)
                .or_else(|| fallback_text_channel(&ctx, guild_id));
            let Some(channel) = channel else { return };
            info!("resuming queue after voice move in guild {guild_id}");
            player.advance(&ctx.http, guild_id, channel).await;
        } else {
            tokio::time::sleep(IDLE_MOVE_GRACE).await;
            if player.voice().is_connected(guild_id) && !player.voice().is_active(guild_id).await {
                info!("leaving idle voice channel in guild {guild_id}");
                if let Err(e) = player.voice().disconnect(guild_id).await {
                    warn!("idle disconnect failed for guild {guild_id}: {e}");
                }
            }
        }
    }
}

/// The channel named "general", or the first text channel, for notices that
/// have no originating command.
fn fallback_text_channel(ctx: &SerenityContext, guild_id: GuildId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    let mut text: Vec<_> = guild
        .channels
        .values()
        .filter(|c| c.kind == ChannelType::Text)
        .collect();
    text.sort_by_key(|c| c.position);
    text.iter()
        .find(|c| c.name == "general")
        .or_else(|| text.first())
        .map(|c| c.id)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = env::read_discord_token()?;

    {
        let mut conn = database::establish_connection()?;
        database::run_migrations(&mut conn)?;
        info!("Database ready at {}", env::read_database_url());
    }

    let intents = GatewayIntents::non_privileged() | GatewayIntents::GUILD_VOICE_STATES;
    let voice_cfg = {
        let mix = match std::env::var("CHIME_MIX_MODE").as_deref() {
            Ok("mono") => MixMode::Mono,
            _ => MixMode::Stereo,
        };
        VoiceConfig::default()
            .preallocated_tracks(2)
            .use_softclip(false)
            .mix_mode(mix)
    };

    let manager = Songbird::serenity_from_config(voice_cfg);
    let player = Player::new(manager.clone());

    let mut client = serenity::Client::builder(token, intents)
        .event_handler(Handler)
        .register_songbird_with(manager)
        .await?;
    {
        let mut data = client.data.write().await;
        data.insert::<PlayerKey>(player);
    }

    metrics::spawn_status_logger();
    info!(
        "Commands: /play, /next, /stop, /history, to-do (/add /list /done /delete /clear /dates /export_todos), attendance (/checkin /checkout /attendance /export_attendance), /reminder"
    );
    info!("Tunables: CHIME_MIX_MODE=mono|stereo, CHIME_AUDIO_FORMAT=<yt-dlp format>, DATABASE_URL=path");

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start_autosharded().await {
        error!("Client error: {why:?}");
    }
    Ok(())
}
