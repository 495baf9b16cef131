use anyhow::{Result, anyhow};
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, GuildId, UserId,
};
use tracing::warn;

use crate::commands::str_option;
use crate::database::models::{HistoryAction, MusicHistory};
use crate::player::{EnqueueOutcome, Player};
use crate::queue::Track;
use crate::resolver::{self, ResolveError};

pub fn definition() -> CreateCommand {
    let opt = CreateCommandOption::new(CommandOptionType::String, "query", "Song title or URL")
        .required(true);
    CreateCommand::new("play")
        .description("Play a track or add it to the queue")
        .add_option(opt)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let query = str_option(cmd, "query")
        .ok_or_else(|| anyhow!("missing query"))?
        .to_string();

    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await
    .ok();

    let guild_id = cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))?;
    let voice_channel = {
        let guild = ctx
            .cache
            .guild(guild_id)
            .ok_or_else(|| anyhow!("guild not in cache"))?;
        guild
            .voice_states
            .get(&cmd.user.id)
            .and_then(|vs| vs.channel_id)
    };
    let Some(voice_channel) = voice_channel else {
        reply(ctx, cmd, "You must be in a voice channel to play music.").await;
        return Ok(());
    };

    let player = Player::from_ctx(ctx).await?;

    if let Err(e) = player.voice().join_or_move(guild_id, voice_channel).await {
        warn!("voice join failed for guild {guild_id}: {e}");
        reply(ctx, cmd, "Could not join your voice channel. Try again.").await;
        return Ok(());
    }

    let track = match resolver::resolve(&query).await {
        Ok(track) => track,
        Err(ResolveError::NoResults) => {
            reply(ctx, cmd, "No results for that query.").await;
            return Ok(());
        }
        Err(ResolveError::Lookup(e)) => {
            warn!("lookup failed for {query:?}: {e:#}");
            reply(ctx, cmd, "Search failed. Try again.").await;
            return Ok(());
        }
    };

    let outcome = player
        .enqueue(&ctx.http, guild_id, cmd.channel_id, track.clone())
        .await;

    let action = match outcome {
        EnqueueOutcome::Queued { .. } => HistoryAction::Queued,
        _ => HistoryAction::Played,
    };
    record_history(guild_id, cmd.user.id, &track, action);

    let msg = match outcome {
        EnqueueOutcome::Started => format!("▶️ Now playing: **{}**", track.title),
        EnqueueOutcome::Queued { position } => {
            format!("➕ Added to queue at position {position}: **{}**", track.title)
        }
        EnqueueOutcome::FailedToStart => {
            format!("❌ Could not start playback of **{}**.", track.title)
        }
    };
    reply(ctx, cmd, msg).await;
    Ok(())
}

async fn reply(ctx: &SerenityContext, cmd: &CommandInteraction, content: impl Into<String>) {
    let _ = cmd
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await;
}

/// Fire-and-forget history insert; a slow database must never hold up the
/// playback path.
fn record_history(guild_id: GuildId, user_id: UserId, track: &Track, action: HistoryAction) {
    let guild = guild_id.to_string();
    let user = user_id.to_string();
    let title = track.title.clone();
    let url = track.source_url.clone();
    tokio::task::spawn_blocking(move || {
        let stamped = crate::clock::now_naive();
        match crate::database::establish_connection() {
            Ok(mut conn) => {
                if let Err(e) =
                    MusicHistory::create(&mut conn, &guild, &user, &title, &url, action, stamped)
                {
                    warn!("music history insert failed: {e}");
                }
            }
            Err(e) => warn!("music history insert skipped: {e}"),
        }
    });
}
