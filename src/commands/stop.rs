use anyhow::{Result, anyhow};
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse,
};

use crate::player::{Player, StopOutcome};

pub fn definition() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and clear the queue")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await
    .ok();

    let guild_id = cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))?;
    let player = Player::from_ctx(ctx).await?;

    let msg = match player.stop(guild_id).await {
        StopOutcome::NotConnected => "Not connected.",
        StopOutcome::Stopped => "⏹️ Stopped, cleared the queue, and disconnected.",
    };
    cmd.edit_response(&ctx.http, EditInteractionResponse::new().content(msg))
        .await
        .ok();
    Ok(())
}
