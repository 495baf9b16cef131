use anyhow::{Result, anyhow};
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
};

use crate::player::{Player, SkipOutcome};

pub fn definition() -> CreateCommand {
    CreateCommand::new("next").description("Skip to the next queued track")
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

    let outcome = player.skip(&ctx.http, guild_id, cmd.channel_id).await;
    let remaining = player.queues().len(guild_id);

    match outcome {
        SkipOutcome::NotConnected => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().content("Not connected."),
            )
            .await
            .ok();
        }
        SkipOutcome::NothingQueued => {
            cmd.edit_response(
                &ctx.http,
                EditInteractionResponse::new().content("📭 Nothing queued to skip to."),
            )
            .await
            .ok();
        }
        SkipOutcome::Skipped | SkipOutcome::Kicked => {
            let embed = CreateEmbed::new()
                .title("⏭️ Skipped")
                .description(format!(
                    "Moving on to the next track. {} track(s) remaining in queue.",
                    remaining
                ))
                .colour(0x00FF7F); // Spring green
            cmd.edit_response(&ctx.http, EditInteractionResponse::new().embeds(vec![embed]))
                .await
                .ok();
        }
    }
    Ok(())
}
