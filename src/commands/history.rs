use anyhow::{Result, anyhow};
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage,
};

use crate::database::{establish_connection, models::MusicHistory};

pub fn definition() -> CreateCommand {
    CreateCommand::new("history").description("Show this server's recently played tracks")
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let guild_id = cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))?;

    let rows = {
        let mut conn = establish_connection()?;
        MusicHistory::recent_for_guild(&mut conn, &guild_id.to_string(), 10)?
    };

    let response = if rows.is_empty() {
        CreateInteractionResponseMessage::new()
            .content("📭 No tracks have been played in this server yet.")
    } else {
        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let icon = if row.action == "played" { "▶️" } else { "➕" };
            lines.push(format!(
                "`{}` {icon} **{}**",
                row.created_at.format("%Y-%m-%d %H:%M"),
                truncate_title(&row.title, 60)
            ));
        }
        let embed = CreateEmbed::new()
            .title("🎧 Last 10 tracks")
            .description(lines.join("\n"))
            .colour(0x00FF7F);
        CreateInteractionResponseMessage::new().embeds(vec![embed])
    };

    cmd.create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await
        .ok();
    Ok(())
}

fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_titles_are_untouched() {
        assert_eq!(truncate_title("short", 60), "short");
    }

    #[test]
    fn long_titles_are_cut_on_char_boundaries() {
        let long = "é".repeat(80);
        let cut = truncate_title(&long, 60);
        assert_eq!(cut.chars().count(), 60);
        assert!(cut.ends_with("..."));
    }
}
