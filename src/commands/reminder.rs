use anyhow::{Result, anyhow};
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateCommand,
    CreateCommandOption,
};

use crate::clock;
use crate::commands::{respond, str_option};
use crate::database::{establish_connection, models::Reminder};
use crate::reminders;

pub fn definition() -> CreateCommand {
    CreateCommand::new("reminder")
        .description("Schedule a reminder in this channel")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "message", "Message to send")
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "date", "Date (YYYY-MM-DD)")
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "time", "Time (HH:MM, 24-hour)")
                .required(true),
        )
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let message = str_option(cmd, "message").ok_or_else(|| anyhow!("missing message"))?;
    let date = str_option(cmd, "date").ok_or_else(|| anyhow!("missing date"))?;
    let time = str_option(cmd, "time").ok_or_else(|| anyhow!("missing time"))?;

    let send_time = match clock::parse_date_time(date, time) {
        Ok(t) => t,
        Err(_) => {
            return respond(
                ctx,
                cmd,
                "⚠️ Invalid date or time. Use YYYY-MM-DD and HH:MM (24-hour).",
                true,
            )
            .await;
        }
    };
    if send_time <= clock::now_naive() {
        return respond(ctx, cmd, "❌ That time is already in the past.", true).await;
    }

    let reminder = {
        let mut conn = establish_connection()?;
        Reminder::create(
            &mut conn,
            &cmd.user.id.to_string(),
            &cmd.channel_id.to_string(),
            message,
            send_time,
        )?
    };

    reminders::schedule(ctx.http.clone(), reminder.id, reminder.send_time);

    respond(
        ctx,
        cmd,
        format!(
            "✅ Reminder set for **{} WIB**.",
            send_time.format("%Y-%m-%d %H:%M")
        ),
        false,
    )
    .await
}
