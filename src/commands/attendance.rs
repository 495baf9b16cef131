use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateAttachment,
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EditInteractionResponse,
};

use crate::clock;
use crate::commands::{respond, str_option};
use crate::database::{establish_connection, models::Attendance};

pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new("checkin").description("Record your daily check-in"),
        CreateCommand::new("checkout").description("Record your checkout time"),
        CreateCommand::new("attendance").description("Show your last 5 attendance records"),
        CreateCommand::new("export_attendance")
            .description("Export your attendance to a CSV file")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "start_date",
                    "Start date (YYYY-MM-DD, optional)",
                )
                .required(false),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "end_date",
                    "End date (YYYY-MM-DD, optional)",
                )
                .required(false),
            ),
    ]
}

pub async fn handle_checkin(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let guild_id = cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))?;
    let now = clock::now_naive();

    {
        let mut conn = establish_connection()?;
        Attendance::check_in(
            &mut conn,
            &cmd.user.id.to_string(),
            &cmd.user.name,
            &guild_id.to_string(),
            now,
        )?;
    }

    respond(
        ctx,
        cmd,
        format!(
            "✅ {}, checked in at **{} WIB**!",
            cmd.user.name,
            now.format("%Y-%m-%d %H:%M:%S")
        ),
        false,
    )
    .await
}

pub async fn handle_checkout(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let guild_id = cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))?;
    let (day_start, day_end) = clock::day_bounds(clock::today());

    let record = {
        let mut conn = establish_connection()?;
        Attendance::latest_for_window(
            &mut conn,
            &cmd.user.id.to_string(),
            &guild_id.to_string(),
            day_start,
            day_end,
        )?
    };

    let Some(record) = record else {
        return respond(ctx, cmd, "⚠️ You have not checked in today.", false).await;
    };
    if record.checkout_time.is_some() {
        return respond(ctx, cmd, "🕓 You already checked out today.", false).await;
    }

    let now = clock::now_naive();
    let secs = (now - record.checkin_time).num_seconds().max(0);
    {
        let mut conn = establish_connection()?;
        Attendance::complete(&mut conn, record.id, now, secs as i32)?;
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    respond(
        ctx,
        cmd,
        format!(
            "👋 Checked out at **{} WIB**!\n⏰ Worked today: **{hours} h {minutes} min**.",
            now.format("%Y-%m-%d %H:%M:%S")
        ),
        false,
    )
    .await
}

pub async fn handle_history(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let rows = {
        let mut conn = establish_connection()?;
        Attendance::recent_for_user(&mut conn, &cmd.user.id.to_string(), 5)?
    };

    if rows.is_empty() {
        return respond(ctx, cmd, "📭 No attendance records yet.", false).await;
    }

    let mut msg = vec!["🗓️ **Last 5 attendance records:**".to_string()];
    for row in &rows {
        let checkin = row.checkin_time.format("%Y-%m-%d %H:%M:%S").to_string();
        let checkout = row
            .checkout_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let duration = row
            .work_duration_secs
            .map(|secs| clock::format_hms(secs.into()))
            .unwrap_or_else(|| "-".to_string());
        msg.push(format!("📅 {checkin} → {checkout} | ⏱️ {duration}"));
    }
    respond(ctx, cmd, msg.join("\n"), false).await
}

pub async fn handle_export(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await
    .ok();

    let guild_id = cmd.guild_id.ok_or_else(|| anyhow!("not in a guild"))?;
    let Ok((start, end)) = parse_window(str_option(cmd, "start_date"), str_option(cmd, "end_date"))
    else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("⚠️ Invalid date format. Use YYYY-MM-DD."),
        )
        .await
        .ok();
        return Ok(());
    };

    let rows = {
        let mut conn = establish_connection()?;
        Attendance::in_range(
            &mut conn,
            &cmd.user.id.to_string(),
            &guild_id.to_string(),
            start,
            end,
        )?
    };

    if rows.is_empty() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("📭 No attendance records for that period."),
        )
        .await
        .ok();
        return Ok(());
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["No", "Date", "Check-in", "Checkout", "Duration"])?;
    for (i, row) in rows.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            row.checkin_time.format("%Y-%m-%d").to_string(),
            row.checkin_time.format("%H:%M:%S").to_string(),
            row.checkout_time
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            row.work_duration_secs
                .map(|secs| clock::format_hms(secs.into()))
                .unwrap_or_else(|| "-".to_string()),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| anyhow!("building csv: {e}"))?;

    let filename = format!(
        "attendance_{}_{}.csv",
        cmd.user.name,
        clock::now().format("%Y%m%d_%H%M%S")
    );
    cmd.create_followup(
        &ctx.http,
        CreateInteractionResponseFollowup::new()
            .content(format!("📊 Attendance export for {}:", cmd.user.name))
            .add_file(CreateAttachment::bytes(bytes, filename)),
    )
    .await?;
    Ok(())
}

/// Inclusive start-of-day to exclusive day-after-end window.
fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>)> {
    let start = match start.filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => Some(clock::day_bounds(clock::parse_date(raw)?).0),
    };
    let end = match end.filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => Some(clock::day_bounds(clock::parse_date(raw)?).1),
    };
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_window_is_inclusive_of_the_end_day() {
        let (start, end) = parse_window(Some("2025-01-01"), Some("2025-01-02")).unwrap();
        let start = start.unwrap();
        let end = end.unwrap();
        assert_eq!(start.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-01-01 00:00:00");
        // Exclusive upper bound lands on the next midnight.
        assert_eq!(end.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-01-03 00:00:00");
        assert!(parse_window(Some("bad"), None).is_err());
    }
}
