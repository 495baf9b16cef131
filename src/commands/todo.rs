use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serenity::all::{
    CommandInteraction, CommandOptionType, Context as SerenityContext, CreateAttachment,
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage, EditInteractionResponse,
};

use crate::clock;
use crate::commands::{int_option, respond, str_option};
use crate::database::{establish_connection, models::Todo};

/// Discord caps message bodies at 2000 chars; stay under with headroom.
const CHUNK_LIMIT: usize = 1900;

pub fn definitions() -> Vec<CreateCommand> {
    let date_opt = || {
        CreateCommandOption::new(CommandOptionType::String, "date", "Date (YYYY-MM-DD, optional)")
            .required(false)
    };
    vec![
        CreateCommand::new("add")
            .description("Add a task to your to-do list")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "task", "Task description")
                    .required(true),
            )
            .add_option(date_opt()),
        CreateCommand::new("list")
            .description("Show your tasks for a date")
            .add_option(date_opt()),
        CreateCommand::new("done")
            .description("Mark a task as done")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "task_id", "Task ID")
                    .required(true),
            ),
        CreateCommand::new("delete")
            .description("Delete a task by ID")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "task_id", "Task ID")
                    .required(true),
            ),
        CreateCommand::new("clear")
            .description("Delete all tasks for a date (default: today)")
            .add_option(date_opt()),
        CreateCommand::new("dates").description("Show all your tasks, grouped by date"),
        CreateCommand::new("export_todos")
            .description("Export your tasks to a CSV file")
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

/// Optional `date` option, defaulting to today. `Err(())` means the user
/// typed something unparseable and has already been answered.
async fn date_or_today(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
) -> Result<std::result::Result<NaiveDate, ()>> {
    match str_option(cmd, "date").filter(|s| !s.trim().is_empty()) {
        None => Ok(Ok(clock::today())),
        Some(raw) => match clock::parse_date(raw) {
            Ok(date) => Ok(Ok(date)),
            Err(_) => {
                respond(ctx, cmd, "⚠️ Invalid date format. Use YYYY-MM-DD.", true).await?;
                Ok(Err(()))
            }
        },
    }
}

pub async fn handle_add(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let task = str_option(cmd, "task").ok_or_else(|| anyhow!("missing task"))?;
    let Ok(date) = date_or_today(ctx, cmd).await? else {
        return Ok(());
    };

    let todo = {
        let mut conn = establish_connection()?;
        Todo::create(
            &mut conn,
            &cmd.user.id.to_string(),
            date,
            task,
            clock::now_naive(),
        )?
    };

    respond(
        ctx,
        cmd,
        format!("📝 Added **{}** for **{date}** (ID: {}).", todo.task, todo.id),
        false,
    )
    .await
}

pub async fn handle_list(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Ok(date) = date_or_today(ctx, cmd).await? else {
        return Ok(());
    };

    let rows = {
        let mut conn = establish_connection()?;
        Todo::for_date(&mut conn, &cmd.user.id.to_string(), date)?
    };

    if rows.is_empty() {
        return respond(ctx, cmd, format!("✨ No tasks for **{date}**."), false).await;
    }

    let mut msg = vec![format!("📅 **Tasks for {date}:**")];
    for todo in &rows {
        msg.push(format!("{} {} (ID: {})", status_mark(todo.done), todo.task, todo.id));
    }
    respond(ctx, cmd, msg.join("\n"), false).await
}

pub async fn handle_done(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let task_id = int_option(cmd, "task_id").ok_or_else(|| anyhow!("missing task_id"))? as i32;
    let affected = {
        let mut conn = establish_connection()?;
        Todo::mark_done(&mut conn, task_id, &cmd.user.id.to_string())?
    };
    if affected > 0 {
        respond(ctx, cmd, format!("✅ Task {task_id} marked as done!"), false).await
    } else {
        respond(ctx, cmd, "❌ Task ID not found.", false).await
    }
}

pub async fn handle_delete(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let task_id = int_option(cmd, "task_id").ok_or_else(|| anyhow!("missing task_id"))? as i32;
    let affected = {
        let mut conn = establish_connection()?;
        Todo::delete(&mut conn, task_id, &cmd.user.id.to_string())?
    };
    if affected > 0 {
        respond(ctx, cmd, format!("🗑️ Task {task_id} deleted."), false).await
    } else {
        respond(ctx, cmd, "❌ Task ID not found.", false).await
    }
}

pub async fn handle_clear(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Ok(date) = date_or_today(ctx, cmd).await? else {
        return Ok(());
    };
    let removed = {
        let mut conn = establish_connection()?;
        Todo::clear_date(&mut conn, &cmd.user.id.to_string(), date)?
    };
    respond(ctx, cmd, format!("🧹 Cleared {removed} task(s) for {date}."), false).await
}

pub async fn handle_dates(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let rows = {
        let mut conn = establish_connection()?;
        Todo::all_for_user(&mut conn, &cmd.user.id.to_string())?
    };

    if rows.is_empty() {
        return respond(ctx, cmd, "✨ You have no tasks at all.", false).await;
    }

    let mut grouped: BTreeMap<NaiveDate, Vec<&Todo>> = BTreeMap::new();
    for todo in &rows {
        grouped.entry(todo.task_date).or_default().push(todo);
    }

    let mut lines = vec!["📅 **All your tasks (WIB):**".to_string()];
    for (date, todos) in grouped {
        lines.push(format!("\n📆 {date}:"));
        for todo in todos {
            lines.push(format!("　{} {}", status_mark(todo.done), todo.task));
        }
    }

    let chunks = chunk_lines(&lines, CHUNK_LIMIT);
    let mut chunks = chunks.into_iter();
    if let Some(first) = chunks.next() {
        cmd.create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(first),
            ),
        )
        .await?;
    }
    for rest in chunks {
        cmd.create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new().content(rest),
        )
        .await?;
    }
    Ok(())
}

pub async fn handle_export(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
    )
    .await
    .ok();

    let range = parse_range(str_option(cmd, "start_date"), str_option(cmd, "end_date"));
    let Ok((start, end)) = range else {
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
        Todo::in_range(&mut conn, &cmd.user.id.to_string(), start, end)?
    };

    if rows.is_empty() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("📭 No tasks in that date range."),
        )
        .await
        .ok();
        return Ok(());
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["Date", "Task", "Status", "Created"])?;
    for todo in &rows {
        wtr.write_record([
            todo.task_date.to_string(),
            todo.task.clone(),
            if todo.done { "done".to_string() } else { "open".to_string() },
            todo.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| anyhow!("building csv: {e}"))?;

    let filename = format!("todos_{}_{}.csv", cmd.user.name, clock::today());
    cmd.create_followup(
        &ctx.http,
        CreateInteractionResponseFollowup::new()
            .content("📂 Here are your exported tasks:")
            .add_file(CreateAttachment::bytes(bytes, filename)),
    )
    .await?;
    Ok(())
}

fn status_mark(done: bool) -> &'static str {
    if done { "✅" } else { "☐" }
}

fn parse_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
    let parse = |value: Option<&str>| -> Result<Option<NaiveDate>> {
        match value.filter(|s| !s.trim().is_empty()) {
            None => Ok(None),
            Some(raw) => Ok(Some(clock::parse_date(raw)?)),
        }
    };
    Ok((parse(start)?, parse(end)?))
}

fn chunk_lines(lines: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in lines {
        if !current.is_empty() && current.len() + line.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chunking_respects_the_limit() {
        let lines: Vec<String> = (0..50).map(|i| format!("line number {i}")).collect();
        let chunks = chunk_lines(&lines, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.lines()).collect();
        assert_eq!(rejoined.len(), 50);
    }

    #[test]
    fn range_parsing_accepts_open_ends() {
        assert_eq!(parse_range(None, None).unwrap(), (None, None));
        let (start, end) = parse_range(Some("2025-01-01"), None).unwrap();
        assert!(start.is_some() && end.is_none());
        assert!(parse_range(Some("nope"), None).is_err());
    }
}
