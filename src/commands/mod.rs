use anyhow::Result;
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, Context as SerenityContext,
    CreateInteractionResponse, CreateInteractionResponseMessage,
};

pub mod attendance;
pub mod history;
pub mod next;
pub mod play;
pub mod reminder;
pub mod stop;
pub mod todo;

pub(crate) fn str_option<'a>(cmd: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    cmd.data.options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        CommandDataOptionValue::String(s) => Some(s.as_str()),
        _ => None,
    })
}

pub(crate) fn int_option(cmd: &CommandInteraction, name: &str) -> Option<i64> {
    cmd.data.options.iter().find(|o| o.name == name).and_then(|o| match &o.value {
        CommandDataOptionValue::Integer(v) => Some(*v),
        _ => None,
    })
}

pub(crate) async fn respond(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(ephemeral),
        ),
    )
    .await?;
    Ok(())
}
