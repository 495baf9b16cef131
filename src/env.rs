use anyhow::{Result, anyhow};

pub fn read_discord_token() -> Result<String> {
    const CANDIDATES: &[&str] = &["DISCORD_TOKEN", "DISCORD_BOT_TOKEN", "BOT_TOKEN"];
    for key in CANDIDATES {
        if let Ok(val) = std::env::var(key)
            && !val.is_empty()
        {
            return Ok(val);
        }
    }
    Err(anyhow!(
        "Set one of DISCORD_TOKEN, DISCORD_BOT_TOKEN, or BOT_TOKEN in environment"
    ))
}

/// Sqlite path; relative paths resolve against the working directory.
pub fn read_database_url() -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "chime.db".to_string())
}
