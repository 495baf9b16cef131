use std::process::Stdio;

use anyhow::{Context as AnyhowContext, anyhow};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command as TokioCommand;
use url::Url;

use crate::queue::Track;

/// Format preference handed to the lookup tool; low-bitrate audio keeps the
/// voice pipeline light. Overridable via CHIME_AUDIO_FORMAT.
const DEFAULT_FORMAT: &str = "bestaudio[abr<=96]/bestaudio";

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The lookup ran but matched nothing. Nothing gets enqueued.
    #[error("no results for that query")]
    NoResults,
    /// The lookup itself failed: missing binary, crash, unusable output.
    #[error("track lookup failed: {0}")]
    Lookup(#[source] anyhow::Error),
}

#[derive(Debug, Deserialize)]
struct LookupHit {
    url: Option<String>,
    title: Option<String>,
}

fn is_url(query: &str) -> bool {
    Url::parse(query)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn format_preference() -> String {
    std::env::var("CHIME_AUDIO_FORMAT")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string())
}

/// Resolve a free-text query or URL to a playable source URL and title.
/// Free text is searched with exactly one best-match result.
pub async fn resolve(query: &str) -> Result<Track, ResolveError> {
    let ytdlp = which::which("yt-dlp")
        .map_err(|e| ResolveError::Lookup(anyhow!("yt-dlp not found on PATH: {e}")))?;

    let target = if is_url(query) {
        query.to_string()
    } else {
        format!("ytsearch1:{query}")
    };

    let out = TokioCommand::new(&ytdlp)
        .arg("-j")
        .arg("--no-playlist")
        .arg("-f")
        .arg(format_preference())
        .arg("-q")
        .arg(&target)
        .stdin(Stdio::null())
        .output()
        .await
        .context("running yt-dlp lookup")
        .map_err(ResolveError::Lookup)?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        let detail = stderr.trim().lines().last().unwrap_or_default().to_string();
        return Err(ResolveError::Lookup(anyhow!(
            "yt-dlp exited with {}: {detail}",
            out.status
        )));
    }

    parse_lookup(&String::from_utf8_lossy(&out.stdout))
}

/// Parse the first JSON document a lookup printed. An empty stdout on a
/// clean exit means the search matched nothing.
fn parse_lookup(stdout: &str) -> Result<Track, ResolveError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(ResolveError::NoResults)?;

    let hit: LookupHit = serde_json::from_str(line)
        .map_err(|e| ResolveError::Lookup(anyhow!("unparseable lookup output: {e}")))?;

    let source_url = hit
        .url
        .ok_or_else(|| ResolveError::Lookup(anyhow!("lookup result has no playable format url")))?;

    Ok(Track {
        source_url,
        title: hit.title.unwrap_or_else(|| "Unknown Title".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn urls_pass_through_search_detection() {
        assert!(is_url("https://youtu.be/abc123"));
        assert!(is_url("http://example.com/track.mp3"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/file"));
    }

    #[test]
    fn parses_a_lookup_hit() {
        let json = r#"{"url":"https://cdn.example/a.webm","title":"A Song","duration":180}"#;
        let track = parse_lookup(json).unwrap();
        assert_eq!(track.source_url, "https://cdn.example/a.webm");
        assert_eq!(track.title, "A Song");
    }

    #[test]
    fn missing_title_gets_a_placeholder() {
        let json = r#"{"url":"https://cdn.example/b.webm"}"#;
        assert_eq!(parse_lookup(json).unwrap().title, "Unknown Title");
    }

    #[test]
    fn empty_output_is_no_results() {
        assert!(matches!(parse_lookup(""), Err(ResolveError::NoResults)));
        assert!(matches!(parse_lookup("  \n  \n"), Err(ResolveError::NoResults)));
    }

    #[test]
    fn missing_format_url_is_a_lookup_failure() {
        let json = r#"{"title":"No Stream"}"#;
        assert!(matches!(parse_lookup(json), Err(ResolveError::Lookup(_))));
    }

    #[test]
    fn garbage_output_is_a_lookup_failure() {
        assert!(matches!(
            parse_lookup("WARNING: not json"),
            Err(ResolveError::Lookup(_))
        ));
    }
}
