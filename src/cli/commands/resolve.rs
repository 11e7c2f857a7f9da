//! Resolve command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::resolver::SubtitleResolver;
use crate::store::{Catalog, SqliteCatalog};
use anyhow::Result;
use std::sync::Arc;

/// Run the resolve command.
pub async fn run_resolve(
    url: &str,
    cookie: &str,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
    let resolver = SubtitleResolver::new(&settings, catalog)?;

    let tracks = resolver.resolve_url(url, cookie).await?;

    Output::header(&format!("Resolved {} track(s)", tracks.len()));
    println!();
    for track in &tracks {
        let duration = track
            .cues
            .last()
            .map(|cue| cue.end_seconds)
            .unwrap_or_default();
        Output::track_info(&track.language_label, track.cues.len(), duration);
    }
    println!();

    let json = serde_json::to_string_pretty(&tracks)?;
    match output {
        Some(path) if path != "-" => {
            std::fs::write(&path, &json)?;
            Output::success(&format!("Wrote track set to {}", path));
        }
        _ => {
            println!("{}", json);
        }
    }

    Ok(())
}
