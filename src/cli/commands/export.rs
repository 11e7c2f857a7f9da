//! Export command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::resolver::SubtitleResolver;
use crate::store::{Catalog, SqliteCatalog};
use crate::subtitle;
use anyhow::Result;
use std::sync::Arc;

/// Run the export command.
///
/// Resolves the track set first (a previously resolved part is served from the
/// catalog without touching the network), then renders the first track as
/// compacted plain text.
pub async fn run_export(
    url: &str,
    cookie: &str,
    min_chars: usize,
    timestamps: bool,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
    let resolver = SubtitleResolver::new(&settings, catalog)?;

    let tracks = resolver.resolve_url(url, cookie).await?;

    let track = match tracks.first() {
        Some(track) => track,
        None => {
            Output::error("Resolution produced no subtitle track.");
            return Ok(());
        }
    };

    let text = subtitle::compact_text(track, min_chars, timestamps);

    match output {
        Some(path) if path != "-" => {
            std::fs::write(&path, &text)?;
            Output::success(&format!(
                "Exported '{}' to {} ({} cues)",
                track.language_label,
                path,
                track.cues.len()
            ));
        }
        _ => {
            println!("{}", text);
        }
    }

    Ok(())
}
