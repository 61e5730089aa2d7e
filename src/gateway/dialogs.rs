//! Native file dialogs.

use crate::model::{OutputFormat, VIDEO_EXTENSIONS};
use std::path::PathBuf;

#[cfg(feature = "dialogs")]
pub async fn pick_input_file() -> Option<PathBuf> {
    // The synchronous dialog runs on the blocking pool so the TUI thread and
    // runtime workers stay free.
    tokio::task::spawn_blocking(|| {
        rfd::FileDialog::new()
            .set_title("Select the video file")
            .add_filter("Videos", &VIDEO_EXTENSIONS)
            .pick_file()
    })
    .await
    .ok()
    .flatten()
}

#[cfg(feature = "dialogs")]
pub async fn pick_output_location(default_name: &str, format: OutputFormat) -> Option<PathBuf> {
    let default_name = default_name.to_string();
    tokio::task::spawn_blocking(move || {
        rfd::FileDialog::new()
            .set_file_name(&default_name)
            .add_filter("Video", &[format.extension()])
            .save_file()
    })
    .await
    .ok()
    .flatten()
}

#[cfg(not(feature = "dialogs"))]
pub async fn pick_input_file() -> Option<PathBuf> {
    tracing::warn!(
        extensions = ?VIDEO_EXTENSIONS,
        "built without native dialogs; pass --input instead"
    );
    None
}

#[cfg(not(feature = "dialogs"))]
pub async fn pick_output_location(default_name: &str, format: OutputFormat) -> Option<PathBuf> {
    tracing::warn!(
        default_name,
        %format,
        "built without native dialogs; pass --output instead"
    );
    None
}
