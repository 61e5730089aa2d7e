use crate::model::HistoryEntry;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Default export file name for a history entry.
pub fn export_file_name(entry: &HistoryEntry) -> String {
    let stem = Path::new(&entry.original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".into());
    format!("video-enhancer-{}-{}.json", stem, entry.id)
}

/// Export an entry as JSON into `dir`.
/// Returns the absolute path of the exported file.
pub fn export_entry_json_in(dir: &Path, entry: &HistoryEntry) -> Result<PathBuf> {
    let path = dir.join(export_file_name(entry));
    crate::orchestrator::export_entry_json(&path, entry)?;
    Ok(path)
}

/// Export an entry as JSON into the current directory.
pub fn export_entry_json(entry: &HistoryEntry) -> Result<PathBuf> {
    let current_dir = std::env::current_dir().context("get current directory")?;
    export_entry_json_in(&current_dir, entry)
}

/// Initialize the clipboard manager thread if not already initialized.
/// This creates a background thread that processes clipboard operations sequentially,
/// keeping each clipboard instance alive for a sufficient duration.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                match Clipboard::new() {
                    Ok(mut clipboard) => {
                        if clipboard.set_text(&text).is_ok() {
                            // Clipboard managers on Linux read from the owning instance.
                            std::thread::sleep(Duration::from_secs(2));
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "clipboard unavailable"),
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
