use std::{
    fs::File,
    io::{Seek, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use shared::domain::Note;
use tracing::info;

/// Entry name of a note inside the archive. Trashed notes live under `trash/`.
pub fn entry_name(note: &Note) -> String {
    let file_name: String = note
        .id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if note.deleted {
        format!("trash/{file_name}.txt")
    } else {
        format!("{file_name}.txt")
    }
}

pub fn write_archive<W: Write + Seek>(out: W, notes: &[Note]) -> anyhow::Result<W> {
    let mut writer = zip::ZipWriter::new(out);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for note in notes {
        let name = entry_name(note);
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("failed to start archive entry '{name}'"))?;
        writer
            .write_all(note.content.as_bytes())
            .with_context(|| format!("failed to write archive entry '{name}'"))?;
    }
    writer.finish().context("failed to finish archive")
}

/// Writes one deflated entry per note to `path` off the async runtime.
pub async fn export_zip_archive(path: PathBuf, notes: Vec<Note>) -> anyhow::Result<PathBuf> {
    tokio::task::spawn_blocking(move || {
        let file = File::create(&path)
            .with_context(|| format!("failed to create archive '{}'", path.display()))?;
        write_archive(file, &notes)?;
        info!(path = %path.display(), notes = notes.len(), "exported notes");
        Ok(path)
    })
    .await
    .context("export task panicked")?
}

pub fn default_archive_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("notes-{}.zip", now.format("%Y-%m-%d"))
}

pub fn resolve_archive_path(requested: &Path) -> PathBuf {
    if requested.as_os_str().is_empty() || requested.is_dir() {
        requested.join(default_archive_name(chrono::Local::now()))
    } else {
        requested.to_path_buf()
    }
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
