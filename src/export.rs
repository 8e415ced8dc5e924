use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::session::Mode;

pub const VCARD_MIME: &str = "text/vcard; charset=utf-8";

/// `contact.vcf` for a single card, `contacts_batch_{N}.vcf` for a batch.
pub fn file_name(mode: Mode, batch_len: usize) -> String {
    match mode {
        Mode::Single => "contact.vcf".to_string(),
        Mode::Batch => format!("contacts_batch_{}.vcf", batch_len),
    }
}

/// Write `content` as UTF-8 to `dir/name`. Returns `None` when there is
/// nothing to export.
pub fn write_export(dir: &Path, name: &str, content: &str) -> Result<Option<PathBuf>> {
    if content.trim().is_empty() {
        return Ok(None);
    }

    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export dir: {}", dir.display()))?;
    }

    let path = dir.join(name);
    fs::write(&path, content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), bytes = content.len(), mime = VCARD_MIME, "exported vCard");
    Ok(Some(path))
}
