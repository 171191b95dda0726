use anyhow::{Context, Result};
use log::debug;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::runtime::Runtime;

use super::extract::{DIR_MODE, FILE_MODE};

/// Writes a directory tree into a single zip archive.
pub struct ZipPacker;

impl ZipPacker {
    /// Archive everything below `source_dir` into `archive_path`.
    ///
    /// Entry names are relative to `source_dir` and always use `/`. Entries
    /// are written in name order so identical trees give identical listings.
    #[tracing::instrument(skip(self, runtime))]
    pub fn pack<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        source_dir: &Path,
        archive_path: &Path,
    ) -> Result<u64> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut count = 0u64;

        let mut pending = vec![String::new()];
        while let Some(prefix) = pending.pop() {
            let dir = if prefix.is_empty() {
                source_dir.to_path_buf()
            } else {
                source_dir.join(&prefix)
            };
            let mut entries = runtime.read_dir(&dir)?;
            entries.sort();

            // Reverse so the stack pops subdirectories in name order
            let mut subdirs = Vec::new();
            for entry in entries {
                let name = entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("Invalid file name {:?}", entry))?;
                let entry_name = format!("{}{}", prefix, name);

                if runtime.is_dir(&entry) {
                    zip.add_directory(
                        format!("{}/", entry_name),
                        SimpleFileOptions::default().unix_permissions(DIR_MODE),
                    )?;
                    subdirs.push(format!("{}/", entry_name));
                } else {
                    zip.start_file(
                        entry_name.as_str(),
                        SimpleFileOptions::default().unix_permissions(FILE_MODE),
                    )?;
                    let mut reader = runtime.open(&entry)?;
                    std::io::copy(&mut reader, &mut zip)
                        .with_context(|| format!("Failed to add {:?} to archive", entry))?;
                    count += 1;
                }
            }
            pending.extend(subdirs.into_iter().rev());
        }

        let bytes = zip.finish()?.into_inner();
        if let Some(parent) = archive_path.parent() {
            runtime.create_dir_all(parent)?;
        }
        let mut out = runtime.create_file(archive_path)?;
        out.write_all(&bytes)
            .with_context(|| format!("Failed to write archive {:?}", archive_path))?;

        debug!("Packed {} file(s) into {:?}", count, archive_path);
        Ok(count)
    }
}
