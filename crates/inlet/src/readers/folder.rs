//! 🗂️ Folder reader — every file under a directory, recursively, one record each.
//!
//! Files ending in `.gz` are inflated on the way through. Anything that refuses to
//! become UTF-8 text (or refuses to inflate) is skipped with a `warn!`; the walk goes on.
//! The directory walk itself failing, or a file that can't even be read, is fatal.
//!
//! 🏷️ Identifier: the full path of the file, as reached from the folder you passed in.
//!
//! 🔗 Symlinks to files are read like any other file. Symlinked directories are not
//! descended into, so a link loop can't send the walk in circles.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::common::{DocumentRecord, SourceStats};
use crate::readers::DocumentSource;

const GZIP_SUFFIX: &str = ".gz";

pub struct FolderSource {
    folder: String,
    walker: Option<walkdir::IntoIter>,
    exhausted: bool,
    stats: SourceStats,
}

impl std::fmt::Debug for FolderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderSource")
            .field("folder", &self.folder)
            .field("stats", &self.stats)
            .finish()
    }
}

impl FolderSource {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            walker: None,
            exhausted: false,
            stats: SourceStats::default(),
        }
    }
}

/// 🫁 Raw bytes in, text out. `None` means "not text we can use".
fn decode_file(path: &Path, raw: Vec<u8>) -> Option<String> {
    let bytes = if path.to_string_lossy().ends_with(GZIP_SUFFIX) {
        let mut inflated = Vec::with_capacity(raw.len() * 4);
        if let Err(err) = GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated) {
            warn!("⚠️ Unable to decompress file: {} ({})", path.display(), err);
            return None;
        }
        inflated
    } else {
        raw
    };

    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!("⚠️ Unable to process file: {} ({})", path.display(), err);
            None
        }
    }
}

#[async_trait]
impl DocumentSource for FolderSource {
    async fn next_record(&mut self) -> Result<Option<DocumentRecord>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.walker.is_none() {
            debug!("🗂️ walking folder '{}'", self.folder);
            self.walker = Some(WalkDir::new(&self.folder).sort_by_file_name().into_iter());
        }

        loop {
            let Some(walker) = self.walker.as_mut() else {
                return Ok(None);
            };
            let Some(entry) = walker.next() else {
                trace!("🏁 folder '{}' fully walked", self.folder);
                self.exhausted = true;
                self.walker = None;
                return Ok(None);
            };
            let entry = entry.with_context(|| {
                format!("💀 The walk through '{}' tripped over something", self.folder)
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if entry.path_is_symlink() {
                let target_is_file = tokio::fs::metadata(entry.path())
                    .await
                    .is_ok_and(|metadata| metadata.is_file());
                if !target_is_file {
                    debug!("🔗 skipping '{}': link doesn't lead to a file", entry.path().display());
                    continue;
                }
            } else if !entry.file_type().is_file() {
                debug!("🗂️ skipping '{}': not a regular file", entry.path().display());
                continue;
            }

            let path = entry.into_path();
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("💀 Could not read '{}'", path.display()))?;

            match decode_file(&path, raw) {
                Some(content) => {
                    self.stats.emitted += 1;
                    return Ok(Some(DocumentRecord::new(path.display().to_string(), content)));
                }
                None => self.stats.skipped += 1,
            }
        }
    }

    fn stats(&self) -> SourceStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::fs;
    use std::io::Write;

    async fn drain(source: &mut FolderSource) -> Result<Vec<DocumentRecord>> {
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).expect("gzip write");
        encoder.finish().expect("gzip finish")
    }

    #[tokio::test]
    async fn the_one_where_gzipped_and_plain_files_both_come_out_as_text() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("doc1"), "plain old text")?;
        fs::write(dir.path().join("doc2.gz"), gzip("squished text"))?;

        let mut source = FolderSource::new(dir.path().display().to_string());
        let records = drain(&mut source).await?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, dir.path().join("doc1").display().to_string());
        assert_eq!(records[0].content, "plain old text");
        assert_eq!(records[1].id, dir.path().join("doc2.gz").display().to_string());
        assert_eq!(records[1].content, "squished text");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_subfolders_are_walked_too() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("a/b"))?;
        fs::write(dir.path().join("a/b/deep"), "from the depths")?;
        fs::write(dir.path().join("top"), "from the top")?;

        let mut source = FolderSource::new(dir.path().display().to_string());
        let contents: Vec<String> = drain(&mut source).await?.into_iter().map(|r| r.content).collect();

        assert_eq!(contents, vec!["from the depths", "from the top"]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_binary_and_broken_gzip_are_skipped_not_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a_binary"), [0xff, 0xfe, 0x00, 0xc3])?;
        fs::write(dir.path().join("b_fake.gz"), "not actually gzip")?;
        fs::write(dir.path().join("c_text"), "survivor")?;

        let mut source = FolderSource::new(dir.path().display().to_string());
        let records = drain(&mut source).await?;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "survivor");
        assert_eq!(source.stats().skipped, 2);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn the_one_where_symlinked_files_are_read_and_symlinked_dirs_are_not_followed() -> Result<()> {
        let outside = tempfile::tempdir()?;
        fs::write(outside.path().join("target"), "linked text")?;
        fs::create_dir(outside.path().join("elsewhere"))?;
        fs::write(outside.path().join("elsewhere/hidden"), "should not show up")?;

        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a_plain"), "plain text")?;
        std::os::unix::fs::symlink(outside.path().join("target"), dir.path().join("b_link"))?;
        std::os::unix::fs::symlink(outside.path().join("elsewhere"), dir.path().join("c_dir_link"))?;
        std::os::unix::fs::symlink(outside.path().join("gone"), dir.path().join("d_dangling"))?;
        // -- a loop back to the root, harmless because links to dirs aren't walked
        std::os::unix::fs::symlink(dir.path(), dir.path().join("e_loop"))?;

        let mut source = FolderSource::new(dir.path().display().to_string());
        let records = drain(&mut source).await?;

        let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["plain text", "linked text"]);
        assert_eq!(records[1].id, dir.path().join("b_link").display().to_string());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_missing_folder_is_fatal() {
        let mut source = FolderSource::new("/no/such/folder/anywhere");
        assert!(source.next_record().await.is_err());
    }
}
