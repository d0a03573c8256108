use crate::error::OtbResult;
use crate::reader::{OtbReader, ReadOptions, ReadStats};
use crate::writer::OtbWriter;
use itemforge_types::{ProgressSink, ServerItemList};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// A loaded item database bound to its file.
///
/// The list sits behind a read-write lock: read-only queries may proceed
/// in parallel, while mutations, saves and reloads each hold the write
/// side for the whole operation. Share the document with `Arc` when more
/// than one owner needs it.
pub struct OtbDocument {
    path: PathBuf,
    list: RwLock<ServerItemList>,
    stats: ReadStats,
}

impl OtbDocument {
    pub fn open(path: &Path, options: ReadOptions) -> OtbResult<Self> {
        Self::open_with_progress(path, options, &mut ProgressSink::disabled())
    }

    pub fn open_with_progress(
        path: &Path,
        options: ReadOptions,
        progress: &mut ProgressSink<'_>,
    ) -> OtbResult<Self> {
        let mut reader = OtbReader::new(options);
        let list = reader.read_with_progress(path, progress)?;
        info!(path = %path.display(), items = list.len(), "document opened");
        Ok(Self {
            path: path.to_path_buf(),
            list: RwLock::new(list),
            stats: reader.stats().clone(),
        })
    }

    /// Creates an empty, unsaved document targeting `path`.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            list: RwLock::new(ServerItemList::new()),
            stats: ReadStats::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Statistics from the read that populated this document.
    pub fn read_stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Shared read access; any number may be held at once.
    pub fn read(&self) -> RwLockReadGuard<'_, ServerItemList> {
        self.list.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive access for mutations. Callers mark the list dirty via its
    /// own mutators; the guard serializes the whole edit.
    pub fn modify(&self) -> RwLockWriteGuard<'_, ServerItemList> {
        self.list.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_modified(&self) -> bool {
        self.read().is_dirty()
    }

    /// Writes the list to its file, holding the write lock so no edit can
    /// interleave with serialization.
    pub fn save(&self) -> OtbResult<()> {
        self.save_to(&self.path)
    }

    pub fn save_as(&mut self, path: &Path) -> OtbResult<()> {
        self.save_to(path)?;
        self.path = path.to_path_buf();
        Ok(())
    }

    fn save_to(&self, path: &Path) -> OtbResult<()> {
        let mut list = self.modify();
        OtbWriter::new().write(path, &list)?;
        list.clear_dirty();
        info!(path = %path.display(), items = list.len(), "document saved");
        Ok(())
    }

    /// Discards in-memory state and re-reads the file.
    pub fn reload(&mut self, options: ReadOptions) -> OtbResult<()> {
        let mut reader = OtbReader::new(options);
        let fresh = reader.read(&self.path)?;
        self.stats = reader.stats().clone();
        *self.modify() = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemforge_types::{ServerItem, ServerItemType};

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("items.otb");
        let document = OtbDocument::create(&path);
        {
            let mut list = document.modify();
            list.version.major = 1;
            list.description = "document fixture".into();
            let mut item = ServerItem::new(100, ServerItemType::Ground);
            item.name = "dirt".into();
            list.add(item).unwrap();
        }
        document.save().unwrap();
        path
    }

    #[test]
    fn test_open_save_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());

        let document = OtbDocument::open(&path, ReadOptions::default()).unwrap();
        assert!(!document.is_modified());
        assert_eq!(document.read().len(), 1);

        {
            let mut list = document.modify();
            let mut item = ServerItem::new(101, ServerItemType::Container);
            item.name = "crate".into();
            list.add(item).unwrap();
        }
        assert!(document.is_modified());

        document.save().unwrap();
        assert!(!document.is_modified());

        let reopened = OtbDocument::open(&path, ReadOptions::default()).unwrap();
        assert_eq!(reopened.read().len(), 2);
    }

    #[test]
    fn test_reload_discards_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());

        let mut document = OtbDocument::open(&path, ReadOptions::default()).unwrap();
        document
            .modify()
            .add(ServerItem::new(150, ServerItemType::Fluid))
            .unwrap();
        assert_eq!(document.read().len(), 2);

        document.reload(ReadOptions::default()).unwrap();
        assert_eq!(document.read().len(), 1);
        assert!(!document.is_modified());
    }

    #[test]
    fn test_concurrent_readers() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let document = OtbDocument::open(&path, ReadOptions::default()).unwrap();
        let a = document.read();
        let b = document.read();
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_save_as_rebinds_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let mut document = OtbDocument::open(&path, ReadOptions::default()).unwrap();

        let copy = dir.path().join("copy.otb");
        document.save_as(&copy).unwrap();
        assert_eq!(document.path(), copy.as_path());
        assert!(copy.exists());
    }
}
