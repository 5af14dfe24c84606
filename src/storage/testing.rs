//! In-memory backend for unit tests
//!
//! Keeps entries in insertion order (its "native" order) and records every
//! primitive call so tests can assert on what reached the backend.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{FormatError, MountError, StorageError};
use crate::storage::backend::{
    Backend, CardType, DirEntry, EntryKind, FormatType, MountOptions, WriteMode,
};
use crate::storage::path::{CanonicalPath, normalize};

/// Shared view of the calls made on a [`MemoryBackend`]
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<&'static str>>>);

impl CallLog {
    fn record(&self, call: &'static str) {
        self.0.borrow_mut().push(call);
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.borrow().iter().filter(|c| **c == call).count()
    }

    pub fn total(&self) -> usize {
        self.0.borrow().len()
    }
}

enum Node {
    File(Vec<u8>),
    Dir,
}

pub struct MemoryBackend {
    capacity: u64,
    card_type: CardType,
    entries: Vec<(String, Node)>,
    mounted: bool,
    formattable: bool,
    begin_failure: Option<Box<dyn Fn() -> MountError>>,
    successful_begins_left: Option<usize>,
    calls: CallLog,
}

impl MemoryBackend {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            card_type: CardType::Sd,
            entries: Vec::new(),
            mounted: false,
            formattable: false,
            begin_failure: None,
            successful_begins_left: None,
            calls: CallLog::default(),
        }
    }

    pub fn with_card_type(mut self, card_type: CardType) -> Self {
        self.card_type = card_type;
        self
    }

    pub fn with_format_support(mut self) -> Self {
        self.formattable = true;
        self
    }

    pub fn failing_begin(self, failure: impl Fn() -> MountError + 'static) -> Self {
        self.failing_begin_after(0, failure)
    }

    /// Let `successes` mounts through, then fail every later one
    pub fn failing_begin_after(
        mut self,
        successes: usize,
        failure: impl Fn() -> MountError + 'static,
    ) -> Self {
        self.begin_failure = Some(Box::new(failure));
        self.successful_begins_left = Some(successes);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn position(&self, path: &CanonicalPath) -> Option<usize> {
        self.entries.iter().position(|(p, _)| p == path.as_str())
    }

    fn kind_of(&self, path: &CanonicalPath) -> Option<EntryKind> {
        if path.is_root() {
            return Some(EntryKind::Directory);
        }
        self.position(path).map(|idx| match self.entries[idx].1 {
            Node::File(_) => EntryKind::File,
            Node::Dir => EntryKind::Directory,
        })
    }

    fn parent_exists(&self, path: &CanonicalPath) -> bool {
        let (parent, _) = path.split_last();
        self.kind_of(&parent) == Some(EntryKind::Directory)
    }

    fn used(&self) -> u64 {
        self.entries
            .iter()
            .map(|(_, node)| match node {
                Node::File(data) => data.len() as u64,
                Node::Dir => 0,
            })
            .sum()
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn begin(&mut self, _options: &MountOptions) -> Result<CardType, MountError> {
        self.calls.record("begin");
        if let Some(failure) = &self.begin_failure {
            match self.successful_begins_left {
                Some(left) if left > 0 => self.successful_begins_left = Some(left - 1),
                _ => return Err(failure()),
            }
        }
        self.mounted = true;
        Ok(self.card_type)
    }

    fn end(&mut self) {
        self.calls.record("end");
        self.mounted = false;
    }

    fn supports_format(&self) -> bool {
        self.formattable
    }

    fn format(
        &mut self,
        _format_type: FormatType,
        _options: &MountOptions,
    ) -> Result<(), FormatError> {
        self.calls.record("format");
        if !self.formattable {
            return Err(FormatError::FormatUnsupported);
        }
        self.entries.clear();
        self.mounted = false;
        Ok(())
    }

    fn write_file(
        &mut self,
        path: &CanonicalPath,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        self.calls.record("write_file");
        if !self.parent_exists(path) || self.kind_of(path) == Some(EntryKind::Directory) {
            return Err(StorageError::OpenFailure(path.to_string()));
        }

        match self.position(path) {
            Some(idx) => {
                if let Node::File(content) = &mut self.entries[idx].1 {
                    if mode == WriteMode::Truncate {
                        content.clear();
                    }
                    content.extend_from_slice(data);
                }
            }
            None => self
                .entries
                .push((path.to_string(), Node::File(data.to_vec()))),
        }
        Ok(())
    }

    fn read_file(&mut self, path: &CanonicalPath) -> Result<Vec<u8>, StorageError> {
        self.calls.record("read_file");
        match self.position(path).map(|idx| &self.entries[idx].1) {
            Some(Node::File(data)) => Ok(data.clone()),
            _ => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn remove_file(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        self.calls.record("remove_file");
        match self.kind_of(path) {
            Some(EntryKind::File) => {
                if let Some(idx) = self.position(path) {
                    self.entries.remove(idx);
                }
                Ok(())
            }
            Some(EntryKind::Directory) => Err(StorageError::NotAFile(path.to_string())),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn stat(&mut self, path: &CanonicalPath) -> Result<Option<EntryKind>, StorageError> {
        self.calls.record("stat");
        Ok(self.kind_of(path))
    }

    fn create_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        self.calls.record("create_dir");
        if self.kind_of(path).is_some() {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        if !self.parent_exists(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        self.entries.push((path.to_string(), Node::Dir));
        Ok(())
    }

    fn remove_dir(&mut self, path: &CanonicalPath) -> Result<(), StorageError> {
        self.calls.record("remove_dir");
        match self.kind_of(path) {
            Some(EntryKind::Directory) => {
                let prefix = format!("{}/", path);
                if self.entries.iter().any(|(p, _)| p.starts_with(&prefix)) {
                    return Err(StorageError::IoError(std::io::Error::other(
                        "directory not empty",
                    )));
                }
                if let Some(idx) = self.position(path) {
                    self.entries.remove(idx);
                }
                Ok(())
            }
            Some(EntryKind::File) => Err(StorageError::NotADirectory(path.to_string())),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn list_dir(&mut self, path: &CanonicalPath) -> Result<Vec<DirEntry>, StorageError> {
        self.calls.record("list_dir");
        if self.kind_of(path) != Some(EntryKind::Directory) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        Ok(self
            .entries
            .iter()
            .filter_map(|(p, node)| {
                let entry_path = normalize(p);
                let (parent, name) = entry_path.split_last();
                if parent != *path {
                    return None;
                }
                let kind = match node {
                    Node::File(_) => EntryKind::File,
                    Node::Dir => EntryKind::Directory,
                };
                Some(DirEntry {
                    name: name.to_string(),
                    kind,
                })
            })
            .collect())
    }

    fn total_bytes(&mut self) -> Result<u64, StorageError> {
        self.calls.record("total_bytes");
        Ok(self.capacity)
    }

    fn free_bytes(&mut self) -> Result<u64, StorageError> {
        self.calls.record("free_bytes");
        Ok(self.capacity.saturating_sub(self.used()))
    }
}
