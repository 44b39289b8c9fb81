//! Journal-backed durable catalog store.
//!
//! Every mutation is appended to a single journal file as a framed entry:
//!
//! ```text
//! magic (4) | payload length (4, LE) | CBOR payload | CRC32C of payload (4, LE)
//! ```
//!
//! On open the journal is replayed into a [`MemoryStore`]. A torn or
//! checksum-failing entry ends the replay and is truncated away, which is
//! the state left behind by a process killed mid-append.
//!
//! Updates and key-set rewrites supersede earlier entries, so the journal
//! grows with every sync run. [`FileStore::compact`] rewrites it as the
//! minimal entry sequence for the current state and swaps it in with a
//! rename. The writer lock lives on a sidecar `<journal>.lock` file so it
//! survives the swap.

use super::{CatalogStore, MemoryStore, Mutation};
use crate::error::{StoreError, StoreResult};
use crate::types::{CatalogRecord, MakeEntry, MetadataKeySet, OptionEntry, YearEntry};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const JOURNAL_MAGIC: [u8; 4] = *b"CSJ1";

const LOCK_SUFFIX: &str = ".lock";

const COMPACT_SUFFIX: &str = ".compact";

/// magic (4) + length (4)
const HEADER_SIZE: usize = 8;

const CRC_SIZE: usize = 4;

/// Result of a journal compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Entries in the journal before compaction.
    pub input_entries: usize,
    /// Entries written to the compacted journal.
    pub output_entries: usize,
    /// Bytes saved (input size - output size).
    pub bytes_saved: u64,
}

/// A durable catalog store backed by an append-only journal.
///
/// An exclusive lock is held for the lifetime of the store, so at most one
/// process writes to the journal. Readers that must not block the writer
/// use [`FileStore::snapshot`] instead.
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    journal: Mutex<Journal>,
    _lock_file: File,
}

struct Journal {
    file: File,
    /// Entries in the file, superseded ones included.
    entries: usize,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl Journal {
    fn append(&mut self, frame: &[u8]) -> StoreResult<()> {
        let len_before = self.file.metadata()?.len();
        if let Err(e) = self
            .file
            .write_all(frame)
            .and_then(|()| self.file.sync_data())
        {
            // Drop any partial frame so later appends stay replayable.
            if let Err(rollback) = self.file.set_len(len_before) {
                error!(
                    error = %e,
                    rollback_error = %rollback,
                    "journal rollback failed; refusing further writes"
                );
                self.poisoned = true;
            }
            return Err(e.into());
        }

        self.entries += 1;
        Ok(())
    }
}

impl FileStore {
    /// Opens (or creates) the journal at `path` and replays it.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process holds the store, `Corrupted`
    /// if a checksummed entry cannot be replayed, or an I/O error.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(sidecar(&path, LOCK_SUFFIX))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        // A compaction interrupted before its rename leaves its copy behind.
        let staging = sidecar(&path, COMPACT_SUFFIX);
        match fs::remove_file(&staging) {
            Ok(()) => warn!(path = %staging.display(), "removed stale compaction file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let (mutations, valid_len) = decode_journal(&bytes)?;
        let entries = mutations.len();
        let memory = replay(mutations)?;

        if valid_len < bytes.len() {
            warn!(
                path = %path.display(),
                valid_len,
                file_len = bytes.len(),
                "truncating torn journal tail"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), entries, "journal replayed");

        Ok(Self {
            path,
            memory,
            journal: Mutex::new(Journal {
                file,
                entries,
                poisoned: false,
            }),
            _lock_file: lock_file,
        })
    }

    /// Replays the journal at `path` into a detached in-memory copy.
    ///
    /// Takes no lock and never modifies the file, so it can run while a
    /// sync holds the journal. A missing journal yields an empty store.
    pub fn snapshot(path: impl AsRef<Path>) -> StoreResult<MemoryStore> {
        let bytes = match fs::read(path.as_ref()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MemoryStore::new()),
            Err(e) => return Err(e.into()),
        };
        let (mutations, _) = decode_journal(&bytes)?;
        replay(mutations)
    }

    /// Returns the journal path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all records in sequence order.
    pub fn records(&self) -> Vec<CatalogRecord> {
        self.memory.records()
    }

    /// Rewrites the journal as the minimal entry sequence that rebuilds the
    /// current state.
    ///
    /// The compacted copy is written and synced beside the journal, then
    /// renamed over it, so a crash at any point leaves one complete journal.
    /// Returns `None` when no entry is superseded.
    pub fn compact(&self) -> StoreResult<Option<CompactionResult>> {
        let mut journal = self.journal.lock();
        if journal.poisoned {
            return Err(StoreError::Poisoned);
        }

        let live = self.memory.mutations();
        if journal.entries <= live.len() {
            return Ok(None);
        }

        let mut bytes = Vec::new();
        for mutation in &live {
            bytes.extend_from_slice(&encode_frame(mutation)?);
        }

        let input_size = journal.file.metadata()?.len();
        let staging = sidecar(&self.path, COMPACT_SUFFIX);
        {
            let mut file = File::create(&staging)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &self.path)?;

        // The old handle now points at the unlinked journal.
        match OpenOptions::new().read(true).append(true).open(&self.path) {
            Ok(file) => journal.file = file,
            Err(e) => {
                error!(error = %e, "cannot reopen compacted journal; refusing further writes");
                journal.poisoned = true;
                return Err(e.into());
            }
        }

        let result = CompactionResult {
            input_entries: journal.entries,
            output_entries: live.len(),
            bytes_saved: input_size.saturating_sub(bytes.len() as u64),
        };
        journal.entries = live.len();

        info!(
            path = %self.path.display(),
            input_entries = result.input_entries,
            output_entries = result.output_entries,
            bytes_saved = result.bytes_saved,
            "journal compacted"
        );
        Ok(Some(result))
    }

    fn mutate(&self, mutation: Mutation) -> StoreResult<bool> {
        let mut journal = self.journal.lock();
        if journal.poisoned {
            return Err(StoreError::Poisoned);
        }

        if !self.memory.check(&mutation)? {
            return Ok(false);
        }

        journal.append(&encode_frame(&mutation)?)?;
        self.memory.apply(mutation)
    }
}

/// `<journal><suffix>`, next to the journal.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn replay(mutations: Vec<Mutation>) -> StoreResult<MemoryStore> {
    let memory = MemoryStore::new();
    for (index, mutation) in mutations.into_iter().enumerate() {
        memory
            .apply(mutation)
            .map_err(|e| StoreError::Corrupted(format!("entry {index}: {e}")))?;
    }
    Ok(memory)
}

fn encode_frame(mutation: &Mutation) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(mutation, &mut payload)
        .map_err(|e| StoreError::Codec(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Codec("journal entry too large".into()))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&JOURNAL_MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32c::crc32c(&payload).to_le_bytes());
    Ok(frame)
}

/// Decodes every intact frame. Returns the mutations and the byte length of
/// the intact prefix.
fn decode_journal(bytes: &[u8]) -> StoreResult<(Vec<Mutation>, usize)> {
    let mut mutations = Vec::new();
    let mut offset = 0usize;

    while bytes.len() - offset >= HEADER_SIZE {
        let header = &bytes[offset..offset + HEADER_SIZE];
        if header[0..4] != JOURNAL_MAGIC {
            break;
        }

        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let end = offset + HEADER_SIZE + len + CRC_SIZE;
        if end > bytes.len() {
            break;
        }

        let payload = &bytes[offset + HEADER_SIZE..offset + HEADER_SIZE + len];
        let crc_bytes = &bytes[end - CRC_SIZE..end];
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if crc32c::crc32c(payload) != stored_crc {
            break;
        }

        let mutation: Mutation = ciborium::from_reader(payload).map_err(|e| {
            StoreError::Corrupted(format!("undecodable entry at offset {offset}: {e}"))
        })?;
        mutations.push(mutation);
        offset = end;
    }

    Ok((mutations, offset))
}

impl CatalogStore for FileStore {
    fn find_record(&self, external_id: &str) -> StoreResult<Option<CatalogRecord>> {
        self.memory.find_record(external_id)
    }

    fn max_sequence(&self) -> StoreResult<u64> {
        self.memory.max_sequence()
    }

    fn insert_record(&self, record: CatalogRecord) -> StoreResult<()> {
        self.mutate(Mutation::InsertRecord(record)).map(|_| ())
    }

    fn update_record(&self, record: CatalogRecord) -> StoreResult<()> {
        self.mutate(Mutation::UpdateRecord(record)).map(|_| ())
    }

    fn records_by_vehicle(
        &self,
        year: i32,
        make: &str,
        model: &str,
    ) -> StoreResult<Vec<CatalogRecord>> {
        self.memory.records_by_vehicle(year, make, model)
    }

    fn record_count(&self) -> StoreResult<usize> {
        self.memory.record_count()
    }

    fn metadata_keys(&self) -> StoreResult<Option<MetadataKeySet>> {
        self.memory.metadata_keys()
    }

    fn delete_metadata_keys(&self) -> StoreResult<()> {
        self.mutate(Mutation::DeleteMetadataKeys).map(|_| ())
    }

    fn create_metadata_keys(&self, keys: MetadataKeySet) -> StoreResult<()> {
        self.mutate(Mutation::CreateMetadataKeys(keys)).map(|_| ())
    }

    fn find_year(&self, year: i32) -> StoreResult<Option<YearEntry>> {
        self.memory.find_year(year)
    }

    fn create_year(&self, entry: YearEntry) -> StoreResult<()> {
        self.mutate(Mutation::CreateYear(entry)).map(|_| ())
    }

    fn add_make_to_year(&self, year: i32, make: &str) -> StoreResult<bool> {
        self.mutate(Mutation::AddMakeToYear {
            year,
            make: make.to_string(),
        })
    }

    fn years(&self) -> StoreResult<Vec<YearEntry>> {
        self.memory.years()
    }

    fn find_make(&self, make: &str) -> StoreResult<Option<MakeEntry>> {
        self.memory.find_make(make)
    }

    fn create_make(&self, entry: MakeEntry) -> StoreResult<()> {
        self.mutate(Mutation::CreateMake(entry)).map(|_| ())
    }

    fn add_model_to_make(&self, make: &str, model: &str) -> StoreResult<bool> {
        self.mutate(Mutation::AddModelToMake {
            make: make.to_string(),
            model: model.to_string(),
        })
    }

    fn makes(&self) -> StoreResult<Vec<MakeEntry>> {
        self.memory.makes()
    }

    fn find_option(&self, option: &str) -> StoreResult<Option<OptionEntry>> {
        self.memory.find_option(option)
    }

    fn create_option(&self, entry: OptionEntry) -> StoreResult<()> {
        self.mutate(Mutation::CreateOption(entry)).map(|_| ())
    }

    fn options(&self) -> StoreResult<Vec<OptionEntry>> {
        self.memory.options()
    }

    fn compact(&self) -> StoreResult<Option<CompactionResult>> {
        FileStore::compact(self)
    }
}
