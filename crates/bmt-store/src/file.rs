use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use bmt_types::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::WriteBatch;
use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// Flush/sync strategy for the segment file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after every batch (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for [`FileObjectStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Sync strategy applied after each batch.
    pub sync_mode: SyncMode,
    /// Open without write access; `write_batch` fails with `ReadOnly`.
    pub read_only: bool,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

struct SegmentWriter {
    file: File,
    /// End of the last complete record.
    offset: u64,
}

/// Append-only, file-backed object store.
///
/// Every batch becomes one record in a single segment file:
///
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized WriteBatch)]
/// ```
///
/// On open the file is replayed front to back into an in-memory map. A
/// record that fails its CRC is skipped; a torn record at the tail (from a
/// crash mid-append) is discarded and cut off, so a batch is either fully
/// visible after restart or not at all. A zero length header followed by
/// more bytes is not a torn tail: a writable open fails with
/// [`StoreError::CorruptRecord`] and leaves the file as it is, while a
/// read-only open serves the records before it.
pub struct FileObjectStore {
    path: PathBuf,
    objects: RwLock<HashMap<Digest, StoredObject>>,
    writer: Option<Mutex<SegmentWriter>>,
    config: FileStoreConfig,
}

struct Replay {
    objects: HashMap<Digest, StoredObject>,
    valid_len: u64,
    records: usize,
    /// Set when replay stopped at an unreadable header with bytes after it.
    corrupt: Option<String>,
}

impl FileObjectStore {
    /// Open (or create) a store backed by the segment file at `path`.
    pub fn open(path: &Path, config: FileStoreConfig) -> StoreResult<Self> {
        let writer = if config.read_only {
            None
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(path)?;
            Some(file)
        };

        let replay = replay(path)?;
        let writer = match writer {
            Some(file) => {
                if let Some(reason) = replay.corrupt {
                    return Err(StoreError::CorruptRecord {
                        offset: replay.valid_len,
                        reason,
                    });
                }
                let file_len = file.metadata()?.len();
                if replay.valid_len < file_len {
                    warn!(
                        valid_len = replay.valid_len,
                        file_len, "discarding torn tail of segment file"
                    );
                    file.set_len(replay.valid_len)?;
                }
                Some(Mutex::new(SegmentWriter {
                    file,
                    offset: replay.valid_len,
                }))
            }
            None => None,
        };

        info!(
            path = %path.display(),
            objects = replay.objects.len(),
            records = replay.records,
            read_only = config.read_only,
            "file store opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            objects: RwLock::new(replay.objects),
            writer,
            config,
        })
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Return a sorted list of all digests in the store.
    pub fn all_ids(&self) -> Vec<Digest> {
        let map = self.objects.read().expect("lock poisoned");
        let mut ids: Vec<Digest> = map.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Bytes of complete records in the segment file.
    pub fn segment_len(&self) -> u64 {
        match &self.writer {
            Some(w) => w.lock().expect("segment mutex poisoned").offset,
            None => fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0),
        }
    }

    /// Path to the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_record(&self, w: &mut SegmentWriter, payload: &[u8]) -> StoreResult<u64> {
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("batch exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(payload);

        let result = w.file.write_all(&frame).and_then(|()| {
            if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
                w.file.sync_all()
            } else {
                w.file.flush()
            }
        });
        if let Err(e) = result {
            // Cut off any partial frame so later appends stay readable.
            if let Err(trunc) = w.file.set_len(w.offset) {
                warn!(offset = w.offset, error = %trunc, "failed to roll back partial record");
            }
            return Err(e.into());
        }

        let record_offset = w.offset;
        w.offset += frame.len() as u64;
        Ok(record_offset)
    }
}

fn replay(path: &Path) -> StoreResult<Replay> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut objects = HashMap::new();
    let mut offset: u64 = 0;
    let mut records = 0;
    let mut corrupt = None;

    while offset + HEADER_SIZE as u64 <= file_len {
        let mut header_buf = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header_buf[0], header_buf[1], header_buf[2], header_buf[3]]);
        let expected_crc =
            u32::from_le_bytes([header_buf[4], header_buf[5], header_buf[6], header_buf[7]]);

        if length == 0 {
            warn!(offset, file_len, "zero-length record header; stopping replay");
            corrupt = Some("zero-length record header".to_string());
            break;
        }
        if offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "record overruns end of file; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated record; stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let next = offset + HEADER_SIZE as u64 + length as u64;
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping record"
            );
            offset = next;
            continue;
        }

        match bincode::deserialize::<WriteBatch>(&payload) {
            Ok(batch) => {
                for (id, object) in batch {
                    objects.entry(id).or_insert(object);
                }
                records += 1;
            }
            Err(e) => {
                warn!(offset, error = %e, "failed to decode record; skipping");
            }
        }
        offset = next;
    }

    debug!(records, objects = objects.len(), "segment replay complete");
    Ok(Replay {
        objects,
        valid_len: offset,
        records,
        corrupt,
    })
}

impl ObjectStore for FileObjectStore {
    fn read(&self, id: &Digest) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn write_batch(&self, batch: WriteBatch) -> StoreResult<()> {
        let writer = self.writer.as_ref().ok_or(StoreError::ReadOnly)?;
        batch.validate()?;
        if batch.is_empty() {
            return Ok(());
        }

        let payload =
            bincode::serialize(&batch).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut w = writer.lock().expect("segment mutex poisoned");
        let record_offset = self.append_record(&mut w, &payload)?;

        let count = batch.len();
        let mut map = self.objects.write().expect("lock poisoned");
        for (id, object) in batch {
            map.entry(id).or_insert(object);
        }
        debug!(offset = record_offset, count, len = payload.len(), "batch appended");
        Ok(())
    }
}

impl std::fmt::Debug for FileObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileObjectStore")
            .field("path", &self.path)
            .field("object_count", &self.len())
            .field("read_only", &self.config.read_only)
            .finish()
    }
}
