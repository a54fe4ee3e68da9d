use crate::error::{HootError, Result};
use crate::index::types::RecordNo;
use crate::store::{Archive, RecordMeta};
use crc32fast::Hasher;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER_LEN: u64 = 13;

const FLAG_DELETED: u8 = 0b01;
const FLAG_REPLICATED: u8 = 0b10;

struct LogState {
    file: File,
    /// Start offset of every record, indexed by record number
    offsets: Vec<u64>,
    len: u64,
}

/// Append-only record archive.
///
/// Record format:
/// - u32 payload length (little endian)
/// - u32 crc32 of key, flags and payload
/// - u32 key
/// - u8 flags (deleted, replicated)
/// - raw payload bytes
///
/// Record numbers are positions in the file. Opening scans the headers; a
/// torn record at the tail is cut off.
pub struct RecordLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

fn checksum(key: u32, flags: u8, payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&key.to_le_bytes());
    hasher.update(&[flags]);
    hasher.update(payload);
    hasher.finalize()
}

impl RecordLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        let file_len = file.metadata()?.len();
        let (offsets, len) = scan(&file, file_len)?;
        if len < file_len {
            warn!(
                path = %path.display(),
                valid = len,
                dropped = file_len - len,
                "truncating torn record at end of archive"
            );
            file.set_len(len)?;
        }
        debug!(path = %path.display(), records = offsets.len(), "opened record log");

        Ok(Self {
            path,
            state: Mutex::new(LogState { file, offsets, len }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, key: u32, flags: u8, payload: &[u8]) -> Result<RecordNo> {
        let mut state = self.state.lock();
        let rec = state.offsets.len() as RecordNo;
        let offset = state.len;

        let mut buf = Vec::with_capacity(HEADER_LEN as usize + payload.len());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&checksum(key, flags, payload).to_le_bytes());
        buf.extend_from_slice(&key.to_le_bytes());
        buf.push(flags);
        buf.extend_from_slice(payload);

        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(&buf)?;
        state.offsets.push(offset);
        state.len += buf.len() as u64;
        Ok(rec)
    }

    fn read_header(state: &mut LogState, rec: RecordNo) -> Result<(u64, [u8; HEADER_LEN as usize])> {
        let offset = *state
            .offsets
            .get(rec as usize)
            .ok_or(HootError::RecordNotFound(rec))?;
        state.file.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; HEADER_LEN as usize];
        state.file.read_exact(&mut header)?;
        Ok((offset, header))
    }
}

fn meta_from_header(header: &[u8; HEADER_LEN as usize]) -> RecordMeta {
    let flags = header[12];
    RecordMeta {
        len: u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
        key: u32::from_le_bytes([header[8], header[9], header[10], header[11]]),
        deleted: flags & FLAG_DELETED != 0,
        replicated: flags & FLAG_REPLICATED != 0,
    }
}

/// Walk record headers, returning record offsets and the length of the valid prefix
fn scan(file: &File, file_len: u64) -> Result<(Vec<u64>, u64)> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(0))?;
    let mut offsets = Vec::new();
    let mut pos = 0u64;
    let mut header = [0u8; HEADER_LEN as usize];

    while pos + HEADER_LEN <= file_len {
        reader.read_exact(&mut header)?;
        let payload = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let end = pos + HEADER_LEN + payload;
        if end > file_len {
            break;
        }
        reader.seek_relative(payload as i64)?;
        offsets.push(pos);
        pos = end;
    }

    Ok((offsets, pos))
}

impl Archive for RecordLog {
    fn write_data(&self, key: u32, data: &[u8]) -> Result<RecordNo> {
        self.append(key, 0, data)
    }

    fn read_bytes(&self, rec: RecordNo) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        let (offset, header) = Self::read_header(&mut state, rec)?;
        let meta = meta_from_header(&header);

        let mut payload = vec![0u8; meta.len as usize];
        state.file.read_exact(&mut payload)?;

        let stored = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if checksum(meta.key, header[12], &payload) != stored {
            return Err(HootError::corrupt(&self.path, offset, "record checksum mismatch"));
        }
        Ok(payload)
    }

    fn read_meta(&self, rec: RecordNo) -> Result<RecordMeta> {
        let mut state = self.state.lock();
        let (_, header) = Self::read_header(&mut state, rec)?;
        Ok(meta_from_header(&header))
    }

    fn delete(&self, key: u32) -> Result<RecordNo> {
        self.append(key, FLAG_DELETED, &[])
    }

    fn delete_replicated(&self, key: u32) -> Result<RecordNo> {
        self.append(key, FLAG_DELETED | FLAG_REPLICATED, &[])
    }

    fn count(&self) -> u32 {
        self.state.lock().offsets.len() as u32
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.file.flush()?;
        state.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("t.mgdat")).unwrap();
        assert_eq!(log.write_data(10, b"first").unwrap(), 0);
        assert_eq!(log.write_data(11, b"").unwrap(), 1);
        assert_eq!(log.read_bytes(0).unwrap(), b"first");
        assert!(log.read_bytes(1).unwrap().is_empty());
        assert_eq!(log.key_at(0).unwrap(), (10, false));
        assert!(matches!(log.read_bytes(2), Err(HootError::RecordNotFound(2))));
    }

    #[test]
    fn test_objects() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Entry {
            name: String,
        }

        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("t.mgdat")).unwrap();
        let rec = log
            .write_object(
                1,
                &Entry {
                    name: "a".to_string(),
                },
            )
            .unwrap();
        let back: Entry = log.read_object(rec).unwrap();
        assert_eq!(back.name, "a");
    }

    #[test]
    fn test_delete_markers() {
        let dir = tempfile::tempdir().unwrap();
        let log = RecordLog::open(dir.path().join("t.mgdat")).unwrap();
        log.write_data(5, b"x").unwrap();
        let rec = log.delete(5).unwrap();
        let replicated = log.delete_replicated(6).unwrap();
        assert_eq!(log.key_at(rec).unwrap(), (5, true));
        let meta = log.read_meta(replicated).unwrap();
        assert!(meta.deleted && meta.replicated);
        assert_eq!(log.count(), 3);
    }

    #[test]
    fn test_reopen_and_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.mgdat");
        {
            let log = RecordLog::open(&path).unwrap();
            log.write_data(1, b"one").unwrap();
            log.write_data(2, b"two").unwrap();
            log.flush().unwrap();
        }
        let full = fs::metadata(&path).unwrap().len();
        // half-written third record
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[9, 0, 0, 0, 1, 2]).unwrap();
        drop(file);

        let log = RecordLog::open(&path).unwrap();
        assert_eq!(log.count(), 2);
        assert_eq!(fs::metadata(&path).unwrap().len(), full);
        assert_eq!(log.read_bytes(1).unwrap(), b"two");
        assert_eq!(log.write_data(3, b"three").unwrap(), 2);
    }

    #[test]
    fn test_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.mgdat");
        {
            let log = RecordLog::open(&path).unwrap();
            log.write_data(1, b"payload").unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let log = RecordLog::open(&path).unwrap();
        assert!(log.read_bytes(0).unwrap_err().is_corruption());
    }
}
