//! Content-addressed on-disk tier.
//!
//! One gzip-compressed file per key, named by the SHA-256 of the key. File
//! layout before compression:
//!
//! ```text
//! "CTXV" | u16 LE version | u8 dtype | u32 LE key_len | key bytes
//!        | u32 LE value_count | value_count × f32 LE
//! ```
//!
//! Writes land in a uniquely named temporary file that is renamed into
//! place, so concurrent writers of the same key never leave a torn file.

use super::vector::ContextVector;
use crate::error::StorageError;
use crate::reward::CacheKey;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"CTXV";
const FORMAT_VERSION: u16 = 1;
const DTYPE_F32: u8 = 1;
const EXTENSION: &str = "ctx";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone)]
pub struct DiskTier {
    dir: PathBuf,
}

impl DiskTier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem-safe name for a key. Naming only, not a security boundary.
    pub fn file_name(key: &CacheKey) -> String {
        let digest = Sha256::digest(key.as_str().as_bytes());
        format!("{}.{EXTENSION}", hex::encode(digest))
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// `Ok(None)` when no file exists or the file belongs to a different key.
    /// Corrupt files are deleted and reported.
    pub fn read(&self, key: &CacheKey) -> Result<Option<ContextVector>, StorageError> {
        let path = self.path_for(key);
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };

        match decode(&compressed) {
            Ok((stored_key, vector)) if stored_key == key.as_str() => Ok(Some(vector)),
            Ok((stored_key, _)) => {
                tracing::warn!(
                    path = %path.display(),
                    stored_key = %stored_key,
                    "cache file name collision; treating as miss"
                );
                Ok(None)
            }
            Err(message) => {
                let _ = fs::remove_file(&path);
                Err(StorageError::Corrupt {
                    path: path.display().to_string(),
                    message,
                })
            }
        }
    }

    pub fn write(&self, key: &CacheKey, vector: &ContextVector) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;

        let path = self.path_for(key);
        let temp = self.dir.join(format!(
            ".{}.{}.{TEMP_EXTENSION}",
            Self::file_name(key),
            uuid::Uuid::new_v4().simple()
        ));
        let bytes = encode(key, vector).map_err(|source| io_error(&temp, source))?;

        if let Err(source) = fs::write(&temp, &bytes) {
            let _ = fs::remove_file(&temp);
            return Err(io_error(&temp, source));
        }
        if let Err(source) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(io_error(&path, source));
        }
        Ok(())
    }

    /// Delete every cache artifact (including orphaned temp files).
    /// Returns the number of cache files removed.
    pub fn clear(&self) -> Result<usize, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(io_error(&self.dir, source)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.dir, source))?;
            let path = entry.path();
            let extension = path.extension().and_then(|ext| ext.to_str());
            match extension {
                Some(EXTENSION) => match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(error) if error.kind() == ErrorKind::NotFound => {}
                    Err(source) => return Err(io_error(&path, source)),
                },
                Some(TEMP_EXTENSION) => {
                    let _ = fs::remove_file(&path);
                }
                _ => {}
            }
        }
        Ok(removed)
    }

    /// Number of cache files currently on disk.
    pub fn count(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| {
                        entry.path().extension().and_then(|ext| ext.to_str()) == Some(EXTENSION)
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn encode(key: &CacheKey, vector: &ContextVector) -> std::io::Result<Vec<u8>> {
    let key_bytes = key.as_str().as_bytes();
    let key_len = u32::try_from(key_bytes.len())
        .map_err(|_| std::io::Error::new(ErrorKind::InvalidInput, "cache key too long"))?;
    let value_count = u32::try_from(vector.len())
        .map_err(|_| std::io::Error::new(ErrorKind::InvalidInput, "context vector too long"))?;

    let mut raw = Vec::with_capacity(15 + key_bytes.len() + vector.len() * 4);
    raw.extend_from_slice(MAGIC);
    raw.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    raw.push(DTYPE_F32);
    raw.extend_from_slice(&key_len.to_le_bytes());
    raw.extend_from_slice(key_bytes);
    raw.extend_from_slice(&value_count.to_le_bytes());
    for value in vector.as_slice() {
        raw.extend_from_slice(&value.to_bits().to_le_bytes());
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    encoder.finish()
}

fn decode(compressed: &[u8]) -> Result<(String, ContextVector), String> {
    let mut raw = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|error| format!("gzip: {error}"))?;

    let mut cursor = Cursor { bytes: &raw, at: 0 };
    if cursor.take(4)? != MAGIC {
        return Err("bad magic".into());
    }
    let version = u16::from_le_bytes(cursor.array()?);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported version {version}"));
    }
    let dtype = cursor.take(1)?[0];
    if dtype != DTYPE_F32 {
        return Err(format!("unsupported dtype {dtype}"));
    }
    let key_len = u32::from_le_bytes(cursor.array()?) as usize;
    let key = std::str::from_utf8(cursor.take(key_len)?)
        .map_err(|error| format!("key: {error}"))?
        .to_string();
    let value_count = u32::from_le_bytes(cursor.array()?) as usize;
    let mut values = Vec::with_capacity(value_count);
    for _ in 0..value_count {
        values.push(f32::from_bits(u32::from_le_bytes(cursor.array()?)));
    }
    if cursor.at != raw.len() {
        return Err(format!("{} trailing bytes", raw.len() - cursor.at));
    }
    Ok((key, ContextVector::new(values)))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self
            .at
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| "truncated".to_string())?;
        let slice = &self.bytes[self.at..end];
        self.at = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let slice = self.take(N)?;
        let mut out = [0_u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(raw: &str) -> CacheKey {
        CacheKey::from_canonical(raw)
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path());
        let values = vec![
            0.1_f32,
            -0.0,
            f32::MIN_POSITIVE,
            f32::from_bits(1),
            f32::MAX,
            f32::NAN,
            f32::NEG_INFINITY,
            1.0 / 3.0,
        ];
        let vector = ContextVector::new(values.clone());

        tier.write(&key("k"), &vector).unwrap();
        let restored = tier.read(&key("k")).unwrap().unwrap();

        let original_bits: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        let restored_bits: Vec<u32> = restored.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(original_bits, restored_bits);
    }

    #[test]
    fn file_name_is_sha256_of_key() {
        let name = DiskTier::file_name(&key("multiplicative|{}*1.0"));
        assert_eq!(name.len(), 64 + 4);
        assert!(name.ends_with(".ctx"));
        assert!(name[..64].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(name, DiskTier::file_name(&key("additive|{}*1.0")));
    }

    #[test]
    fn missing_file_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path().join("not-yet-created"));
        assert!(tier.read(&key("absent")).unwrap().is_none());
        assert_eq!(tier.clear().unwrap(), 0);
    }

    #[test]
    fn corrupt_file_is_reported_and_removed() {
        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path());
        let path = tier.path_for(&key("k"));
        fs::write(&path, b"not gzip at all").unwrap();

        let error = tier.read(&key("k")).unwrap_err();
        assert!(matches!(error, StorageError::Corrupt { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn clear_removes_cache_and_temp_files_only() {
        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path());
        tier.write(&key("a"), &ContextVector::new(vec![1.0])).unwrap();
        tier.write(&key("b"), &ContextVector::new(vec![2.0])).unwrap();
        fs::write(temp.path().join(".orphan.tmp"), b"x").unwrap();
        fs::write(temp.path().join("README"), b"keep").unwrap();

        assert_eq!(tier.count(), 2);
        assert_eq!(tier.clear().unwrap(), 2);
        assert_eq!(tier.count(), 0);
        assert!(!temp.path().join(".orphan.tmp").exists());
        assert!(temp.path().join("README").exists());
    }

    #[test]
    fn overwrite_same_key_keeps_file_readable() {
        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path());
        tier.write(&key("k"), &ContextVector::new(vec![1.0])).unwrap();
        tier.write(&key("k"), &ContextVector::new(vec![2.0])).unwrap();
        assert_eq!(
            tier.read(&key("k")).unwrap(),
            Some(ContextVector::new(vec![2.0]))
        );
        assert_eq!(tier.count(), 1);
    }

    #[test]
    fn concurrent_writers_to_one_key_never_expose_a_partial_file() {
        const WRITERS: usize = 4;
        const ROUNDS: usize = 25;

        let temp = TempDir::new().unwrap();
        let tier = DiskTier::new(temp.path());
        let shared = key("contended");
        let candidates: Vec<ContextVector> = (0..WRITERS)
            .map(|writer| ContextVector::new(vec![writer as f32 + 0.5; 512]))
            .collect();

        std::thread::scope(|scope| {
            for vector in &candidates {
                let (tier, shared) = (&tier, &shared);
                scope.spawn(move || {
                    for _ in 0..ROUNDS {
                        tier.write(shared, vector).unwrap();
                    }
                });
            }
            let (tier, shared, candidates) = (&tier, &shared, &candidates);
            scope.spawn(move || {
                for _ in 0..WRITERS * ROUNDS {
                    if let Some(read) = tier.read(shared).unwrap() {
                        assert!(candidates.contains(&read));
                    }
                }
            });
        });

        let last = tier.read(&shared).unwrap().unwrap();
        assert!(candidates.contains(&last));
        assert_eq!(tier.count(), 1);
        let leftovers = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str()) == Some(TEMP_EXTENSION)
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
