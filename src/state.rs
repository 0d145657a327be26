use redb::{Database, ReadableTable, TableDefinition};
use rkyv::{AlignedVec, Archive, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    RedbCreate(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Durable record of a discovered URL. `completed` only ever moves from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub completed: bool,
}

impl UrlRecord {
    pub fn discovered(url: String) -> Self {
        Self { url, completed: false }
    }
}

/// Page with the highest word count seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct LongestPage {
    pub url: String,
    pub word_count: u64,
}

fn encode<T>(value: &T) -> Result<AlignedVec, StateError>
where
    T: rkyv::Serialize<rkyv::ser::serializers::AllocSerializer<256>>,
{
    rkyv::to_bytes::<_, 256>(value)
        .map_err(|e| StateError::Serialization(format!("Serialize failed: {}", e)))
}

fn decode_record(bytes: &[u8]) -> Result<UrlRecord, StateError> {
    let mut aligned = AlignedVec::new();
    aligned.extend_from_slice(bytes);
    // Bytes were written by `encode` in this module.
    unsafe { rkyv::from_bytes_unchecked::<UrlRecord>(&aligned) }
        .map_err(|e| StateError::Serialization(format!("Deserialize failed: {}", e)))
}

fn decode_longest(bytes: &[u8]) -> Result<LongestPage, StateError> {
    let mut aligned = AlignedVec::new();
    aligned.extend_from_slice(bytes);
    unsafe { rkyv::from_bytes_unchecked::<LongestPage>(&aligned) }
        .map_err(|e| StateError::Serialization(format!("Deserialize failed: {}", e)))
}

fn decode_counter(bytes: &[u8]) -> Result<u64, StateError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StateError::Serialization(format!("Bad counter length: {}", bytes.len())))?;
    Ok(u64::from_le_bytes(raw))
}

// ============================================================================
// DATABASE SCHEMA
// ============================================================================

/// Durable crawl state: URL records plus the longest-page, word-frequency and
/// subdomain aggregates, each in its own table.
///
/// Every mutating method commits its own write transaction before returning, so an
/// acknowledged write survives process termination.
pub struct CrawlerState {
    db: Database,
    path: PathBuf,
}

impl CrawlerState {
    const URLS: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("urls");
    const WORD_FREQUENCIES: TableDefinition<'_, &str, u64> =
        TableDefinition::new("word_frequencies");
    const SUBDOMAINS: TableDefinition<'_, &str, u64> =
        TableDefinition::new("subdomain_frequencies");
    const METADATA: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("metadata");

    const LONGEST_PAGE_KEY: &'static str = "longest_page";
    const COMPLETED_COUNT_KEY: &'static str = "completed_count";

    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(&path)?;

        // Open each table so read transactions never see a missing table.
        let write_txn = db.begin_write()?;
        {
            let urls = write_txn.open_table(Self::URLS)?;
            let _words = write_txn.open_table(Self::WORD_FREQUENCIES)?;
            let _subdomains = write_txn.open_table(Self::SUBDOMAINS)?;
            let mut metadata = write_txn.open_table(Self::METADATA)?;

            // Databases written before the counter existed get it rebuilt once.
            let has_counter = metadata.get(Self::COMPLETED_COUNT_KEY)?.is_some();
            if !has_counter {
                let mut completed = 0u64;
                for result in urls.iter()? {
                    let (_key, value) = result?;
                    if decode_record(value.value())?.completed {
                        completed += 1;
                    }
                }
                metadata.insert(Self::COMPLETED_COUNT_KEY, completed.to_le_bytes().as_slice())?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db, path })
    }

    /// Delete any existing database at `path` and open a fresh one.
    pub fn recreate<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // URL RECORDS
    // ========================================================================

    pub fn contains_url(&self, hash: &str) -> Result<bool, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::URLS)?;
        let found = table.get(hash)?.is_some();
        Ok(found)
    }

    pub fn get_url(&self, hash: &str) -> Result<Option<UrlRecord>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::URLS)?;
        let record = match table.get(hash)? {
            Some(bytes) => Some(decode_record(bytes.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Insert `(url, false)` under `hash` unless a record already exists.
    /// Returns true if the record was created.
    pub fn insert_url_if_absent(&self, hash: &str, url: &str) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(Self::URLS)?;
            if table.get(hash)?.is_some() {
                false
            } else {
                let bytes = encode(&UrlRecord::discovered(url.to_string()))?;
                table.insert(hash, bytes.as_slice())?;
                true
            }
        };
        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Mark the record under `hash` completed, bump the completed counter if it was not
    /// already completed, and raise the longest-page aggregate if `word_count` beats it,
    /// all in one transaction. Returns false if no record existed beforehand; the
    /// completed record is written either way.
    pub fn mark_completed(&self, hash: &str, url: &str, word_count: u64) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut urls = write_txn.open_table(Self::URLS)?;
            let previous = match urls.get(hash)? {
                Some(bytes) => Some(decode_record(bytes.value())?),
                None => None,
            };
            let bytes = encode(&UrlRecord {
                url: url.to_string(),
                completed: true,
            })?;
            urls.insert(hash, bytes.as_slice())?;

            let mut metadata = write_txn.open_table(Self::METADATA)?;
            if !previous.as_ref().is_some_and(|record| record.completed) {
                let completed = match metadata.get(Self::COMPLETED_COUNT_KEY)? {
                    Some(bytes) => decode_counter(bytes.value())?,
                    None => 0,
                };
                metadata.insert(
                    Self::COMPLETED_COUNT_KEY,
                    (completed + 1).to_le_bytes().as_slice(),
                )?;
            }

            let current_max = match metadata.get(Self::LONGEST_PAGE_KEY)? {
                Some(bytes) => decode_longest(bytes.value())?.word_count,
                None => 0,
            };
            if word_count > current_max {
                let bytes = encode(&LongestPage {
                    url: url.to_string(),
                    word_count,
                })?;
                metadata.insert(Self::LONGEST_PAGE_KEY, bytes.as_slice())?;
            }
            previous.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Visit every URL record.
    pub fn for_each_url<F>(&self, mut f: F) -> Result<(), StateError>
    where
        F: FnMut(UrlRecord),
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::URLS)?;
        for result in table.iter()? {
            let (_key, value) = result?;
            f(decode_record(value.value())?);
        }
        Ok(())
    }

    /// Number of URL records; this is the unique-page count.
    pub fn url_count(&self) -> Result<u64, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::URLS)?;
        Ok(table.len()?)
    }

    /// Number of completed URL records, read from the counter kept by `mark_completed`.
    pub fn completed_count(&self) -> Result<u64, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::METADATA)?;
        let count = match table.get(Self::COMPLETED_COUNT_KEY)? {
            Some(bytes) => decode_counter(bytes.value())?,
            None => 0,
        };
        Ok(count)
    }

    // ========================================================================
    // AGGREGATES
    // ========================================================================

    pub fn longest_page(&self) -> Result<Option<LongestPage>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::METADATA)?;
        let longest = match table.get(Self::LONGEST_PAGE_KEY)? {
            Some(bytes) => Some(decode_longest(bytes.value())?),
            None => None,
        };
        Ok(longest)
    }

    /// Add one to the counter of each word, in a single transaction.
    pub fn increment_words<S: AsRef<str>>(&self, words: &[S]) -> Result<(), StateError> {
        if words.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::WORD_FREQUENCIES)?;
            for word in words {
                let word = word.as_ref();
                let current = table.get(word)?.map(|v| v.value()).unwrap_or(0);
                table.insert(word, current + 1)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn increment_subdomain(&self, host: &str) -> Result<(), StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(Self::SUBDOMAINS)?;
            let current = table.get(host)?.map(|v| v.value()).unwrap_or(0);
            table.insert(host, current + 1)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn word_frequency(&self, word: &str) -> Result<u64, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::WORD_FREQUENCIES)?;
        let count = table.get(word)?.map(|v| v.value()).unwrap_or(0);
        Ok(count)
    }

    /// All word counters, in key order.
    pub fn word_frequencies(&self) -> Result<Vec<(String, u64)>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::WORD_FREQUENCIES)?;
        let mut words = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            words.push((key.value().to_string(), value.value()));
        }
        Ok(words)
    }

    /// All subdomain counters, sorted lexicographically by host.
    pub fn subdomain_counts(&self) -> Result<Vec<(String, u64)>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(Self::SUBDOMAINS)?;
        let mut hosts = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            hosts.push((key.value().to_string(), value.value()));
        }
        Ok(hosts)
    }
}
