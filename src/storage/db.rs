use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;
use super::StoreError;

#[derive(Debug, Error)]
pub enum LocalError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for LocalError {
    fn from(e: redb::CommitError) -> Self {
        LocalError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for LocalError {
    fn from(e: redb::DatabaseError) -> Self {
        LocalError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::StorageError> for LocalError {
    fn from(e: redb::StorageError) -> Self {
        LocalError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for LocalError {
    fn from(e: redb::TableError) -> Self {
        LocalError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for LocalError {
    fn from(e: redb::TransactionError) -> Self {
        LocalError::Transaction(Box::new(e))
    }
}

// Let local store code use `?` on redb and codec results directly.

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Local(e.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Local(e.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Local(e.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Local(e.into())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Local(e.into())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Local(e.into())
    }
}

/// Embedded key-value database backing the local store.
pub struct LocalDatabase {
    db: Arc<RedbDatabase>,
}

impl Clone for LocalDatabase {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl LocalDatabase {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, LocalError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("fileshare-local.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LOCAL_STORAGE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, LocalError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, LocalError> {
        Ok(self.db.begin_write()?)
    }

    /// Read and decode the value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, LocalError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(LOCAL_STORAGE)?;

        match table.get(key)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Encode and store a single value
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), LocalError> {
        let data = rmp_serde::to_vec_named(value)?;
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE)?;
            table.insert(key, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Encoded size of every stored key
    pub fn entry_sizes(&self) -> Result<BTreeMap<String, u64>, LocalError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(LOCAL_STORAGE)?;

        let mut sizes = BTreeMap::new();
        for result in table.iter()? {
            let (key, value) = result?;
            sizes.insert(key.value().to_string(), value.value().len() as u64);
        }
        Ok(sizes)
    }

    /// Remove every key, returning how many were removed
    pub fn purge_all(&self) -> Result<u64, LocalError> {
        let write_txn = self.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(LOCAL_STORAGE)?;
            let keys: Vec<String> = table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;

            for key in keys {
                table.remove(key.as_str())?;
                removed += 1;
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }
}
