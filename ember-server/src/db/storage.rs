//! redb-based storage for orders, printers and print jobs
//!
//! Values are JSON documents keyed by entity id. redb serializes write
//! transactions, which is the write-serialization point the status machine
//! and the job queue build their atomicity on.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{Order, PrintJob, Printer};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Orders table: key = order_id, value = JSON
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Printers table: key = printer_id, value = JSON
const PRINTERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("printers");

/// Print jobs table: key = job_id, value = JSON
const PRINT_JOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("print_jobs");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Embedded entity storage
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    /// Open or create the database file
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(PRINTERS_TABLE)?;
            let _ = write_txn.open_table(PRINT_JOBS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ── Generic single-table helpers ────────────────────────────────

    fn put<T: Serialize>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        id: &str,
        value: &T,
    ) -> StorageResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut t = write_txn.open_table(table)?;
            t.insert(id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
        id: &str,
    ) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table)?;
        match t.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn remove(&self, table: TableDefinition<&str, &[u8]>, id: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut t = write_txn.open_table(table)?;
            t.remove(id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn scan<T: DeserializeOwned>(
        &self,
        table: TableDefinition<&str, &[u8]>,
    ) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let t = read_txn.open_table(table)?;
        let mut out = Vec::new();
        for entry in t.iter()? {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    // ── Orders ──────────────────────────────────────────────────────

    pub fn store_order(&self, order: &Order) -> StorageResult<()> {
        self.put(ORDERS_TABLE, &order.id, order)
    }

    pub fn get_order(&self, id: &str) -> StorageResult<Option<Order>> {
        self.get(ORDERS_TABLE, id)
    }

    pub fn list_orders(&self, restaurant_id: &str) -> StorageResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .scan(ORDERS_TABLE)?
            .into_iter()
            .filter(|o: &Order| o.restaurant_id == restaurant_id)
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }

    // ── Printers ────────────────────────────────────────────────────

    pub fn store_printer(&self, printer: &Printer) -> StorageResult<()> {
        self.put(PRINTERS_TABLE, &printer.id, printer)
    }

    pub fn get_printer(&self, id: &str) -> StorageResult<Option<Printer>> {
        self.get(PRINTERS_TABLE, id)
    }

    pub fn remove_printer(&self, id: &str) -> StorageResult<bool> {
        self.remove(PRINTERS_TABLE, id)
    }

    pub fn list_printers(&self, restaurant_id: &str) -> StorageResult<Vec<Printer>> {
        let mut printers: Vec<Printer> = self
            .scan(PRINTERS_TABLE)?
            .into_iter()
            .filter(|p: &Printer| p.restaurant_id == restaurant_id)
            .collect();
        printers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(printers)
    }

    pub fn list_all_printers(&self) -> StorageResult<Vec<Printer>> {
        self.scan(PRINTERS_TABLE)
    }

    // ── Print jobs ──────────────────────────────────────────────────

    pub fn store_job(&self, job: &PrintJob) -> StorageResult<()> {
        self.put(PRINT_JOBS_TABLE, &job.id, job)
    }

    pub fn get_job(&self, id: &str) -> StorageResult<Option<PrintJob>> {
        self.get(PRINT_JOBS_TABLE, id)
    }

    pub fn list_jobs(&self) -> StorageResult<Vec<PrintJob>> {
        self.scan(PRINT_JOBS_TABLE)
    }

    pub fn list_jobs_for_restaurant(&self, restaurant_id: &str) -> StorageResult<Vec<PrintJob>> {
        let mut jobs: Vec<PrintJob> = self
            .scan(PRINT_JOBS_TABLE)?
            .into_iter()
            .filter(|j: &PrintJob| j.restaurant_id == restaurant_id)
            .collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        Ok(jobs)
    }

    pub fn list_jobs_for_printer(&self, printer_id: &str) -> StorageResult<Vec<PrintJob>> {
        let mut jobs: Vec<PrintJob> = self
            .scan(PRINT_JOBS_TABLE)?
            .into_iter()
            .filter(|j: &PrintJob| j.printer_id == printer_id)
            .collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(jobs)
    }
}
