// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The top-level coordinator: `connect`/`createTable`/`upsert`/
//! `executeLatestQuery`/`executeTimeRangeQuery`/`shutdown` (spec.md
//! §4.11).

use crate::config::EngineConfig;
use crate::descriptor_table::DescriptorTable;
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::table::Table;
use crate::thread_pool::ThreadPool;
use crate::value::{Row, Vin};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

fn schema_path(root: &std::path::Path, table: &str) -> PathBuf {
    root.join(table).join("schema")
}

fn latest_records_path(root: &std::path::Path, table: &str) -> PathBuf {
    root.join(table).join("latest_records")
}

fn table_root(root: &std::path::Path, table: &str) -> PathBuf {
    root.join(table)
}

/// A single upsert request: all rows destined for one table.
pub struct WriteRequest {
    pub table: String,
    pub rows: Vec<Row>,
}

/// A latest-row query: one or more VINs against one table.
pub struct LatestQueryRequest {
    pub table: String,
    pub vins: Vec<Vin>,
    pub requested_columns: Vec<String>,
}

/// A time-range query against one table/VIN.
pub struct TimeRangeQueryRequest {
    pub table: String,
    pub vin: Vin,
    pub lower: i64,
    pub upper: i64,
    pub requested_columns: Vec<String>,
}

/// The embedded storage engine. Owns every table, the shared thread pool,
/// and the shared descriptor cache.
///
/// Per spec.md §3's Ownership note, each [`Table`] uniquely owns its
/// `TableWriter`/`TableReader`/`TableSchema`; the Engine owns the table
/// map and the thread pool.
pub struct Engine {
    config: EngineConfig,
    descriptors: Arc<DescriptorTable>,
    tables: RwLock<HashMap<String, Table>>,
    pool: Mutex<Option<ThreadPool>>,
    connected: std::sync::atomic::AtomicBool,
}

impl Engine {
    /// Builds an engine from `config`, not yet connected.
    pub fn new(config: EngineConfig) -> Self {
        let descriptors = Arc::new(DescriptorTable::new(config.descriptor_table_capacity));
        Self {
            config,
            descriptors,
            tables: RwLock::new(HashMap::new()),
            pool: Mutex::new(None),
            connected: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Initializes the thread pool and restores every table found on
    /// disk under the configured root (schema + `latest_records`).
    ///
    /// Returns [`Error::State`] if already connected.
    pub fn connect(&self) -> Result<()> {
        if self.connected.load(std::sync::atomic::Ordering::Acquire) {
            log::warn!("connect called while already connected");
            return Err(Error::State("already connected".to_string()));
        }

        *self.pool.lock().expect("pool lock poisoned") = Some(ThreadPool::new(self.config.thread_pool_size));
        std::fs::create_dir_all(&self.config.path)?;

        let mut tables = self.tables.write().expect("tables lock poisoned");
        let mut restored = 0;
        if let Ok(entries) = std::fs::read_dir(&self.config.path) {
            for entry in entries.flatten() {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let schema_file = schema_path(&self.config.path, &name);
                if !schema_file.exists() {
                    continue;
                }
                let schema = Arc::new(TableSchema::restore(&schema_file)?);
                let table = Table::open(table_root(&self.config.path, &name), schema, self.descriptors.clone());
                table.restore_latest(&latest_records_path(&self.config.path, &name))?;
                tables.insert(name, table);
                restored += 1;
            }
        }

        self.connected.store(true, std::sync::atomic::Ordering::Release);
        log::info!("connected, root={:?}, tables_restored={restored}", self.config.path);
        Ok(())
    }

    /// Declares a new table with a fixed column schema.
    ///
    /// Returns [`Error::Duplicate`] if `name` already exists.
    pub fn create_table(&self, name: &str, schema: TableSchema) -> Result<()> {
        self.require_connected()?;
        let mut tables = self.tables.write().expect("tables lock poisoned");
        if tables.contains_key(name) {
            log::warn!("createTable({name}): already exists");
            return Err(Error::Duplicate(name.to_string()));
        }
        let root = table_root(&self.config.path, name);
        std::fs::create_dir_all(&root)?;
        schema.persist(&schema_path(&self.config.path, name))?;

        let schema = Arc::new(schema);
        let table = Table::open(root, schema, self.descriptors.clone());
        tables.insert(name.to_string(), table);
        log::info!("createTable({name}): ok");
        Ok(())
    }

    /// Appends every row in `request` to its table's shard streams.
    ///
    /// Returns [`Error::NotFound`] if the table does not exist.
    pub fn upsert(&self, request: WriteRequest) -> Result<()> {
        self.require_connected()?;
        let tables = self.tables.read().expect("tables lock poisoned");
        let table = tables.get(&request.table).ok_or_else(|| Error::NotFound(request.table.clone()))?;
        for row in request.rows {
            table.writer().append(row)?;
        }
        log::info!("upsert({}): ok", request.table);
        Ok(())
    }

    /// Looks up each requested VIN's latest row, parallelized across the
    /// thread pool (spec.md §9's REDESIGN FLAG: unconditionally pooled,
    /// unlike the original's schema-file-existence branch).
    pub fn execute_latest_query(&self, request: LatestQueryRequest) -> Result<Vec<Row>> {
        self.require_connected()?;
        let tables = self.tables.read().expect("tables lock poisoned");
        let table = tables.get(&request.table).ok_or_else(|| Error::NotFound(request.table.clone()))?;
        let reader = table.reader().clone();
        drop(tables);

        let pool_guard = self.pool.lock().expect("pool lock poisoned");
        let pool = pool_guard.as_ref().ok_or_else(|| Error::State("not connected".to_string()))?;

        let results = Arc::new(Mutex::new(Vec::with_capacity(request.vins.len())));
        let mut futures = Vec::with_capacity(request.vins.len());
        for vin in request.vins {
            let reader = reader.clone();
            let results = results.clone();
            let columns = request.requested_columns.clone();
            futures.push(pool.submit(move || {
                if let Some(row) = reader.latest(vin) {
                    let projected = if columns.is_empty() { row } else { row.project(&columns) };
                    results.lock().expect("results lock poisoned").push(projected);
                }
            }));
        }
        for future in futures {
            future.join();
        }
        drop(pool_guard);

        log::info!("executeLatestQuery({}): ok", request.table);
        Ok(Arc::try_unwrap(results).expect("all futures joined").into_inner().expect("results lock poisoned"))
    }

    /// Streams one VIN's rows in `[lower, upper)` from its table
    /// (single-threaded, per spec.md §4.10).
    pub fn execute_time_range_query(&self, request: TimeRangeQueryRequest) -> Result<Vec<Row>> {
        self.require_connected()?;
        let tables = self.tables.read().expect("tables lock poisoned");
        let table = tables.get(&request.table).ok_or_else(|| Error::NotFound(request.table.clone()))?;
        let rows = table
            .reader()
            .time_range(request.vin, request.lower, request.upper, &request.requested_columns)?;
        log::info!("executeTimeRangeQuery({}): ok, rows={}", request.table, rows.len());
        Ok(rows)
    }

    /// Stops the pool, closes every append stream, and persists every
    /// table's schema and `latest_records` snapshot. Idempotent: a second
    /// call is a no-op.
    ///
    /// A [`Error::Corruption`] persisting one table does not prevent the
    /// others from being persisted (spec.md §7).
    pub fn shutdown(&self) -> Result<()> {
        if !self.connected.swap(false, std::sync::atomic::Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(mut pool) = self.pool.lock().expect("pool lock poisoned").take() {
            pool.shutdown();
        }

        let tables = self.tables.read().expect("tables lock poisoned");
        for (name, table) in tables.iter() {
            if let Err(e) = table.close() {
                log::error!("shutdown: closing table {name} failed: {e}");
            }
            if let Err(e) = table.persist_latest(&latest_records_path(&self.config.path, name)) {
                log::error!("shutdown: persisting latest_records for {name} failed: {e}");
            }
        }
        self.descriptors.clear();
        log::info!("shutdown: ok");
        Ok(())
    }

    fn require_connected(&self) -> Result<()> {
        if self.connected.load(std::sync::atomic::Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::State("engine not connected".to_string()))
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
