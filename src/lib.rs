// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An embedded time-series storage engine for vehicle telemetry.
//!
//! Clients open a database rooted at a directory, declare one or more
//! tables with a fixed column schema, upsert batches of rows keyed by a
//! 17-byte vehicle identifier (VIN) and a 64-bit timestamp, and pose two
//! query shapes: a *latest query* returning each requested VIN's row
//! with the largest timestamp, and a *time-range query* returning every
//! row of a VIN whose timestamp lies in `[lower, upper)`. State survives
//! a clean shutdown/restart.
//!
//! # Example usage
//!
//! ```
//! use vints::{ColumnDef, ColumnType, ColumnValue, Engine, EngineConfig, Row, Vin};
//! use vints::{LatestQueryRequest, TableSchema, WriteRequest};
//!
//! # let dir = tempfile::tempdir()?;
//! let engine = Engine::new(EngineConfig::new(dir.path()));
//! engine.connect()?;
//!
//! let schema = TableSchema::new(vec![ColumnDef {
//!     name: "speed_kph".to_string(),
//!     ty: ColumnType::Float64,
//! }]);
//! engine.create_table("vehicle_telemetry", schema)?;
//!
//! let vin = Vin::from_slice(b"1HGCM82633A004352");
//! let mut row = Row::new(vin, 1_700_000_000);
//! row.columns.insert("speed_kph".to_string(), ColumnValue::Float64(87.5));
//!
//! engine.upsert(WriteRequest {
//!     table: "vehicle_telemetry".to_string(),
//!     rows: vec![row],
//! })?;
//!
//! let latest = engine.execute_latest_query(LatestQueryRequest {
//!     table: "vehicle_telemetry".to_string(),
//!     vins: vec![vin],
//!     requested_columns: vec![],
//! })?;
//! assert_eq!(latest.len(), 1);
//!
//! engine.shutdown()?;
//! # Ok::<(), vints::Error>(())
//! ```

mod arena;
mod bitstream;
mod block_cache;
mod codec;
mod coding;
mod config;
mod descriptor_table;
mod engine;
mod error;
mod memtable;
mod row_codec;
mod schema;
mod segment;
mod sharding;
mod skiplist;
mod table;
mod thread_pool;
mod value;

#[doc(hidden)]
pub use arena::Arena;
#[doc(hidden)]
pub use memtable::MemTable;
#[doc(hidden)]
pub use segment::{write_segment, SegmentReader};
#[doc(hidden)]
pub use skiplist::SkipList;
#[doc(hidden)]
pub use table::{Table, TableReader, TableWriter};
#[doc(hidden)]
pub use thread_pool::ThreadPool;

pub use block_cache::BlockCache;
pub use codec::CodecId;
pub use config::EngineConfig;
pub use descriptor_table::DescriptorTable;
pub use engine::{Engine, LatestQueryRequest, TimeRangeQueryRequest, WriteRequest};
pub use error::{Error, Result};
pub use schema::{ColumnDef, TableSchema};
pub use value::{ColumnType, ColumnValue, Row, Vin};
