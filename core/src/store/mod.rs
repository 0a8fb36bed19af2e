//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Pipeline stages receive rows from the store; they never execute SQL.

use crate::error::PipelineResult;
use rusqlite::{Connection, OpenFlags};

mod contracts;
mod predictions;

pub use contracts::REQUIRED_VIEW_COLUMNS;
pub use predictions::PredictionSnapshot;

/// Name of the detailed contracts view the pipeline reads.
pub const CONTRACTS_VIEW: &str = "v_contratos_detalhados";

pub struct ChurnStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl ChurnStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_insurance_source.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_predictions.sql"))?;
        Ok(())
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Raw connection, for tests that need to reshape the source.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// A client as written to `clientes`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewClient {
    pub client_id:      String,
    pub name:           String,
    pub birth_date:     Option<String>,
    pub gender:         Option<String>,
    pub monthly_income: Option<f64>,
    pub education:      Option<String>,
    pub dependents:     Option<i64>,
    pub signup_date:    Option<String>,
}

/// A contract as written to `contratos`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub contract_id:     String,
    pub client_id:       Option<String>,
    pub insurance_type:  Option<String>,
    pub start_date:      Option<String>,
    pub end_date:        Option<String>,
    pub monthly_premium: Option<f64>,
    pub satisfaction:    Option<String>,
    pub sales_channel:   Option<String>,
    pub auto_renewal:    Option<bool>,
    pub status:          crate::types::ContractStatus,
}

/// A cancellation as written to `cancelamentos`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCancellation {
    pub contract_id:       String,
    pub cancellation_date: String,
    pub reason:            Option<String>,
    pub channel:           Option<String>,
}
