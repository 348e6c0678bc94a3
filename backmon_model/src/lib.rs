//! Schema model and query structures for the backmon time-series pipeline.
//!
//! A [`Database`] holds the declarative description of every known
//! measurement: its [`Table`] (fields, tags, timestamp column), the
//! [`RetentionPolicy`] it lives in and the downsampling
//! [`ContinuousQuery`]s derived from it. Tables classify arbitrary row data
//! into tags, fields and a timestamp; [`InsertQuery`] encodes the result
//! into line protocol.

pub mod database;
pub mod datatype;
pub mod definitions;
pub mod escape;
pub mod queries;
pub mod retention;
pub mod table;

pub use database::Database;
pub use datatype::Datatype;
pub use queries::{
    ContinuousQuery, ContinuousQueryTemplate, InsertQuery, Keyword, SelectionQuery,
};
pub use retention::RetentionPolicy;
pub use table::{SchemaKind, SplitRow, SplitWarning, Table};

/// Primary error type for schema construction and query building.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("invalid clause combination: {0}")]
    InvalidCombination(&'static str),

    #[error("cannot split an empty row")]
    EmptyRow,

    #[error("no fields left to insert for table `{0}`")]
    NoFieldsToInsert(String),

    #[error(transparent)]
    Units(#[from] backmon_units::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
