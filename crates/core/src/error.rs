use crate::session::Stage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint {endpoint}: {details}")]
    InvalidEndpoint { endpoint: String, details: String },

    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("store at {endpoint} is unreachable: {details}")]
    Unreachable { endpoint: String, details: String },

    #[error("store at {0} rejected the credentials")]
    Unauthorized(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("index {index} is incompatible: {details}")]
    IncompatibleIndex { index: String, details: String },
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding server serves {served}, expected {expected}")]
    ModelMismatch { expected: String, served: String },

    #[error("model {model} returned {found} dimensions, expected {expected}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid response from embedding server: {0}")]
    BackendResponse(String),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("the file has no header row")]
    MissingHeader,

    #[error("column {0:?} appears more than once in the header")]
    DuplicateHeader(String),

    #[error("line {line} has {found} fields, expected {expected}")]
    RaggedRow {
        line: u64,
        expected: u64,
        found: u64,
    },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid index name {0:?}")]
    InvalidIndexName(String),

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("column {0:?} is reserved for the embedding vector")]
    ReservedColumn(String),

    #[error("at least one display column is required")]
    NoDisplayColumns,

    #[error("row {row} has no value in identifier column {column:?}")]
    MissingIdentifier { row: usize, column: String },

    #[error("identifier {id:?} appears on rows {first_row} and {row}")]
    DuplicateIdentifier {
        id: String,
        first_row: usize,
        row: usize,
    },

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("invalid limits: k={k}, num_candidates={num_candidates}")]
    InvalidLimits { k: usize, num_candidates: usize },

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    #[error("{rows} rows x {columns} columns exceeds the worksheet limits")]
    SheetTooLarge { rows: usize, columns: usize },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{action} requires stage {required:?}, session is at {current:?}")]
    StageNotReached {
        action: &'static str,
        required: Stage,
        current: Stage,
    },

    #[error("no index configuration chosen yet")]
    NotConfigured,

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
