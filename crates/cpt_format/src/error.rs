use std::path::PathBuf;

use thiserror::Error;

use crate::date::DateError;
use crate::header::HeaderError;
use crate::roles::RoleError;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CPTv10 namespace declaration not found in {path}")]
    MissingNamespace { path: PathBuf },

    #[error("line {line} in {path} has a malformed header: {source}")]
    Header {
        path: PathBuf,
        line: usize,
        #[source]
        source: HeaderError,
    },

    #[error("line {line} in {path} has an invalid date token: {source}")]
    Date {
        path: PathBuf,
        line: usize,
        #[source]
        source: DateError,
    },

    #[error("header at line {line} in {path} is missing required tag '{tag}'")]
    MissingTag {
        path: PathBuf,
        line: usize,
        tag: &'static str,
    },

    #[error("line {line} in {path} is not part of any data block")]
    UnexpectedLine { path: PathBuf, line: usize },

    #[error("line {line} in {path} has a malformed data block: {detail}")]
    MalformedBlock {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("field '{field}' in {path} has inconsistent dimensions: {detail}")]
    Dimensionality {
        path: PathBuf,
        field: String,
        detail: String,
    },

    #[error("CPTv10 arrays need between 2 and 4 dimensions, found {found}")]
    DimensionCount { found: usize },

    #[error("dimension '{name}' is not a valid CPTv10 dimension")]
    InvalidDimension { name: String },

    #[error("dimension '{name}' appears more than once")]
    DuplicateDimension { name: String },

    #[error("coordinate '{name}' is not a valid CPTv10 coordinate")]
    InvalidCoordinate { name: String },

    #[error("dimension '{dim}' has no matching coordinate")]
    MissingCoordinate { dim: String },

    #[error("coordinate '{name}' has {found} values but dimension '{dim}' has extent {expected}")]
    CoordinateLength {
        name: String,
        dim: String,
        expected: usize,
        found: usize,
    },

    #[error("coordinate '{name}' must index the 'T' dimension, found '{dim}'")]
    MisplacedTimeCoordinate { name: String, dim: String },

    #[error("coordinate '{present}' requires its pair '{missing}'")]
    UnpairedTimeBounds {
        present: &'static str,
        missing: &'static str,
    },

    #[error("array is missing the required '{name}' attribute")]
    MissingAttribute { name: &'static str },

    #[error("the 'missing' attribute cannot be NaN")]
    NanMissingValue,

    #[error("field name {name:?} cannot be written into a CPTv10 header")]
    InvalidFieldName { name: String },

    #[error("'{name}' value {value:?} contains a tab, comma or line break")]
    InvalidText { name: String, value: String },

    #[error("array '{name}' holds {found} values but shape {shape:?} requires {expected}")]
    ShapeMismatch {
        name: String,
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Roles(#[from] RoleError),
}

impl FormatError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn block(path: impl Into<PathBuf>, line: usize, detail: impl Into<String>) -> Self {
        Self::MalformedBlock {
            path: path.into(),
            line,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn dimensionality(
        path: impl Into<PathBuf>,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Dimensionality {
            path: path.into(),
            field: field.into(),
            detail: detail.into(),
        }
    }
}
