use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("at least one calling source must be given")]
    NoSources,
    #[error("number of calling sources ({sources}) does not match number of input files ({inputs})")]
    SourceInputCountMismatch { sources: usize, inputs: usize },
    #[error("calling source {name} is given more than once")]
    DuplicateSourceName { name: String },
    #[error("invalid BND record: ALT {spec} does not follow BND spec ({msg})")]
    InvalidBNDRecordAlt { spec: String, msg: String },
    #[error("invalid BND record at {chrom}:{pos} in {source_name}: {msg}")]
    MalformedRecord {
        source_name: String,
        chrom: String,
        pos: i64,
        msg: String,
    },
    #[error("record {i} in {path} does not define a chromosome")]
    RecordMissingChrom { i: usize, path: PathBuf },
    #[error("breakend at {chrom}:{pos} in {source_name} has MATEID but no own ID")]
    BreakendMateidWithoutRecid {
        source_name: String,
        chrom: String,
        pos: i64,
    },
    #[error("invalid {kind} declaration for {id} in header of {source_name}: {msg}")]
    InvalidHeaderDeclaration {
        kind: String,
        id: String,
        source_name: String,
        msg: String,
    },
    #[error(
        "incompatible declarations of {kind} field {id}: {first_source} declares {first}, {source_name} declares {second}"
    )]
    IncompatibleFieldDeclaration {
        kind: String,
        id: String,
        first_source: String,
        first: String,
        source_name: String,
        second: String,
    },
    #[error("{kind} field {id} of {source_name} must be declared as {expected}, found {found}")]
    UnexpectedFieldDeclaration {
        kind: String,
        id: String,
        source_name: String,
        expected: String,
        found: String,
    },
    #[error("annotation field {id} of {source_name} must be of type String, found {found}")]
    InvalidAnnotationField {
        id: String,
        source_name: String,
        found: String,
    },
    #[error("calling source {source_name} has {found} samples but {expected} are expected")]
    SampleCountMismatch {
        source_name: String,
        expected: usize,
        found: usize,
    },
}
