//! bcf_utils.rs
//!
//! Utilities for VCF/BCF record handling shared by the loader and the writer.
//!
//! This module provides:
//! 1. Chromosome resolution of records
//! 2. Removal of missing and vector-end sentinels from typed buffers
//! 3. Output format selection from a path

use std::path::Path;

use anyhow::Result;
use rust_htslib::bcf::{self, header::HeaderView, record::Numeric};

use crate::errors::Error;

/// htslib marks the padding of shorter per-sample vectors with this value.
pub(crate) const VECTOR_END_INTEGER: i32 = i32::MIN + 1;
const VECTOR_END_FLOAT_BITS: u32 = 0x7F80_0002;

/// Get chromosome name from a VCF record
///
/// # Arguments
/// * `record` - VCF record
/// * `header` - VCF header (for resolving RID to name)
/// * `i` - index of the record in its file, for error reporting
/// * `path` - file the record was read from, for error reporting
///
/// # Errors
/// Returns error if the RID is missing or cannot be resolved.
pub(crate) fn get_chrom(
    record: &bcf::Record,
    header: &HeaderView,
    i: usize,
    path: &Path,
) -> Result<String> {
    let missing = || Error::RecordMissingChrom {
        i,
        path: path.to_owned(),
    };
    let rid = record.rid().ok_or_else(missing)?;
    let chrom = header.rid2name(rid).map_err(|_| missing())?;
    Ok(String::from_utf8_lossy(chrom).into_owned())
}

/// Convert an integer buffer as returned by htslib into optional values,
/// dropping vector-end padding.
pub(crate) fn integer_values(values: &[i32]) -> Vec<Option<i32>> {
    values
        .iter()
        .take_while(|v| **v != VECTOR_END_INTEGER)
        .map(|v| if v.is_missing() { None } else { Some(*v) })
        .collect()
}

/// Convert a float buffer as returned by htslib into optional values,
/// dropping vector-end padding.
pub(crate) fn float_values(values: &[f32]) -> Vec<Option<f32>> {
    values
        .iter()
        .take_while(|v| v.to_bits() != VECTOR_END_FLOAT_BITS)
        .map(|v| if v.is_missing() { None } else { Some(*v) })
        .collect()
}

pub(crate) fn vector_end_float() -> f32 {
    f32::from_bits(VECTOR_END_FLOAT_BITS)
}

/// Choose `(uncompressed, format)` for `bcf::Writer` from the extension of the output path.
///
/// `.bcf` gives compressed BCF, `.vcf.gz` compressed VCF, everything else plain VCF.
pub(crate) fn output_format(path: &Path) -> (bool, bcf::Format) {
    let name = path.to_string_lossy();
    if name.ends_with(".bcf") {
        (false, bcf::Format::Bcf)
    } else if name.ends_with(".gz") {
        (false, bcf::Format::Vcf)
    } else {
        (true, bcf::Format::Vcf)
    }
}
