// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use rust_htslib::bcf::{self, record::Numeric};

use crate::fields::FieldValue;
use crate::header::MergedHeader;
use crate::synthesis::MergedRecord;
use crate::utils::bcf_utils::{output_format, vector_end_float, VECTOR_END_INTEGER};

/// Sort by chromosome name, position, alleles and ID.
pub fn sort_records(records: &mut [MergedRecord]) {
    records.sort_by(|a, b| {
        a.chrom()
            .cmp(b.chrom())
            .then_with(|| a.pos().cmp(&b.pos()))
            .then_with(|| a.ref_allele().cmp(b.ref_allele()))
            .then_with(|| a.alt_allele().cmp(b.alt_allele()))
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Sort the given records and write them to `path`, as BCF if the path ends with
/// `.bcf`, compressed VCF if it ends with `.gz`, plain VCF otherwise.
pub fn write_records(
    path: &Path,
    header: &MergedHeader,
    mut records: Vec<MergedRecord>,
) -> Result<()> {
    sort_records(&mut records);

    let (uncompressed, format) = output_format(path);
    let mut writer = bcf::Writer::from_path(path, &header.to_bcf_header(), uncompressed, format)
        .with_context(|| format!("error writing output file {}", path.display()))?;

    for merged in &records {
        let mut record = writer.empty_record();
        let rid = writer.header().name2rid(merged.chrom().as_bytes())?;
        record.set_rid(Some(rid));
        record.set_pos(merged.pos() as i64 - 1);
        record.set_id(merged.id().as_deref().unwrap_or(".").as_bytes())?;
        record.set_alleles(&[
            merged.ref_allele().as_bytes(),
            merged.alt_allele().as_bytes(),
        ])?;
        record.set_qual(f32::missing());

        if !merged.filters().is_empty() {
            let filters: Vec<&[u8]> = merged.filters().iter().map(|f| f.as_bytes()).collect();
            record.set_filters(&filters)?;
        }

        for (id, value) in merged.info() {
            value.push_info(&mut record, id.as_bytes())?;
        }

        if !header.samples().is_empty() {
            let ids: BTreeSet<&String> = merged
                .format()
                .iter()
                .flat_map(|values| values.keys())
                .collect();
            for id in ids {
                let values = merged
                    .format()
                    .iter()
                    .map(|values| values.get(id))
                    .collect_vec();
                push_format(&mut record, id.as_bytes(), &values)?;
            }
        }

        writer.write(&record)?;
    }
    info!(
        "Wrote {} merged records to {}.",
        records.len(),
        path.display()
    );

    Ok(())
}

/// Push the values of all samples of one FORMAT field. Samples lacking the field
/// get a missing value, shorter vectors are padded with the vector end marker.
fn push_format(
    record: &mut bcf::Record,
    id: &[u8],
    values: &[Option<&FieldValue>],
) -> Result<()> {
    let width = values
        .iter()
        .map(|value| match value {
            Some(FieldValue::Integer(v)) => v.len(),
            Some(FieldValue::Float(v)) => v.len(),
            _ => 1,
        })
        .max()
        .unwrap_or(1)
        .max(1);

    match values.iter().flatten().next() {
        Some(FieldValue::Integer(_)) => {
            let mut flat = Vec::with_capacity(values.len() * width);
            for value in values {
                let sample: Vec<i32> = match value {
                    Some(FieldValue::Integer(v)) if !v.is_empty() => v
                        .iter()
                        .map(|v| v.unwrap_or_else(i32::missing))
                        .collect(),
                    _ => vec![i32::missing()],
                };
                let n = sample.len();
                flat.extend(sample);
                flat.extend(std::iter::repeat(VECTOR_END_INTEGER).take(width - n));
            }
            record.push_format_integer(id, &flat)?;
        }
        Some(FieldValue::Float(_)) => {
            let mut flat = Vec::with_capacity(values.len() * width);
            for value in values {
                let sample: Vec<f32> = match value {
                    Some(FieldValue::Float(v)) if !v.is_empty() => v
                        .iter()
                        .map(|v| v.unwrap_or_else(f32::missing))
                        .collect(),
                    _ => vec![f32::missing()],
                };
                let n = sample.len();
                flat.extend(sample);
                flat.extend(std::iter::repeat(vector_end_float()).take(width - n));
            }
            record.push_format_float(id, &flat)?;
        }
        Some(FieldValue::String(_)) => {
            let strings = values
                .iter()
                .map(|value| match value {
                    Some(FieldValue::String(v)) if !v.is_empty() => v.join(","),
                    _ => ".".to_owned(),
                })
                .collect_vec();
            let bytes = strings.iter().map(|s| s.as_bytes()).collect_vec();
            record.push_format_string(id, &bytes)?;
        }
        // flags and absent fields are not written
        Some(FieldValue::Flag) | None => (),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakend::tests::bnd;
    use crate::header::reconcile;
    use crate::source::{Source, SourceHeader};
    use crate::synthesis::synthesize;

    #[test]
    fn test_sort_records() {
        let breakends = vec![
            bnd(0, "b", "9", 84867241, "]22:24334571]A", None).build().unwrap(),
            bnd(0, "c", "21", 8258375, "]9:131198324]N", None).build().unwrap(),
            bnd(0, "d", "21", 8258375, "[16:3728788[N", None).build().unwrap(),
            bnd(0, "e", "10", 5, "N[1:1[", None).build().unwrap(),
            bnd(0, "f", "22", 24334571, "A[9:84867241[", None).build().unwrap(),
            bnd(0, "g", "22", 100, "A[9:1[", None).build().unwrap(),
        ];
        let header = reconcile(
            &[Source::new("manta", 0, SourceHeader::default(), Vec::new())],
            None,
        )
        .unwrap();
        let mut records = (0..breakends.len())
            .map(|i| synthesize(&[i], &breakends, &header))
            .collect_vec();
        sort_records(&mut records);
        let ids = records
            .iter()
            .map(|record| record.id().clone().unwrap())
            .collect_vec();
        assert_eq!(ids, vec!["e", "d", "c", "g", "f", "b"]);
    }
}
