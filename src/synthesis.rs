// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Synthesis of one merged record per side of a fusion event.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::breakend::Breakend;
use crate::fields::{Cardinality, FieldValue};
use crate::header::{
    MergedHeader, Namespace, CIPOS, IDSRC, PAIRED_READS, PAIRED_READS_BY_SOURCE, SPLIT_READS,
    SPLIT_READS_BY_SOURCE, SRC,
};
use crate::utils::escape_list_item;

/// A record of the merged call set.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct MergedRecord {
    #[getset(get = "pub")]
    chrom: String,
    /// 1-based position.
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    id: Option<String>,
    #[getset(get = "pub")]
    ref_allele: String,
    #[getset(get = "pub")]
    alt_allele: String,
    #[getset(get = "pub")]
    filters: Vec<String>,
    #[getset(get = "pub")]
    info: BTreeMap<String, FieldValue>,
    /// FORMAT values, indexed by sample.
    #[getset(get = "pub")]
    format: Vec<BTreeMap<String, FieldValue>>,
}

/// Read support of one breakend in one sample, reduced to the alternate allele count.
fn support(
    breakend: &Breakend,
    sample: usize,
    field: &str,
    cardinality: Option<Cardinality>,
) -> i32 {
    breakend
        .format()
        .get(sample)
        .and_then(|values| values.get(field))
        .map_or(0, |value| {
            value.support_count(cardinality.unwrap_or(Cardinality::Fixed(1)))
        })
}

fn single_string(value: &str) -> FieldValue {
    FieldValue::String(vec![value.to_owned()])
}

/// Build the merged record of one event side.
///
/// # Arguments
/// * `side` - arena indices of the breakends, ordered by source priority
/// * `breakends` - the breakend arena
/// * `header` - the reconciled header providing source namespaces
pub fn synthesize(side: &[usize], breakends: &[Breakend], header: &MergedHeader) -> MergedRecord {
    let members: Vec<&Breakend> = side.iter().map(|i| &breakends[*i]).collect();
    let namespaces: Vec<&Namespace> = members
        .iter()
        .map(|breakend| header.namespace(breakend.source()))
        .collect();
    let canonical = members[0];

    let mut info = BTreeMap::new();
    info.insert("SVTYPE".to_owned(), single_string("BND"));
    if let Some(mate_id) = canonical.mate_id() {
        info.insert("MATEID".to_owned(), single_string(&escape_list_item(mate_id)));
    }
    if canonical.rna_first() {
        info.insert("RNA_FIRST".to_owned(), FieldValue::Flag);
    }
    let cipos = canonical.cipos();
    info.insert(
        CIPOS.to_owned(),
        FieldValue::Integer(vec![Some(cipos.lo as i32), Some(cipos.hi as i32)]),
    );
    info.insert(
        IDSRC.to_owned(),
        FieldValue::String(
            members
                .iter()
                .map(|breakend| {
                    breakend
                        .id()
                        .as_ref()
                        .map_or_else(|| ".".to_owned(), |id| escape_list_item(id))
                })
                .collect(),
        ),
    );
    info.insert(
        SRC.to_owned(),
        FieldValue::String(
            namespaces
                .iter()
                .map(|namespace| namespace.source_name().to_owned())
                .collect(),
        ),
    );
    for (breakend, namespace) in members.iter().zip(&namespaces) {
        for (name, value) in breakend.info() {
            if let Some(name) = namespace.info_name(name) {
                info.insert(name.to_owned(), value.clone());
            }
        }
        if let Some(qual) = breakend.qual() {
            info.insert(namespace.quality_field(), FieldValue::Float(vec![Some(qual)]));
        }
    }

    let support_fields = [
        (
            PAIRED_READS,
            PAIRED_READS_BY_SOURCE,
            namespaces
                .iter()
                .map(|namespace| namespace.paired_reads())
                .collect_vec(),
        ),
        (
            SPLIT_READS,
            SPLIT_READS_BY_SOURCE,
            namespaces
                .iter()
                .map(|namespace| namespace.split_reads())
                .collect_vec(),
        ),
    ];
    let format = (0..header.samples().len())
        .map(|sample| {
            let mut values = BTreeMap::new();
            for (field, by_source, cardinalities) in &support_fields {
                let counts: Vec<Option<i32>> = members
                    .iter()
                    .zip(cardinalities)
                    .map(|(breakend, cardinality)| {
                        Some(support(breakend, sample, field, *cardinality))
                    })
                    .collect();
                values.insert(field.to_string(), FieldValue::Integer(vec![counts[0]]));
                values.insert(by_source.to_string(), FieldValue::Integer(counts));
            }
            for (breakend, namespace) in members.iter().zip(&namespaces) {
                if let Some(sample_values) = breakend.format().get(sample) {
                    for (name, value) in sample_values {
                        if let Some(name) = namespace.format_name(name) {
                            values.insert(name.to_owned(), value.clone());
                        }
                    }
                }
            }
            values
        })
        .collect();

    let filters = canonical
        .filters()
        .iter()
        .map(|tag| namespaces[0].filter_name(tag))
        .filter(|tag| tag != ".")
        .collect();

    MergedRecord {
        chrom: canonical.chrom().to_owned(),
        pos: canonical.pos(),
        id: canonical.id().clone(),
        ref_allele: canonical.ref_allele().to_owned(),
        alt_allele: canonical.alt_allele().to_owned(),
        filters,
        info,
        format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakend::tests::bnd;
    use crate::breakend::ConfidenceInterval;
    use crate::fields::{ContigDeclaration, FieldDeclaration, FilterDeclaration, ValueType};
    use crate::header::reconcile;
    use crate::source::{Source, SourceHeader};

    fn decl(id: &str, cardinality: Cardinality, value_type: ValueType) -> FieldDeclaration {
        FieldDeclaration::new(id.to_owned(), cardinality, value_type, String::new(), None)
    }

    fn source(name: &str, priority: usize, support: Cardinality) -> Source {
        let header = SourceHeader::new(
            vec![
                decl("SVTYPE", Cardinality::Fixed(1), ValueType::String),
                decl("MATEID", Cardinality::Fixed(1), ValueType::String),
                decl("CIPOS", Cardinality::Fixed(2), ValueType::Integer),
                decl("TESTANN", Cardinality::Variable, ValueType::String),
            ],
            vec![
                decl("PR", support, ValueType::Integer),
                decl("SR", support, ValueType::Integer),
            ],
            vec![FilterDeclaration::new(
                "Local".to_owned(),
                String::new(),
                None,
            )],
            vec![ContigDeclaration::new("22".to_owned(), None)],
            vec!["splA".to_owned()],
        );
        Source::new(name, priority, header, Vec::new())
    }

    fn header() -> MergedHeader {
        reconcile(
            &[
                source("manta", 0, Cardinality::PerAllele),
                source("starfusion", 1, Cardinality::Fixed(1)),
                source("arriba", 2, Cardinality::Fixed(1)),
            ],
            Some("TESTANN"),
        )
        .unwrap()
    }

    fn with_support(builder: crate::breakend::BreakendBuilder, pr: Vec<i32>, sr: Vec<i32>) -> Breakend {
        let mut values = BTreeMap::new();
        values.insert(
            "PR".to_owned(),
            FieldValue::Integer(pr.into_iter().map(Some).collect()),
        );
        values.insert(
            "SR".to_owned(),
            FieldValue::Integer(sr.into_iter().map(Some).collect()),
        );
        builder.format(vec![values]).build().unwrap()
    }

    fn strings(values: &[&str]) -> FieldValue {
        FieldValue::String(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_synthesize_merged_side() {
        let mut manta_info = BTreeMap::new();
        manta_info.insert(
            "CIPOS".to_owned(),
            FieldValue::Integer(vec![Some(0), Some(3)]),
        );
        let mut arriba_info = BTreeMap::new();
        arriba_info.insert("TESTANN".to_owned(), strings(&["SPECC1L|+|CDS"]));
        let breakends = vec![
            with_support(
                bnd(0, "MantaBND:244:0:1:0:0:0:1", "22", 24334571, "A[9:84867241[", Some("MantaBND:244:0:1:0:0:0:0"))
                    .cipos(ConfidenceInterval::new(0, 3))
                    .info(manta_info)
                    .filters(vec!["PASS".to_owned()])
                    .qual(Some(999.0)),
                vec![7, 3],
                vec![10, 20],
            ),
            with_support(
                bnd(1, "2d095596", "22", 24334573, "N[9:84867243[", Some("x")),
                vec![6],
                vec![22],
            ),
            with_support(
                bnd(2, "2eb133b5", "22", 24334573, "N[9:84867243[", Some("y"))
                    .info(arriba_info)
                    .filters(vec!["Local".to_owned()]),
                vec![3],
                vec![19],
            ),
        ];

        let record = synthesize(&[0, 1, 2], &breakends, &header());
        assert_eq!(record.chrom(), "22");
        assert_eq!(record.pos(), 24334571);
        assert_eq!(record.id(), &Some("MantaBND:244:0:1:0:0:0:1".to_owned()));
        assert_eq!(record.alt_allele(), "A[9:84867241[");
        assert_eq!(record.filters(), &vec!["PASS".to_owned()]);

        let info = record.info();
        assert_eq!(info["SRC"], strings(&["manta", "starfusion", "arriba"]));
        assert_eq!(
            info["IDSRC"],
            strings(&["MantaBND%3A244%3A0%3A1%3A0%3A0%3A0%3A1", "2d095596", "2eb133b5"])
        );
        assert_eq!(info["MATEID"], strings(&["MantaBND%3A244%3A0%3A1%3A0%3A0%3A0%3A0"]));
        assert_eq!(info["CIPOS"], FieldValue::Integer(vec![Some(0), Some(3)]));
        assert_eq!(info["s0_CIPOS"], FieldValue::Integer(vec![Some(0), Some(3)]));
        assert_eq!(info["s0_VCQUAL"], FieldValue::Float(vec![Some(999.0)]));
        assert_eq!(info["s2_TESTANN"], strings(&["SPECC1L|+|CDS"]));
        assert!(!info.contains_key("s1_VCQUAL"));

        let format = &record.format()[0];
        assert_eq!(format["PR"], FieldValue::Integer(vec![Some(3)]));
        assert_eq!(
            format["PRSRC"],
            FieldValue::Integer(vec![Some(3), Some(6), Some(3)])
        );
        assert_eq!(format["SR"], FieldValue::Integer(vec![Some(20)]));
        assert_eq!(
            format["SRSRC"],
            FieldValue::Integer(vec![Some(20), Some(22), Some(19)])
        );
        assert_eq!(format["s0_PR"], FieldValue::Integer(vec![Some(7), Some(3)]));
        assert_eq!(format["s1_PR"], FieldValue::Integer(vec![Some(6)]));
    }

    #[test]
    fn test_synthesize_single_breakend() {
        let breakends = vec![with_support(
            bnd(0, "m", "1", 154944376, "]7:72948421]N", None).filters(vec!["Local".to_owned()]),
            vec![5, 2],
            vec![1, 0],
        )];
        let record = synthesize(&[0], &breakends, &header());
        assert_eq!(record.filters(), &vec!["s0_Local".to_owned()]);
        assert_eq!(record.info()["SRC"], strings(&["manta"]));
        assert_eq!(record.info()["IDSRC"], strings(&["m"]));
        assert_eq!(record.info()["CIPOS"], FieldValue::Integer(vec![Some(0), Some(0)]));
        assert!(!record.info().contains_key("MATEID"));
        assert_eq!(record.format()[0]["PR"], FieldValue::Integer(vec![Some(2)]));
        assert_eq!(record.format()[0]["SRSRC"], FieldValue::Integer(vec![Some(0)]));
    }

    #[test]
    fn test_missing_support_counts_zero() {
        let breakends = vec![
            bnd(1, "s", "1", 10, "N[2:20[", None).build().unwrap(),
            with_support(bnd(2, "a", "1", 10, "N[2:20[", None), vec![4], vec![1]),
        ];
        let record = synthesize(&[0, 1], &breakends, &header());
        assert_eq!(
            record.format()[0]["PRSRC"],
            FieldValue::Integer(vec![Some(0), Some(4)])
        );
        assert_eq!(record.format()[0]["PR"], FieldValue::Integer(vec![Some(0)]));
        assert!(record.filters().is_empty());
    }
}
