// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Reconciliation of the headers of all calling sources into one merged header.
//!
//! Well-known breakend fields stay canonical, every other field, filter and the
//! variant quality of a source are renamed into the namespace `s{priority}_` of
//! that source and tagged with a `Source` attribute.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::Result;
use itertools::Itertools;
use rust_htslib::bcf;

use crate::errors::Error;
use crate::fields::{
    Cardinality, ContigDeclaration, FieldDeclaration, FieldKind, FilterDeclaration, ValueType,
};
use crate::source::Source;

/// INFO fields copied from the highest-priority breakend instead of being namespaced.
pub const PASSTHROUGH_INFO: [&str; 3] = ["SVTYPE", "MATEID", "RNA_FIRST"];
pub const CIPOS: &str = "CIPOS";
pub const IDSRC: &str = "IDSRC";
pub const SRC: &str = "SRC";
pub const PAIRED_READS: &str = "PR";
pub const SPLIT_READS: &str = "SR";
pub const PAIRED_READS_BY_SOURCE: &str = "PRSRC";
pub const SPLIT_READS_BY_SOURCE: &str = "SRSRC";
pub const QUALITY: &str = "VCQUAL";
pub const PASS: &str = "PASS";

lazy_static! {
    static ref DEFAULT_PASSTHROUGH: Vec<FieldDeclaration> = vec![
        FieldDeclaration::new(
            "MATEID".to_owned(),
            Cardinality::Variable,
            ValueType::String,
            "ID of mate breakend".to_owned(),
            None,
        ),
        FieldDeclaration::new(
            "RNA_FIRST".to_owned(),
            Cardinality::Fixed(0),
            ValueType::Flag,
            "For RNA fusions, this break-end is 5' in the fusion transcript".to_owned(),
            None,
        ),
        FieldDeclaration::new(
            "SVTYPE".to_owned(),
            Cardinality::Fixed(1),
            ValueType::String,
            "Type of structural variant".to_owned(),
            None,
        ),
    ];
}

/// Renaming of the fields and filters of one source.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Namespace {
    #[getset(get = "pub")]
    source_name: String,
    #[getset(get = "pub")]
    prefix: String,
    info: BTreeMap<String, String>,
    format: BTreeMap<String, String>,
    filters: BTreeMap<String, String>,
    /// Cardinality of the paired-read support field of the source, if declared.
    #[getset(get_copy = "pub")]
    paired_reads: Option<Cardinality>,
    /// Cardinality of the split-read support field of the source, if declared.
    #[getset(get_copy = "pub")]
    split_reads: Option<Cardinality>,
}

impl Namespace {
    pub fn new(priority: usize, source_name: &str) -> Self {
        Namespace {
            source_name: source_name.to_owned(),
            prefix: format!("s{}", priority),
            info: BTreeMap::new(),
            format: BTreeMap::new(),
            filters: BTreeMap::new(),
            paired_reads: None,
            split_reads: None,
        }
    }

    pub fn qualify(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// Output name of a private INFO field, `None` for canonical pass-through fields.
    pub fn info_name(&self, name: &str) -> Option<&str> {
        self.info.get(name).map(|n| n.as_str())
    }

    /// Output name of a private FORMAT field.
    pub fn format_name(&self, name: &str) -> Option<&str> {
        self.format.get(name).map(|n| n.as_str())
    }

    /// Output name of a filter tag. `PASS` and `.` stay as they are.
    pub fn filter_name(&self, tag: &str) -> String {
        if tag == PASS || tag == "." {
            return tag.to_owned();
        }
        self.filters
            .get(tag)
            .cloned()
            .unwrap_or_else(|| self.qualify(tag))
    }

    /// Name of the field holding the variant quality reported by the source.
    pub fn quality_field(&self) -> String {
        self.qualify(QUALITY)
    }
}

/// The header of the merged call set.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct MergedHeader {
    info: Vec<FieldDeclaration>,
    format: Vec<FieldDeclaration>,
    filters: Vec<FilterDeclaration>,
    contigs: Vec<ContigDeclaration>,
    samples: Vec<String>,
    /// One namespace per source, in priority order.
    namespaces: Vec<Namespace>,
}

impl MergedHeader {
    pub fn namespace(&self, priority: usize) -> &Namespace {
        &self.namespaces[priority]
    }

    pub fn info_declaration(&self, id: &str) -> Option<&FieldDeclaration> {
        self.info.iter().find(|decl| decl.id() == id)
    }

    pub fn format_declaration(&self, id: &str) -> Option<&FieldDeclaration> {
        self.format.iter().find(|decl| decl.id() == id)
    }

    /// Build the htslib header for writing.
    pub fn to_bcf_header(&self) -> bcf::Header {
        let mut header = bcf::Header::new();
        for contig in &self.contigs {
            header.push_record(contig.header_line().as_bytes());
        }
        for decl in &self.info {
            header.push_record(decl.header_line(FieldKind::Info).as_bytes());
        }
        for filter in &self.filters {
            header.push_record(filter.header_line().as_bytes());
        }
        for decl in &self.format {
            header.push_record(decl.header_line(FieldKind::Format).as_bytes());
        }
        for sample in &self.samples {
            header.push_sample(sample.as_bytes());
        }
        header
    }
}

fn synthesized_info(sources: &[Source]) -> Vec<FieldDeclaration> {
    let possible_values = sources
        .iter()
        .map(|source| format!("{} (s{})", source.name(), source.priority()))
        .join(", ");
    vec![
        FieldDeclaration::new(
            CIPOS.to_owned(),
            Cardinality::Fixed(2),
            ValueType::Integer,
            "Confidence interval around POS".to_owned(),
            None,
        ),
        FieldDeclaration::new(
            IDSRC.to_owned(),
            Cardinality::Variable,
            ValueType::String,
            "ID of breakend by source".to_owned(),
            None,
        ),
        FieldDeclaration::new(
            SRC.to_owned(),
            Cardinality::Variable,
            ValueType::String,
            format!(
                "Fusions callers where the breakend is identified. Possible values: {}",
                possible_values
            ),
            None,
        ),
    ]
}

fn synthesized_format() -> Vec<FieldDeclaration> {
    let decl = |id: &str, cardinality, description: &str| {
        FieldDeclaration::new(
            id.to_owned(),
            cardinality,
            ValueType::Integer,
            description.to_owned(),
            None,
        )
    };
    vec![
        decl(
            PAIRED_READS,
            Cardinality::Fixed(1),
            "Count of pairs of reads supporting the fusion",
        ),
        decl(
            PAIRED_READS_BY_SOURCE,
            Cardinality::Variable,
            "Count of pairs of reads supporting the fusion by source",
        ),
        decl(
            SPLIT_READS,
            Cardinality::Fixed(1),
            "Count of reads mapping on the fusion junction",
        ),
        decl(
            SPLIT_READS_BY_SOURCE,
            Cardinality::Variable,
            "Count of reads mapping on the fusion junction by source",
        ),
    ]
}

/// Merge the headers of the given sources, which have to be ordered by priority.
///
/// # Errors
/// * incompatible declarations of a pass-through field across sources
/// * `CIPOS`, `PR` or `SR` declared with a type the merge cannot interpret
/// * an annotation field that is not declared as String
/// * sources with differing numbers of samples
pub fn reconcile(sources: &[Source], annotation_field: Option<&str>) -> Result<MergedHeader> {
    let mut info: BTreeMap<String, FieldDeclaration> = synthesized_info(sources)
        .into_iter()
        .map(|decl| (decl.id().to_owned(), decl))
        .collect();
    let mut format: BTreeMap<String, FieldDeclaration> = synthesized_format()
        .into_iter()
        .map(|decl| (decl.id().to_owned(), decl))
        .collect();
    let mut filters: BTreeMap<String, FilterDeclaration> = BTreeMap::new();
    let mut passthrough: BTreeMap<String, (&str, FieldDeclaration)> = BTreeMap::new();
    let mut namespaces = Vec::with_capacity(sources.len());
    let mut annotation_declared = false;

    for source in sources {
        let mut namespace = Namespace::new(source.priority(), source.name());

        for decl in source.header().info() {
            let id = decl.id().as_str();
            if PASSTHROUGH_INFO.contains(&id) {
                if let Some((first_source, first)) = passthrough.get(id) {
                    if first.value_type() != decl.value_type()
                        || !first.cardinality().is_compatible(&decl.cardinality())
                    {
                        return Err(Error::IncompatibleFieldDeclaration {
                            kind: FieldKind::Info.to_string(),
                            id: id.to_owned(),
                            first_source: first_source.to_string(),
                            first: first.signature(),
                            source_name: source.name().to_owned(),
                            second: decl.signature(),
                        }
                        .into());
                    }
                } else {
                    passthrough.insert(id.to_owned(), (source.name().as_str(), decl.clone()));
                }
                continue;
            }
            if id == CIPOS
                && (decl.value_type() != ValueType::Integer
                    || decl.cardinality() != Cardinality::Fixed(2))
            {
                return Err(Error::UnexpectedFieldDeclaration {
                    kind: FieldKind::Info.to_string(),
                    id: id.to_owned(),
                    source_name: source.name().to_owned(),
                    expected: "Number=2,Type=Integer".to_owned(),
                    found: decl.signature(),
                }
                .into());
            }
            if Some(id) == annotation_field {
                if decl.value_type() != ValueType::String {
                    return Err(Error::InvalidAnnotationField {
                        id: id.to_owned(),
                        source_name: source.name().to_owned(),
                        found: decl.signature(),
                    }
                    .into());
                }
                annotation_declared = true;
            }

            let name = namespace.qualify(id);
            namespace.info.insert(id.to_owned(), name.clone());
            info.insert(name.clone(), decl.renamed(name, source.name()));
        }

        let quality = namespace.quality_field();
        info.insert(
            quality.clone(),
            FieldDeclaration::new(
                quality,
                Cardinality::Fixed(1),
                ValueType::Float,
                "The variant quality".to_owned(),
                Some(source.name().to_owned()),
            ),
        );

        for decl in source.header().format() {
            let id = decl.id().as_str();
            if id == PAIRED_READS || id == SPLIT_READS {
                if decl.value_type() != ValueType::Integer {
                    return Err(Error::UnexpectedFieldDeclaration {
                        kind: FieldKind::Format.to_string(),
                        id: id.to_owned(),
                        source_name: source.name().to_owned(),
                        expected: "Type=Integer".to_owned(),
                        found: decl.signature(),
                    }
                    .into());
                }
                if id == PAIRED_READS {
                    namespace.paired_reads = Some(decl.cardinality());
                } else {
                    namespace.split_reads = Some(decl.cardinality());
                }
            }
            let name = namespace.qualify(id);
            namespace.format.insert(id.to_owned(), name.clone());
            format.insert(name.clone(), decl.renamed(name, source.name()));
        }

        for filter in source.header().filters() {
            if filter.id() == PASS {
                continue;
            }
            let name = namespace.qualify(filter.id());
            namespace.filters.insert(filter.id().to_owned(), name.clone());
            filters.insert(
                name.clone(),
                FilterDeclaration::new(
                    name,
                    filter.description().to_owned(),
                    Some(source.name().to_owned()),
                ),
            );
        }
        // filters used by records without being declared
        for tag in source
            .breakends()
            .iter()
            .flat_map(|breakend| breakend.filters())
        {
            if tag == PASS || namespace.filters.contains_key(tag) {
                continue;
            }
            warn!(
                "Filter {} used by calling source {} is not declared in its header.",
                tag,
                source.name()
            );
            let name = namespace.qualify(tag);
            namespace.filters.insert(tag.to_owned(), name.clone());
            filters.insert(
                name.clone(),
                FilterDeclaration::new(
                    name,
                    format!("Filter {} of {}", tag, source.name()),
                    Some(source.name().to_owned()),
                ),
            );
        }

        namespaces.push(namespace);
    }

    for default in DEFAULT_PASSTHROUGH.iter() {
        let decl = passthrough
            .remove(default.id())
            .map_or_else(|| default.clone(), |(_, decl)| decl);
        info.insert(decl.id().to_owned(), decl);
    }

    if let Some(annotation_field) = annotation_field {
        if !annotation_declared {
            warn!(
                "Annotation field {} is not declared by any calling source.",
                annotation_field
            );
        }
    }

    Ok(MergedHeader {
        info: info.into_iter().map(|(_, decl)| decl).collect(),
        format: format.into_iter().map(|(_, decl)| decl).collect(),
        filters: filters.into_iter().map(|(_, filter)| filter).collect(),
        contigs: merge_contigs(sources),
        samples: merge_samples(sources)?,
        namespaces,
    })
}

/// Union of declared contigs in priority order, followed by undeclared chromosomes
/// referenced by breakends or their mates, sorted by name.
fn merge_contigs(sources: &[Source]) -> Vec<ContigDeclaration> {
    let mut seen = HashSet::new();
    let mut contigs = Vec::new();
    for contig in sources
        .iter()
        .flat_map(|source| source.header().contigs())
    {
        if seen.insert(contig.id().to_owned()) {
            contigs.push(contig.clone());
        }
    }

    let undeclared: BTreeSet<&str> = sources
        .iter()
        .flat_map(|source| source.breakends())
        .flat_map(|breakend| {
            vec![
                breakend.chrom().as_str(),
                breakend.notation().mate_contig(),
            ]
        })
        .filter(|chrom| !seen.contains(*chrom))
        .collect();
    contigs.extend(
        undeclared
            .into_iter()
            .map(|chrom| ContigDeclaration::new(chrom.to_owned(), None)),
    );
    contigs
}

/// Samples of the highest-priority source. Other sources are matched by index.
fn merge_samples(sources: &[Source]) -> Result<Vec<String>> {
    let samples = match sources.first() {
        Some(source) => source.header().samples().clone(),
        None => return Ok(Vec::new()),
    };
    for source in &sources[1..] {
        let other = source.header().samples();
        if other.len() != samples.len() {
            return Err(Error::SampleCountMismatch {
                source_name: source.name().to_owned(),
                expected: samples.len(),
                found: other.len(),
            }
            .into());
        }
        if other != &samples {
            warn!(
                "Sample names of calling source {} ({}) differ from {} ({}), samples are matched by their order.",
                source.name(),
                other.join(","),
                sources[0].name(),
                samples.join(",")
            );
        }
    }
    Ok(samples)
}
