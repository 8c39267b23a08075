// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Loading of the breakend calls of one calling source.

use std::collections::hash_map::Entry;
use std::collections::{btree_map, BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_htslib::bcf::header::{HeaderRecord, HeaderView};
use rust_htslib::bcf::record::Numeric;
use rust_htslib::bcf::{self, Read};

use crate::breakend::{Breakend, BreakendBuilder, BreakendNotation, ConfidenceInterval};
use crate::errors::Error;
use crate::fields::{
    ContigDeclaration, FieldDeclaration, FieldValue, FilterDeclaration, ValueType,
};
use crate::utils::bcf_utils::{float_values, get_chrom, integer_values};
use crate::utils::unquote;

/// A calling source as given on the command line.
#[derive(Debug, Clone, PartialEq, new, Getters)]
#[getset(get = "pub")]
pub struct SourceSpec {
    name: String,
    path: PathBuf,
}

/// Header declarations of one source.
#[derive(Debug, Clone, Default, PartialEq, new, Getters)]
#[getset(get = "pub")]
pub struct SourceHeader {
    info: Vec<FieldDeclaration>,
    format: Vec<FieldDeclaration>,
    filters: Vec<FilterDeclaration>,
    contigs: Vec<ContigDeclaration>,
    samples: Vec<String>,
}

impl SourceHeader {
    pub(crate) fn from_header_view(header: &HeaderView, source_name: &str) -> Result<Self> {
        let mut source_header = SourceHeader::default();

        let invalid = |kind: &str, id: Option<&String>, msg: String| Error::InvalidHeaderDeclaration {
            kind: kind.to_owned(),
            id: id.cloned().unwrap_or_else(|| "?".to_owned()),
            source_name: source_name.to_owned(),
            msg,
        };

        for record in header.header_records() {
            match record {
                HeaderRecord::Info { values, .. } => {
                    let decl = FieldDeclaration::from_header_values(|key| values.get(key))
                        .map_err(|msg| invalid("INFO", values.get("ID"), msg))?;
                    source_header.info.push(decl);
                }
                HeaderRecord::Format { values, .. } => {
                    let decl = FieldDeclaration::from_header_values(|key| values.get(key))
                        .map_err(|msg| invalid("FORMAT", values.get("ID"), msg))?;
                    source_header.format.push(decl);
                }
                HeaderRecord::Filter { values, .. } => {
                    let id = values
                        .get("ID")
                        .ok_or_else(|| invalid("FILTER", None, "missing ID".to_owned()))?;
                    let description = values.get("Description").map_or("", |d| unquote(d));
                    source_header.filters.push(FilterDeclaration::new(
                        id.to_owned(),
                        description.to_owned(),
                        None,
                    ));
                }
                HeaderRecord::Contig { values, .. } => {
                    let id = values
                        .get("ID")
                        .ok_or_else(|| invalid("contig", None, "missing ID".to_owned()))?;
                    let length = values.get("length").and_then(|l| l.parse().ok());
                    source_header
                        .contigs
                        .push(ContigDeclaration::new(id.to_owned(), length));
                }
                _ => (),
            }
        }

        source_header.samples = header
            .samples()
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect();

        Ok(source_header)
    }

    pub fn info_declaration(&self, id: &str) -> Option<&FieldDeclaration> {
        self.info.iter().find(|decl| decl.id() == id)
    }

    pub fn format_declaration(&self, id: &str) -> Option<&FieldDeclaration> {
        self.format.iter().find(|decl| decl.id() == id)
    }

    fn declares_info(&self, id: &str, value_type: ValueType) -> bool {
        self.info_declaration(id)
            .map_or(false, |decl| decl.value_type() == value_type)
    }
}

/// The breakend calls of one calling source, with its header.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Source {
    #[getset(get = "pub")]
    name: String,
    /// Position in the ordered list of sources, 0 being the highest priority.
    #[getset(get_copy = "pub")]
    priority: usize,
    #[getset(get = "pub")]
    header: SourceHeader,
    #[getset(get = "pub")]
    breakends: Vec<Breakend>,
}

impl Source {
    pub fn new(name: &str, priority: usize, header: SourceHeader, breakends: Vec<Breakend>) -> Self {
        Source {
            name: name.to_owned(),
            priority,
            header,
            breakends,
        }
    }

    /// Read all BND records of the VCF/BCF at `path`.
    ///
    /// # Arguments
    /// * `spec` - name and path of the source
    /// * `priority` - index of the source in the ordered source list
    /// * `annotation_field` - INFO field whose values are concatenated when duplicate calls are collapsed
    pub fn load(spec: &SourceSpec, priority: usize, annotation_field: Option<&str>) -> Result<Self> {
        let mut reader = bcf::Reader::from_path(spec.path()).with_context(|| {
            format!(
                "error reading input file {} of calling source {}",
                spec.path().display(),
                spec.name()
            )
        })?;
        let header = SourceHeader::from_header_view(reader.header(), spec.name())?;
        let loader = Loader {
            source_name: spec.name(),
            path: spec.path(),
            priority,
            header: &header,
        };

        let mut breakends = Vec::new();
        let mut skipped = 0;
        if header.declares_info("SVTYPE", ValueType::String) {
            for (i, record) in reader.records().enumerate() {
                let record = record?;
                match loader.breakend(&record, i)? {
                    Some(breakend) => breakends.push(breakend),
                    None => skipped += 1,
                }
            }
        } else {
            warn!(
                "Header of calling source {} does not declare SVTYPE, no breakends will be read.",
                spec.name()
            );
        }
        if skipped > 0 {
            info!(
                "Skipped {} records of calling source {} that are not breakends.",
                skipped,
                spec.name()
            );
        }

        let n = breakends.len();
        let breakends = collapse_duplicates(breakends, annotation_field);
        if breakends.len() < n {
            debug!(
                "Collapsed {} duplicated breakends of calling source {}.",
                n - breakends.len(),
                spec.name()
            );
        }
        info!(
            "Loaded {} breakends of calling source {} from {}.",
            breakends.len(),
            spec.name(),
            spec.path().display()
        );

        Ok(Source::new(spec.name(), priority, header, breakends))
    }

    pub(crate) fn take_breakends(&mut self) -> Vec<Breakend> {
        std::mem::take(&mut self.breakends)
    }
}

struct Loader<'a> {
    source_name: &'a str,
    path: &'a Path,
    priority: usize,
    header: &'a SourceHeader,
}

impl<'a> Loader<'a> {
    fn malformed(&self, chrom: &str, record: &bcf::Record, msg: String) -> Error {
        Error::MalformedRecord {
            source_name: self.source_name.to_owned(),
            chrom: chrom.to_owned(),
            pos: record.pos() + 1,
            msg,
        }
    }

    /// Build a breakend from the given record, or `None` if it is not a BND.
    fn breakend(&self, record: &bcf::Record, i: usize) -> Result<Option<Breakend>> {
        let is_bnd = record
            .info(b"SVTYPE")
            .string()?
            .map_or(false, |svtype| svtype.first() == Some(&&b"BND"[..]));
        if !is_bnd {
            return Ok(None);
        }

        let chrom = get_chrom(record, record.header(), i, self.path)?;
        let alleles = record.alleles();
        if alleles.len() != 2 {
            return Err(self
                .malformed(
                    &chrom,
                    record,
                    format!("expected one ALT allele, found {}", alleles.len() - 1),
                )
                .into());
        }
        let ref_allele = String::from_utf8_lossy(alleles[0]).into_owned();
        let alt_allele = String::from_utf8_lossy(alleles[1]).into_owned();
        let notation = BreakendNotation::decode(&alt_allele)
            .map_err(|e| self.malformed(&chrom, record, e.to_string()))?;

        let id = match record.id().as_slice() {
            b"." => None,
            id => Some(String::from_utf8_lossy(id).into_owned()),
        };

        let mut builder = BreakendBuilder::default()
            .source(self.priority)
            .chrom(chrom.clone())
            .pos(record.pos() as u64 + 1)
            .ref_allele(ref_allele)
            .alt_allele(alt_allele)
            .notation(notation);

        if self.header.declares_info("MATEID", ValueType::String) {
            if let Some(mate_ids) = record.info(b"MATEID").string()? {
                if mate_ids.len() > 1 {
                    warn!(
                        "Breakend {}:{} of calling source {} has {} mates, only the first one is considered.",
                        chrom,
                        record.pos() + 1,
                        self.source_name,
                        mate_ids.len()
                    );
                }
                if let Some(mate_id) = mate_ids.first() {
                    if id.is_none() {
                        return Err(Error::BreakendMateidWithoutRecid {
                            source_name: self.source_name.to_owned(),
                            chrom,
                            pos: record.pos() + 1,
                        }
                        .into());
                    }
                    builder = builder.mate_id(String::from_utf8_lossy(mate_id).into_owned());
                }
            }
        }

        if self.header.declares_info("CIPOS", ValueType::Integer) {
            if let Some(cipos) = record.info(b"CIPOS").integer()? {
                let cipos = integer_values(&cipos);
                if let [Some(lo), Some(hi)] = cipos.as_slice() {
                    builder = builder.cipos(ConfidenceInterval::new(*lo as i64, *hi as i64));
                }
            }
        }

        if self.header.declares_info("RNA_FIRST", ValueType::Flag) {
            builder = builder.rna_first(record.info(b"RNA_FIRST").flag()?);
        }

        let qual = record.qual();
        if !qual.is_missing() {
            builder = builder.qual(Some(qual));
        }

        let filters = record
            .filters()
            .map(|filter| String::from_utf8_lossy(&record.header().id_to_name(filter)).into_owned())
            .collect();

        let breakend = builder
            .id(id)
            .filters(filters)
            .info(self.info(record)?)
            .format(self.format(record))
            .build()?;

        Ok(Some(breakend))
    }

    /// Collect all declared INFO fields present in the record.
    fn info(&self, record: &bcf::Record) -> Result<BTreeMap<String, FieldValue>> {
        let mut info = BTreeMap::new();
        for decl in self.header.info() {
            let tag = decl.id().as_bytes();
            let value = match decl.value_type() {
                ValueType::Flag => {
                    if record.info(tag).flag()? {
                        Some(FieldValue::Flag)
                    } else {
                        None
                    }
                }
                ValueType::Integer => record
                    .info(tag)
                    .integer()?
                    .map(|values| FieldValue::Integer(integer_values(&values))),
                ValueType::Float => record
                    .info(tag)
                    .float()?
                    .map(|values| FieldValue::Float(float_values(&values))),
                ValueType::String | ValueType::Character => {
                    record.info(tag).string()?.map(|values| {
                        FieldValue::String(
                            values
                                .iter()
                                .map(|v| String::from_utf8_lossy(v).into_owned())
                                .collect(),
                        )
                    })
                }
            };
            if let Some(value) = value {
                info.insert(decl.id().to_owned(), value);
            }
        }
        Ok(info)
    }

    /// Collect all declared FORMAT fields present in the record, per sample.
    fn format(&self, record: &bcf::Record) -> Vec<BTreeMap<String, FieldValue>> {
        let mut format = vec![BTreeMap::new(); self.header.samples().len()];
        for decl in self.header.format() {
            let tag = decl.id().as_bytes();
            if tag == b"GT" {
                if let Ok(genotypes) = record.genotypes() {
                    for (sample, values) in format.iter_mut().enumerate() {
                        values.insert(
                            decl.id().to_owned(),
                            FieldValue::String(vec![genotypes.get(sample).to_string()]),
                        );
                    }
                }
                continue;
            }
            match decl.value_type() {
                ValueType::Integer => {
                    if let Ok(per_sample) = record.format(tag).integer() {
                        for (values, sample_values) in format.iter_mut().zip(per_sample.iter()) {
                            let sample_values = integer_values(sample_values);
                            if sample_values.iter().any(Option::is_some) {
                                values.insert(
                                    decl.id().to_owned(),
                                    FieldValue::Integer(sample_values),
                                );
                            }
                        }
                    }
                }
                ValueType::Float => {
                    if let Ok(per_sample) = record.format(tag).float() {
                        for (values, sample_values) in format.iter_mut().zip(per_sample.iter()) {
                            let sample_values = float_values(sample_values);
                            if sample_values.iter().any(Option::is_some) {
                                values
                                    .insert(decl.id().to_owned(), FieldValue::Float(sample_values));
                            }
                        }
                    }
                }
                ValueType::String | ValueType::Character => {
                    if let Ok(per_sample) = record.format(tag).string() {
                        for (values, sample_value) in format.iter_mut().zip(per_sample.iter()) {
                            let value = String::from_utf8_lossy(sample_value);
                            if !value.is_empty() && value != "." {
                                values.insert(
                                    decl.id().to_owned(),
                                    FieldValue::String(vec![value.into_owned()]),
                                );
                            }
                        }
                    }
                }
                // flags are not allowed in FORMAT
                ValueType::Flag => (),
            }
        }
        format
    }
}

/// Collapse breakend pairs of one source that report the same junction more than once.
///
/// Two breakends are duplicates if locus and alleles of themselves and of their mates
/// agree. Breakends are returned in canonical order, the first duplicate in that order
/// is kept and the values of the annotation field of the others are appended to it.
pub(crate) fn collapse_duplicates(
    mut breakends: Vec<Breakend>,
    annotation_field: Option<&str>,
) -> Vec<Breakend> {
    breakends.sort_by(|a, b| a.canonical_cmp(b));
    let mut kept_as: Vec<Option<usize>> = vec![None; breakends.len()];
    {
        let mut by_id = HashMap::new();
        for (i, breakend) in breakends.iter().enumerate() {
            if let Some(id) = breakend.id() {
                by_id.entry(id.as_str()).or_insert(i);
            }
        }

        let mut kept = HashMap::new();
        for (i, breakend) in breakends.iter().enumerate() {
            let mate_site = breakend
                .mate_id()
                .as_ref()
                .and_then(|mate_id| by_id.get(mate_id.as_str()))
                .map(|j| breakends[*j].site());
            match kept.entry((breakend.site(), mate_site)) {
                Entry::Occupied(entry) => kept_as[i] = Some(*entry.get()),
                Entry::Vacant(entry) => {
                    entry.insert(i);
                }
            }
        }
    }

    if let Some(field) = annotation_field {
        for (i, target) in kept_as.iter().enumerate() {
            if let Some(target) = target {
                if let Some(value) = breakends[i].info().get(field).cloned() {
                    match breakends[*target].info_mut().entry(field.to_owned()) {
                        btree_map::Entry::Occupied(mut entry) => {
                            entry.get_mut().extend(&value)
                        }
                        btree_map::Entry::Vacant(entry) => {
                            entry.insert(value);
                        }
                    }
                }
            }
        }
    }

    breakends
        .into_iter()
        .zip(kept_as)
        .filter_map(|(breakend, target)| {
            if target.is_none() {
                Some(breakend)
            } else {
                None
            }
        })
        .collect()
}
