// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Result;
use derive_builder::Builder;
use itertools::Itertools;
use rayon::prelude::*;

use crate::clustering::cluster;
use crate::errors::Error;
use crate::header::reconcile;
use crate::source::{Source, SourceSpec};
use crate::synthesis::synthesize;
use crate::writer::write_records;

/// Merges the breakend calls of several calling sources into one call set.
#[derive(Builder, Debug)]
#[builder(pattern = "owned", derive(Debug))]
pub struct Merger {
    /// Calling sources ordered by priority.
    #[builder(private)]
    sources: Vec<SourceSpec>,
    /// INFO field of free text annotations, whose values are kept when duplicate
    /// calls of a source are collapsed.
    #[builder(default)]
    annotation_field: Option<String>,
    #[builder(setter(into))]
    output: PathBuf,
}

impl MergerBuilder {
    /// Pair source names with their input files. The order defines the priority of
    /// the sources, the first one being the highest.
    pub fn calling_sources(self, names: &[String], paths: &[PathBuf]) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::NoSources.into());
        }
        if names.len() != paths.len() {
            return Err(Error::SourceInputCountMismatch {
                sources: names.len(),
                inputs: paths.len(),
            }
            .into());
        }
        let mut seen = HashSet::new();
        if let Some(name) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(Error::DuplicateSourceName {
                name: name.to_owned(),
            }
            .into());
        }

        Ok(self.sources(
            names
                .iter()
                .zip(paths)
                .map(|(name, path)| SourceSpec::new(name.to_owned(), path.to_owned()))
                .collect(),
        ))
    }
}

impl Merger {
    pub fn merge(&self) -> Result<()> {
        let annotation_field = self.annotation_field.as_deref();

        let mut sources = self
            .sources
            .par_iter()
            .enumerate()
            .map(|(priority, spec)| Source::load(spec, priority, annotation_field))
            .collect::<Result<Vec<_>>>()?;

        let header = reconcile(&sources, annotation_field)?;

        let breakends = sources
            .iter_mut()
            .flat_map(|source| source.take_breakends())
            .collect_vec();
        let events = cluster(&breakends);
        info!(
            "Clustered {} breakends into {} fusion events.",
            breakends.len(),
            events.len()
        );

        let records = events
            .iter()
            .flat_map(|event| event.sides())
            .map(|side| synthesize(side, &breakends, &header))
            .collect_vec();

        write_records(&self.output, &header, records)
    }
}
