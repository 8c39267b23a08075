// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use crate::merge::MergerBuilder;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "fusion-merge",
    about = "Merge breakend (BND) calls of several fusion callers into one VCF/BCF with per-caller provenance.",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub struct FusionMerge {
    #[structopt(
        long = "calling-sources",
        required = true,
        help = "Names of the fusion callers, ordered by priority. The first caller provides the canonical values of merged records."
    )]
    pub calling_sources: Vec<String>,
    #[structopt(
        long = "inputs-variants",
        parse(from_os_str),
        required = true,
        help = "VCF/BCF files with the calls of each caller, in the order of --calling-sources."
    )]
    pub inputs_variants: Vec<PathBuf>,
    #[structopt(
        long = "output-variants",
        parse(from_os_str),
        help = "VCF/BCF file that shall contain the merged calls (BCF if ending with .bcf, compressed VCF if ending with .gz)."
    )]
    pub output_variants: PathBuf,
    #[structopt(
        long = "annotation-field",
        help = "INFO field with free text annotations (e.g. gene and consequence). Its values are kept when duplicated calls of a caller are collapsed."
    )]
    pub annotation_field: Option<String>,
    #[structopt(
        long = "logging-level",
        default_value = "info",
        possible_values = &["off", "error", "warn", "info", "debug", "trace"],
        case_insensitive = true,
        help = "Verbosity of the log written to STDERR."
    )]
    pub logging_level: log::LevelFilter,
}

pub fn run(opt: FusionMerge) -> Result<()> {
    let merger = MergerBuilder::default()
        .calling_sources(&opt.calling_sources, &opt.inputs_variants)?
        .annotation_field(opt.annotation_field)
        .output(opt.output_variants)
        .build()?;
    merger.merge()
}
