// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use structopt::StructOpt;

use fusion_merge::cli::{run, FusionMerge};

pub fn main() -> Result<()> {
    let opt = FusionMerge::from_args();

    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(opt.logging_level)
        .chain(std::io::stderr())
        .apply()?;

    run(opt)
}
