// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Merging of structural variant breakend (BND) calls reported by several fusion callers
//! into one call set with per-caller provenance.

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate strum_macros;

pub mod breakend;
pub mod cli;
pub mod clustering;
pub mod errors;
pub mod fields;
pub mod header;
pub mod merge;
pub mod source;
pub mod synthesis;
pub(crate) mod utils;
pub mod writer;

pub use crate::merge::{Merger, MergerBuilder};
