// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Decoding and encoding of the bracket notation of breakend ALT alleles.
//!
//! The four forms are `t[p[`, `t]p]`, `[p[t` and `]p]t` where `t` is the local
//! sequence and `p` the `chrom:pos` of the mate.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use bio_types::genome::{self, AbstractLocus};
use regex::Regex;

use crate::errors::Error;

/// Whether the retained local sequence precedes (`Downstream`) or follows (`Upstream`)
/// the breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    Upstream,
    Downstream,
}

/// Bracket used around the mate locus. `[` means the joined mate sequence extends to the
/// right of the mate position, `]` to the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bracket {
    Open,
    Close,
}

impl Bracket {
    fn from_char(c: &str) -> Self {
        if c == "[" {
            Bracket::Open
        } else {
            Bracket::Close
        }
    }

    fn as_char(self) -> char {
        match self {
            Bracket::Open => '[',
            Bracket::Close => ']',
        }
    }
}

/// Decoded breakend ALT allele.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct BreakendNotation {
    #[getset(get = "pub")]
    local_sequence: String,
    #[getset(get = "pub")]
    mate: genome::Locus,
    #[getset(get_copy = "pub")]
    bracket: Bracket,
    #[getset(get_copy = "pub")]
    orientation: Orientation,
}

impl BreakendNotation {
    pub fn new(
        local_sequence: &str,
        mate: genome::Locus,
        bracket: Bracket,
        orientation: Orientation,
    ) -> Self {
        BreakendNotation {
            local_sequence: local_sequence.to_owned(),
            mate,
            bracket,
            orientation,
        }
    }

    /// Decode a breakend ALT allele. Anything but the four canonical forms is rejected.
    pub fn decode(spec: &str) -> Result<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(
                r"^(?P<prefix>[A-Za-z]*)(?P<bracket1>[\]\[])(?P<mate>[^\]\[]+)(?P<bracket2>[\]\[])(?P<suffix>[A-Za-z]*)$"
            )
            .unwrap();
        }

        let invalid = |msg: &str| Error::InvalidBNDRecordAlt {
            spec: spec.to_owned(),
            msg: msg.to_owned(),
        };

        let caps = RE
            .captures(spec)
            .ok_or_else(|| invalid("expected t[p[, t]p], [p[t or ]p]t"))?;

        let bracket = &caps["bracket1"];
        if bracket != &caps["bracket2"] {
            return Err(invalid("brackets do not match").into());
        }

        let (local_sequence, orientation) = match (&caps["prefix"], &caps["suffix"]) {
            (prefix, "") if !prefix.is_empty() => (prefix, Orientation::Downstream),
            ("", suffix) if !suffix.is_empty() => (suffix, Orientation::Upstream),
            _ => {
                return Err(
                    invalid("local sequence must be given on exactly one side of the mate").into(),
                )
            }
        };

        // contig names may contain ':', the position follows the last one
        let (contig, pos) = caps["mate"]
            .rsplit_once(':')
            .ok_or_else(|| invalid("mate locus must be given as chrom:pos"))?;
        if contig.is_empty() {
            return Err(invalid("empty mate chromosome").into());
        }
        let pos: u64 = pos
            .parse()
            .map_err(|_| invalid("mate position is not a number"))?;
        if pos == 0 {
            return Err(invalid("mate position must be 1-based").into());
        }

        Ok(BreakendNotation::new(
            local_sequence,
            genome::Locus::new(contig.to_owned(), pos),
            Bracket::from_char(bracket),
            orientation,
        ))
    }

    /// Chromosome of the mate.
    pub fn mate_contig(&self) -> &str {
        self.mate.contig()
    }

    /// 1-based position of the mate.
    pub fn mate_pos(&self) -> u64 {
        self.mate.pos()
    }
}

impl FromStr for BreakendNotation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        BreakendNotation::decode(s)
    }
}

impl fmt::Display for BreakendNotation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.bracket.as_char();
        match self.orientation {
            Orientation::Downstream => write!(
                f,
                "{t}{b}{contig}:{pos}{b}",
                t = self.local_sequence,
                b = b,
                contig = self.mate.contig(),
                pos = self.mate.pos()
            ),
            Orientation::Upstream => write!(
                f,
                "{b}{contig}:{pos}{b}{t}",
                t = self.local_sequence,
                b = b,
                contig = self.mate.contig(),
                pos = self.mate.pos()
            ),
        }
    }
}
