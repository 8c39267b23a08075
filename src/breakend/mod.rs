// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub mod notation;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use derive_builder::Builder;

use crate::fields::FieldValue;
pub use crate::breakend::notation::{Bracket, BreakendNotation, Orientation};

/// Confidence interval around a breakend position, given as the signed
/// offsets of the `CIPOS` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, new)]
pub struct ConfidenceInterval {
    pub lo: i64,
    pub hi: i64,
}

impl ConfidenceInterval {
    /// Positions covered around `pos`. Inverted offsets are normalized.
    pub fn range(&self, pos: u64) -> RangeInclusive<i64> {
        let pos = pos as i64;
        let (lo, hi) = if self.lo <= self.hi {
            (self.lo, self.hi)
        } else {
            (self.hi, self.lo)
        };
        pos + lo..=pos + hi
    }
}

/// One end of a structural rearrangement as reported by a single calling source.
#[derive(Debug, Clone, PartialEq, Builder, Getters, CopyGetters)]
#[builder(pattern = "owned")]
pub struct Breakend {
    /// Priority index of the calling source.
    #[getset(get_copy = "pub")]
    source: usize,
    #[builder(setter(into))]
    #[getset(get = "pub")]
    id: Option<String>,
    #[builder(setter(into))]
    #[getset(get = "pub")]
    chrom: String,
    /// 1-based position.
    #[getset(get_copy = "pub")]
    pos: u64,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    cipos: ConfidenceInterval,
    #[builder(default, setter(into, strip_option))]
    #[getset(get = "pub")]
    mate_id: Option<String>,
    #[getset(get = "pub")]
    notation: BreakendNotation,
    #[builder(setter(into))]
    #[getset(get = "pub")]
    ref_allele: String,
    #[builder(setter(into))]
    #[getset(get = "pub")]
    alt_allele: String,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    qual: Option<f32>,
    #[builder(default)]
    #[getset(get = "pub")]
    info: BTreeMap<String, FieldValue>,
    /// FORMAT values, indexed by sample.
    #[builder(default)]
    #[getset(get = "pub")]
    format: Vec<BTreeMap<String, FieldValue>>,
    #[builder(default)]
    #[getset(get = "pub")]
    filters: Vec<String>,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    rna_first: bool,
}

impl Breakend {
    pub fn orientation(&self) -> Orientation {
        self.notation.orientation()
    }

    /// Whether both breakends lie on the same chromosome with overlapping
    /// confidence ranges.
    pub fn is_positionally_equivalent(&self, other: &Breakend) -> bool {
        if self.chrom != other.chrom {
            return false;
        }
        let a = self.cipos.range(self.pos);
        let b = other.cipos.range(other.pos);
        a.start() <= b.end() && b.start() <= a.end()
    }

    /// Order used to process breakends independently of their input order.
    pub fn canonical_cmp(&self, other: &Breakend) -> Ordering {
        self.source
            .cmp(&other.source)
            .then_with(|| self.chrom.cmp(&other.chrom))
            .then_with(|| self.pos.cmp(&other.pos))
            .then_with(|| self.notation.mate_contig().cmp(other.notation.mate_contig()))
            .then_with(|| self.notation.mate_pos().cmp(&other.notation.mate_pos()))
            .then_with(|| self.alt_allele.cmp(&other.alt_allele))
            .then_with(|| self.ref_allele.cmp(&other.ref_allele))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Locus and alleles, identifying a call independently of its ID.
    pub(crate) fn site(&self) -> (&str, u64, &str, &str) {
        (&self.chrom, self.pos, &self.ref_allele, &self.alt_allele)
    }

    pub(crate) fn info_mut(&mut self) -> &mut BTreeMap<String, FieldValue> {
        &mut self.info
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Breakend with mate, as used in tests across the crate.
    pub(crate) fn bnd(
        source: usize,
        id: &str,
        chrom: &str,
        pos: u64,
        alt: &str,
        mate_id: Option<&str>,
    ) -> BreakendBuilder {
        let notation = BreakendNotation::decode(alt).unwrap();
        let builder = BreakendBuilder::default()
            .source(source)
            .id(Some(id.to_owned()))
            .chrom(chrom)
            .pos(pos)
            .ref_allele(notation.local_sequence().clone())
            .alt_allele(alt)
            .notation(notation);
        match mate_id {
            Some(mate_id) => builder.mate_id(mate_id),
            None => builder,
        }
    }

    #[test]
    fn test_confidence_interval_range() {
        assert_eq!(ConfidenceInterval::new(0, 3).range(100), 100..=103);
        assert_eq!(ConfidenceInterval::new(-81, 82).range(1000), 919..=1082);
        assert_eq!(ConfidenceInterval::default().range(5), 5..=5);
        assert_eq!(ConfidenceInterval::new(3, -3).range(5), 2..=8);
    }

    #[test]
    fn test_positional_equivalence() {
        let manta = bnd(0, "m", "22", 24334571, "A[9:84867241[", None)
            .cipos(ConfidenceInterval::new(0, 3))
            .build()
            .unwrap();
        let arriba = bnd(2, "a", "22", 24334573, "N[9:84867243[", None)
            .build()
            .unwrap();
        assert!(manta.is_positionally_equivalent(&arriba));
        assert!(arriba.is_positionally_equivalent(&manta));

        let far = bnd(2, "f", "22", 24334575, "N[9:84867243[", None)
            .build()
            .unwrap();
        assert!(!manta.is_positionally_equivalent(&far));

        let other_chrom = bnd(2, "o", "21", 24334571, "N[9:84867243[", None)
            .build()
            .unwrap();
        assert!(!manta.is_positionally_equivalent(&other_chrom));
    }

    #[test]
    fn test_exact_position_without_interval() {
        let a = bnd(0, "a", "1", 100, "N[2:5[", None).build().unwrap();
        let b = bnd(1, "b", "1", 100, "N[2:5[", None).build().unwrap();
        let c = bnd(1, "c", "1", 101, "N[2:5[", None).build().unwrap();
        assert!(a.is_positionally_equivalent(&b));
        assert!(!a.is_positionally_equivalent(&c));
    }

    #[test]
    fn test_canonical_cmp() {
        let a = bnd(0, "b", "22", 10, "N[9:5[", None).build().unwrap();
        let b = bnd(0, "a", "22", 10, "N[9:6[", None).build().unwrap();
        let c = bnd(1, "a", "1", 1, "N[9:6[", None).build().unwrap();
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);
        assert_eq!(b.canonical_cmp(&c), Ordering::Less);
    }
}
