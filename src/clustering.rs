// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Clustering of breakends of all calling sources into fusion events.
//!
//! Breakends are first paired with their mates inside each source. The resulting
//! local events of different sources are merged whenever their breakends are
//! positionally equivalent on both sides. Merging is transitive and tracked with a
//! union-find structure over the breakend arena, where each class holds at most one
//! breakend per source.
//!
//! All processing happens in the canonical breakend order, hence the partition does
//! not depend on the order of the input records.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use petgraph::unionfind::UnionFind;

use crate::breakend::Breakend;

/// Breakends of one source, paired by their mate relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalEvent {
    Pair(usize, usize),
    Single(usize),
}

/// A junction reported by one or more sources.
///
/// Each side holds the arena indices of the breakends at one breakpoint, ordered by
/// source priority. Dangling breakends yield events with a single side.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct FusionEvent {
    sides: Vec<Vec<usize>>,
}

/// Breakends in canonical order, addressed by their rank in that order.
struct Arena<'a> {
    breakends: Vec<&'a Breakend>,
    /// Arena index of each rank.
    index: Vec<usize>,
}

impl<'a> Arena<'a> {
    fn new(breakends: &'a [Breakend]) -> Self {
        let index: Vec<usize> = (0..breakends.len())
            .sorted_by(|i, j| breakends[*i].canonical_cmp(&breakends[*j]))
            .collect();
        Arena {
            breakends: index.iter().map(|i| &breakends[*i]).collect(),
            index,
        }
    }

    fn len(&self) -> usize {
        self.breakends.len()
    }

    /// Pair breakends with their mates inside each source.
    fn mates(&self) -> Vec<Option<usize>> {
        let mut by_id = HashMap::new();
        for (k, breakend) in self.breakends.iter().enumerate() {
            if let Some(id) = breakend.id() {
                by_id.entry((breakend.source(), id.as_str())).or_insert(k);
            }
        }

        let mut mates = vec![None; self.len()];
        for (k, breakend) in self.breakends.iter().enumerate() {
            if mates[k].is_some() {
                continue;
            }
            let mate_id = match breakend.mate_id() {
                Some(mate_id) => mate_id,
                None => continue,
            };
            let partner = match by_id.get(&(breakend.source(), mate_id.as_str())) {
                Some(partner) if *partner != k => *partner,
                _ => {
                    warn!(
                        "Mate {} of breakend {}:{} not found in its calling source, it is treated as dangling.",
                        mate_id,
                        breakend.chrom(),
                        breakend.pos()
                    );
                    continue;
                }
            };
            let mate = self.breakends[partner];
            let points_back = match mate.mate_id() {
                Some(back) => breakend.id().as_ref() == Some(back),
                None => true,
            };
            if mates[partner].is_some() || !points_back {
                warn!(
                    "Mate {} of breakend {}:{} is already paired with another breakend, it is treated as dangling.",
                    mate_id,
                    breakend.chrom(),
                    breakend.pos()
                );
                continue;
            }
            if mate.chrom() != breakend.notation().mate_contig()
                || mate.pos() != breakend.notation().mate_pos()
            {
                warn!(
                    "Breakend {}:{} points to {}:{} but its mate {} is located at {}:{}.",
                    breakend.chrom(),
                    breakend.pos(),
                    breakend.notation().mate_contig(),
                    breakend.notation().mate_pos(),
                    mate_id,
                    mate.chrom(),
                    mate.pos()
                );
            }
            mates[k] = Some(partner);
            mates[partner] = Some(k);
        }
        mates
    }

    /// Pairs of breakends of different sources with overlapping positions, found by a
    /// sweep over each chromosome.
    fn overlapping(&self) -> Vec<(usize, usize)> {
        let mut by_chrom: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (k, breakend) in self.breakends.iter().enumerate() {
            by_chrom.entry(breakend.chrom()).or_default().push(k);
        }

        let mut overlapping = Vec::new();
        for (_, mut ranks) in by_chrom {
            let range = |k: usize| self.breakends[k].cipos().range(self.breakends[k].pos());
            ranks.sort_by_key(|k| (*range(*k).start(), *k));

            let mut active: Vec<usize> = Vec::new();
            for k in ranks {
                let start = *range(k).start();
                active.retain(|a| *range(*a).end() >= start);
                for a in &active {
                    if self.breakends[*a].source() != self.breakends[k].source() {
                        overlapping.push((*a, k));
                    }
                }
                active.push(k);
            }
        }
        overlapping
    }
}

/// Union-find over arena ranks where each class holds at most one breakend per source
/// and the mates of all its paired breakends lie in one partner class.
struct Classes {
    unionfind: UnionFind<usize>,
    sources: Vec<BTreeSet<usize>>,
    /// Rank of the mate of some paired member, stored at the root.
    mate: Vec<Option<usize>>,
}

impl Classes {
    fn new(arena: &Arena, mates: &[Option<usize>]) -> Self {
        Classes {
            unionfind: UnionFind::new(arena.len()),
            sources: arena
                .breakends
                .iter()
                .map(|breakend| [breakend.source()].iter().cloned().collect())
                .collect(),
            mate: mates.to_vec(),
        }
    }

    fn find(&self, k: usize) -> usize {
        self.unionfind.find(k)
    }

    /// Whether joining the given pairs keeps classes free of two breakends of one source.
    fn admissible(&self, unions: &[(usize, usize)]) -> bool {
        let roots: Vec<(usize, usize)> = unions
            .iter()
            .map(|(x, y)| (self.find(*x), self.find(*y)))
            .collect();
        let disjoint = roots.iter().all(|(rx, ry)| {
            rx == ry || self.sources[*rx].is_disjoint(&self.sources[*ry])
        });
        // both sides of a junction must not end up in the same class
        let separated = match roots.as_slice() {
            [(rx1, ry1), (rx2, ry2)] => {
                rx1 != rx2 && rx1 != ry2 && ry1 != rx2 && ry1 != ry2
            }
            _ => true,
        };
        // joined classes must agree on their partner class, which must differ from
        // the joined class itself
        let joined = |r: usize| {
            roots
                .iter()
                .find(|(rx, ry)| r == *rx || r == *ry)
                .map_or(r, |(rx, _)| *rx)
        };
        let mate_consistent = roots.iter().all(|(rx, ry)| {
            let partners: BTreeSet<usize> = [*rx, *ry]
                .iter()
                .filter_map(|r| self.mate[*r])
                .map(|mate| joined(self.find(mate)))
                .collect();
            partners.len() <= 1 && !partners.contains(&joined(*rx))
        });
        disjoint && separated && mate_consistent
    }

    fn union(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx == ry {
            return;
        }
        let mut sources = std::mem::take(&mut self.sources[rx]);
        sources.extend(std::mem::take(&mut self.sources[ry]));
        let mate = self.mate[rx].take().or_else(|| self.mate[ry].take());
        self.unionfind.union(rx, ry);
        let root = self.find(rx);
        self.sources[root] = sources;
        self.mate[root] = mate;
    }
}

/// Assignments of breakends between two local events to try, in order of preference.
fn assignments(a: LocalEvent, b: LocalEvent) -> Vec<Vec<(usize, usize)>> {
    match (a, b) {
        (LocalEvent::Pair(a1, a2), LocalEvent::Pair(b1, b2)) => {
            vec![vec![(a1, b1), (a2, b2)], vec![(a1, b2), (a2, b1)]]
        }
        (LocalEvent::Pair(a1, a2), LocalEvent::Single(b))
        | (LocalEvent::Single(b), LocalEvent::Pair(a1, a2)) => vec![vec![(a1, b)], vec![(a2, b)]],
        (LocalEvent::Single(a), LocalEvent::Single(b)) => vec![vec![(a, b)]],
    }
}

/// Partition the given breakends into fusion events.
///
/// Events are returned in canonical order of their first breakend, sides are ordered
/// by their first breakend as well.
pub fn cluster(breakends: &[Breakend]) -> Vec<FusionEvent> {
    let arena = Arena::new(breakends);
    let mates = arena.mates();

    let mut events = Vec::new();
    let mut event_of = vec![0; arena.len()];
    for k in 0..arena.len() {
        match mates[k] {
            Some(mate) if mate < k => event_of[k] = event_of[mate],
            Some(mate) => {
                event_of[k] = events.len();
                events.push(LocalEvent::Pair(k, mate));
            }
            None => {
                event_of[k] = events.len();
                events.push(LocalEvent::Single(k));
            }
        }
    }

    let candidates: BTreeSet<(usize, usize)> = arena
        .overlapping()
        .into_iter()
        .map(|(a, b)| {
            let (ea, eb) = (event_of[a], event_of[b]);
            (ea.min(eb), ea.max(eb))
        })
        .collect();

    let mut classes = Classes::new(&arena, &mates);
    let mut merged = 0;
    for (ea, eb) in candidates {
        let assignment = assignments(events[ea], events[eb]).into_iter().find(|unions| {
            unions.iter().all(|(x, y)| {
                arena.breakends[*x].is_positionally_equivalent(arena.breakends[*y])
            }) && classes.admissible(unions)
        });
        if let Some(unions) = assignment {
            for (x, y) in unions {
                classes.union(x, y);
            }
            merged += 1;
        }
    }
    debug!(
        "Merged {} of {} local events across calling sources.",
        merged,
        events.len()
    );

    // members are ranks, hence sorted canonically
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for k in 0..arena.len() {
        members.entry(classes.find(k)).or_default().push(k);
    }
    let partner = |root: usize| {
        members[&root]
            .iter()
            .find_map(|k| mates[*k])
            .map(|mate| classes.find(mate))
    };

    let mut visited = BTreeSet::new();
    let mut fusion_events = Vec::new();
    for root in members
        .keys()
        .cloned()
        .sorted_by_key(|root| members[root][0])
    {
        if !visited.insert(root) {
            continue;
        }
        let mut sides = vec![root];
        if let Some(other) = partner(root) {
            if visited.insert(other) {
                sides.push(other);
            }
        }
        let sides = sides
            .into_iter()
            .map(|root| {
                members[&root]
                    .iter()
                    .map(|k| arena.index[*k])
                    .sorted_by_key(|i| breakends[*i].source())
                    .collect()
            })
            .collect();
        fusion_events.push(FusionEvent { sides });
    }
    fusion_events
}
