//! Per-procedure interprocedural summaries.
//!
//! Each callable accumulates, per call site, the nilness vector of the
//! values it was invoked with, and per return site the nilness vector of
//! the values it returns. Method values additionally record the bound
//! receiver's nilness per call site. Observations are combined with the
//! lattice meet, so entries only ever weaken toward Unknown; the merged
//! vectors the walker seeds entry blocks from are derived on demand.
//!
//! Site keys are the bridge's program-unique instruction ids; `BTreeMap`
//! keeps meet order and any summary output deterministic.

use std::collections::BTreeMap;

use crate::lattice::{meet_vec, Nilness};

/// Stable identifier of a call or return site: the instruction's id.
pub type SiteKey = u32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcedureSummary {
    args_by_site: BTreeMap<SiteKey, Vec<Nilness>>,
    returns_by_site: BTreeMap<SiteKey, Vec<Nilness>>,
    receiver_by_site: BTreeMap<SiteKey, Nilness>,
}

impl ProcedureSummary {
    pub fn is_empty(&self) -> bool {
        self.args_by_site.is_empty()
            && self.returns_by_site.is_empty()
            && self.receiver_by_site.is_empty()
    }

    /// Length of the recorded argument vectors, if any have been observed.
    pub fn args_len(&self) -> Option<usize> {
        self.args_by_site.values().next().map(|v| v.len())
    }

    /// At least one call site has been observed (even a zero-argument
    /// one).
    pub fn has_call_sites(&self) -> bool {
        !self.args_by_site.is_empty()
    }

    /// Length of the recorded return vectors, if any have been observed.
    pub fn returns_len(&self) -> Option<usize> {
        self.returns_by_site.values().next().map(|v| v.len())
    }

    /// Record or meet an argument observation. Returns `true` iff the
    /// summary changed. The caller reconciles arity beforehand.
    pub fn observe_args(&mut self, site: SiteKey, vec: Vec<Nilness>) -> bool {
        observe(&mut self.args_by_site, site, vec)
    }

    /// Record or meet a return observation. Returns `true` iff the
    /// summary changed.
    pub fn observe_returns(&mut self, site: SiteKey, vec: Vec<Nilness>) -> bool {
        observe(&mut self.returns_by_site, site, vec)
    }

    /// Record or meet the bound receiver's nilness at a call site.
    pub fn observe_receiver(&mut self, site: SiteKey, nilness: Nilness) -> bool {
        match self.receiver_by_site.get_mut(&site) {
            None => {
                self.receiver_by_site.insert(site, nilness);
                true
            }
            Some(cur) => {
                let met = cur.meet(nilness);
                if *cur == met {
                    false
                } else {
                    *cur = met;
                    true
                }
            }
        }
    }

    /// Positional meet of all argument observations; empty when nothing
    /// has been observed.
    pub fn merged_args(&self) -> Vec<Nilness> {
        merge_sites(&self.args_by_site)
    }

    /// Positional meet of all return observations.
    pub fn merged_returns(&self) -> Vec<Nilness> {
        merge_sites(&self.returns_by_site)
    }

    /// All receiver observations compressed to a single nilness.
    pub fn merged_receiver(&self) -> Option<Nilness> {
        self.receiver_by_site
            .values()
            .copied()
            .reduce(Nilness::meet)
    }

    /// Arity reconciliation: the callable turned out to be a method
    /// value, so every recorded argument vector gains the site's
    /// receiver (Unknown where none was seen) as a new leading position.
    pub fn prepend_receivers(&mut self) -> bool {
        if self.args_by_site.is_empty() {
            return false;
        }
        for (site, vec) in self.args_by_site.iter_mut() {
            let recv = self
                .receiver_by_site
                .get(site)
                .copied()
                .unwrap_or(Nilness::Unknown);
            vec.insert(0, recv);
        }
        true
    }

    pub fn args_at(&self, site: SiteKey) -> Option<&[Nilness]> {
        self.args_by_site.get(&site).map(|v| v.as_slice())
    }

    pub fn returns_at(&self, site: SiteKey) -> Option<&[Nilness]> {
        self.returns_by_site.get(&site).map(|v| v.as_slice())
    }

    pub fn receiver_at(&self, site: SiteKey) -> Option<Nilness> {
        self.receiver_by_site.get(&site).copied()
    }
}

fn observe(map: &mut BTreeMap<SiteKey, Vec<Nilness>>, site: SiteKey, vec: Vec<Nilness>) -> bool {
    match map.get_mut(&site) {
        None => {
            map.insert(site, vec);
            true
        }
        Some(cur) => {
            assert_eq!(
                cur.len(),
                vec.len(),
                "inconsistent nilness vector length at site {site}"
            );
            let met = meet_vec(cur, &vec);
            if *cur == met {
                false
            } else {
                *cur = met;
                true
            }
        }
    }
}

fn merge_sites(map: &BTreeMap<SiteKey, Vec<Nilness>>) -> Vec<Nilness> {
    let mut merged: Option<Vec<Nilness>> = None;
    for vec in map.values() {
        merged = Some(match merged {
            None => vec.clone(),
            Some(m) => meet_vec(&m, vec),
        });
    }
    merged.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_changes() {
        let mut s = ProcedureSummary::default();
        assert!(s.observe_args(10, vec![Nilness::NonNil]));
        assert!(!s.observe_args(10, vec![Nilness::NonNil]));
        assert_eq!(s.args_at(10), Some(&[Nilness::NonNil][..]));
    }

    #[test]
    fn test_observation_weakens_to_unknown() {
        let mut s = ProcedureSummary::default();
        s.observe_args(10, vec![Nilness::NonNil]);
        assert!(s.observe_args(10, vec![Nilness::Nil]));
        assert_eq!(s.args_at(10), Some(&[Nilness::Unknown][..]));
        // Unknown never strengthens back.
        assert!(!s.observe_args(10, vec![Nilness::Nil]));
        assert_eq!(s.args_at(10), Some(&[Nilness::Unknown][..]));
    }

    #[test]
    fn test_merged_args_meets_across_sites() {
        let mut s = ProcedureSummary::default();
        s.observe_args(10, vec![Nilness::NonNil, Nilness::Nil]);
        s.observe_args(20, vec![Nilness::NonNil, Nilness::NonNil]);
        assert_eq!(s.merged_args(), vec![Nilness::NonNil, Nilness::Unknown]);
    }

    #[test]
    fn test_merged_empty() {
        let s = ProcedureSummary::default();
        assert!(s.merged_args().is_empty());
        assert!(s.merged_returns().is_empty());
        assert_eq!(s.merged_receiver(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn test_has_call_sites() {
        let mut s = ProcedureSummary::default();
        assert!(!s.has_call_sites());
        s.observe_returns(5, vec![Nilness::Nil]);
        assert!(!s.has_call_sites());
        s.observe_args(10, vec![]);
        assert!(s.has_call_sites());
    }

    #[test]
    fn test_returns_tracked_separately() {
        let mut s = ProcedureSummary::default();
        s.observe_returns(30, vec![Nilness::Nil]);
        s.observe_returns(31, vec![Nilness::NonNil]);
        assert_eq!(s.merged_returns(), vec![Nilness::Unknown]);
        assert_eq!(s.returns_at(30), Some(&[Nilness::Nil][..]));
        assert!(s.merged_args().is_empty());
    }

    #[test]
    fn test_receiver_meet() {
        let mut s = ProcedureSummary::default();
        assert!(s.observe_receiver(10, Nilness::Nil));
        assert!(!s.observe_receiver(10, Nilness::Nil));
        assert!(s.observe_receiver(10, Nilness::NonNil));
        assert_eq!(s.receiver_at(10), Some(Nilness::Unknown));

        s.observe_receiver(20, Nilness::NonNil);
        assert_eq!(s.merged_receiver(), Some(Nilness::Unknown));
    }

    #[test]
    fn test_prepend_receivers() {
        let mut s = ProcedureSummary::default();
        s.observe_args(10, vec![Nilness::NonNil]);
        s.observe_args(20, vec![Nilness::NonNil]);
        s.observe_receiver(10, Nilness::Nil);

        assert!(s.prepend_receivers());
        assert_eq!(s.args_at(10), Some(&[Nilness::Nil, Nilness::NonNil][..]));
        // No receiver was seen at site 20, so its new position is Unknown.
        assert_eq!(
            s.args_at(20),
            Some(&[Nilness::Unknown, Nilness::NonNil][..])
        );
        assert_eq!(s.args_len(), Some(2));
    }

    #[test]
    #[should_panic(expected = "inconsistent nilness vector length")]
    fn test_arity_mismatch_panics() {
        let mut s = ProcedureSummary::default();
        s.observe_args(10, vec![Nilness::NonNil]);
        s.observe_args(10, vec![Nilness::NonNil, Nilness::Nil]);
    }
}
