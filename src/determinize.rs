use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, trace};

use crate::builder::AmbiguityResolver;
use crate::dfa::{Repr, Transition};
use crate::error::Result;
use crate::fnv;
use crate::label::Label;
use crate::nfa::{Nfa, StateId};
use crate::sparse_set::SparseSet;

/// Converts an NFA into a raw (not yet minimized) DFA by the classic
/// powerset construction.
///
/// Every DFA state is the epsilon closure of a set of NFA states,
/// represented canonically (sorted, deduplicated) so that set equality
/// drives interning. Accept labels are derived from the accepting members
/// of each set, collapsed through the ambiguity resolver when more than
/// one label is present.
pub(crate) struct Determinizer<'a, L> {
    /// The NFA we're converting into a DFA.
    nfa: &'a Nfa<L>,
    /// Collapses conflicting accept labels. Called at most once per raw
    /// DFA state.
    resolver: &'a dyn AmbiguityResolver<L>,
    /// The DFA we're building.
    repr: Repr<L>,
    /// The canonical NFA state set of each DFA state built so far, aligned
    /// with `repr.states`.
    builder_states: Vec<Rc<Vec<StateId>>>,
    /// Interns canonical NFA state sets to existing DFA states.
    cache: fnv::HashMap<Rc<Vec<StateId>>, StateId>,
}

impl<'a, L: Label> Determinizer<'a, L> {
    pub(crate) fn new(
        nfa: &'a Nfa<L>,
        resolver: &'a dyn AmbiguityResolver<L>,
    ) -> Determinizer<'a, L> {
        Determinizer {
            nfa,
            resolver,
            repr: Repr::new(),
            builder_states: vec![],
            cache: fnv::HashMap::default(),
        }
    }

    /// Run subset construction from the given NFA start states. The
    /// resulting DFA has one start state per entry of `starts`, in order;
    /// entries with equal closures share a DFA state.
    pub(crate) fn build(mut self, starts: &[StateId]) -> Result<Repr<L>> {
        let mut set = SparseSet::new(self.nfa.len().max(1));
        let mut stack = vec![];
        let mut worklist = VecDeque::new();

        for &nfa_start in starts {
            set.clear();
            set.insert(nfa_start);
            self.nfa.epsilon_close(&mut set, &mut stack);
            let (dfa_id, is_new) = self.cached_state(&set)?;
            self.repr.starts.push(dfa_id);
            if is_new {
                worklist.push_back(dfa_id);
            }
        }

        while let Some(dfa_id) = worklist.pop_front() {
            let members = Rc::clone(&self.builder_states[dfa_id]);

            // All outgoing NFA edges of this set, in canonical member
            // order. Ranges may overlap arbitrarily.
            let mut edges: Vec<(u16, u16, StateId)> = vec![];
            for &nfa_id in members.iter() {
                for &(range, target) in self.nfa.transitions(nfa_id) {
                    edges.push((range.start, range.end, target));
                }
            }
            if edges.is_empty() {
                continue;
            }

            // Split the edges into a disjoint covering: between two
            // consecutive boundary points the set of reachable NFA states
            // is constant. Points are widened to u32 so that 0xFFFF + 1
            // cannot wrap.
            let mut points: Vec<u32> = Vec::with_capacity(2 * edges.len());
            for &(start, end, _) in &edges {
                points.push(start as u32);
                points.push(end as u32 + 1);
            }
            points.sort_unstable();
            points.dedup();

            let mut transitions: Vec<Transition> = vec![];
            for window in points.windows(2) {
                let (lo, hi) = (window[0], window[1] - 1);
                set.clear();
                for &(start, end, target) in &edges {
                    if start as u32 <= lo && lo <= end as u32 {
                        if !set.contains(target) {
                            set.insert(target);
                        }
                    }
                }
                if set.is_empty() {
                    continue;
                }
                self.nfa.epsilon_close(&mut set, &mut stack);
                let (target, is_new) = self.cached_state(&set)?;
                if is_new {
                    worklist.push_back(target);
                }
                match transitions.last_mut() {
                    // Adjacent subranges reaching the same DFA state
                    // coalesce into one transition.
                    Some(last)
                        if last.target == target
                            && last.end as u32 + 1 == lo =>
                    {
                        last.end = hi as u16;
                    }
                    _ => transitions.push(Transition {
                        start: lo as u16,
                        end: hi as u16,
                        target,
                    }),
                }
            }
            self.repr.states[dfa_id].transitions = transitions;
        }

        debug!(
            "determinized {} NFA states into {} raw DFA states",
            self.nfa.len(),
            self.repr.states.len(),
        );
        Ok(self.repr)
    }

    /// Intern the epsilon-closed set in `set`, creating a new DFA state
    /// (with its accept label resolved) if the set has not been seen.
    fn cached_state(&mut self, set: &SparseSet) -> Result<(StateId, bool)> {
        let mut ids: Vec<StateId> = set.iter().collect();
        ids.sort_unstable();
        let key = Rc::new(ids);
        if let Some(&dfa_id) = self.cache.get(&key) {
            return Ok((dfa_id, false));
        }

        let mut conflicts: Vec<L> = vec![];
        for &nfa_id in key.iter() {
            if let Some(label) = self.nfa.accept(nfa_id) {
                if !conflicts.contains(label) {
                    conflicts.push(label.clone());
                }
            }
        }
        let accept = match conflicts.len() {
            0 => None,
            1 => conflicts.pop(),
            _ => Some(self.resolver.resolve(&conflicts)?),
        };

        let dfa_id = self.repr.add_state(accept);
        trace!("raw DFA state {} <- NFA set {:?}", dfa_id, key);
        self.builder_states.push(Rc::clone(&key));
        self.cache.insert(key, dfa_id);
        Ok((dfa_id, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DefaultResolver;
    use crate::error::ErrorKind;
    use crate::pattern::CharRange;

    fn unit(c: u8) -> u16 {
        c as u16
    }

    #[test]
    fn overlapping_ranges_split_into_disjoint_covering() {
        // start --[a-z]--> s1, start --[m-p]--> s2(accepts). On [m-p] both
        // targets are reachable, so the covering must split [a-z] in three.
        let mut nfa: Nfa<u32> = Nfa::new();
        let start = nfa.add_state(None);
        let s1 = nfa.add_state(None);
        let s2 = nfa.add_state(Some(1));
        nfa.add_transition(start, CharRange::new(unit(b'a'), unit(b'z')), s1);
        nfa.add_transition(start, CharRange::new(unit(b'm'), unit(b'p')), s2);

        let repr = Determinizer::new(&nfa, &DefaultResolver)
            .build(&[start])
            .unwrap();
        let dfa_start = repr.starts[0];
        let transitions = &repr.states[dfa_start].transitions;
        assert_eq!(3, transitions.len());
        assert_eq!(
            (unit(b'a'), unit(b'l')),
            (transitions[0].start, transitions[0].end)
        );
        assert_eq!(
            (unit(b'm'), unit(b'p')),
            (transitions[1].start, transitions[1].end)
        );
        assert_eq!(
            (unit(b'q'), unit(b'z')),
            (transitions[2].start, transitions[2].end)
        );
        // The middle subrange reaches {s1, s2} and accepts.
        let mid = transitions[1].target;
        assert_eq!(Some(&1), repr.states[mid].accept.as_ref());
        assert_ne!(transitions[0].target, mid);
        // [a-l] and [q-z] reach the same set and were interned once.
        assert_eq!(transitions[0].target, transitions[2].target);
    }

    #[test]
    fn conflicting_labels_fail_without_resolver() {
        let mut nfa: Nfa<u32> = Nfa::new();
        let start = nfa.add_state(None);
        let a = nfa.add_state(Some(1));
        let b = nfa.add_state(Some(2));
        nfa.add_transition(start, CharRange::single(unit(b'x')), a);
        nfa.add_transition(start, CharRange::single(unit(b'x')), b);

        let err = Determinizer::new(&nfa, &DefaultResolver)
            .build(&[start])
            .unwrap_err();
        match err.kind() {
            ErrorKind::Ambiguity(labels) => assert_eq!(2, labels.len()),
            kind => panic!("unexpected error kind: {:?}", kind),
        }
    }

    #[test]
    fn equal_start_closures_share_a_state() {
        let mut nfa: Nfa<u32> = Nfa::new();
        let s0 = nfa.add_state(None);
        let s1 = nfa.add_state(None);
        let acc = nfa.add_state(Some(9));
        nfa.add_epsilon(s0, s1);
        nfa.add_transition(s1, CharRange::single(unit(b'k')), acc);

        // s0's closure is {s0, s1}; s1's closure is {s1}. Distinct sets,
        // distinct DFA states, but requesting s0 twice dedupes.
        let repr = Determinizer::new(&nfa, &DefaultResolver)
            .build(&[s0, s0, s1])
            .unwrap();
        assert_eq!(repr.starts[0], repr.starts[1]);
        assert_ne!(repr.starts[0], repr.starts[2]);
    }
}
