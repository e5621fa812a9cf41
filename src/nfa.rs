use log::trace;

use crate::pattern::CharRange;
use crate::sparse_set::SparseSet;

/// The identifier of an NFA or DFA state.
///
/// States live in a contiguous arena and reference each other by index,
/// which makes cyclic automata trivial to build and serialization a matter
/// of dumping the arena.
pub type StateId = usize;

/// A nondeterministic finite automaton over 16-bit code units.
///
/// An NFA only exists while a DFA is being constructed: patterns append
/// their sub-automata to it, then subset construction consumes it. Each
/// state carries an optional accept label, a list of character range
/// transitions and a list of epsilon transitions. Ranges may overlap; no
/// attempt is made to keep them disjoint at this level.
#[derive(Clone, Debug)]
pub struct Nfa<L> {
    states: Vec<NfaState<L>>,
}

#[derive(Clone, Debug)]
struct NfaState<L> {
    accept: Option<L>,
    transitions: Vec<(CharRange, StateId)>,
    epsilons: Vec<StateId>,
}

impl<L> Nfa<L> {
    /// Create a new NFA with no states.
    pub fn new() -> Nfa<L> {
        Nfa { states: vec![] }
    }

    /// Add a state with the given accept label and return its identifier.
    pub fn add_state(&mut self, accept: Option<L>) -> StateId {
        let id = self.states.len();
        self.states.push(NfaState {
            accept,
            transitions: vec![],
            epsilons: vec![],
        });
        id
    }

    /// Add a transition on every code unit in `range` from `from` to `to`.
    pub fn add_transition(
        &mut self,
        from: StateId,
        range: CharRange,
        to: StateId,
    ) {
        self.states[from].transitions.push((range, to));
    }

    /// Add an epsilon transition from `from` to `to`.
    pub fn add_epsilon(&mut self, from: StateId, to: StateId) {
        self.states[from].epsilons.push(to);
    }

    /// The number of states in this NFA.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if this NFA has no states.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The accept label of the given state, if any.
    pub fn accept(&self, id: StateId) -> Option<&L> {
        self.states[id].accept.as_ref()
    }

    pub(crate) fn transitions(&self, id: StateId) -> &[(CharRange, StateId)] {
        &self.states[id].transitions
    }

    pub(crate) fn epsilons(&self, id: StateId) -> &[StateId] {
        &self.states[id].epsilons
    }

    /// Insert into `set` every state reachable from the members of `set`
    /// using only epsilon transitions. `stack` is caller-provided scratch
    /// so repeated closures don't reallocate.
    pub(crate) fn epsilon_close(
        &self,
        set: &mut SparseSet,
        stack: &mut Vec<StateId>,
    ) {
        stack.clear();
        stack.extend(set.iter());
        while let Some(id) = stack.pop() {
            for &next in self.epsilons(id) {
                if !set.contains(next) {
                    set.insert(next);
                    stack.push(next);
                }
            }
        }
    }

    /// Return a state equivalent to `start`, except that it does not accept
    /// the empty string.
    ///
    /// Every path of length one or more from `start` is preserved: the new
    /// state receives a copy of the character transitions of every state in
    /// `start`'s epsilon closure. It has no epsilon transitions and no
    /// accept label, so zero-length acceptance is gone.
    pub fn disemptify(&mut self, start: StateId) -> StateId {
        let mut closure = SparseSet::new(self.len());
        let mut stack = vec![];
        closure.insert(start);
        self.epsilon_close(&mut closure, &mut stack);

        let mut transitions = vec![];
        for id in closure.iter() {
            transitions.extend_from_slice(self.transitions(id));
        }
        trace!(
            "disemptify: state {} closure of {} states, {} transitions kept",
            start,
            closure.len(),
            transitions.len(),
        );

        let new_start = self.add_state(None);
        self.states[new_start].transitions = transitions;
        new_start
    }
}

impl<L> Default for Nfa<L> {
    fn default() -> Nfa<L> {
        Nfa::new()
    }
}
