use std::fmt;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::label::Label;
use crate::nfa::StateId;

const LABEL: &[u8] = b"lex-automata\x00";
const VERSION: u16 = 1;

/// The internal representation of a DFA.
///
/// States are values in a contiguous arena referenced by index. Each state
/// holds an optional accept label and a transition table of sorted,
/// disjoint code unit ranges. Code units not covered by any range have no
/// transition; the dead sink is implicit.
#[derive(Clone, Debug)]
pub(crate) struct Repr<L> {
    pub(crate) states: Vec<State<L>>,
    /// One start state per requested language, in request order. Entries
    /// may repeat when languages are equivalent.
    pub(crate) starts: Vec<StateId>,
}

#[derive(Clone, Debug)]
pub(crate) struct State<L> {
    pub(crate) accept: Option<L>,
    pub(crate) transitions: Vec<Transition>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Transition {
    pub(crate) start: u16,
    pub(crate) end: u16,
    pub(crate) target: StateId,
}

impl<L> Repr<L> {
    pub(crate) fn new() -> Repr<L> {
        Repr { states: vec![], starts: vec![] }
    }

    pub(crate) fn add_state(&mut self, accept: Option<L>) -> StateId {
        let id = self.states.len();
        self.states.push(State { accept, transitions: vec![] });
        id
    }
}

/// A minimized deterministic finite automaton.
///
/// A `Dfa` is immutable, cheap to clone (the state arena is shared) and
/// safe to read from many threads at once. It is produced by a
/// [`DfaBuilder`](crate::DfaBuilder) and consumed one state at a time
/// through [`DfaState`] handles.
#[derive(Clone)]
pub struct Dfa<L> {
    repr: Arc<Repr<L>>,
}

impl<L> Dfa<L> {
    pub(crate) fn from_repr(repr: Repr<L>) -> Dfa<L> {
        Dfa { repr: Arc::new(repr) }
    }

    /// The start states of this DFA, one per language requested at build
    /// time, in request order.
    pub fn start_states(&self) -> Vec<DfaState<L>> {
        self.repr
            .starts
            .iter()
            .map(|&id| DfaState { repr: Arc::clone(&self.repr), id })
            .collect()
    }

    /// The total number of states in this DFA.
    pub fn state_count(&self) -> usize {
        self.repr.states.len()
    }

    /// The memory usage of the transition tables, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.repr
            .states
            .iter()
            .map(|s| s.transitions.len() * std::mem::size_of::<Transition>())
            .sum()
    }
}

impl<L: Label> Dfa<L> {
    /// Serialize this DFA to bytes.
    ///
    /// Construction is deterministic, so for a given pattern set and
    /// language list the serialization is stable across runs. The encoding
    /// is little endian regardless of the host.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.repr.states.len() > u32::MAX as usize {
            return Err(Error::serialize(&format!(
                "cannot serialize DFA with {} states using u32 state ids",
                self.repr.states.len(),
            )));
        }
        let mut buf = vec![];
        buf.extend_from_slice(LABEL);
        buf.write_u16::<LittleEndian>(0xFEFF).unwrap();
        buf.write_u16::<LittleEndian>(VERSION).unwrap();
        buf.write_u32::<LittleEndian>(self.repr.states.len() as u32).unwrap();
        buf.write_u32::<LittleEndian>(self.repr.starts.len() as u32).unwrap();
        for &start in &self.repr.starts {
            buf.write_u32::<LittleEndian>(start as u32).unwrap();
        }
        for state in &self.repr.states {
            match state.accept {
                None => buf.push(0),
                Some(ref label) => {
                    buf.push(1);
                    label.encode(&mut buf);
                }
            }
            buf.write_u32::<LittleEndian>(state.transitions.len() as u32)
                .unwrap();
            for t in &state.transitions {
                buf.write_u16::<LittleEndian>(t.start).unwrap();
                buf.write_u16::<LittleEndian>(t.end).unwrap();
                buf.write_u32::<LittleEndian>(t.target as u32).unwrap();
            }
        }
        Ok(buf)
    }

    /// Deserialize a DFA previously produced by [`Dfa::to_bytes`].
    ///
    /// The input is fully validated: a malformed buffer yields an error,
    /// never a panic or an automaton that indexes out of bounds.
    pub fn from_bytes(mut buf: &[u8]) -> Result<Dfa<L>> {
        if buf.len() < LABEL.len() || &buf[..LABEL.len()] != LABEL {
            return Err(Error::deserialize("unrecognized DFA label"));
        }
        buf = &buf[LABEL.len()..];

        let marker = read_u16(&mut buf)?;
        if marker != 0xFEFF {
            return Err(Error::deserialize(&format!(
                "invalid endianness marker: 0x{:04X}",
                marker
            )));
        }
        let version = read_u16(&mut buf)?;
        if version != VERSION {
            return Err(Error::deserialize(&format!(
                "unsupported DFA format version: {}",
                version
            )));
        }

        let state_count = read_u32(&mut buf)? as usize;
        let start_count = read_u32(&mut buf)? as usize;
        // Each start takes 4 bytes and each state at least 5, so counts
        // larger than the remaining input cannot be honest. This bounds
        // allocation before trusting them.
        if start_count as u64 * 4 > buf.len() as u64
            || state_count > buf.len()
        {
            return Err(Error::deserialize("state counts exceed input size"));
        }
        let mut starts = Vec::with_capacity(start_count);
        for _ in 0..start_count {
            let start = read_u32(&mut buf)? as usize;
            if start >= state_count {
                return Err(Error::deserialize("start state out of bounds"));
            }
            starts.push(start);
        }

        let mut states = Vec::with_capacity(state_count);
        for _ in 0..state_count {
            let accept = match read_u8(&mut buf)? {
                0 => None,
                1 => Some(L::decode(&mut buf)?),
                b => {
                    return Err(Error::deserialize(&format!(
                        "invalid accept flag: 0x{:02X}",
                        b
                    )))
                }
            };
            let ntrans = read_u32(&mut buf)? as usize;
            if ntrans as u64 * 8 > buf.len() as u64 {
                return Err(Error::deserialize(
                    "transition count exceeds input size",
                ));
            }
            let mut transitions = Vec::with_capacity(ntrans);
            let mut prev_end: Option<u16> = None;
            for _ in 0..ntrans {
                let start = read_u16(&mut buf)?;
                let end = read_u16(&mut buf)?;
                let target = read_u32(&mut buf)? as usize;
                if start > end {
                    return Err(Error::deserialize("inverted range"));
                }
                if let Some(prev) = prev_end {
                    if start <= prev {
                        return Err(Error::deserialize(
                            "transition ranges overlap or are unsorted",
                        ));
                    }
                }
                if target >= state_count {
                    return Err(Error::deserialize(
                        "transition target out of bounds",
                    ));
                }
                prev_end = Some(end);
                transitions.push(Transition { start, end, target });
            }
            states.push(State { accept, transitions });
        }
        if !buf.is_empty() {
            return Err(Error::deserialize("trailing bytes after DFA"));
        }
        Ok(Dfa::from_repr(Repr { states, starts }))
    }
}

impl<L: fmt::Debug> fmt::Debug for Dfa<L> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Dfa(starts: {:?})", self.repr.starts)?;
        for (id, state) in self.repr.states.iter().enumerate() {
            write!(f, "{:06}", id)?;
            if let Some(ref label) = state.accept {
                write!(f, " ({:?})", label)?;
            }
            write!(f, ":")?;
            for t in &state.transitions {
                if t.start == t.end {
                    write!(f, " {:04X} => {}", t.start, t.target)?;
                } else {
                    write!(
                        f,
                        " {:04X}-{:04X} => {}",
                        t.start, t.end, t.target
                    )?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// A handle to one state of a [`Dfa`].
///
/// This is the entire runtime interface of a built automaton: feed a code
/// unit to [`next_state`](DfaState::next_state), inspect
/// [`matched`](DfaState::matched) at any point. Handles share the
/// underlying automaton and are freely clonable across threads.
#[derive(Clone)]
pub struct DfaState<L> {
    repr: Arc<Repr<L>>,
    id: StateId,
}

impl<L> DfaState<L> {
    /// The state reached from this one on `unit`, or `None` if there is no
    /// transition (the implicit dead sink, from which nothing ever
    /// matches).
    pub fn next_state(&self, unit: u16) -> Option<DfaState<L>> {
        let transitions = &self.repr.states[self.id].transitions;
        // Last range whose start is <= unit, if any.
        let i = transitions.partition_point(|t| t.start <= unit);
        if i == 0 || transitions[i - 1].end < unit {
            return None;
        }
        Some(DfaState {
            repr: Arc::clone(&self.repr),
            id: transitions[i - 1].target,
        })
    }

    /// The label accepted at this state, if any.
    pub fn matched(&self) -> Option<&L> {
        self.repr.states[self.id].accept.as_ref()
    }

    /// The index of this state within its automaton.
    pub fn state_number(&self) -> usize {
        self.id
    }

    /// The automaton this state belongs to.
    pub fn dfa(&self) -> Dfa<L> {
        Dfa { repr: Arc::clone(&self.repr) }
    }
}

impl<L> PartialEq for DfaState<L> {
    /// Two handles are equal when they name the same state of the same
    /// automaton.
    fn eq(&self, other: &DfaState<L>) -> bool {
        Arc::ptr_eq(&self.repr, &other.repr) && self.id == other.id
    }
}

impl<L> Eq for DfaState<L> {}

impl<L: fmt::Debug> fmt::Debug for DfaState<L> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DfaState")
            .field("id", &self.id)
            .field("accept", &self.repr.states[self.id].accept)
            .finish()
    }
}

fn read_u8(buf: &mut &[u8]) -> Result<u8> {
    buf.read_u8().map_err(|_| truncated())
}

fn read_u16(buf: &mut &[u8]) -> Result<u16> {
    buf.read_u16::<LittleEndian>().map_err(|_| truncated())
}

fn read_u32(buf: &mut &[u8]) -> Result<u32> {
    buf.read_u32::<LittleEndian>().map_err(|_| truncated())
}

fn truncated() -> Error {
    Error::deserialize("unexpected end of input")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dfa<u32> {
        // start --a--> accept(7), with a self loop on the accept state.
        let mut repr = Repr::new();
        let start = repr.add_state(None);
        let accept = repr.add_state(Some(7));
        repr.states[start].transitions.push(Transition {
            start: b'a' as u16,
            end: b'a' as u16,
            target: accept,
        });
        repr.states[accept].transitions.push(Transition {
            start: b'a' as u16,
            end: b'a' as u16,
            target: accept,
        });
        repr.starts.push(start);
        Dfa::from_repr(repr)
    }

    #[test]
    fn walk() {
        let dfa = sample();
        let start = dfa.start_states().remove(0);
        assert_eq!(None, start.matched());
        let next = start.next_state(b'a' as u16).unwrap();
        assert_eq!(Some(&7), next.matched());
        assert!(start.next_state(b'b' as u16).is_none());
    }

    #[test]
    fn roundtrip() {
        let dfa = sample();
        let bytes = dfa.to_bytes().unwrap();
        let back: Dfa<u32> = Dfa::from_bytes(&bytes).unwrap();
        assert_eq!(bytes, back.to_bytes().unwrap());
        let start = back.start_states().remove(0);
        assert_eq!(
            Some(&7),
            start.next_state(b'a' as u16).unwrap().matched()
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(Dfa::<u32>::from_bytes(b"not a dfa").is_err());
        let dfa = sample();
        let mut bytes = dfa.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(Dfa::<u32>::from_bytes(&bytes).is_err());
    }
}
