use byteorder::{BigEndian, WriteBytesExt};

use crate::nfa::{Nfa, StateId};

/// An inclusive range of 16-bit code units.
///
/// Ranges are the transition alphabet of both NFAs and DFAs in this crate.
/// At the NFA level ranges may overlap freely; subset construction is what
/// splits them into a disjoint covering.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CharRange {
    /// The first code unit in the range.
    pub start: u16,
    /// The last code unit in the range, inclusive.
    pub end: u16,
}

impl CharRange {
    /// The range covering the entire code unit alphabet.
    pub const ALL: CharRange = CharRange { start: 0, end: 0xFFFF };

    /// Create a new inclusive range. `start` must be `<= end`.
    pub fn new(start: u16, end: u16) -> CharRange {
        assert!(start <= end, "invalid range: {} > {}", start, end);
        CharRange { start, end }
    }

    /// The range containing exactly one code unit.
    pub fn single(unit: u16) -> CharRange {
        CharRange { start: unit, end: unit }
    }

    /// Returns true if and only if this range contains `unit`.
    pub fn contains(&self, unit: u16) -> bool {
        self.start <= unit && unit <= self.end
    }
}

/// A pattern descriptor.
///
/// A pattern contributes a sub-automaton to an NFA under construction. The
/// core pipeline never inspects a pattern beyond its two capabilities:
/// appending itself to an NFA via [`Pattern::add_to_nfa`] and producing its
/// mirror image via [`Pattern::reversed`].
///
/// The variants cover the regular operations: the empty string, literal
/// sequences of code units, single-unit character classes, concatenation,
/// alternation and Kleene star. Bounded repetition, one-or-more and optional
/// patterns are provided as derived constructors that expand into these.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Pattern {
    /// Matches the empty string.
    Empty,
    /// Matches exactly the given sequence of code units.
    Literal(Vec<u16>),
    /// Matches any single code unit contained in one of the ranges.
    Class(Vec<CharRange>),
    /// Matches each sub-pattern in sequence.
    Concat(Vec<Pattern>),
    /// Matches any one of the sub-patterns.
    Alt(Vec<Pattern>),
    /// Matches zero or more repetitions of the sub-pattern.
    Repeat(Box<Pattern>),
}

impl Pattern {
    /// A pattern matching the literal string, as UTF-16 code units.
    pub fn literal(s: &str) -> Pattern {
        Pattern::Literal(s.encode_utf16().collect())
    }

    /// A pattern matching any single code unit in `range`.
    pub fn range(range: CharRange) -> Pattern {
        Pattern::Class(vec![range])
    }

    /// A pattern matching any single code unit in any of `ranges`.
    pub fn class(ranges: Vec<CharRange>) -> Pattern {
        Pattern::Class(ranges)
    }

    /// A pattern matching each of `parts` in sequence.
    pub fn concat(parts: Vec<Pattern>) -> Pattern {
        Pattern::Concat(parts)
    }

    /// A pattern matching any one of `parts`.
    pub fn alt(parts: Vec<Pattern>) -> Pattern {
        Pattern::Alt(parts)
    }

    /// A pattern matching zero or more repetitions of `pat`.
    pub fn zero_or_more(pat: Pattern) -> Pattern {
        Pattern::Repeat(Box::new(pat))
    }

    /// A pattern matching one or more repetitions of `pat`.
    pub fn one_or_more(pat: Pattern) -> Pattern {
        Pattern::Concat(vec![pat.clone(), Pattern::Repeat(Box::new(pat))])
    }

    /// A pattern matching zero or one occurrence of `pat`.
    pub fn optional(pat: Pattern) -> Pattern {
        Pattern::Alt(vec![pat, Pattern::Empty])
    }

    /// A pattern matching zero or more code units from `range`.
    ///
    /// `maybe_repeat(CharRange::ALL)` is the universal prefix used when
    /// assembling reverse finders.
    pub fn maybe_repeat(range: CharRange) -> Pattern {
        Pattern::Repeat(Box::new(Pattern::Class(vec![range])))
    }

    /// Append this pattern's sub-automaton to `nfa` and return its entry
    /// state.
    ///
    /// The sub-automaton is built backward from `accept`: starting at the
    /// returned entry state, the NFA reaches `accept` if and only if the
    /// input consumed matches this pattern. The pattern never adds outgoing
    /// transitions to `accept` itself, so one accept state can terminate
    /// many patterns.
    pub fn add_to_nfa<L>(&self, nfa: &mut Nfa<L>, accept: StateId) -> StateId {
        match *self {
            Pattern::Empty => accept,
            Pattern::Literal(ref units) => {
                let mut target = accept;
                for &unit in units.iter().rev() {
                    let state = nfa.add_state(None);
                    nfa.add_transition(state, CharRange::single(unit), target);
                    target = state;
                }
                target
            }
            Pattern::Class(ref ranges) => {
                let state = nfa.add_state(None);
                for &range in ranges {
                    nfa.add_transition(state, range, accept);
                }
                state
            }
            Pattern::Concat(ref parts) => {
                let mut target = accept;
                for part in parts.iter().rev() {
                    target = part.add_to_nfa(nfa, target);
                }
                target
            }
            Pattern::Alt(ref parts) => {
                let union = nfa.add_state(None);
                for part in parts {
                    let entry = part.add_to_nfa(nfa, accept);
                    nfa.add_epsilon(union, entry);
                }
                union
            }
            Pattern::Repeat(ref inner) => {
                let hub = nfa.add_state(None);
                nfa.add_epsilon(hub, accept);
                let entry = inner.add_to_nfa(nfa, hub);
                nfa.add_epsilon(hub, entry);
                hub
            }
        }
    }

    /// The mirror image of this pattern: it matches a string if and only if
    /// this pattern matches the string reversed.
    ///
    /// Reversal is an involution: `p.reversed().reversed()` matches exactly
    /// the strings `p` matches.
    pub fn reversed(&self) -> Pattern {
        match *self {
            Pattern::Empty => Pattern::Empty,
            Pattern::Literal(ref units) => {
                Pattern::Literal(units.iter().rev().cloned().collect())
            }
            Pattern::Class(ref ranges) => Pattern::Class(ranges.clone()),
            Pattern::Concat(ref parts) => Pattern::Concat(
                parts.iter().rev().map(Pattern::reversed).collect(),
            ),
            Pattern::Alt(ref parts) => {
                Pattern::Alt(parts.iter().map(Pattern::reversed).collect())
            }
            Pattern::Repeat(ref inner) => {
                Pattern::Repeat(Box::new(inner.reversed()))
            }
        }
    }

    /// Append a deterministic structural encoding of this pattern to `dst`.
    ///
    /// Two patterns have equal encodings if and only if they are
    /// structurally equal. This feeds the content fingerprint used for
    /// builder cache keys.
    pub(crate) fn encode(&self, dst: &mut Vec<u8>) {
        match *self {
            Pattern::Empty => dst.push(0),
            Pattern::Literal(ref units) => {
                dst.push(1);
                dst.write_u32::<BigEndian>(units.len() as u32).unwrap();
                for &unit in units {
                    dst.write_u16::<BigEndian>(unit).unwrap();
                }
            }
            Pattern::Class(ref ranges) => {
                dst.push(2);
                dst.write_u32::<BigEndian>(ranges.len() as u32).unwrap();
                for range in ranges {
                    dst.write_u16::<BigEndian>(range.start).unwrap();
                    dst.write_u16::<BigEndian>(range.end).unwrap();
                }
            }
            Pattern::Concat(ref parts) => {
                dst.push(3);
                dst.write_u32::<BigEndian>(parts.len() as u32).unwrap();
                for part in parts {
                    part.encode(dst);
                }
            }
            Pattern::Alt(ref parts) => {
                dst.push(4);
                dst.write_u32::<BigEndian>(parts.len() as u32).unwrap();
                for part in parts {
                    part.encode(dst);
                }
            }
            Pattern::Repeat(ref inner) => {
                dst.push(5);
                inner.encode(dst);
            }
        }
    }
}
