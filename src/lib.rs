/*!
A library for building minimized deterministic finite automata (DFAs) that
match sets of labeled patterns, for use in lexical analysis.

The entry point is the [`DfaBuilder`]: patterns are accumulated against
result labels, then compiled in one shot into an immutable, serializable
automaton. Matching a string against all patterns at once is then a walk of
[`DfaState`] handles, one [`DfaState::next_state`] call per code unit, with
[`DfaState::matched`] reporting the label (if any) accepted at each
position.

# Example

This builds a matcher for two token patterns and walks it:

```
use lex_automata::{CharRange, DfaBuilder, Pattern};

let mut builder = DfaBuilder::new();
builder.add_pattern(
    Pattern::one_or_more(Pattern::range(CharRange::new(
        '0' as u16,
        '9' as u16,
    ))),
    "number".to_string(),
);
builder.add_pattern(Pattern::literal("let"), "keyword".to_string());

let start = builder.build(None).unwrap();
let mut state = start;
for unit in "42".encode_utf16() {
    state = state.next_state(unit).unwrap();
}
assert_eq!(Some(&"number".to_string()), state.matched());
```

# Construction pipeline

A build is a linear pipeline: patterns append their sub-automata to an NFA
with labeled accepting states; subset construction turns the NFA into a
raw DFA, collapsing conflicting labels through an [`AmbiguityResolver`];
hash-partition refinement then minimizes the result. Multiple languages
(label subsets) requested in one batch run through the pipeline together
and share every equivalent state, including start states.

A second pipeline derives a *reverse finder*
([`DfaBuilder::build_reverse_finder`]): a DFA fed backward from the end of
input that accepts exactly at the positions where a forward match begins.

# Caching

Construction is deterministic, so built automata can be memoized. A
[`BuilderCache`] keys serialized DFAs by a content fingerprint of the
patterns, labels, language membership and resolver; the cache is advisory
and its absence never changes results.
*/

#![deny(missing_docs)]

pub use crate::builder::{
    build_from_nfa, AmbiguityResolver, DefaultResolver, DfaBuilder,
};
pub use crate::cache::{BuilderCache, MemoryCache};
pub use crate::dfa::{Dfa, DfaState};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::label::Label;
pub use crate::nfa::{Nfa, StateId};
pub use crate::pattern::{CharRange, Pattern};

mod builder;
mod cache;
mod determinize;
mod dfa;
mod error;
mod fnv;
mod label;
mod minimize;
mod nfa;
mod pattern;
mod sparse_set;
