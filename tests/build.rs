use std::collections::HashSet;

use lex_automata::{
    build_from_nfa, AmbiguityResolver, CharRange, DfaBuilder, DfaState,
    ErrorKind, Nfa, Pattern, Result,
};

fn lang(labels: &[char]) -> HashSet<char> {
    labels.iter().copied().collect()
}

/// Walk `input` from `start` and return the label accepted after the last
/// code unit, if the walk survives and ends in an accepting state.
fn run<L: Clone>(start: &DfaState<L>, input: &str) -> Option<L> {
    let mut state = start.clone();
    for unit in input.encode_utf16() {
        state = state.next_state(unit)?;
    }
    state.matched().cloned()
}

/// The 1-based input positions after which an accepting state is reached.
fn accept_positions<L: Clone>(
    start: &DfaState<L>,
    input: &str,
) -> Vec<(usize, L)> {
    let mut positions = vec![];
    let mut state = start.clone();
    for (i, unit) in input.encode_utf16().enumerate() {
        state = match state.next_state(unit) {
            None => break,
            Some(state) => state,
        };
        if let Some(label) = state.matched() {
            positions.push((i + 1, label.clone()));
        }
    }
    positions
}

/// A resolver that picks the greatest conflicting label.
struct MaxResolver;

impl AmbiguityResolver<char> for MaxResolver {
    fn resolve(&self, conflicts: &[char]) -> Result<char> {
        Ok(*conflicts.iter().max().unwrap())
    }

    fn cache_tag(&self) -> &[u8] {
        b"max"
    }
}

#[test]
fn matches_one_of_two_literals() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("cat"), 'A');
    builder.add_pattern(Pattern::literal("car"), 'B');

    let start = builder.build(None).unwrap();
    assert_eq!(Some('A'), run(&start, "cat"));
    assert_eq!(Some('B'), run(&start, "car"));
    assert_eq!(None, run(&start, "cab"));
    assert_eq!(None, run(&start, "ca"));
    assert_eq!(None, run(&start, "cats"));
}

#[test]
fn one_or_more_accepts_after_every_repetition() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::one_or_more(Pattern::literal("a")), 'A');

    let start = builder.build(None).unwrap();
    assert_eq!(
        vec![(1, 'A'), (2, 'A'), (3, 'A'), (4, 'A')],
        accept_positions(&start, "aaaa"),
    );
    assert_eq!(None, start.matched());
}

#[test]
fn shorter_match_visible_on_the_way_to_a_longer_one() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("for"), 'F');
    builder.add_pattern(Pattern::literal("foreach"), 'E');

    let start = builder.build(Some(&MaxResolver)).unwrap();
    assert_eq!(
        vec![(3, 'F'), (7, 'E')],
        accept_positions(&start, "foreach"),
    );
}

#[test]
fn languages_get_start_states_in_request_order() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("hi"), 'A');
    builder.add_pattern(Pattern::literal("bye"), 'B');

    let starts = builder
        .build_languages(&[lang(&['A']), lang(&['B'])], None)
        .unwrap();
    assert_eq!(2, starts.len());
    assert_eq!(Some('A'), run(&starts[0], "hi"));
    assert_eq!(Some('B'), run(&starts[1], "bye"));
    assert_eq!(None, run(&starts[1], "hi"));
    assert_eq!(None, run(&starts[0], "bye"));
}

#[test]
fn equivalent_languages_share_their_start_state() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("tok"), 'A');
    builder.add_pattern(Pattern::literal("other"), 'B');

    let starts = builder
        .build_languages(&[lang(&['A']), lang(&['A'])], None)
        .unwrap();
    assert_eq!(starts[0], starts[1]);

    let starts = builder
        .build_languages(&[lang(&['A']), lang(&['B'])], None)
        .unwrap();
    assert_ne!(starts[0], starts[1]);
}

#[test]
fn one_accept_state_per_label_minimizes_unions() {
    // Two patterns under one label share an accept, so "cat" and "car"
    // collapse to the four-state trie: start, c, ca, accept.
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("cat"), 'A');
    builder.add_pattern(Pattern::literal("car"), 'A');

    let start = builder.build(None).unwrap();
    assert_eq!(4, start.dfa().state_count());
    assert_eq!(Some('A'), run(&start, "cat"));
    assert_eq!(Some('A'), run(&start, "car"));

    // With distinct labels the accepts cannot merge.
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("cat"), 'A');
    builder.add_pattern(Pattern::literal("car"), 'B');
    let start = builder.build(None).unwrap();
    assert_eq!(5, start.dfa().state_count());
}

#[test]
fn ambiguity_fails_without_a_resolver() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("dup"), 'A');
    builder.add_pattern(Pattern::literal("dup"), 'B');

    let err = builder.build(None).unwrap_err();
    match err.kind() {
        ErrorKind::Ambiguity(labels) => assert_eq!(2, labels.len()),
        kind => panic!("unexpected error kind: {:?}", kind),
    }

    // The builder itself stays usable after a failed build.
    let start = builder.build(Some(&MaxResolver)).unwrap();
    assert_eq!(Some('B'), run(&start, "dup"));
}

#[test]
fn empty_language_list_builds_nothing() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("x"), 'A');
    assert!(builder.build_languages(&[], None).unwrap().is_empty());
}

#[test]
fn empty_builder_yields_a_single_dead_start() {
    let builder: DfaBuilder<char> = DfaBuilder::new();
    let start = builder.build(None).unwrap();
    assert_eq!(1, start.dfa().state_count());
    assert_eq!(None, start.matched());
    assert!(start.next_state(b'a' as u16).is_none());
}

#[test]
fn empty_membership_yields_a_dead_language() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("x"), 'A');
    let start = builder.build_language(&lang(&[]), None).unwrap();
    assert_eq!(None, run(&start, "x"));
    assert!(start.next_state(b'x' as u16).is_none());
}

#[test]
fn labels_with_no_patterns_are_skipped() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("x"), 'A');
    // 'Z' is in the language but has no patterns.
    let start = builder.build_language(&lang(&['A', 'Z']), None).unwrap();
    assert_eq!(Some('A'), run(&start, "x"));
}

#[test]
fn empty_string_pattern_makes_the_start_accepting() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::optional(Pattern::literal("x")), 'A');
    let start = builder.build(None).unwrap();
    assert_eq!(Some(&'A'), start.matched());
    assert_eq!(Some('A'), run(&start, "x"));
}

#[test]
fn alphabet_boundaries_are_reachable() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::range(CharRange::ALL), 'A');
    let start = builder.build(None).unwrap();
    assert_eq!(Some(&'A'), start.next_state(0x0000).unwrap().matched());
    assert_eq!(Some(&'A'), start.next_state(0xFFFF).unwrap().matched());
}

#[test]
fn construction_is_deterministic() {
    let build = || {
        let mut builder = DfaBuilder::new();
        builder.add_pattern(Pattern::literal("for"), 'F');
        builder.add_pattern(Pattern::literal("foreach"), 'E');
        builder.add_pattern(
            Pattern::one_or_more(Pattern::range(CharRange::new(
                'a' as u16,
                'z' as u16,
            ))),
            'W',
        );
        builder
            .build_languages(&[lang(&['F', 'E', 'W']), lang(&['W'])], Some(&MaxResolver))
            .unwrap()
            .remove(0)
            .dfa()
            .to_bytes()
            .unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn build_from_a_caller_supplied_nfa() {
    // start --[0-9]+--> accept, assembled by hand.
    let mut nfa: Nfa<char> = Nfa::new();
    let start = nfa.add_state(None);
    let accept = nfa.add_state(Some('N'));
    let digits = CharRange::new('0' as u16, '9' as u16);
    nfa.add_transition(start, digits, accept);
    nfa.add_transition(accept, digits, accept);

    let starts = build_from_nfa(&nfa, &[start], None, None).unwrap();
    assert_eq!(1, starts.len());
    assert_eq!(Some('N'), run(&starts[0], "2024"));
    assert_eq!(None, run(&starts[0], "20x4"));
}

#[test]
fn serialization_round_trips() {
    let mut builder = DfaBuilder::new();
    builder.add_pattern(Pattern::literal("cat"), 'A');
    builder.add_pattern(Pattern::literal("car"), 'B');
    let dfa = builder.build(None).unwrap().dfa();

    let bytes = dfa.to_bytes().unwrap();
    let back = lex_automata::Dfa::<char>::from_bytes(&bytes).unwrap();
    assert_eq!(bytes, back.to_bytes().unwrap());
    let start = back.start_states().remove(0);
    assert_eq!(Some('A'), run(&start, "cat"));
    assert_eq!(Some('B'), run(&start, "car"));
    assert_eq!(None, run(&start, "cab"));
}
