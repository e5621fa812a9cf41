use std::collections::HashSet;
use std::sync::Arc;

use byteorder::{BigEndian, WriteBytesExt};
use indexmap::IndexMap;
use log::debug;
use sha1::{Digest, Sha1};

use crate::cache::{encode_base32, BuilderCache};
use crate::determinize::Determinizer;
use crate::dfa::{Dfa, DfaState};
use crate::error::{Error, Result};
use crate::label::Label;
use crate::minimize::Minimizer;
use crate::nfa::{Nfa, StateId};
use crate::pattern::{CharRange, Pattern};

// DFA types for cache keys.
const DFA_TYPE_MATCHER: u32 = 0;
const DFA_TYPE_REVERSE_FINDER: u32 = 1;

/// Collapses a set of conflicting accept labels into one.
///
/// When patterns for multiple labels match the same string, subset
/// construction calls the resolver with the conflicting labels (at most
/// once per raw DFA state). The resolver either chooses a single label or
/// fails the build.
pub trait AmbiguityResolver<L> {
    /// Choose one label from `conflicts`, which always has at least two
    /// elements, or fail.
    fn resolve(&self, conflicts: &[L]) -> Result<L>;

    /// Stable identity bytes mixed into builder cache keys.
    ///
    /// Two resolvers that can choose differently must return different
    /// tags, otherwise the cache could hand back a DFA built with the
    /// other resolver.
    fn cache_tag(&self) -> &[u8];
}

/// The default ambiguity resolver. It resolves nothing: every conflict
/// fails the build with [`ErrorKind::Ambiguity`](crate::ErrorKind).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultResolver;

impl<L: Label> AmbiguityResolver<L> for DefaultResolver {
    fn resolve(&self, conflicts: &[L]) -> Result<L> {
        Err(Error::ambiguity(conflicts))
    }

    fn cache_tag(&self) -> &[u8] {
        b"default"
    }
}

/// Builds minimized DFAs that match sets of labeled patterns.
///
/// Patterns are accumulated against *labels*; a build request names one or
/// more *languages*, each a subset of the accumulated labels, and yields
/// one start state per language. All languages requested in a batch are
/// determinized and minimized together, so equivalent states are shared
/// between them. Feeding a string to a start state code unit by code unit
/// via [`DfaState::next_state`] and inspecting [`DfaState::matched`]
/// reports which label (if any) matches each prefix.
///
/// Building a DFA is not cheap. It is typically done once per pattern set;
/// a [`BuilderCache`] can memoize built automata by content fingerprint so
/// repeated runs skip construction entirely.
///
/// # Example
///
/// ```
/// use lex_automata::{DfaBuilder, Pattern};
///
/// let mut builder = DfaBuilder::new();
/// builder.add_pattern(Pattern::literal("cat"), "animal".to_string());
/// builder.add_pattern(Pattern::literal("car"), "vehicle".to_string());
///
/// let start = builder.build(None).unwrap();
/// let mut state = start;
/// for unit in "cat".encode_utf16() {
///     state = state.next_state(unit).unwrap();
/// }
/// assert_eq!(Some(&"animal".to_string()), state.matched());
/// ```
pub struct DfaBuilder<L> {
    patterns: IndexMap<L, Vec<Pattern>>,
    cache: Option<Arc<dyn BuilderCache>>,
}

impl<L: Label> DfaBuilder<L> {
    /// Create a new builder with no cache.
    pub fn new() -> DfaBuilder<L> {
        DfaBuilder { patterns: IndexMap::new(), cache: None }
    }

    /// Create a new builder that consults `cache` before building and
    /// populates it afterward.
    pub fn with_cache(cache: Arc<dyn BuilderCache>) -> DfaBuilder<L> {
        DfaBuilder { patterns: IndexMap::new(), cache: Some(cache) }
    }

    /// Add a pattern for the given label. A label may have any number of
    /// patterns; matching any of them reports that label.
    pub fn add_pattern(&mut self, pattern: Pattern, label: L) {
        self.patterns.entry(label).or_default().push(pattern);
    }

    /// Forget every pattern added so far.
    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    /// Build a DFA matching all patterns added to this builder.
    ///
    /// Pass `None` as the resolver to fail on ambiguity.
    pub fn build(
        &self,
        resolver: Option<&dyn AmbiguityResolver<L>>,
    ) -> Result<DfaState<L>> {
        let all = self.all_labels();
        Ok(self.build_languages(&[all], resolver)?.remove(0))
    }

    /// Build a DFA for one language, given as a subset of the labels added
    /// to this builder.
    pub fn build_language(
        &self,
        language: &HashSet<L>,
        resolver: Option<&dyn AmbiguityResolver<L>>,
    ) -> Result<DfaState<L>> {
        let languages = std::slice::from_ref(language);
        Ok(self.build_languages(languages, resolver)?.remove(0))
    }

    /// Build DFAs for multiple languages simultaneously.
    ///
    /// The returned start states correspond to `languages` by position.
    /// Languages built together are globally minimized and share as many
    /// states as possible; two equivalent languages share their start
    /// state outright. An empty `languages` list is not an error and
    /// returns an empty list without building anything.
    pub fn build_languages(
        &self,
        languages: &[HashSet<L>],
        resolver: Option<&dyn AmbiguityResolver<L>>,
    ) -> Result<Vec<DfaState<L>>> {
        if languages.is_empty() {
            return Ok(vec![]);
        }
        let resolver = resolver.unwrap_or(&DefaultResolver);
        let dfa = match self.cache {
            None => self.build_forward(languages, resolver)?,
            Some(ref cache) => {
                let key = self.cache_key(
                    DFA_TYPE_MATCHER,
                    languages,
                    Some(resolver),
                );
                match cached(cache.as_ref(), &key) {
                    Some(dfa) => dfa,
                    None => {
                        let dfa = self.build_forward(languages, resolver)?;
                        cache.put(&key, &dfa.to_bytes()?);
                        dfa
                    }
                }
            }
        };
        Ok(dfa.start_states())
    }

    /// Build the reverse finder for all patterns added to this builder.
    ///
    /// A reverse finder is fed a string *backward* from the end and
    /// reports `true` at every position where a non-empty match of one of
    /// the patterns begins in the forward direction. Searching with a
    /// reverse finder is how match start positions are located without
    /// trying every position as a match start.
    pub fn build_reverse_finder(&self) -> Result<DfaState<bool>> {
        let all = self.all_labels();
        Ok(self.build_reverse_finders(&[all])?.remove(0))
    }

    /// Build the reverse finder for the union of the given languages.
    ///
    /// The patterns of every label that appears in at least one language
    /// are folded into a single backward automaton with one start state;
    /// the returned list is that automaton's start list. An empty
    /// `languages` list returns an empty list without building anything.
    pub fn build_reverse_finders(
        &self,
        languages: &[HashSet<L>],
    ) -> Result<Vec<DfaState<bool>>> {
        if languages.is_empty() {
            return Ok(vec![]);
        }
        let dfa = match self.cache {
            None => self.build_reverse(languages)?,
            Some(ref cache) => {
                let key = self.cache_key(
                    DFA_TYPE_REVERSE_FINDER,
                    languages,
                    None,
                );
                match cached(cache.as_ref(), &key) {
                    Some(dfa) => dfa,
                    None => {
                        let dfa = self.build_reverse(languages)?;
                        cache.put(&key, &dfa.to_bytes()?);
                        dfa
                    }
                }
            }
        };
        Ok(dfa.start_states())
    }

    fn all_labels(&self) -> HashSet<L> {
        self.patterns.keys().cloned().collect()
    }

    /// Assemble the forward NFA for `languages` and run the shared
    /// subset + minimize tail.
    fn build_forward(
        &self,
        languages: &[HashSet<L>],
        resolver: &dyn AmbiguityResolver<L>,
    ) -> Result<Dfa<L>> {
        let mut nfa: Nfa<L> = Nfa::new();
        let starts: Vec<StateId> =
            languages.iter().map(|_| nfa.add_state(None)).collect();

        for (label, patterns) in &self.patterns {
            if patterns.is_empty() {
                continue;
            }
            // Entry state for matching this label, created lazily so that
            // labels outside every requested language contribute nothing.
            let mut entry: Option<StateId> = None;
            for (i, language) in languages.iter().enumerate() {
                if !language.contains(label) {
                    continue;
                }
                let target = match entry {
                    Some(state) => state,
                    None => {
                        // One accept state per label, regardless of how
                        // many patterns it has: minimization folds the
                        // union into the minimal shape.
                        let accept = nfa.add_state(Some(label.clone()));
                        let state = if patterns.len() == 1 {
                            patterns[0].add_to_nfa(&mut nfa, accept)
                        } else {
                            let union = nfa.add_state(None);
                            for pattern in patterns {
                                let e = pattern.add_to_nfa(&mut nfa, accept);
                                nfa.add_epsilon(union, e);
                            }
                            union
                        };
                        entry = Some(state);
                        state
                    }
                };
                nfa.add_epsilon(starts[i], target);
            }
        }

        subset_and_minimize(&nfa, &starts, resolver)
    }

    /// Assemble the backward NFA for the union of `languages` and run the
    /// shared subset + minimize tail with the always-fail resolver; all
    /// accept labels are `true`, so conflicts cannot arise.
    fn build_reverse(&self, languages: &[HashSet<L>]) -> Result<Dfa<bool>> {
        let mut nfa: Nfa<bool> = Nfa::new();
        let mut start = nfa.add_state(None);
        let end = nfa.add_state(Some(true));

        for (label, patterns) in &self.patterns {
            if patterns.is_empty() {
                continue;
            }
            if !languages.iter().any(|lang| lang.contains(label)) {
                continue;
            }
            for pattern in patterns {
                let entry = pattern.reversed().add_to_nfa(&mut nfa, end);
                nfa.add_epsilon(start, entry);
            }
        }

        // Omit the empty string, then allow anything first.
        start = nfa.disemptify(start);
        start = Pattern::maybe_repeat(CharRange::ALL)
            .add_to_nfa(&mut nfa, start);

        subset_and_minimize(&nfa, &[start], &DefaultResolver)
    }

    /// The content fingerprint of a build request: a SHA-1 digest over a
    /// deterministic serialization of everything that semantically
    /// determines the DFA, rendered in base32.
    ///
    /// Iteration follows the accumulator's insertion order; labels with no
    /// patterns or no language membership are omitted, exactly as they are
    /// during assembly. Language membership is bit-packed 32 languages per
    /// word, low bits first within each word.
    fn cache_key(
        &self,
        dfa_type: u32,
        languages: &[HashSet<L>],
        resolver: Option<&dyn AmbiguityResolver<L>>,
    ) -> String {
        let mut buf: Vec<u8> = vec![];
        buf.write_u32::<BigEndian>(dfa_type).unwrap();
        buf.write_u32::<BigEndian>(languages.len() as u32).unwrap();
        for (label, patterns) in &self.patterns {
            if patterns.is_empty() {
                continue;
            }
            if !languages.iter().any(|lang| lang.contains(label)) {
                continue;
            }
            buf.write_u32::<BigEndian>(patterns.len() as u32).unwrap();
            if languages.len() > 1 {
                let mut bits: u32 =
                    if languages[0].contains(label) { 1 } else { 0 };
                for (i, language) in languages.iter().enumerate().skip(1) {
                    if i & 31 == 0 {
                        buf.write_u32::<BigEndian>(bits).unwrap();
                        bits = 0;
                    }
                    if language.contains(label) {
                        bits |= 1 << (i & 31);
                    }
                }
                buf.write_u32::<BigEndian>(bits).unwrap();
            }
            for pattern in patterns {
                pattern.encode(&mut buf);
            }
            label.encode(&mut buf);
        }
        // A zero pattern count terminates the label sequence.
        buf.write_u32::<BigEndian>(0).unwrap();
        if let Some(resolver) = resolver {
            buf.extend_from_slice(resolver.cache_tag());
        }
        encode_base32(Sha1::digest(&buf).as_slice())
    }
}

impl<L: Label> Default for DfaBuilder<L> {
    fn default() -> DfaBuilder<L> {
        DfaBuilder::new()
    }
}

/// Build DFAs from a caller-supplied NFA.
///
/// This is the shared tail of the forward and reverse pipelines, exposed
/// for callers that assemble their own NFAs. The returned start states
/// correspond to `starts` by position. When `cache` is given, the NFA's
/// shape is fingerprinted for memoization.
pub fn build_from_nfa<L: Label>(
    nfa: &Nfa<L>,
    starts: &[StateId],
    resolver: Option<&dyn AmbiguityResolver<L>>,
    cache: Option<&dyn BuilderCache>,
) -> Result<Vec<DfaState<L>>> {
    if starts.is_empty() {
        return Ok(vec![]);
    }
    let resolver = resolver.unwrap_or(&DefaultResolver);
    let dfa = match cache {
        None => subset_and_minimize(nfa, starts, resolver)?,
        Some(cache) => {
            let key = nfa_cache_key(nfa, starts, resolver);
            match cached(cache, &key) {
                Some(dfa) => dfa,
                None => {
                    let dfa = subset_and_minimize(nfa, starts, resolver)?;
                    cache.put(&key, &dfa.to_bytes()?);
                    dfa
                }
            }
        }
    };
    Ok(dfa.start_states())
}

fn subset_and_minimize<L: Label>(
    nfa: &Nfa<L>,
    starts: &[StateId],
    resolver: &dyn AmbiguityResolver<L>,
) -> Result<Dfa<L>> {
    let raw = Determinizer::new(nfa, resolver).build(starts)?;
    let minimal = Minimizer::new(&raw).run();
    Ok(Dfa::from_repr(minimal))
}

fn cached<L: Label>(cache: &dyn BuilderCache, key: &str) -> Option<Dfa<L>> {
    // A corrupt cache entry is indistinguishable from a miss; the cache is
    // advisory and absence never affects correctness.
    let dfa = cache.get(key).and_then(|bytes| Dfa::from_bytes(&bytes).ok());
    if dfa.is_some() {
        debug!("builder cache hit for {}", key);
    }
    dfa
}

/// Fingerprint a caller-supplied NFA: the start list, the full state,
/// transition and epsilon tables, and the resolver tag.
fn nfa_cache_key<L: Label>(
    nfa: &Nfa<L>,
    starts: &[StateId],
    resolver: &dyn AmbiguityResolver<L>,
) -> String {
    let mut buf: Vec<u8> = vec![];
    buf.write_u32::<BigEndian>(starts.len() as u32).unwrap();
    for &start in starts {
        buf.write_u32::<BigEndian>(start as u32).unwrap();
    }
    buf.write_u32::<BigEndian>(nfa.len() as u32).unwrap();
    for id in 0..nfa.len() {
        match nfa.accept(id) {
            None => buf.push(0),
            Some(label) => {
                buf.push(1);
                label.encode(&mut buf);
            }
        }
        let transitions = nfa.transitions(id);
        buf.write_u32::<BigEndian>(transitions.len() as u32).unwrap();
        for &(range, target) in transitions {
            buf.write_u16::<BigEndian>(range.start).unwrap();
            buf.write_u16::<BigEndian>(range.end).unwrap();
            buf.write_u32::<BigEndian>(target as u32).unwrap();
        }
        let epsilons = nfa.epsilons(id);
        buf.write_u32::<BigEndian>(epsilons.len() as u32).unwrap();
        for &target in epsilons {
            buf.write_u32::<BigEndian>(target as u32).unwrap();
        }
    }
    buf.extend_from_slice(resolver.cache_tag());
    encode_base32(Sha1::digest(&buf).as_slice())
}
