use std::collections::VecDeque;

use log::debug;

use crate::dfa::{Repr, Transition};
use crate::fnv;
use crate::label::Label;
use crate::nfa::StateId;

/// A state signature: the state's current block plus the full-alphabet
/// covering of (range, target block), with gaps mapped to the dead sink's
/// block and adjacent equal-block ranges merged. Two states with equal
/// signatures are indistinguishable by one more input step.
type Signature = (usize, Vec<(u16, u16, usize)>);

/// Minimizes a raw DFA by hash-partition refinement.
///
/// States are grouped into blocks, starting from their accept labels, and
/// blocks are split until every pair of states in a block transitions into
/// the same blocks on every code unit. The implicit dead sink participates
/// as a virtual extra state, which lets states that can never reach an
/// accept fall into its block and vanish from the output.
///
/// All start states are refined together, so equivalent states are shared
/// across every language requested in a batch.
pub(crate) struct Minimizer<'a, L> {
    repr: &'a Repr<L>,
}

impl<'a, L: Label> Minimizer<'a, L> {
    pub(crate) fn new(repr: &'a Repr<L>) -> Minimizer<'a, L> {
        Minimizer { repr }
    }

    pub(crate) fn run(self) -> Repr<L> {
        let n = self.repr.states.len();
        let sink = n;

        // Initial partition: the no-accept block (which also holds the
        // virtual sink) first, then one block per distinct label in first
        // occurrence order.
        let mut blocks: Vec<usize> = vec![0; n + 1];
        let mut block_count = {
            let mut by_label: fnv::IndexMap<Option<&L>, usize> =
                fnv::IndexMap::default();
            by_label.insert(None, 0);
            for (id, state) in self.repr.states.iter().enumerate() {
                let next = by_label.len();
                blocks[id] =
                    *by_label.entry(state.accept.as_ref()).or_insert(next);
            }
            by_label.len()
        };

        // Signature refinement until a pass fails to split anything. Block
        // ids are reassigned each pass in first occurrence order, which
        // keeps the outcome deterministic.
        let mut passes = 0;
        loop {
            passes += 1;
            let mut signatures: fnv::IndexMap<Signature, usize> =
                fnv::IndexMap::default();
            let mut next_blocks = vec![0; n + 1];
            for id in 0..=n {
                let sig = self.signature(id, sink, &blocks);
                let next = signatures.len();
                next_blocks[id] = *signatures.entry(sig).or_insert(next);
            }
            let new_count = signatures.len();
            blocks = next_blocks;
            if new_count == block_count {
                break;
            }
            block_count = new_count;
        }

        let minimal = self.reconstruct(sink, &blocks);
        debug!(
            "minimized {} states into {} in {} passes",
            n,
            minimal.states.len(),
            passes,
        );
        minimal
    }

    fn signature(
        &self,
        id: StateId,
        sink: StateId,
        blocks: &[usize],
    ) -> Signature {
        let sink_block = blocks[sink];
        let mut cover: Vec<(u16, u16, usize)> = vec![];
        // The covering is always contiguous from 0x0000 to 0xFFFF, so a
        // new segment only needs pushing when the block changes.
        fn append(
            cover: &mut Vec<(u16, u16, usize)>,
            start: u16,
            end: u16,
            block: usize,
        ) {
            match cover.last_mut() {
                Some(last) if last.2 == block => last.1 = end,
                _ => cover.push((start, end, block)),
            }
        }

        if id == sink {
            return (sink_block, vec![(0, 0xFFFF, sink_block)]);
        }
        let mut pos: u32 = 0;
        for t in &self.repr.states[id].transitions {
            if (t.start as u32) > pos {
                append(&mut cover, pos as u16, t.start - 1, sink_block);
            }
            append(&mut cover, t.start, t.end, blocks[t.target]);
            pos = t.end as u32 + 1;
        }
        if pos <= 0xFFFF {
            append(&mut cover, pos as u16, 0xFFFF, sink_block);
        }
        (blocks[id], cover)
    }

    /// Rebuild the automaton from the final partition: one state per block
    /// reachable from a start, numbered in discovery order, transitions
    /// rewritten to block representatives and transitions into the sink
    /// block dropped. A start that itself falls into the sink block gets a
    /// materialized state with no transitions.
    fn reconstruct(&self, sink: StateId, blocks: &[usize]) -> Repr<L> {
        let n = self.repr.states.len();
        let sink_block = blocks[sink];

        // Lowest-numbered member of each block.
        let mut representative: fnv::HashMap<usize, StateId> =
            fnv::HashMap::default();
        for id in (0..n).rev() {
            representative.insert(blocks[id], id);
        }

        let mut minimal = Repr::new();
        let mut block_to_new: fnv::HashMap<usize, StateId> =
            fnv::HashMap::default();
        let mut queue: VecDeque<usize> = VecDeque::new();

        fn intern<L: Label>(
            old: &Repr<L>,
            representative: &fnv::HashMap<usize, StateId>,
            sink_block: usize,
            block: usize,
            minimal: &mut Repr<L>,
            block_to_new: &mut fnv::HashMap<usize, StateId>,
            queue: &mut VecDeque<usize>,
        ) -> StateId {
            if let Some(&new_id) = block_to_new.get(&block) {
                return new_id;
            }
            let accept = if block == sink_block {
                None
            } else {
                old.states[representative[&block]].accept.clone()
            };
            let new_id = minimal.add_state(accept);
            block_to_new.insert(block, new_id);
            queue.push_back(block);
            new_id
        }

        for &start in &self.repr.starts {
            let new_id = intern(
                self.repr,
                &representative,
                sink_block,
                blocks[start],
                &mut minimal,
                &mut block_to_new,
                &mut queue,
            );
            minimal.starts.push(new_id);
        }

        while let Some(block) = queue.pop_front() {
            if block == sink_block {
                // Reachable only as a materialized start; it keeps no
                // transitions and stays equivalent to the implicit sink.
                continue;
            }
            let src = representative[&block];
            let new_id = block_to_new[&block];
            let mut transitions: Vec<Transition> = vec![];
            for t in &self.repr.states[src].transitions {
                let target_block = blocks[t.target];
                if target_block == sink_block {
                    continue;
                }
                let target = intern(
                    self.repr,
                    &representative,
                    sink_block,
                    target_block,
                    &mut minimal,
                    &mut block_to_new,
                    &mut queue,
                );
                match transitions.last_mut() {
                    Some(last)
                        if last.target == target
                            && last.end as u32 + 1 == t.start as u32 =>
                    {
                        last.end = t.end;
                    }
                    _ => transitions.push(Transition {
                        start: t.start,
                        end: t.end,
                        target,
                    }),
                }
            }
            minimal.states[new_id].transitions = transitions;
        }

        minimal
    }
}
