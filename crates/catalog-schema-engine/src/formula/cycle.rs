//! Loop detection over the formula dependency graph.

use std::collections::HashSet;

use super::{DependencyGraph, HeaderId};

/// Walk the columns reachable from `start` and return the first loop found,
/// as the chain of headers from `start` ending with the repeated one
/// (`[total, flete, total]`).
///
/// The walk keeps an explicit stack, so deep chains of derived columns never
/// grow the call stack. Columns whose dependencies were fully walked without
/// finding a loop are not revisited.
pub fn detect_cycle(start: &HeaderId, graph: &DependencyGraph) -> Option<Vec<HeaderId>> {
    // `chain[i]` is the column being walked at depth i; `next_dep[i]` the
    // index of its next dependency to follow.
    let mut chain: Vec<HeaderId> = vec![start.clone()];
    let mut next_dep: Vec<usize> = vec![0];
    let mut on_chain: HashSet<HeaderId> = HashSet::from([start.clone()]);
    let mut settled: HashSet<HeaderId> = HashSet::new();

    while let (Some(column), Some(cursor)) = (chain.last(), next_dep.last_mut()) {
        let Some(dep) = graph.get(column).and_then(|deps| deps.get(*cursor)) else {
            // exhausted
            if let Some(done) = chain.pop() {
                on_chain.remove(&done);
                settled.insert(done);
            }
            next_dep.pop();
            continue;
        };
        *cursor += 1;

        if on_chain.contains(dep) {
            chain.push(dep.clone());
            return Some(chain);
        }
        if settled.contains(dep) {
            continue;
        }
        on_chain.insert(dep.clone());
        chain.push(dep.clone());
        next_dep.push(0);
    }
    None
}
