//! Signature-based bisimulation minimisation of the symbolic game
//!
//! A state's signature is the canonical diagram of its
//! `(uap, cap) -> (priority, successor block)` behaviour, with the
//! `(p, ns)` cubes of the relation replaced by packed integer leaves. Two
//! states with equal current blocks and equal signature handles stay
//! together; refinement stops when a pass creates no new block.

use log::info;
use rustc_hash::FxHashMap;

use crate::builder::StateEncoding;
use crate::dd::{Manager, Ref};
use crate::symgame::{remap_targets, SymGame};

/// A partition of the automaton states into behavioural blocks
#[derive(Debug, Clone)]
pub struct Partition {
    /// Block id per state
    pub blocks: Vec<u32>,
    /// Number of distinct blocks
    pub num_blocks: usize,
}

/// Compute the coarsest strong-bisimulation partition of the game states.
/// With `include_strategies`, the minimised relation is `trans ∧ strategies`
/// (the solution); otherwise it is `trans` (the game).
pub fn min_lts_strong(man: &mut Manager, game: &SymGame, include_strategies: bool) -> Partition {
    let rel = if include_strategies {
        man.and(game.trans, game.strategies)
    } else {
        game.trans
    };
    let n = game.num_states;
    let p_start = game.p_vars[0];
    let pns = {
        let mut v = game.p_vars.clone();
        v.extend(&game.ns_vars);
        v
    };
    let mask = (1u64 << game.statebits) - 1;

    let mut blocks = vec![0u32; n];
    let mut num_blocks = 1usize;
    loop {
        // signatures under the current partition
        let mut sigs = Vec::with_capacity(n);
        let mut memo = FxHashMap::default();
        let current = blocks.clone();
        for state in 0..n as u32 {
            let lits = game.encoding.lits(&game.s_vars, state);
            let t = man.restrict(rel, &lits);
            let encoding = game.encoding;
            let bits = game.statebits;
            let sig = remap_targets(
                man,
                t,
                p_start,
                &pns,
                &mut |man, value| {
                    let prio = value >> bits;
                    let succ = encoding.decode(value & mask, bits);
                    man.leaf((prio << 32) | current[succ as usize] as u64)
                },
                &mut memo,
            );
            sigs.push(sig);
        }

        // split blocks on distinct signatures
        let mut assignment: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        let mut next = 0u32;
        let new_blocks: Vec<u32> = (0..n)
            .map(|i| {
                *assignment.entry((blocks[i], sigs[i].raw())).or_insert_with(|| {
                    let b = next;
                    next += 1;
                    b
                })
            })
            .collect();

        if next as usize == num_blocks {
            return Partition {
                blocks: new_blocks,
                num_blocks,
            };
        }
        blocks = new_blocks;
        num_blocks = next as usize;
    }
}

/// Quotient the game by a partition: rebuild the relations over the block
/// representatives (the smallest state of each block) and rebind the state
/// variables to the reduced width. The block holding the initial state
/// becomes block 0.
pub fn minimize(man: &mut Manager, game: &mut SymGame, partition: &Partition) {
    assert_eq!(
        game.encoding,
        StateEncoding::Binary,
        "quotienting expects a binary-encoded game"
    );
    let b = partition.num_blocks;
    let b0 = partition.blocks[0];
    let renumber = |blk: u32| -> u32 {
        if blk == b0 {
            0
        } else if blk == 0 {
            b0
        } else {
            blk
        }
    };

    // smallest member state per renumbered block
    let mut reps: Vec<Option<u32>> = vec![None; b];
    for (state, &blk) in partition.blocks.iter().enumerate() {
        let nb = renumber(blk) as usize;
        if reps[nb].is_none() {
            reps[nb] = Some(state as u32);
        }
    }

    let new_statebits = StateEncoding::Binary.bits(b);
    let s_vars: Vec<u32> = game.s_vars[..new_statebits].to_vec();
    let ns_vars: Vec<u32> = game.ns_vars[..new_statebits].to_vec();
    let ns_start = game.ns_vars[0];

    let mut trans = Manager::ZERO;
    let mut strategies = Manager::ZERO;
    for (blk, rep) in reps.iter().enumerate() {
        let rep = rep.expect("every block has a representative");
        let old_lits = game.encoding.lits(&game.s_vars, rep);
        let s_lits = StateEncoding::Binary.lits(&s_vars, blk as u32);
        let s_cube = man.cube(&s_lits);

        let t = man.restrict(game.trans, &old_lits);
        let mut memo = FxHashMap::default();
        let old_ns = game.ns_vars.clone();
        let old_enc = game.encoding;
        let bits = game.statebits;
        let part_blocks = partition.blocks.clone();
        let t_q = remap_targets(
            man,
            t,
            ns_start,
            &old_ns,
            &mut |man, value| {
                let succ = old_enc.decode(value, bits);
                let target_block = renumber(part_blocks[succ as usize]);
                let lits = StateEncoding::Binary.lits(&ns_vars, target_block);
                man.cube(&lits)
            },
            &mut memo,
        );
        let part = man.and(s_cube, t_q);
        trans = man.or(trans, part);

        let sigma = man.restrict(game.strategies, &old_lits);
        if sigma != Manager::ZERO {
            let part = man.and(s_cube, sigma);
            strategies = man.or(strategies, part);
        }
    }

    info!(
        "bisimulation: {} states collapsed into {} blocks",
        game.num_states, b
    );
    game.trans = trans;
    game.strategies = strategies;
    game.num_states = b;
    game.statebits = new_statebits;
    game.s_vars = s_vars;
    game.ns_vars = ns_vars;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{Automaton, Label, ParityAcceptance, State, Transition};
    use crate::builder::build_symbolic;

    /// Two copies of the same single-state behaviour reachable on `a` and
    /// `!a`: the quotient collapses them
    fn redundant_automaton() -> Automaton {
        let t = |label: Label, succ: u32| Transition {
            label: Some(label),
            successor: succ,
            acc_sig: Some(0),
        };
        let a = || Label::Ap(0);
        let na = || Label::Not(Box::new(Label::Ap(0)));
        Automaton {
            ap_names: vec!["a".into()],
            controllable: vec![],
            num_acc_sets: 1,
            parity: ParityAcceptance { max: true, even: true },
            start: 0,
            states: vec![
                State {
                    id: 0,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![t(a(), 1), t(na(), 2)],
                },
                State {
                    id: 1,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![t(a(), 1), t(na(), 2)],
                },
                State {
                    id: 2,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![t(a(), 1), t(na(), 2)],
                },
            ],
        }
    }

    #[test]
    fn test_partition_collapses_duplicates() {
        let mut man = Manager::new(18);
        let auto = redundant_automaton();
        let game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        let partition = min_lts_strong(&mut man, &game, false);
        assert_eq!(partition.num_blocks, 1);
    }

    #[test]
    fn test_minimize_preserves_realizability() {
        let mut man = Manager::new(18);
        let auto = redundant_automaton();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        let mut reference = game.clone();
        let expected = reference.solve(&mut man);

        let partition = min_lts_strong(&mut man, &game, false);
        assert!(partition.num_blocks < game.num_states);
        minimize(&mut man, &mut game, &partition);
        assert_eq!(game.num_states, 1);
        assert_eq!(game.solve(&mut man), expected);
    }

    #[test]
    fn test_partition_separates_priorities() {
        // states with different transition priorities stay apart
        let t = |p: u32, succ: u32| Transition {
            label: Some(Label::Bool(true)),
            successor: succ,
            acc_sig: Some(p),
        };
        let auto = Automaton {
            ap_names: vec![],
            controllable: vec![],
            num_acc_sets: 2,
            parity: ParityAcceptance { max: true, even: true },
            start: 0,
            states: vec![
                State {
                    id: 0,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![t(0, 1)],
                },
                State {
                    id: 1,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![t(1, 0)],
                },
            ],
        };
        let mut man = Manager::new(18);
        let game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        let partition = min_lts_strong(&mut man, &game, false);
        assert_eq!(partition.num_blocks, 2);
    }
}
