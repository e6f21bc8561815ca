//! Turning a parity automaton into a parity game
//!
//! Three constructions with identical semantics: a naive explicit split over
//! all uncontrollable valuations, an explicit split driven by per-state
//! transition diagrams, and the fully symbolic construction.

use rustc_hash::FxHashMap;

use crate::automaton::{Automaton, Label, Tv};
use crate::dd::{value_lits, Manager, Ref};
use crate::game::{Owner, ParityGame};
use crate::symgame::SymGame;

/// Adjust a priority so the resulting game is max-even with priority 0
/// reserved for intermediate vertices
pub fn adjust_priority(p: u32, max_parity: bool, controller_odd: bool, num_priorities: u32) -> u32 {
    let mut p = p as i64;
    if !max_parity {
        // flip from min to max through an even bound
        let even_max = 2 * ((num_priorities as i64 + 1) / 2);
        p = even_max - p;
    }
    p += 2;
    if controller_odd {
        p -= 1;
    }
    debug_assert!(p >= 1);
    p as u32
}

/// Largest priority that [`adjust_priority`] can produce
pub fn max_adjusted_priority(num_priorities: u32) -> u32 {
    2 + 2 * ((num_priorities + 1) / 2)
}

/// State encoding policy: how automaton states map onto state bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEncoding {
    /// `max(1, ceil(log2 n))` bits holding the state id
    Binary,
    /// One bit per state, exactly one high
    OneHot,
}

impl StateEncoding {
    /// Number of state bits for `n` states
    pub fn bits(self, n: usize) -> usize {
        match self {
            StateEncoding::Binary => {
                let mut bits = 1;
                while (1usize << bits) < n {
                    bits += 1;
                }
                bits
            }
            StateEncoding::OneHot => n,
        }
    }

    /// Assignment of the state bits for a concrete state
    pub fn lits(self, vars: &[u32], state: u32) -> Vec<(u32, bool)> {
        match self {
            StateEncoding::Binary => value_lits(vars, state as u64),
            StateEncoding::OneHot => vars
                .iter()
                .enumerate()
                .map(|(i, &v)| (v, i as u32 == state))
                .collect(),
        }
    }

    /// Recover a state id from a packed bit value, most significant
    /// variable first
    pub fn decode(self, value: u64, bits: usize) -> u32 {
        match self {
            StateEncoding::Binary => value as u32,
            StateEncoding::OneHot => {
                assert_eq!(value.count_ones(), 1, "state valuation is not one-hot");
                bits as u32 - 1 - value.trailing_zeros()
            }
        }
    }

    /// Well-formedness predicate of the encoding over the state variables
    pub fn wellformed(self, man: &mut Manager, vars: &[u32], n: usize) -> Ref {
        match self {
            StateEncoding::Binary => Manager::ONE,
            StateEncoding::OneHot => {
                let mut res = Manager::ZERO;
                for i in 0..n {
                    let lits = self.lits(vars, i as u32);
                    let cube = man.cube(&lits);
                    res = man.or(res, cube);
                }
                res
            }
        }
    }
}

/// Translate a label into a BDD; `ap_vars[i]` is the variable of
/// proposition `i`
pub fn label_to_bdd(man: &mut Manager, label: &Label, ap_vars: &[u32]) -> Ref {
    match label {
        Label::Bool(true) => Manager::ONE,
        Label::Bool(false) => Manager::ZERO,
        Label::Ap(i) => man.ithvar(ap_vars[*i as usize]),
        Label::Not(inner) => !label_to_bdd(man, inner, ap_vars),
        Label::And(l, r) => {
            let left = label_to_bdd(man, l, ap_vars);
            let right = label_to_bdd(man, r, ap_vars);
            man.and(left, right)
        }
        Label::Or(l, r) => {
            let left = label_to_bdd(man, l, ap_vars);
            let right = label_to_bdd(man, r, ap_vars);
            man.or(left, right)
        }
    }
}

/// Allocate one variable per proposition so that every uncontrollable
/// variable precedes every controllable one. Returns the per-proposition
/// variable, the uncontrollable group and the controllable group.
fn ap_variables(man: &mut Manager, auto: &Automaton) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    let uaps = auto.uncontrollable();
    let vars = man.fresh_vars(auto.num_aps());
    let mut ap_vars = vec![0u32; auto.num_aps()];
    let mut uap_vars = Vec::new();
    let mut cap_vars = Vec::new();
    for (i, &ap) in uaps.iter().enumerate() {
        ap_vars[ap as usize] = vars[i];
        uap_vars.push(vars[i]);
    }
    for (j, &ap) in auto.controllable.iter().enumerate() {
        ap_vars[ap as usize] = vars[uaps.len() + j];
        cap_vars.push(vars[uaps.len() + j]);
    }
    (ap_vars, uap_vars, cap_vars)
}

/// Naive splitting: one intermediate vertex per state and uncontrollable
/// valuation, driven by the three-valued label evaluator
pub fn build_naive(auto: &Automaton) -> (ParityGame, u32) {
    let controller_odd = !auto.parity.even;
    let uaps = auto.uncontrollable();
    let num_valuations = 1u64 << uaps.len();
    let state_priorities = auto.state_priorities();

    let mut game = ParityGame::new();
    for state in &auto.states {
        let priority = match state.acc_sig {
            Some(a) => adjust_priority(a, auto.parity.max, controller_odd, auto.num_acc_sets),
            None => 0,
        };
        let label = state.name.clone().unwrap_or_else(|| state.id.to_string());
        game.add_vertex(priority, Owner::Environment, Some(label));
    }

    for state in &auto.states {
        for value in 0..num_valuations {
            let mut succ_inter = Vec::new();
            for trans in &state.transitions {
                let label = auto.effective_label(state, trans);
                if label.eval_naive(&uaps, value) == Tv::False {
                    continue;
                }
                if state_priorities {
                    succ_inter.push(trans.successor);
                } else {
                    let priority = adjust_priority(
                        trans.acc_sig.expect("transition priorities"),
                        auto.parity.max,
                        controller_odd,
                        auto.num_acc_sets,
                    );
                    let vfin = game.add_vertex(priority, Owner::Controller, None);
                    game.add_edge(vfin, trans.successor);
                    succ_inter.push(vfin);
                }
            }
            let vinter = game.add_vertex(0, Owner::Controller, None);
            for to in succ_inter {
                game.add_edge(vinter, to);
            }
            game.add_edge(state.id, vinter);
        }
    }
    (game, auto.start)
}

/// Explicit splitting: per-state transition diagrams, intermediate vertices
/// deduplicated on their target set
pub fn build_explicit(man: &mut Manager, auto: &Automaton) -> (ParityGame, u32) {
    let controller_odd = !auto.parity.even;
    let state_priorities = auto.state_priorities();
    let (ap_vars, uap_vars, _cap_vars) = ap_variables(man, auto);
    let boundary = uap_vars.last().map(|&v| v + 1).unwrap_or(1);

    // variables only used to encode targets for deduplication
    let priobits = priority_bits(auto.num_acc_sets);
    let statebits = StateEncoding::Binary.bits(auto.states.len());
    let p_vars = man.fresh_vars(priobits);
    let ns_vars = man.fresh_vars(statebits);

    let mut game = ParityGame::new();
    for state in &auto.states {
        let priority = match state.acc_sig {
            Some(a) => adjust_priority(a, auto.parity.max, controller_odd, auto.num_acc_sets),
            None => 0,
        };
        let label = state.name.clone().unwrap_or_else(|| state.id.to_string());
        game.add_vertex(priority, Owner::Environment, Some(label));
    }

    for state in &auto.states {
        let mut trans_mt = Manager::ZERO;
        for trans in &state.transitions {
            let priority = if state_priorities {
                0
            } else {
                adjust_priority(
                    trans.acc_sig.expect("transition priorities"),
                    auto.parity.max,
                    controller_odd,
                    auto.num_acc_sets,
                )
            };
            let label = auto.effective_label(state, trans);
            let lbl = label_to_bdd(man, label, &ap_vars);
            let leaf = man.leaf(((priority as u64) << 32) | trans.successor as u64);
            trans_mt = man.ite_mt(lbl, leaf, trans_mt);
        }

        let mut inter_vertices: FxHashMap<u32, u32> = FxHashMap::default();
        for (inter_mt, _cond) in man.collect_subroots(trans_mt, boundary) {
            let mut targets = Vec::new();
            man.collect_leaves(inter_mt, &mut targets);
            let mut targets_bdd = Manager::ZERO;
            for &leaf in &targets {
                let prio = leaf >> 32;
                let target = leaf & 0xffff_ffff;
                let mut lits = value_lits(&p_vars, prio);
                lits.extend(value_lits(&ns_vars, target));
                let cube = man.cube(&lits);
                targets_bdd = man.or(targets_bdd, cube);
            }

            let vinter = match inter_vertices.get(&targets_bdd.raw()).copied() {
                Some(v) => v,
                None => {
                    let vinter = game.add_vertex(
                        0,
                        Owner::Controller,
                        Some(format!("from {}", state.id)),
                    );
                    let mut target_vertices: FxHashMap<u64, u32> = FxHashMap::default();
                    for &leaf in &targets {
                        let priority = (leaf >> 32) as u32;
                        let target = (leaf & 0xffff_ffff) as u32;
                        if priority != 0 {
                            let vfin = *target_vertices.entry(leaf).or_insert_with(|| {
                                let vfin = game.add_vertex(priority, Owner::Controller, None);
                                game.add_edge(vfin, target);
                                vfin
                            });
                            game.add_edge(vinter, vfin);
                        } else {
                            game.add_edge(vinter, target);
                        }
                    }
                    inter_vertices.insert(targets_bdd.raw(), vinter);
                    vinter
                }
            };
            game.add_edge(state.id, vinter);
        }
    }
    (game, auto.start)
}

/// Number of priority bits needed for the adjusted priorities
pub fn priority_bits(num_acc_sets: u32) -> usize {
    let even_max = max_adjusted_priority(num_acc_sets);
    let mut bits = 1;
    while (1u64 << bits) <= even_max as u64 {
        bits += 1;
    }
    bits
}

/// Fully symbolic construction. The initial state is renumbered to 0 so the
/// all-zero latch initialisation of the synthesised circuit is correct.
pub fn build_symbolic(man: &mut Manager, auto: &Automaton, encoding: StateEncoding) -> SymGame {
    let controller_odd = !auto.parity.even;
    let n = auto.states.len();
    let (ap_vars, uap_vars, cap_vars) = ap_variables(man, auto);

    let statebits = encoding.bits(n);
    let priobits = priority_bits(auto.num_acc_sets);
    let s_vars = man.fresh_vars(statebits);
    let p_vars = man.fresh_vars(priobits);
    let ns_vars = man.fresh_vars(statebits);

    // swap the initial state with state 0
    let renumber = |s: u32| -> u32 {
        if s == auto.start {
            0
        } else if s == 0 {
            auto.start
        } else {
            s
        }
    };

    let mut trans = Manager::ZERO;
    for state in &auto.states {
        let mut trans_mt = Manager::ZERO;
        for t in &state.transitions {
            let priority = adjust_priority(
                state.acc_sig.or(t.acc_sig).expect("validated priorities"),
                auto.parity.max,
                controller_odd,
                auto.num_acc_sets,
            );
            let label = auto.effective_label(state, t);
            let lbl = label_to_bdd(man, label, &ap_vars);
            let leaf = man.leaf(((priority as u64) << 32) | renumber(t.successor) as u64);
            trans_mt = man.ite_mt(lbl, leaf, trans_mt);
        }
        let t_state = split_state_targets(man, trans_mt, encoding, &p_vars, &ns_vars);
        let s_lits = encoding.lits(&s_vars, renumber(state.id));
        let s_cube = man.cube(&s_lits);
        let part = man.and(s_cube, t_state);
        trans = man.or(trans, part);
    }

    if encoding == StateEncoding::OneHot {
        let well_s = encoding.wellformed(man, &s_vars, n);
        trans = man.and(trans, well_s);
        let well_ns = encoding.wellformed(man, &ns_vars, n);
        trans = man.and(trans, well_ns);
    }

    SymGame {
        uap_vars,
        cap_vars,
        s_vars,
        p_vars,
        ns_vars,
        trans,
        strategies: Manager::ZERO,
        num_states: n,
        statebits,
        priobits,
        max_priority: max_adjusted_priority(auto.num_acc_sets),
        encoding,
        ap_names: auto.ap_names.clone(),
        controllable: auto.controllable.clone(),
    }
}

/// Replace `(priority, state)` leaves by their cubes under the chosen state
/// encoding
fn split_state_targets(
    man: &mut Manager,
    mt: Ref,
    encoding: StateEncoding,
    p_vars: &[u32],
    ns_vars: &[u32],
) -> Ref {
    match encoding {
        StateEncoding::Binary => man.split_leaves(mt, p_vars, ns_vars),
        StateEncoding::OneHot => {
            let mut leaves = Vec::new();
            man.collect_leaves(mt, &mut leaves);
            let mut res = Manager::ZERO;
            for leaf_value in leaves {
                let prio = leaf_value >> 32;
                let target = (leaf_value & 0xffff_ffff) as u32;
                let leaf = man.leaf(leaf_value);
                // select exactly the branches mapping to this leaf
                let guard = mt_equals(man, mt, leaf);
                let mut lits = value_lits(p_vars, prio);
                lits.extend(encoding.lits(ns_vars, target));
                let cube = man.cube(&lits);
                let part = man.and(guard, cube);
                res = man.or(res, part);
            }
            res
        }
    }
}

/// Characteristic function of the branches of `mt` that reach `leaf`
fn mt_equals(man: &mut Manager, mt: Ref, leaf: Ref) -> Ref {
    if mt == leaf {
        return Manager::ONE;
    }
    if mt == Manager::ZERO || man.is_int_leaf(mt) {
        return Manager::ZERO;
    }
    let v = man.var(mt);
    let (f0, f1) = man.cofactors(mt, v);
    let low = mt_equals(man, f0, leaf);
    let high = mt_equals(man, f1, leaf);
    man.mk_node(v, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_priority_max_even() {
        // max-even games keep their priorities, shifted past the reserved 0
        assert_eq!(adjust_priority(0, true, false, 2), 2);
        assert_eq!(adjust_priority(1, true, false, 2), 3);
    }

    #[test]
    fn test_adjust_priority_min_odd() {
        // priorities {0, 1, 2} of a min-parity automaton with an odd
        // controller become {5, 4, 3}
        assert_eq!(adjust_priority(0, false, true, 3), 5);
        assert_eq!(adjust_priority(1, false, true, 3), 4);
        assert_eq!(adjust_priority(2, false, true, 3), 3);
    }

    #[test]
    fn test_adjusted_bounds() {
        for k in 1..6u32 {
            for p in 0..k {
                for &max in &[true, false] {
                    for &odd in &[true, false] {
                        let adj = adjust_priority(p, max, odd, k);
                        assert!(adj >= 1);
                        assert!(adj <= max_adjusted_priority(k));
                    }
                }
            }
        }
    }

    #[test]
    fn test_state_encoding() {
        assert_eq!(StateEncoding::Binary.bits(1), 1);
        assert_eq!(StateEncoding::Binary.bits(2), 1);
        assert_eq!(StateEncoding::Binary.bits(3), 2);
        assert_eq!(StateEncoding::Binary.bits(5), 3);
        assert_eq!(StateEncoding::OneHot.bits(5), 5);

        let mut man = Manager::new(16);
        let vars = man.fresh_vars(3);
        let lits = StateEncoding::OneHot.lits(&vars, 1);
        assert_eq!(lits, vec![(vars[0], false), (vars[1], true), (vars[2], false)]);
        let cube = man.cube(&lits);
        let value = man.decode_cube(cube, &vars);
        assert_eq!(StateEncoding::OneHot.decode(value, 3), 1);
        assert_eq!(StateEncoding::Binary.decode(0b101, 3), 5);
    }

    #[test]
    fn test_priority_bits() {
        // one acceptance set: adjusted priorities go up to 4
        assert_eq!(priority_bits(1), 3);
        assert_eq!(priority_bits(3), 3);
        assert_eq!(priority_bits(7), 4);
    }
}
