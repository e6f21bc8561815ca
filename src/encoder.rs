//! Conversion of the solved symbolic strategy into an AIG
//!
//! For every controllable proposition and every state bit the encoder
//! extracts a characteristic function over `(s, uap)` and converts it to a
//! literal, by memoised Shannon expansion over the diagram nodes or through
//! an irredundant sum-of-products cover. The memo tables live for a single
//! `encode` call.

use std::collections::VecDeque;

use log::info;
use rustc_hash::FxHashMap;

use crate::aig::{Aig, AigLit};
use crate::builder::StateEncoding;
use crate::dd::{Manager, Ref, ZRef, ZddStore};
use crate::symgame::SymGame;

/// Encoder from a solved symbolic game to a sequential circuit
pub struct AigEncoder<'a> {
    game: &'a SymGame,
    isop: bool,
    sop: bool,
    onehot: bool,
    simplify: bool,
}

impl<'a> AigEncoder<'a> {
    /// Create an encoder with the default Shannon expansion
    pub fn new(game: &'a SymGame) -> AigEncoder<'a> {
        AigEncoder {
            game,
            isop: false,
            sop: false,
            onehot: false,
            simplify: false,
        }
    }

    /// Convert through ISOP covers instead of Shannon expansion
    pub fn set_isop(mut self) -> Self {
        self.isop = true;
        self
    }

    /// Use the one-hot state encoding
    pub fn set_onehot(mut self) -> Self {
        self.onehot = true;
        self
    }

    /// Sum-of-products variant: ISOP covers, product enumeration and the
    /// one-hot state encoding
    pub fn set_sop(mut self) -> Self {
        self.isop = true;
        self.sop = true;
        self.onehot = true;
        self
    }

    /// Opt-in simplification of product and sum queues against the gate
    /// cache
    pub fn set_simplify(mut self) -> Self {
        self.simplify = true;
        self
    }

    /// Encode the strategy into a circuit
    pub fn encode(&self, man: &mut Manager) -> Aig {
        let onehot_game;
        let game = if self.onehot && self.game.encoding != StateEncoding::OneHot {
            onehot_game = self.game.to_onehot(man);
            &onehot_game
        } else {
            self.game
        };

        let mut aig = Aig::new();
        let mut var_to_lit: FxHashMap<u32, AigLit> = FxHashMap::default();

        // inputs first, one per uncontrollable proposition
        let uap_names: Vec<&str> = (0..game.ap_names.len() as u32)
            .filter(|i| !game.controllable.contains(i))
            .map(|i| game.ap_names[i as usize].as_str())
            .collect();
        for (i, &var) in game.uap_vars.iter().enumerate() {
            let lit = aig.add_input(uap_names[i]);
            var_to_lit.insert(var, lit);
        }

        // latches second, one per state bit; with one-hot states the first
        // latch stores the complement so the all-zero reset marks state 0
        let onehot = game.encoding == StateEncoding::OneHot;
        for (j, &var) in game.s_vars.iter().enumerate() {
            let lit = aig.add_latch("");
            let visible = if onehot && j == 0 { !lit } else { lit };
            var_to_lit.insert(var, visible);
        }

        // characteristic functions of the outputs and next-state bits
        let cap_sorted = {
            let mut v = game.cap_vars.clone();
            v.sort_unstable();
            v
        };
        let mut cap_bdds = Vec::new();
        for &cap in &game.cap_vars {
            let lit = man.ithvar(cap);
            let bdd = man.and_exists(game.strategies, lit, &cap_sorted);
            cap_bdds.push(bdd);
        }
        let pc_sorted = {
            let mut v = game.p_vars.clone();
            v.extend(&game.cap_vars);
            v.sort_unstable();
            v
        };
        let full = man.and_exists(game.strategies, game.trans, &pc_sorted);
        let ns_sorted = {
            let mut v = game.ns_vars.clone();
            v.sort_unstable();
            v
        };
        let mut state_bdds = Vec::new();
        for &ns in &game.ns_vars {
            let lit = man.ithvar(ns);
            let bdd = man.and_exists(full, lit, &ns_sorted);
            state_bdds.push(bdd);
        }

        let cap_names: Vec<&str> = game
            .controllable
            .iter()
            .map(|&i| game.ap_names[i as usize].as_str())
            .collect();

        if self.isop {
            let mut zdd = ZddStore::new();
            let mut covers = Vec::new();
            for &bdd in cap_bdds.iter().chain(&state_bdds) {
                let cover = zdd.isop(man, bdd);
                info!(
                    "isop has {} terms and {} nodes",
                    zdd.path_count(cover),
                    zdd.node_count(cover)
                );
                covers.push(cover);
            }
            let mut memo = FxHashMap::default();
            let mut results = Vec::new();
            for &cover in &covers {
                let lit = if self.sop {
                    self.cover_to_aig_sop(&zdd, &mut aig, &var_to_lit, cover)
                } else {
                    cover_to_aig(&zdd, &mut aig, &var_to_lit, &mut memo, cover)
                };
                results.push(lit);
            }
            let (caps, states) = results.split_at(cap_bdds.len());
            for (i, &lit) in caps.iter().enumerate() {
                aig.add_output(lit, cap_names[i]);
            }
            for (j, &lit) in states.iter().enumerate() {
                let next = if onehot && j == 0 { !lit } else { lit };
                aig.connect_latch(j, next);
            }
        } else {
            let mut memo = FxHashMap::default();
            for (i, &bdd) in cap_bdds.iter().enumerate() {
                let lit = shannon(man, &mut aig, &var_to_lit, &mut memo, bdd);
                aig.add_output(lit, cap_names[i]);
            }
            for (j, &bdd) in state_bdds.iter().enumerate() {
                let lit = shannon(man, &mut aig, &var_to_lit, &mut memo, bdd);
                let next = if onehot && j == 0 { !lit } else { lit };
                aig.connect_latch(j, next);
            }
        }
        aig
    }

    /// Sum-of-products conversion: enumerate the cover's products, AND each
    /// product together, then OR the products
    fn cover_to_aig_sop(
        &self,
        zdd: &ZddStore,
        aig: &mut Aig,
        var_to_lit: &FxHashMap<u32, AigLit>,
        cover: ZRef,
    ) -> AigLit {
        if cover == ZddStore::BASE {
            return AigLit::one();
        }
        if cover == ZddStore::EMPTY {
            return AigLit::zero();
        }
        let mut products: VecDeque<AigLit> = VecDeque::new();
        for product in zdd.products(cover) {
            let mut gates: VecDeque<AigLit> = VecDeque::new();
            for lit in product {
                let var = lit.unsigned_abs();
                let mut the_lit = var_to_lit[&var];
                if lit < 0 {
                    the_lit = !the_lit;
                }
                gates.push_back(the_lit);
            }
            if self.simplify {
                simplify_and(aig, &mut gates);
            }
            while let Some(last) = gates.pop_front() {
                match gates.pop_front() {
                    Some(last2) => {
                        let gate = aig.and(last, last2);
                        gates.push_back(gate);
                    }
                    None => products.push_back(last),
                }
            }
        }
        if self.simplify {
            simplify_or(aig, &mut products);
        }
        while let Some(p1) = products.pop_front() {
            match products.pop_front() {
                Some(p2) => {
                    let sum = !aig.and(!p1, !p2);
                    products.push_back(sum);
                }
                None => return p1,
            }
        }
        AigLit::zero()
    }
}

/// Memoised Shannon expansion of a diagram into gates. The memo is keyed on
/// the node without its complement mark and holds the positive literal.
fn shannon(
    man: &Manager,
    aig: &mut Aig,
    var_to_lit: &FxHashMap<u32, AigLit>,
    memo: &mut FxHashMap<u32, AigLit>,
    f: Ref,
) -> AigLit {
    if f == Manager::ONE {
        return AigLit::one();
    }
    if f == Manager::ZERO {
        return AigLit::zero();
    }
    let comp = f.is_negated();
    let node = f.without_negation();
    if let Some(&lit) = memo.get(&node.raw()) {
        return lit ^ comp;
    }

    let v = man.var(node);
    let the_lit = var_to_lit[&v];
    let (low, high) = man.cofactors(node, v);

    let res = if low == Manager::ZERO && high == Manager::ONE {
        the_lit
    } else if high == Manager::ZERO && low == Manager::ONE {
        !the_lit
    } else if low == Manager::ZERO {
        let h = shannon(man, aig, var_to_lit, memo, high);
        aig.and(the_lit, h)
    } else if high == Manager::ZERO {
        let l = shannon(man, aig, var_to_lit, memo, low);
        aig.and(!the_lit, l)
    } else {
        let l = shannon(man, aig, var_to_lit, memo, low);
        let h = shannon(man, aig, var_to_lit, memo, high);
        let a = aig.and(!the_lit, l);
        let b = aig.and(the_lit, h);
        !aig.and(!a, !b)
    };

    memo.insert(node.raw(), res);
    res ^ comp
}

/// Recursive conversion of a cover: fewer gates than plain product
/// enumeration on average
fn cover_to_aig(
    zdd: &ZddStore,
    aig: &mut Aig,
    var_to_lit: &FxHashMap<u32, AigLit>,
    memo: &mut FxHashMap<u32, AigLit>,
    cover: ZRef,
) -> AigLit {
    if cover == ZddStore::BASE {
        return AigLit::one();
    }
    if cover == ZddStore::EMPTY {
        return AigLit::zero();
    }
    if let Some(&lit) = memo.get(&cover.index()) {
        return lit;
    }

    let zv = zdd.var(cover);
    let mut the_lit = var_to_lit[&(zv / 2)];
    if zv & 1 != 0 {
        the_lit = !the_lit;
    }
    let high = zdd.high(cover);
    let low = zdd.low(cover);

    let mut res = the_lit;
    if high != ZddStore::BASE {
        let x = cover_to_aig(zdd, aig, var_to_lit, memo, high);
        res = aig.and(res, x);
    }
    if low != ZddStore::EMPTY {
        let x = cover_to_aig(zdd, aig, var_to_lit, memo, low);
        res = !aig.and(!res, !x);
    }

    memo.insert(cover.index(), res);
    res
}

/// Replace pairs already present in the gate cache by their gate
fn simplify_and(aig: &Aig, gates: &mut VecDeque<AigLit>) {
    loop {
        let mut replaced = None;
        'search: for first in 0..gates.len() {
            for second in first + 1..gates.len() {
                if let Some(lit) = aig.cached_and(gates[first], gates[second]) {
                    replaced = Some((first, second, lit));
                    break 'search;
                }
            }
        }
        match replaced {
            Some((first, second, lit)) => {
                gates.remove(second);
                gates.remove(first);
                gates.push_back(lit);
            }
            None => return,
        }
    }
}

/// The dual of [`simplify_and`] for sum queues
fn simplify_or(aig: &Aig, gates: &mut VecDeque<AigLit>) {
    loop {
        let mut replaced = None;
        'search: for first in 0..gates.len() {
            for second in first + 1..gates.len() {
                if let Some(lit) = aig.cached_and(!gates[first], !gates[second]) {
                    replaced = Some((first, second, lit));
                    break 'search;
                }
            }
        }
        match replaced {
            Some((first, second, lit)) => {
                gates.remove(second);
                gates.remove(first);
                gates.push_back(!lit);
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_symbolic, StateEncoding};
    use crate::symgame::tests::toggle;

    fn solved_toggle(man: &mut Manager) -> SymGame {
        let auto = toggle();
        let mut game = build_symbolic(man, &auto, StateEncoding::Binary);
        assert!(game.solve(man));
        game.post_process(man);
        game
    }

    #[test]
    fn test_encode_toggle_shannon() {
        let mut man = Manager::new(18);
        let game = solved_toggle(&mut man);
        let aig = AigEncoder::new(&game).encode(&mut man);
        assert_eq!(aig.num_inputs(), 1);
        assert_eq!(aig.num_latches(), 1);
        assert_eq!(aig.num_outputs(), 1);
        // the grant mirrors the latch and the latch follows the request
        assert_eq!(aig.num_ands(), 0);
        let latch = &aig.latches()[0];
        assert_eq!(latch.next, aig.inputs()[0].0);
        assert_eq!(aig.outputs()[0].0, latch.lit);
        assert_eq!(aig.outputs()[0].1, "g");
    }

    #[test]
    fn test_encode_deterministic() {
        let mut man = Manager::new(18);
        let game = solved_toggle(&mut man);
        let mut first = Vec::new();
        let mut second = Vec::new();
        AigEncoder::new(&game)
            .encode(&mut man)
            .write_ascii(&mut first)
            .unwrap();
        AigEncoder::new(&game)
            .encode(&mut man)
            .write_ascii(&mut second)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_variants_agree_on_structure() {
        let mut man = Manager::new(20);
        let game = solved_toggle(&mut man);
        let shannon = AigEncoder::new(&game).encode(&mut man);
        let isop = AigEncoder::new(&game).set_isop().encode(&mut man);
        let onehot = AigEncoder::new(&game).set_onehot().encode(&mut man);
        let sop = AigEncoder::new(&game).set_sop().encode(&mut man);
        for aig in [&shannon, &isop] {
            assert_eq!(aig.num_latches(), 1);
        }
        for aig in [&onehot, &sop] {
            assert_eq!(aig.num_latches(), 2);
        }
        for aig in [&shannon, &isop, &onehot, &sop] {
            assert_eq!(aig.num_inputs(), 1);
            assert_eq!(aig.num_outputs(), 1);
            // no duplicated gate pairs
            let mut pairs: Vec<(u32, u32)> = aig
                .ands()
                .iter()
                .map(|g| (g.rhs1.raw(), g.rhs0.raw()))
                .collect();
            pairs.sort_unstable();
            let before = pairs.len();
            pairs.dedup();
            assert_eq!(before, pairs.len());
        }
    }
}
