use rustc_hash::FxHashMap;

use crate::dd::manager::Manager;
use crate::dd::reference::{Ref, ZRef};

#[derive(Debug, Clone, Copy)]
struct ZNode {
    var: u32,
    low: ZRef,
    high: ZRef,
}

/// Zero-suppressed store for irredundant sum-of-products covers.
///
/// A cover is a set of products over *literal* variables: BDD variable `v`
/// contributes the positive literal `2v` and the negative literal `2v + 1`,
/// so the literal order follows the diagram order. ZDD nodes carry no
/// complement marks.
pub struct ZddStore {
    nodes: Vec<ZNode>,
    unique: FxHashMap<(u32, u32, u32), u32>,
    isop_cache: FxHashMap<(u32, u32), (ZRef, Ref)>,
}

impl ZddStore {
    /// The empty cover
    pub const EMPTY: ZRef = ZRef(0);
    /// The cover holding only the empty product (constant true)
    pub const BASE: ZRef = ZRef(1);

    /// Create an empty store
    pub fn new() -> ZddStore {
        ZddStore {
            // index 0 is the empty cover, index 1 the unit cover
            nodes: vec![
                ZNode { var: u32::MAX, low: ZRef(0), high: ZRef(0) },
                ZNode { var: u32::MAX, low: ZRef(1), high: ZRef(1) },
            ],
            unique: FxHashMap::default(),
            isop_cache: FxHashMap::default(),
        }
    }

    /// Returns true for the two terminal covers
    pub fn is_terminal(&self, z: ZRef) -> bool {
        z.0 <= 1
    }

    /// Literal variable at the root of a cover
    pub fn var(&self, z: ZRef) -> u32 {
        self.nodes[z.0 as usize].var
    }

    /// Products not containing the root literal
    pub fn low(&self, z: ZRef) -> ZRef {
        self.nodes[z.0 as usize].low
    }

    /// Products containing the root literal, with the literal removed
    pub fn high(&self, z: ZRef) -> ZRef {
        self.nodes[z.0 as usize].high
    }

    /// Create (or find) a node, applying the zero-suppression rule
    pub fn mk_node(&mut self, var: u32, low: ZRef, high: ZRef) -> ZRef {
        if high == ZddStore::EMPTY {
            return low;
        }
        let key = (var, low.0, high.0);
        if let Some(&i) = self.unique.get(&key) {
            return ZRef(i);
        }
        self.nodes.push(ZNode { var, low, high });
        let i = (self.nodes.len() - 1) as u32;
        self.unique.insert(key, i);
        ZRef(i)
    }

    /// Number of nodes in the cover diagram, terminals excluded
    pub fn node_count(&self, z: ZRef) -> usize {
        let mut seen = FxHashMap::default();
        let mut stack = vec![z];
        let mut count = 0;
        while let Some(r) = stack.pop() {
            if self.is_terminal(r) || seen.insert(r.0, ()).is_some() {
                continue;
            }
            count += 1;
            stack.push(self.low(r));
            stack.push(self.high(r));
        }
        count
    }

    /// Number of products in the cover
    pub fn path_count(&self, z: ZRef) -> u64 {
        let mut memo = FxHashMap::default();
        self.path_count_rec(z, &mut memo)
    }

    fn path_count_rec(&self, z: ZRef, memo: &mut FxHashMap<u32, u64>) -> u64 {
        if z == ZddStore::EMPTY {
            return 0;
        }
        if z == ZddStore::BASE {
            return 1;
        }
        if let Some(&res) = memo.get(&z.0) {
            return res;
        }
        let res = self.path_count_rec(self.low(z), memo) + self.path_count_rec(self.high(z), memo);
        memo.insert(z.0, res);
        res
    }

    /// Irredundant sum-of-products cover of the BDD `f` (Minato's
    /// algorithm). The round-trip invariant `cover_to_bdd(isop(f)) == f`
    /// is asserted before returning.
    pub fn isop(&mut self, man: &mut Manager, f: Ref) -> ZRef {
        let (cover, g) = self.isop_rec(man, f, f);
        assert!(g == f, "isop cover disagrees with its input");
        let back = self.cover_to_bdd(man, cover);
        assert!(back == f, "isop cover does not round-trip");
        cover
    }

    fn isop_rec(&mut self, man: &mut Manager, l: Ref, u: Ref) -> (ZRef, Ref) {
        if l == Manager::ZERO {
            return (ZddStore::EMPTY, Manager::ZERO);
        }
        if u == Manager::ONE {
            return (ZddStore::BASE, Manager::ONE);
        }
        let key = (l.raw(), u.raw());
        if let Some(&res) = self.isop_cache.get(&key) {
            return res;
        }
        let v = man.var(l).min(man.var(u));
        let (l0, l1) = man.cofactors(l, v);
        let (u0, u1) = man.cofactors(u, v);

        // minterms that can only be covered with the negative / positive literal
        let lx0 = man.and(l0, !u1);
        let lx1 = man.and(l1, !u0);
        let (c0, f0) = self.isop_rec(man, lx0, u0);
        let (c1, f1) = self.isop_rec(man, lx1, u1);

        // what is left goes into literal-free products
        let r0 = man.and(l0, !f0);
        let r1 = man.and(l1, !f1);
        let ld = man.or(r0, r1);
        let ud = man.and(u0, u1);
        let (cd, fd) = self.isop_rec(man, ld, ud);

        let low = self.mk_node(2 * v + 1, cd, c0);
        let cover = self.mk_node(2 * v, low, c1);

        let lit = man.ithvar(v);
        let pos = man.and(lit, f1);
        let neg = man.and(!lit, f0);
        let sum = man.or(pos, neg);
        let func = man.or(sum, fd);

        self.isop_cache.insert(key, (cover, func));
        (cover, func)
    }

    /// Characteristic BDD of a cover
    pub fn cover_to_bdd(&mut self, man: &mut Manager, z: ZRef) -> Ref {
        let mut memo = FxHashMap::default();
        self.cover_to_bdd_rec(man, z, &mut memo)
    }

    fn cover_to_bdd_rec(
        &mut self,
        man: &mut Manager,
        z: ZRef,
        memo: &mut FxHashMap<u32, Ref>,
    ) -> Ref {
        if z == ZddStore::EMPTY {
            return Manager::ZERO;
        }
        if z == ZddStore::BASE {
            return Manager::ONE;
        }
        if let Some(&res) = memo.get(&z.0) {
            return res;
        }
        let zv = self.var(z);
        let var = man.ithvar(zv / 2);
        let lit = if zv & 1 != 0 { !var } else { var };
        let high = self.cover_to_bdd_rec(man, self.high(z), memo);
        let low = self.cover_to_bdd_rec(man, self.low(z), memo);
        let here = man.and(lit, high);
        let res = man.or(here, low);
        memo.insert(z.0, res);
        res
    }

    /// Enumerate the products of a cover as sequences of signed literals:
    /// `+v` for the variable, `-v` for its negation
    pub fn products(&self, z: ZRef) -> Vec<Vec<i32>> {
        let mut res = Vec::new();
        let mut stack: Vec<(ZRef, Vec<i32>)> = vec![(z, Vec::new())];
        while let Some((r, product)) = stack.pop() {
            if r == ZddStore::EMPTY {
                continue;
            }
            if r == ZddStore::BASE {
                res.push(product);
                continue;
            }
            let zv = self.var(r);
            let lit = if zv & 1 != 0 { -((zv / 2) as i32) } else { (zv / 2) as i32 };
            stack.push((self.low(r), product.clone()));
            let mut with = product;
            with.push(lit);
            stack.push((self.high(r), with));
        }
        res
    }
}

impl Default for ZddStore {
    fn default() -> ZddStore {
        ZddStore::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isop_simple() {
        let mut man = Manager::new(16);
        let mut zdd = ZddStore::new();
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let f = man.and(x, !y);
        let cover = zdd.isop(&mut man, f);
        assert_eq!(zdd.path_count(cover), 1);
        let products = zdd.products(cover);
        assert_eq!(products.len(), 1);
        let mut p = products[0].clone();
        p.sort_unstable_by_key(|l| l.abs());
        assert_eq!(p, vec![1, -2]);
    }

    #[test]
    fn test_isop_or() {
        let mut man = Manager::new(16);
        let mut zdd = ZddStore::new();
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let f = man.or(x, y);
        let cover = zdd.isop(&mut man, f);
        // x + y is already irredundant
        assert_eq!(zdd.path_count(cover), 2);
    }

    #[test]
    fn test_isop_round_trip_random_functions() {
        let mut man = Manager::new(18);
        let mut zdd = ZddStore::new();
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let z = man.ithvar(3);
        let xy = man.and(x, y);
        let yz = man.and(y, z);
        let xz = man.and(x, z);
        let maj = {
            let a = man.or(xy, yz);
            man.or(a, xz)
        };
        let xor3 = {
            let a = man.xor(x, y);
            man.xor(a, z)
        };
        for f in [maj, xor3, !maj, !xor3, xy, !xy] {
            // isop() itself asserts the round-trip
            let cover = zdd.isop(&mut man, f);
            let g = zdd.cover_to_bdd(&mut man, cover);
            assert_eq!(g, f);
        }
    }

    #[test]
    fn test_constants() {
        let mut man = Manager::new(16);
        let mut zdd = ZddStore::new();
        assert_eq!(zdd.isop(&mut man, Manager::ZERO), ZddStore::EMPTY);
        assert_eq!(zdd.isop(&mut man, Manager::ONE), ZddStore::BASE);
    }
}
