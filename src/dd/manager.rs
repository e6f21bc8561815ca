use log::debug;
use rustc_hash::FxHashMap;

use crate::dd::reference::Ref;

/// Variable field used by boolean terminals and integer leaves, so that they
/// sort below every decision variable during recursion
const TERMINAL_VAR: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    var: u32,
    low: Ref,
    high: Ref,
}

/// Content-addressed manager for complement-edge BDDs and integer-leaf MTBDDs.
///
/// Nodes are hash-consed into a single arena: handles are stable for the
/// lifetime of the manager, which is what the encoder's memoization and the
/// bisimulation signatures rely on. The arena is bounded by the capacity
/// given at construction; exhausting it aborts, as there is no garbage
/// collection to recover from it.
///
/// Variables are 1-indexed and their numeric order is the diagram order.
pub struct Manager {
    nodes: Vec<Node>,
    unique: FxHashMap<(u32, u32, u32), u32>,
    leaves: FxHashMap<u64, u32>,
    ite_cache: FxHashMap<(u32, u32, u32), Ref>,
    capacity: usize,
    next_var: u32,
}

impl Manager {
    /// Boolean terminal for true
    pub const ONE: Ref = Ref::positive(1);
    /// Boolean terminal for false, the complement of [`Manager::ONE`]
    pub const ZERO: Ref = Ref::new(1, true);

    /// Create a manager with room for `1 << capacity_bits` nodes
    pub fn new(capacity_bits: usize) -> Manager {
        assert!(capacity_bits <= 31, "capacity bits should be in the range 0..=31");
        let mut nodes = Vec::new();
        // index 0 is a sentinel, index 1 the boolean terminal
        nodes.push(Node { var: 0, low: Ref::positive(0), high: Ref::positive(0) });
        nodes.push(Node { var: TERMINAL_VAR, low: Ref::positive(0), high: Ref::positive(0) });
        Manager {
            nodes,
            unique: FxHashMap::default(),
            leaves: FxHashMap::default(),
            ite_cache: FxHashMap::default(),
            capacity: 1usize << capacity_bits,
            next_var: 1,
        }
    }

    /// Allocate `n` fresh variables, returned in diagram order
    pub fn fresh_vars(&mut self, n: usize) -> Vec<u32> {
        let vars: Vec<u32> = (self.next_var..self.next_var + n as u32).collect();
        self.next_var += n as u32;
        vars
    }

    /// Number of nodes currently in the arena
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    fn push_node(&mut self, node: Node) -> u32 {
        if self.nodes.len() >= self.capacity {
            panic!("node table is full ({} nodes)", self.capacity);
        }
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Variable of the top node, or a sentinel above all variables for
    /// terminals and leaves
    pub fn var(&self, r: Ref) -> u32 {
        self.nodes[r.index() as usize].var
    }

    /// Returns true if the handle is the boolean terminal (either polarity)
    pub fn is_bool_terminal(&self, r: Ref) -> bool {
        r.index() == 1
    }

    /// Returns true if the handle is an integer leaf
    pub fn is_int_leaf(&self, r: Ref) -> bool {
        r.index() != 1 && self.var(r) == TERMINAL_VAR
    }

    /// Create (or find) the integer leaf holding `value`
    pub fn leaf(&mut self, value: u64) -> Ref {
        if let Some(&i) = self.leaves.get(&value) {
            return Ref::positive(i);
        }
        let node = Node {
            var: TERMINAL_VAR,
            low: Ref::from_raw(value as u32),
            high: Ref::from_raw((value >> 32) as u32),
        };
        let i = self.push_node(node);
        self.leaves.insert(value, i);
        Ref::positive(i)
    }

    /// Value held by an integer leaf
    pub fn leaf_value(&self, r: Ref) -> u64 {
        assert!(self.is_int_leaf(r), "not an integer leaf: {r}");
        let node = &self.nodes[r.index() as usize];
        ((node.high.raw() as u64) << 32) | node.low.raw() as u64
    }

    /// Create (or find) the node `(var, low, high)`, normalising the
    /// complement mark so the high edge is always positive
    pub fn mk_node(&mut self, var: u32, low: Ref, high: Ref) -> Ref {
        debug_assert!(var >= 1 && var < TERMINAL_VAR, "invalid variable {var}");
        if low == high {
            return low;
        }
        if high.is_negated() {
            return !self.mk_node_raw(var, !low, !high);
        }
        self.mk_node_raw(var, low, high)
    }

    fn mk_node_raw(&mut self, var: u32, low: Ref, high: Ref) -> Ref {
        let key = (var, low.raw(), high.raw());
        if let Some(&i) = self.unique.get(&key) {
            return Ref::positive(i);
        }
        let i = self.push_node(Node { var, low, high });
        self.unique.insert(key, i);
        debug!("mk_node({var}, {low}, {high}) -> @{i}");
        Ref::positive(i)
    }

    /// The function of a single variable
    pub fn ithvar(&mut self, var: u32) -> Ref {
        self.mk_node(var, Manager::ZERO, Manager::ONE)
    }

    /// Cofactors of `r` with respect to variable `v`, with the complement
    /// mark pushed onto the children
    pub fn cofactors(&self, r: Ref, v: u32) -> (Ref, Ref) {
        if self.var(r) != v {
            return (r, r);
        }
        let node = &self.nodes[r.index() as usize];
        if r.is_negated() {
            (!node.low, !node.high)
        } else {
            (node.low, node.high)
        }
    }

    /// If-then-else over boolean diagrams
    pub fn ite(&mut self, f: Ref, g: Ref, h: Ref) -> Ref {
        debug_assert!(!self.is_int_leaf(f) && !self.is_int_leaf(g) && !self.is_int_leaf(h));
        if f == Manager::ONE {
            return g;
        }
        if f == Manager::ZERO {
            return h;
        }
        if g == h {
            return g;
        }
        if g == Manager::ONE && h == Manager::ZERO {
            return f;
        }
        if g == Manager::ZERO && h == Manager::ONE {
            return !f;
        }
        // first argument positive
        let (f, g, h) = if f.is_negated() { (!f, h, g) } else { (f, g, h) };
        // then-branch positive, for a canonical cache entry
        if g.is_negated() {
            let res = self.ite(f, !g, !h);
            return !res;
        }
        let key = (f.raw(), g.raw(), h.raw());
        if let Some(&res) = self.ite_cache.get(&key) {
            return res;
        }
        let v = self
            .var(f)
            .min(self.var(g))
            .min(self.var(h));
        let (f0, f1) = self.cofactors(f, v);
        let (g0, g1) = self.cofactors(g, v);
        let (h0, h1) = self.cofactors(h, v);
        let low = self.ite(f0, g0, h0);
        let high = self.ite(f1, g1, h1);
        let res = self.mk_node(v, low, high);
        self.ite_cache.insert(key, res);
        res
    }

    /// Boolean conjunction
    pub fn and(&mut self, f: Ref, g: Ref) -> Ref {
        self.ite(f, g, Manager::ZERO)
    }

    /// Boolean disjunction
    pub fn or(&mut self, f: Ref, g: Ref) -> Ref {
        self.ite(f, Manager::ONE, g)
    }

    /// Boolean exclusive or
    pub fn xor(&mut self, f: Ref, g: Ref) -> Ref {
        self.ite(f, !g, g)
    }

    /// Conjunction over a slice
    pub fn and_all(&mut self, fs: &[Ref]) -> Ref {
        let mut res = Manager::ONE;
        for &f in fs {
            res = self.and(res, f);
        }
        res
    }

    /// Disjunction over a slice
    pub fn or_all(&mut self, fs: &[Ref]) -> Ref {
        let mut res = Manager::ZERO;
        for &f in fs {
            res = self.or(res, f);
        }
        res
    }

    /// Existential quantification over a sorted set of variables
    pub fn exists(&mut self, f: Ref, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]));
        let mut memo = FxHashMap::default();
        self.exists_rec(f, vars, &mut memo)
    }

    fn exists_rec(&mut self, f: Ref, vars: &[u32], memo: &mut FxHashMap<u32, Ref>) -> Ref {
        if self.is_bool_terminal(f) {
            return f;
        }
        let v = self.var(f);
        let vars = &vars[vars.partition_point(|&x| x < v)..];
        if vars.is_empty() {
            return f;
        }
        if let Some(&res) = memo.get(&f.raw()) {
            return res;
        }
        let (f0, f1) = self.cofactors(f, v);
        let low = self.exists_rec(f0, vars, memo);
        let res = if vars[0] == v {
            if low == Manager::ONE {
                Manager::ONE
            } else {
                let high = self.exists_rec(f1, vars, memo);
                self.or(low, high)
            }
        } else {
            let high = self.exists_rec(f1, vars, memo);
            self.mk_node(v, low, high)
        };
        memo.insert(f.raw(), res);
        res
    }

    /// Universal quantification over a sorted set of variables
    pub fn forall(&mut self, f: Ref, vars: &[u32]) -> Ref {
        let res = self.exists(!f, vars);
        !res
    }

    /// `∃vars. f ∧ g`, computed in one pass
    pub fn and_exists(&mut self, f: Ref, g: Ref, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]));
        let mut memo = FxHashMap::default();
        self.and_exists_rec(f, g, vars, &mut memo)
    }

    fn and_exists_rec(
        &mut self,
        f: Ref,
        g: Ref,
        vars: &[u32],
        memo: &mut FxHashMap<(u32, u32), Ref>,
    ) -> Ref {
        if f == Manager::ZERO || g == Manager::ZERO {
            return Manager::ZERO;
        }
        if f == Manager::ONE {
            return self.exists(g, vars);
        }
        if g == Manager::ONE {
            return self.exists(f, vars);
        }
        let v = self.var(f).min(self.var(g));
        let vars = &vars[vars.partition_point(|&x| x < v)..];
        if vars.is_empty() {
            return self.and(f, g);
        }
        if let Some(&res) = memo.get(&(f.raw(), g.raw())) {
            return res;
        }
        let (f0, f1) = self.cofactors(f, v);
        let (g0, g1) = self.cofactors(g, v);
        let low = self.and_exists_rec(f0, g0, vars, memo);
        let res = if vars[0] == v {
            if low == Manager::ONE {
                Manager::ONE
            } else {
                let high = self.and_exists_rec(f1, g1, vars, memo);
                self.or(low, high)
            }
        } else {
            let high = self.and_exists_rec(f1, g1, vars, memo);
            self.mk_node(v, low, high)
        };
        memo.insert((f.raw(), g.raw()), res);
        res
    }

    /// Restrict a diagram by a partial assignment, sorted by variable.
    /// Works on both boolean diagrams and integer-leaf diagrams.
    pub fn restrict(&mut self, f: Ref, cube: &[(u32, bool)]) -> Ref {
        debug_assert!(cube.windows(2).all(|w| w[0].0 < w[1].0));
        let mut memo = FxHashMap::default();
        self.restrict_rec(f, cube, &mut memo)
    }

    fn restrict_rec(
        &mut self,
        f: Ref,
        cube: &[(u32, bool)],
        memo: &mut FxHashMap<u32, Ref>,
    ) -> Ref {
        if self.is_bool_terminal(f) || self.is_int_leaf(f) {
            return f;
        }
        let v = self.var(f);
        let cube = &cube[cube.partition_point(|&(x, _)| x < v)..];
        if cube.is_empty() {
            return f;
        }
        if let Some(&res) = memo.get(&f.raw()) {
            return res;
        }
        let (f0, f1) = self.cofactors(f, v);
        let res = if cube[0].0 == v {
            let child = if cube[0].1 { f1 } else { f0 };
            self.restrict_rec(child, &cube[1..], memo)
        } else {
            let low = self.restrict_rec(f0, cube, memo);
            let high = self.restrict_rec(f1, cube, memo);
            self.mk_node(v, low, high)
        };
        memo.insert(f.raw(), res);
        res
    }

    /// Build the cube of a sorted partial assignment
    pub fn cube(&mut self, lits: &[(u32, bool)]) -> Ref {
        debug_assert!(lits.windows(2).all(|w| w[0].0 < w[1].0));
        let mut res = Manager::ONE;
        for &(v, b) in lits.iter().rev() {
            res = if b {
                self.mk_node(v, Manager::ZERO, res)
            } else {
                self.mk_node(v, res, Manager::ZERO)
            };
        }
        res
    }

    /// Cube encoding `value` over `vars`, most significant bit first
    pub fn value_cube(&mut self, vars: &[u32], value: u64) -> Ref {
        let lits = value_lits(vars, value);
        self.cube(&lits)
    }

    /// If-then-else where the branches are integer-leaf diagrams
    pub fn ite_mt(&mut self, f: Ref, g: Ref, h: Ref) -> Ref {
        debug_assert!(!self.is_int_leaf(f));
        if f == Manager::ONE {
            return g;
        }
        if f == Manager::ZERO {
            return h;
        }
        if g == h {
            return g;
        }
        let v = self
            .var(f)
            .min(self.var(g))
            .min(self.var(h));
        debug_assert!(v != TERMINAL_VAR);
        let (f0, f1) = self.cofactors(f, v);
        let (g0, g1) = self.cofactors(g, v);
        let (h0, h1) = self.cofactors(h, v);
        let low = self.ite_mt(f0, g0, h0);
        let high = self.ite_mt(f1, g1, h1);
        self.mk_node(v, low, high)
    }

    /// Collect the distinct integer leaves of a diagram
    pub fn collect_leaves(&self, f: Ref, out: &mut Vec<u64>) {
        let mut seen = FxHashMap::default();
        let mut stack = vec![f];
        while let Some(r) = stack.pop() {
            if r == Manager::ZERO || r == Manager::ONE {
                continue;
            }
            if seen.insert(r.raw(), ()).is_some() {
                continue;
            }
            if self.is_int_leaf(r) {
                out.push(self.leaf_value(r));
                continue;
            }
            let node = &self.nodes[r.index() as usize];
            stack.push(node.low);
            stack.push(node.high);
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Replace each `(priority << 32 | state)` leaf by its cube over the
    /// priority and next-state variables, turning an eagerly built
    /// transition diagram into a plain BDD
    pub fn split_leaves(&mut self, f: Ref, p_vars: &[u32], ns_vars: &[u32]) -> Ref {
        let mut memo = FxHashMap::default();
        self.split_leaves_rec(f, p_vars, ns_vars, &mut memo)
    }

    fn split_leaves_rec(
        &mut self,
        f: Ref,
        p_vars: &[u32],
        ns_vars: &[u32],
        memo: &mut FxHashMap<u32, Ref>,
    ) -> Ref {
        if f == Manager::ZERO {
            return f;
        }
        if let Some(&res) = memo.get(&f.raw()) {
            return res;
        }
        let res = if self.is_int_leaf(f) {
            let value = self.leaf_value(f);
            let prio = value >> 32;
            let state = value & 0xffff_ffff;
            let mut lits = value_lits(p_vars, prio);
            lits.extend(value_lits(ns_vars, state));
            self.cube(&lits)
        } else {
            assert!(f != Manager::ONE, "unexpected boolean terminal in transition diagram");
            let v = self.var(f);
            let (f0, f1) = self.cofactors(f, v);
            let low = self.split_leaves_rec(f0, p_vars, ns_vars, memo);
            let high = self.split_leaves_rec(f1, p_vars, ns_vars, memo);
            self.mk_node(v, low, high)
        };
        memo.insert(f.raw(), res);
        res
    }

    /// Distinct sub-diagrams whose top variable is at or below `boundary`,
    /// together with the disjunction of the path conditions reaching them.
    /// Dead (false) branches are skipped. The result is in first-visit order.
    pub fn collect_subroots(&mut self, f: Ref, boundary: u32) -> Vec<(Ref, Ref)> {
        let mut order: Vec<Ref> = Vec::new();
        let mut conds: FxHashMap<u32, Ref> = FxHashMap::default();
        let mut stack = vec![(f, Manager::ONE)];
        while let Some((r, cond)) = stack.pop() {
            if r == Manager::ZERO {
                continue;
            }
            if self.is_bool_terminal(r) || self.is_int_leaf(r) || self.var(r) >= boundary {
                match conds.get(&r.raw()).copied() {
                    Some(prev) => {
                        let merged = self.or(prev, cond);
                        conds.insert(r.raw(), merged);
                    }
                    None => {
                        order.push(r);
                        conds.insert(r.raw(), cond);
                    }
                }
                continue;
            }
            let v = self.var(r);
            let (f0, f1) = self.cofactors(r, v);
            let lit = self.ithvar(v);
            let cond0 = self.and(cond, !lit);
            let cond1 = self.and(cond, lit);
            stack.push((f0, cond0));
            stack.push((f1, cond1));
        }
        order
            .into_iter()
            .map(|r| (r, conds[&r.raw()]))
            .collect()
    }

    /// Decode a full positive cube over exactly `vars`, most significant bit
    /// first. Panics if the diagram is not such a cube: the transition
    /// relation is deterministic, so a skipped variable would mean two
    /// distinct targets.
    pub fn decode_cube(&self, f: Ref, vars: &[u32]) -> u64 {
        assert!(vars.len() <= 64, "cannot pack {} variables into a value", vars.len());
        let mut value = 0u64;
        let mut r = f;
        for &v in vars {
            assert!(
                self.var(r) == v,
                "nondeterministic target: variable {v} is unconstrained"
            );
            let (f0, f1) = self.cofactors(r, v);
            value <<= 1;
            if f0 == Manager::ZERO {
                value |= 1;
                r = f1;
            } else {
                assert!(f1 == Manager::ZERO, "nondeterministic target at variable {v}");
                r = f0;
            }
        }
        assert!(r == Manager::ONE, "not a cube over the given variables");
        value
    }

    /// Pick, for every assignment of the remaining variables, the
    /// lexicographically smallest satisfying assignment of `vars`
    pub fn determinize(&mut self, f: Ref, vars: &[u32]) -> Ref {
        let mut f = f;
        for (i, &v) in vars.iter().enumerate() {
            let rest: Vec<u32> = vars[i + 1..].to_vec();
            let f0 = self.restrict(f, &[(v, false)]);
            let f1 = self.restrict(f, &[(v, true)]);
            let feasible0 = self.exists(f0, &rest);
            let lit = self.ithvar(v);
            let keep0 = self.and(feasible0, !lit);
            let t0 = self.and(keep0, f0);
            let keep1 = self.and(!feasible0, lit);
            let t1 = self.and(keep1, f1);
            f = self.or(t0, t1);
        }
        f
    }

    /// Rename the support of `f` through an order-preserving variable map.
    /// `from` and `to` must be sorted; the support of `f` must be contained
    /// in `from`.
    pub fn rename(&mut self, f: Ref, from: &[u32], to: &[u32]) -> Ref {
        assert_eq!(from.len(), to.len());
        let map: FxHashMap<u32, u32> = from.iter().copied().zip(to.iter().copied()).collect();
        let mut memo = FxHashMap::default();
        self.rename_rec(f, &map, &mut memo)
    }

    fn rename_rec(
        &mut self,
        f: Ref,
        map: &FxHashMap<u32, u32>,
        memo: &mut FxHashMap<u32, Ref>,
    ) -> Ref {
        if self.is_bool_terminal(f) {
            return f;
        }
        if let Some(&res) = memo.get(&f.raw()) {
            return res;
        }
        let v = self.var(f);
        let nv = *map
            .get(&v)
            .unwrap_or_else(|| panic!("variable {v} is not in the renaming"));
        let (f0, f1) = self.cofactors(f, v);
        let low = self.rename_rec(f0, map, memo);
        let high = self.rename_rec(f1, map, memo);
        let res = self.mk_node(nv, low, high);
        memo.insert(f.raw(), res);
        res
    }

    /// Variables occurring in the diagram, sorted
    pub fn support(&self, f: Ref) -> Vec<u32> {
        let mut seen = FxHashMap::default();
        let mut vars = Vec::new();
        let mut stack = vec![f];
        while let Some(r) = stack.pop() {
            if self.is_bool_terminal(r) || self.is_int_leaf(r) {
                continue;
            }
            if seen.insert(r.index(), ()).is_some() {
                continue;
            }
            vars.push(self.var(r));
            let node = &self.nodes[r.index() as usize];
            stack.push(node.low);
            stack.push(node.high);
        }
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    /// Number of distinct nodes in the diagram, terminals included
    pub fn node_count(&self, f: Ref) -> usize {
        let mut seen = FxHashMap::default();
        let mut stack = vec![f];
        let mut count = 0;
        while let Some(r) = stack.pop() {
            if seen.insert(r.index(), ()).is_some() {
                continue;
            }
            count += 1;
            if self.is_bool_terminal(r) || self.is_int_leaf(r) {
                continue;
            }
            let node = &self.nodes[r.index() as usize];
            stack.push(node.low);
            stack.push(node.high);
        }
        count
    }

    /// Evaluate a boolean diagram under a total assignment
    pub fn eval(&self, f: Ref, assignment: &dyn Fn(u32) -> bool) -> bool {
        let mut r = f;
        loop {
            if self.is_bool_terminal(r) {
                return !r.is_negated();
            }
            let v = self.var(r);
            let (f0, f1) = self.cofactors(r, v);
            r = if assignment(v) { f1 } else { f0 };
        }
    }

    /// Enumerate the satisfying paths of `f` over `vars` as partial
    /// assignments; `None` marks a variable the path does not constrain
    pub fn paths(&self, f: Ref, vars: &[u32]) -> Vec<Vec<Option<bool>>> {
        let mut res = Vec::new();
        let mut stack: Vec<(Ref, usize, Vec<Option<bool>>)> = vec![(f, 0, Vec::new())];
        while let Some((r, mut pos, mut path)) = stack.pop() {
            if r == Manager::ZERO {
                continue;
            }
            let v = self.var(r);
            // variables skipped on this path are unconstrained
            while pos < vars.len() && (self.is_bool_terminal(r) || vars[pos] < v) {
                path.push(None);
                pos += 1;
            }
            if self.is_bool_terminal(r) {
                res.push(path);
                continue;
            }
            assert!(pos < vars.len() && vars[pos] == v, "unexpected variable {v} in path");
            let (f0, f1) = self.cofactors(r, v);
            let mut path1 = path.clone();
            path1.push(Some(true));
            stack.push((f1, pos + 1, path1));
            path.push(Some(false));
            stack.push((f0, pos + 1, path));
        }
        res
    }
}

/// Literals of `value` over `vars`, most significant bit first
pub(crate) fn value_lits(vars: &[u32], value: u64) -> Vec<(u32, bool)> {
    let n = vars.len();
    vars.iter()
        .enumerate()
        .map(|(i, &v)| (v, (value >> (n - 1 - i)) & 1 != 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminals() {
        let man = Manager::new(16);
        assert_eq!(Manager::ZERO, !Manager::ONE);
        assert!(man.is_bool_terminal(Manager::ONE));
        assert!(!man.is_int_leaf(Manager::ONE));
    }

    #[test]
    fn test_basic_ops() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        assert_eq!(man.and(x, x), x);
        assert_eq!(man.and(x, !x), Manager::ZERO);
        assert_eq!(man.or(x, !x), Manager::ONE);
        let a = man.and(x, y);
        let b = man.or(!x, !y);
        assert_eq!(a, !b);
        let c = man.xor(x, y);
        let d = man.xor(c, y);
        assert_eq!(d, x);
    }

    #[test]
    fn test_ite_shares_complements() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let f = man.ite(x, y, !y);
        let g = man.ite(x, !y, y);
        assert_eq!(f, !g);
    }

    #[test]
    fn test_exists() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let z = man.ithvar(3);
        let xy = man.and(x, y);
        let f = man.or(xy, z);
        assert_eq!(man.exists(f, &[1, 2, 3]), Manager::ONE);
        let no_z = man.exists(f, &[3]);
        assert_eq!(no_z, Manager::ONE);
        let no_x = man.exists(xy, &[1]);
        assert_eq!(no_x, y);
    }

    #[test]
    fn test_and_exists() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let z = man.ithvar(3);
        let f = man.or(x, y);
        let g = man.or(!x, z);
        let direct = man.and(f, g);
        let expected = man.exists(direct, &[1]);
        assert_eq!(man.and_exists(f, g, &[1]), expected);
    }

    #[test]
    fn test_restrict_and_cube() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let f = man.and(x, y);
        assert_eq!(man.restrict(f, &[(1, true)]), y);
        assert_eq!(man.restrict(f, &[(1, false)]), Manager::ZERO);
        let c = man.cube(&[(1, true), (2, true)]);
        assert_eq!(c, f);
        let v = man.value_cube(&[1, 2], 0b10);
        let expected = man.and(x, !y);
        assert_eq!(v, expected);
        assert_eq!(man.decode_cube(v, &[1, 2]), 0b10);
    }

    #[test]
    fn test_leaves_and_split() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let l1 = man.leaf((3u64 << 32) | 7);
        let l2 = man.leaf((1u64 << 32) | 2);
        let f = man.ite_mt(x, l1, l2);
        let mut leaves = Vec::new();
        man.collect_leaves(f, &mut leaves);
        assert_eq!(leaves, vec![(1u64 << 32) | 2, (3u64 << 32) | 7]);
        // split over 2 priority bits and 3 state bits
        let split = man.split_leaves(f, &[2, 3], &[4, 5, 6]);
        let hi = man.restrict(split, &[(1, true)]);
        let expected_hi = man.value_cube(&[2, 3, 4, 5, 6], (0b11 << 3) | 0b111);
        assert_eq!(hi, expected_hi);
    }

    #[test]
    fn test_determinize() {
        let mut man = Manager::new(16);
        let s = man.ithvar(1);
        let c1 = man.ithvar(2);
        let c2 = man.ithvar(3);
        // allow (c1 c2) in {01, 10, 11} for either s
        let a = man.or(c1, c2);
        let f = man.and(a, Manager::ONE);
        let det = man.determinize(f, &[2, 3]);
        // smallest choice is 01
        let expected = man.and(!c1, c2);
        assert_eq!(det, expected);
        // per-state choices stay separate
        let g1 = man.and(s, c1);
        let g0 = man.and(!s, c2);
        let g = man.or(g1, g0);
        let detg = man.determinize(g, &[2, 3]);
        let lhs = man.and(s, c1);
        let lhs = man.and(lhs, !c2);
        let rhs = man.and(!s, !c1);
        let rhs = man.and(rhs, c2);
        let expected = man.or(lhs, rhs);
        assert_eq!(detg, expected);
    }

    #[test]
    fn test_rename() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let y = man.ithvar(2);
        let f = man.and(x, !y);
        let g = man.rename(f, &[1, 2], &[5, 6]);
        let x5 = man.ithvar(5);
        let y6 = man.ithvar(6);
        let expected = man.and(x5, !y6);
        assert_eq!(g, expected);
    }

    #[test]
    fn test_collect_subroots() {
        let mut man = Manager::new(16);
        let u = man.ithvar(1);
        let c = man.ithvar(2);
        // f = u ? c : !c, subroots at boundary 2 are c and !c
        let f = man.ite(u, c, !c);
        let subs = man.collect_subroots(f, 2);
        assert_eq!(subs.len(), 2);
        let conds: Vec<Ref> = subs.iter().map(|&(_, cond)| cond).collect();
        let merged = man.or(conds[0], conds[1]);
        assert_eq!(merged, Manager::ONE);
        for &(sub, cond) in &subs {
            if sub == c {
                assert_eq!(cond, u);
            } else {
                assert_eq!(sub, !c);
                assert_eq!(cond, !u);
            }
        }
    }

    #[test]
    fn test_paths() {
        let mut man = Manager::new(16);
        let x = man.ithvar(1);
        let z = man.ithvar(3);
        let f = man.and(x, z);
        let paths = man.paths(f, &[1, 2, 3]);
        assert_eq!(paths, vec![vec![Some(true), None, Some(true)]]);
    }
}
