//! Symbolic parity game over decision diagrams
//!
//! The game is a tuple of variable groups in the order
//! `uap < cap < s < p < ns` plus two relations: `trans`, the characteristic
//! function of the legal transitions, and `strategies`, the controller's
//! choice function once the game is solved. Both are deterministic in
//! `(s, uap, cap)`: any assignment admits a unique `(p, ns)`.

use std::io::Write;

use log::{debug, info};
use rustc_hash::FxHashMap;

use crate::builder::StateEncoding;
use crate::dd::{Manager, Ref};
use crate::game::{Owner, ParityGame};

/// Symbolic two-player parity game
#[derive(Debug, Clone)]
pub struct SymGame {
    /// Variables of the uncontrollable propositions
    pub uap_vars: Vec<u32>,
    /// Variables of the controllable propositions
    pub cap_vars: Vec<u32>,
    /// Current-state variables
    pub s_vars: Vec<u32>,
    /// Priority variables of the chosen transition
    pub p_vars: Vec<u32>,
    /// Next-state variables
    pub ns_vars: Vec<u32>,
    /// Transition relation over `(s, uap, cap, p, ns)`
    pub trans: Ref,
    /// Controller choice function over `(s, uap, cap)`; false until solved
    pub strategies: Ref,
    /// Number of automaton states
    pub num_states: usize,
    /// Number of state bits
    pub statebits: usize,
    /// Number of priority bits
    pub priobits: usize,
    /// Upper bound on the adjusted priorities
    pub max_priority: u32,
    /// State encoding policy
    pub encoding: StateEncoding,
    /// Proposition names, for the AIG symbol table
    pub ap_names: Vec<String>,
    /// Controllable proposition indices
    pub controllable: Vec<u32>,
}

/// A vertex set of the split game, layer by layer: round-start vertices over
/// `s`, controller-choice vertices over `(s, uap)` and forced transition
/// vertices over `(p, ns)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    states: Ref,
    inter: Ref,
    targets: Ref,
}

impl Region {
    const EMPTY: Region = Region {
        states: Manager::ZERO,
        inter: Manager::ZERO,
        targets: Manager::ZERO,
    };

    fn is_empty(self) -> bool {
        self == Region::EMPTY
    }

    fn minus(self, man: &mut Manager, other: Region) -> Region {
        Region {
            states: man.and(self.states, !other.states),
            inter: man.and(self.inter, !other.inter),
            targets: man.and(self.targets, !other.targets),
        }
    }

    fn union(self, man: &mut Manager, other: Region) -> Region {
        Region {
            states: man.or(self.states, other.states),
            inter: man.or(self.inter, other.inter),
            targets: man.or(self.targets, other.targets),
        }
    }
}

/// Explicit export of a symbolic game, with the diagram cube of every
/// vertex so an external solver's strategy can be lifted back
pub struct ExplicitExport {
    /// The explicit game; automaton states come first, in order
    pub game: ParityGame,
    /// Vertex id to diagram cube
    pub cubes: FxHashMap<u32, Ref>,
    /// Vertices where the controller picks a transition
    pub choice_vertices: Vec<u32>,
}

impl SymGame {
    /// Cube of a concrete state over the current-state variables
    pub fn state_cube(&self, man: &mut Manager, state: u32) -> Ref {
        let lits = self.encoding.lits(&self.s_vars, state);
        man.cube(&lits)
    }

    fn pns_vars(&self) -> Vec<u32> {
        let mut vars = self.p_vars.clone();
        vars.extend(&self.ns_vars);
        vars
    }

    fn decode_target(&self, man: &Manager, f: Ref) -> (u32, u32) {
        let vars = self.pns_vars();
        let value = man.decode_cube(f, &vars);
        let prio = (value >> self.statebits) as u32;
        let mask = (1u64 << self.statebits) - 1;
        let state = self.encoding.decode(value & mask, self.statebits);
        (prio, state)
    }

    /// Solve the game with the internal fixed-point solver. On a realizable
    /// game this also fills `strategies`. Returns realizability.
    pub fn solve(&mut self, man: &mut Manager) -> bool {
        let mut quant = self.uap_vars.clone();
        quant.extend(&self.cap_vars);
        let mut no_state = quant.clone();
        quant.extend(&self.pns_vars());
        quant.sort_unstable();
        no_state.extend(&self.s_vars);
        no_state.sort_unstable();

        let valid = man.exists(self.trans, &quant);
        let range = man.exists(self.trans, &no_state);
        let full = Region {
            states: valid,
            inter: valid,
            targets: range,
        };
        let (w_ctrl, w_env, sigma) = self.zielonka(man, full);
        debug!("solved: ctrl {} / env {}", w_ctrl.states, w_env.states);

        let s0 = self.state_cube(man, 0);
        let realizable = man.and(w_ctrl.states, s0) != Manager::ZERO;
        if realizable {
            self.strategies = sigma;
        }
        realizable
    }

    fn zielonka(&self, man: &mut Manager, r: Region) -> (Region, Region, Ref) {
        if r.is_empty() {
            return (Region::EMPTY, Region::EMPTY, Manager::ZERO);
        }
        let Some(d) = self.max_priority_in(man, r.targets) else {
            // no transitions left: the controller is stuck everywhere
            return (Region::EMPTY, r, Manager::ZERO);
        };
        let alpha_ctrl = d % 2 == 0;

        let pcube = man.value_cube(&self.p_vars, d as u64);
        let dtargets = man.and(r.targets, pcube);
        let seed = Region {
            states: Manager::ZERO,
            inter: Manager::ZERO,
            targets: dtargets,
        };
        let (a, sigma_a) = self.attract(man, r, seed, alpha_ctrl);
        let r1 = r.minus(man, a);
        let (w0, w1, sig1) = self.zielonka(man, r1);
        let opponent_win = if alpha_ctrl { w1 } else { w0 };

        if opponent_win.is_empty() {
            if alpha_ctrl {
                let sigma = man.or(sig1, sigma_a);
                (r, Region::EMPTY, sigma)
            } else {
                (Region::EMPTY, r, Manager::ZERO)
            }
        } else {
            let (b, sigma_b) = self.attract(man, r, opponent_win, !alpha_ctrl);
            let r2 = r.minus(man, b);
            let (w0s, w1s, sig2) = self.zielonka(man, r2);
            if alpha_ctrl {
                (w0s, w1s.union(man, b), sig2)
            } else {
                let sigma = man.or(sig2, sigma_b);
                let sigma = man.or(sigma, sig1);
                (w0s.union(man, b), w1s, sigma)
            }
        }
    }

    fn max_priority_in(&self, man: &mut Manager, targets: Ref) -> Option<u32> {
        for d in (1..=self.max_priority).rev() {
            let pcube = man.value_cube(&self.p_vars, d as u64);
            if man.and(targets, pcube) != Manager::ZERO {
                return Some(d);
            }
        }
        None
    }

    /// Attractor of `seed` for the given player within `r`. For the
    /// controller the recorded choices are returned as a strategy diagram.
    fn attract(
        &self,
        man: &mut Manager,
        r: Region,
        seed: Region,
        for_ctrl: bool,
    ) -> (Region, Ref) {
        let pns = {
            let mut v = self.pns_vars();
            v.sort_unstable();
            v
        };
        // moves that stay inside the region
        let avail = man.and_exists(self.trans, r.targets, &pns);
        let mut z = seed;
        let mut sigma = Manager::ZERO;
        loop {
            let mut changed = false;

            // forced transition vertices whose successor state is attracted
            let zns = man.rename(z.states, &self.s_vars, &self.ns_vars);
            let t = man.and(r.targets, zns);
            let nt = man.and(t, !z.targets);
            if nt != Manager::ZERO {
                z.targets = man.or(z.targets, nt);
                changed = true;
            }

            // controller-choice vertices
            let into = man.and_exists(self.trans, z.targets, &pns);
            let pred = if for_ctrl {
                man.exists(into, &self.cap_vars)
            } else {
                let ok = man.or(!avail, into);
                man.forall(ok, &self.cap_vars)
            };
            let pred = man.and(r.inter, pred);
            let ni = man.and(pred, !z.inter);
            if ni != Manager::ZERO {
                if for_ctrl {
                    let chosen = man.and(ni, into);
                    sigma = man.or(sigma, chosen);
                }
                z.inter = man.or(z.inter, ni);
                changed = true;
            }

            // round-start vertices
            let pred = if for_ctrl {
                let escape = man.and(r.inter, !z.inter);
                let can_escape = man.exists(escape, &self.uap_vars);
                !can_escape
            } else {
                man.exists(z.inter, &self.uap_vars)
            };
            let pred = man.and(r.states, pred);
            let ns = man.and(pred, !z.states);
            if ns != Manager::ZERO {
                z.states = man.or(z.states, ns);
                changed = true;
            }

            if !changed {
                return (z, sigma);
            }
        }
    }

    /// Lift an explicit solver's strategy into the choice function: each
    /// pair maps the `(s, uap)` set of a controller vertex to the `(p, ns)`
    /// cube of its chosen successor
    pub fn apply_strategy(&mut self, man: &mut Manager, pairs: &[(Ref, Ref)]) {
        let pns = {
            let mut v = self.pns_vars();
            v.sort_unstable();
            v
        };
        let mut strategies = Manager::ZERO;
        for &(a, b) in pairs {
            let moves = man.and_exists(self.trans, b, &pns);
            let applied = man.and(a, moves);
            assert!(
                applied != Manager::ZERO,
                "no admissible controller choice when applying the strategy"
            );
            strategies = man.or(strategies, applied);
        }
        self.strategies = strategies;
    }

    /// Export the game as an explicit parity game for an external solver
    pub fn to_explicit(&self, man: &mut Manager) -> ExplicitExport {
        self.relation_to_explicit(man, self.trans)
    }

    /// Witness parity game of the solved strategy, fully won by the
    /// controller
    pub fn strategy_to_pg(&self, man: &mut Manager) -> ParityGame {
        let rel = man.and(self.trans, self.strategies);
        self.relation_to_explicit(man, rel).game
    }

    fn relation_to_explicit(&self, man: &mut Manager, rel: Ref) -> ExplicitExport {
        let boundary = self
            .cap_vars
            .first()
            .copied()
            .unwrap_or(self.p_vars[0]);
        let mut game = ParityGame::new();
        let mut cubes = FxHashMap::default();
        let mut choice_vertices = Vec::new();

        // states with any transition left come first, keeping their order
        let mut state_vertex = FxHashMap::default();
        let mut restricted = Vec::new();
        for state in 0..self.num_states as u32 {
            let lits = self.encoding.lits(&self.s_vars, state);
            let t = man.restrict(rel, &lits);
            if t == Manager::ZERO {
                continue;
            }
            let v = game.add_vertex(0, Owner::Environment, Some(state.to_string()));
            let cube = man.cube(&lits);
            cubes.insert(v, cube);
            state_vertex.insert(state, v);
            restricted.push((state, v, t));
        }

        for (state, v, t) in restricted {
            let s_cube = cubes[&v];
            let mut prio_vertices: FxHashMap<u64, u32> = FxHashMap::default();
            for (sub, cond) in man.collect_subroots(t, boundary) {
                let vinter =
                    game.add_vertex(0, Owner::Controller, Some(format!("from {}", state)));
                let vertex_cube = man.and(s_cube, cond);
                cubes.insert(vinter, vertex_cube);
                choice_vertices.push(vinter);
                game.add_edge(v, vinter);

                for (tgt, _cond) in man.collect_subroots(sub, self.p_vars[0]) {
                    let (prio, succ) = self.decode_target(man, tgt);
                    let vfin = *prio_vertices.entry(man.decode_cube(tgt, &self.pns_vars())).or_insert_with(|| {
                        let vfin = game.add_vertex(prio, Owner::Controller, None);
                        cubes.insert(vfin, tgt);
                        let target_vertex = *state_vertex
                            .get(&succ)
                            .expect("transition target escapes the relation");
                        game.add_edge(vfin, target_vertex);
                        vfin
                    });
                    game.add_edge(vinter, vfin);
                }
            }
        }
        ExplicitExport {
            game,
            cubes,
            choice_vertices,
        }
    }

    /// Determinise the controller choice and restrict the strategy to the
    /// states reachable from the initial state under it
    pub fn post_process(&mut self, man: &mut Manager) {
        self.strategies = man.determinize(self.strategies, &self.cap_vars);

        let rel = man.and(self.trans, self.strategies);
        let mut quant = self.uap_vars.clone();
        quant.extend(&self.cap_vars);
        quant.extend(&self.s_vars);
        quant.extend(&self.p_vars);
        quant.sort_unstable();

        let mut reach = self.state_cube(man, 0);
        loop {
            let img = man.and_exists(rel, reach, &quant);
            let img_s = man.rename(img, &self.ns_vars, &self.s_vars);
            let next = man.or(reach, img_s);
            if next == reach {
                break;
            }
            reach = next;
        }
        self.strategies = man.and(self.strategies, reach);
        info!("post processed strategy: {} nodes", man.node_count(self.strategies));
    }

    /// Re-encode a binary game into the one-hot policy, allocating fresh
    /// state variables
    pub fn to_onehot(&self, man: &mut Manager) -> SymGame {
        if self.encoding == StateEncoding::OneHot {
            return self.clone();
        }
        let n = self.num_states;
        let enc = StateEncoding::OneHot;
        let s_oh = man.fresh_vars(n);
        let ns_oh = man.fresh_vars(n);
        let ns_start = self.ns_vars[0];

        let mut trans = Manager::ZERO;
        let mut strategies = Manager::ZERO;
        for state in 0..n as u32 {
            let bin_lits = self.encoding.lits(&self.s_vars, state);
            let oh_lits = enc.lits(&s_oh, state);
            let t = man.restrict(self.trans, &bin_lits);
            if t != Manager::ZERO {
                let mut memo = FxHashMap::default();
                let old_ns = self.ns_vars.clone();
                let bits = self.statebits;
                let old_enc = self.encoding;
                let t_oh = remap_targets(man, t, ns_start, &old_ns, &mut |man, value| {
                    let target = old_enc.decode(value, bits);
                    let lits = enc.lits(&ns_oh, target);
                    man.cube(&lits)
                }, &mut memo);
                let cube = man.cube(&oh_lits);
                let part = man.and(cube, t_oh);
                trans = man.or(trans, part);
            }
            let sigma = man.restrict(self.strategies, &bin_lits);
            if sigma != Manager::ZERO {
                let cube = man.cube(&oh_lits);
                let part = man.and(cube, sigma);
                strategies = man.or(strategies, part);
            }
        }
        let well_s = enc.wellformed(man, &s_oh, n);
        trans = man.and(trans, well_s);
        let well_ns = enc.wellformed(man, &ns_oh, n);
        trans = man.and(trans, well_ns);

        SymGame {
            uap_vars: self.uap_vars.clone(),
            cap_vars: self.cap_vars.clone(),
            s_vars: s_oh,
            p_vars: self.p_vars.clone(),
            ns_vars: ns_oh,
            trans,
            strategies,
            num_states: n,
            statebits: n,
            priobits: self.priobits,
            max_priority: self.max_priority,
            encoding: enc,
            ap_names: self.ap_names.clone(),
            controllable: self.controllable.clone(),
        }
    }

    /// Print the Mealy machine of the solved strategy in KISS2 format
    pub fn write_kiss(&self, man: &mut Manager, out: &mut dyn Write) -> std::io::Result<()> {
        let rel = man.and(self.trans, self.strategies);
        let mut uc_vars = self.uap_vars.clone();
        uc_vars.extend(&self.cap_vars);

        let mut lines = Vec::new();
        for state in 0..self.num_states as u32 {
            let lits = self.encoding.lits(&self.s_vars, state);
            let r = man.restrict(rel, &lits);
            if r == Manager::ZERO {
                continue;
            }
            for (tgt, cond) in man.collect_subroots(r, self.p_vars[0]) {
                let (_prio, succ) = self.decode_target(man, tgt);
                for path in man.paths(cond, &uc_vars) {
                    let bits = |range: std::ops::Range<usize>| -> String {
                        path[range]
                            .iter()
                            .map(|b| match b {
                                Some(true) => '1',
                                Some(false) => '0',
                                None => '-',
                            })
                            .collect()
                    };
                    let inputs = bits(0..self.uap_vars.len());
                    let outputs = bits(self.uap_vars.len()..uc_vars.len());
                    lines.push(format!("{} S{} S{} {}", inputs, state, succ, outputs));
                }
            }
        }

        writeln!(out, ".i {}", self.uap_vars.len())?;
        writeln!(out, ".o {}", self.cap_vars.len())?;
        writeln!(out, ".p {}", lines.len())?;
        writeln!(out, ".s {}", self.num_states)?;
        writeln!(out, ".r S0")?;
        for line in lines {
            writeln!(out, "{}", line)?;
        }
        writeln!(out, ".e")
    }
}

/// Rebuild a relation with its next-state cubes replaced through `rebuild`,
/// which receives the packed old next-state valuation
pub(crate) fn remap_targets(
    man: &mut Manager,
    f: Ref,
    ns_start: u32,
    old_ns: &[u32],
    rebuild: &mut impl FnMut(&mut Manager, u64) -> Ref,
    memo: &mut FxHashMap<u32, Ref>,
) -> Ref {
    if f == Manager::ZERO {
        return f;
    }
    if let Some(&res) = memo.get(&f.raw()) {
        return res;
    }
    let v = man.var(f);
    let res = if v >= ns_start {
        let value = man.decode_cube(f, old_ns);
        rebuild(man, value)
    } else {
        let (f0, f1) = man.cofactors(f, v);
        let low = remap_targets(man, f0, ns_start, old_ns, rebuild, memo);
        let high = remap_targets(man, f1, ns_start, old_ns, rebuild, memo);
        man.mk_node(v, low, high)
    };
    memo.insert(f.raw(), res);
    res
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::automaton::{Automaton, Label, ParityAcceptance, State, Transition};
    use crate::builder::build_symbolic;
    use crate::game::{Solver, ZielonkaSolver};

    fn trivial_realizable() -> Automaton {
        // single state, self loop on priority 0, min-even parity
        Automaton {
            ap_names: vec![],
            controllable: vec![],
            num_acc_sets: 1,
            parity: ParityAcceptance { max: false, even: true },
            start: 0,
            states: vec![State {
                id: 0,
                name: None,
                label: None,
                acc_sig: None,
                transitions: vec![Transition {
                    label: Some(Label::Bool(true)),
                    successor: 0,
                    acc_sig: Some(0),
                }],
            }],
        }
    }

    fn trivial_unrealizable() -> Automaton {
        // environment proposition only, always-enabled odd transition
        Automaton {
            ap_names: vec!["a".into()],
            controllable: vec![],
            num_acc_sets: 2,
            parity: ParityAcceptance { max: true, even: true },
            start: 0,
            states: vec![State {
                id: 0,
                name: None,
                label: None,
                acc_sig: None,
                transitions: vec![Transition {
                    label: Some(Label::Bool(true)),
                    successor: 0,
                    acc_sig: Some(1),
                }],
            }],
        }
    }

    pub(crate) fn toggle() -> Automaton {
        // g must equal r delayed by one step
        let r = |b: bool| {
            let ap: Label = Label::Ap(0);
            if b {
                ap
            } else {
                Label::Not(Box::new(ap))
            }
        };
        let g = |b: bool| {
            let ap: Label = Label::Ap(1);
            if b {
                ap
            } else {
                Label::Not(Box::new(ap))
            }
        };
        let both = |a: Label, b: Label| Label::And(Box::new(a), Box::new(b));
        let trans = |rb: bool, gb: bool, succ: u32| Transition {
            label: Some(both(r(rb), g(gb))),
            successor: succ,
            acc_sig: Some(0),
        };
        Automaton {
            ap_names: vec!["r".into(), "g".into()],
            controllable: vec![1],
            num_acc_sets: 1,
            parity: ParityAcceptance { max: true, even: true },
            start: 0,
            states: vec![
                State {
                    id: 0,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![trans(true, false, 1), trans(false, false, 0)],
                },
                State {
                    id: 1,
                    name: None,
                    label: None,
                    acc_sig: None,
                    transitions: vec![trans(true, true, 1), trans(false, true, 0)],
                },
            ],
        }
    }

    #[test]
    fn test_solve_trivial_realizable() {
        let mut man = Manager::new(18);
        let auto = trivial_realizable();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        assert!(game.solve(&mut man));
    }

    #[test]
    fn test_solve_trivial_unrealizable() {
        let mut man = Manager::new(18);
        let auto = trivial_unrealizable();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        assert!(!game.solve(&mut man));
    }

    #[test]
    fn test_solve_toggle() {
        let mut man = Manager::new(18);
        let auto = toggle();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        assert!(game.solve(&mut man));
        game.post_process(&mut man);
        // the strategy answers every uncontrollable input from both states
        for state in 0..2u32 {
            let cube = game.state_cube(&mut man, state);
            let here = man.and(game.strategies, cube);
            assert_ne!(here, Manager::ZERO);
            let mut no_cap = game.cap_vars.clone();
            no_cap.sort_unstable();
            let covered = man.exists(here, &no_cap);
            let mut all = game.s_vars.clone();
            all.extend(&game.uap_vars);
            all.sort_unstable();
            let total = man.exists(covered, &all);
            assert_eq!(total, Manager::ONE);
        }
    }

    #[test]
    fn test_explicit_export_matches_internal_solver() {
        let mut man = Manager::new(18);
        let auto = toggle();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        let export = game.to_explicit(&mut man);
        export.game.check().unwrap();
        let solution = ZielonkaSolver.solve(&export.game);
        assert_eq!(solution.winner[0], Owner::Controller);
        assert!(game.solve(&mut man));
    }

    #[test]
    fn test_apply_strategy_from_explicit() {
        let mut man = Manager::new(18);
        let auto = toggle();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        let export = game.to_explicit(&mut man);
        let solution = ZielonkaSolver.solve(&export.game);
        let mut pairs = Vec::new();
        for &v in &export.choice_vertices {
            if solution.winner[v as usize] == Owner::Controller {
                let succ = solution.strategy[v as usize].expect("winning choice vertex");
                pairs.push((export.cubes[&v], export.cubes[&succ]));
            }
        }
        assert!(!pairs.is_empty());
        game.apply_strategy(&mut man, &pairs);
        assert_ne!(game.strategies, Manager::ZERO);
        game.post_process(&mut man);
        let s0 = game.state_cube(&mut man, 0);
        let at0 = man.and(game.strategies, s0);
        assert_ne!(at0, Manager::ZERO);
    }

    #[test]
    fn test_onehot_round_trip() {
        let mut man = Manager::new(18);
        let auto = toggle();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        assert!(game.solve(&mut man));
        game.post_process(&mut man);
        let oh = game.to_onehot(&mut man);
        assert_eq!(oh.statebits, 2);
        assert_eq!(oh.encoding, StateEncoding::OneHot);
        // the one-hot game solves to the same verdict
        let mut oh2 = oh.clone();
        assert!(oh2.solve(&mut man));
    }

    #[test]
    fn test_kiss_output() {
        let mut man = Manager::new(18);
        let auto = toggle();
        let mut game = build_symbolic(&mut man, &auto, StateEncoding::Binary);
        assert!(game.solve(&mut man));
        game.post_process(&mut man);
        let mut buf = Vec::new();
        game.write_kiss(&mut man, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(".i 1\n.o 1\n"));
        assert!(text.contains(".r S0"));
        assert!(text.trim_end().ends_with(".e"));
    }
}
