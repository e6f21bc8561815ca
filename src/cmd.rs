//! Command line interface and pipeline orchestration

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::info;
use rustc_hash::FxHashMap;

use crate::aig::{AbcRewriter, Aig};
use crate::bisim::{min_lts_strong, minimize};
use crate::builder::{build_explicit, build_naive, build_symbolic, StateEncoding};
use crate::dd::{Manager, Ref};
use crate::encoder::AigEncoder;
use crate::error::{Error, Result};
use crate::game::{Owner, Solver, ZielonkaSolver};
use crate::hoa;
use crate::symgame::{ExplicitExport, SymGame};

/// Command line arguments
#[derive(Parser)]
#[command(version, about = "Reactive synthesis from parity automata to AIGER circuits")]
pub struct Cli {
    /// Input automaton in HOA format; reads standard input when absent
    pub file: Option<PathBuf>,

    /// Solve the parity game using the internal symbolic solver
    #[arg(long)]
    pub sym: bool,

    /// Use the naive splitting procedure (not recommended)
    #[arg(long)]
    pub naive: bool,

    /// Use the explicit splitting procedure (not recommended)
    #[arg(long)]
    pub explicit: bool,

    /// Only check realizability (no synthesis)
    #[arg(long)]
    pub real: bool,

    /// Apply bisimulation minimisation to the game
    #[arg(long)]
    pub bisim_game: bool,

    /// Apply bisimulation minimisation to the solution
    #[arg(long)]
    pub bisim_sol: bool,

    /// Apply bisimulation minimisation to both game and solution
    #[arg(long)]
    pub bisim: bool,

    /// Use one-hot encoding for the states
    #[arg(long)]
    pub onehot: bool,

    /// Convert BDDs to AIG using ISOP instead of Shannon expansion
    #[arg(long)]
    pub isop: bool,

    /// Encode with ISOP and one-hot states (SOP variant of --isop --onehot)
    #[arg(long)]
    pub sop: bool,

    /// Compress the generated AIG with the external rewriter
    #[arg(long)]
    pub compress: bool,

    /// Compress the generated AIG with the drw and drf passes
    #[arg(long)]
    pub drewrite: bool,

    /// Try all combinations of bisimulation and encoding and write the
    /// smallest AIG
    #[arg(long)]
    pub best: bool,

    /// Just print the parity game (implies --no-solve)
    #[arg(long)]
    pub print_game: bool,

    /// Print the witness parity game
    #[arg(long)]
    pub print_witness: bool,

    /// Print the Mealy machine in KISS format
    #[arg(long)]
    pub print_kiss: bool,

    /// Do not solve, halt after constructing the parity game
    #[arg(long)]
    pub no_solve: bool,

    /// Write an ASCII AIGER file to standard output
    #[arg(short = 'a', long)]
    pub write_ascii: bool,

    /// Write a binary AIGER file to standard output
    #[arg(short = 'b', long)]
    pub write_binary: bool,

    /// Be verbose
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    fn wants_aig(&self) -> bool {
        self.write_ascii || self.write_binary || self.best
    }

    fn check(&self) -> Result<()> {
        if self.naive && self.explicit {
            return Err(Error::Config(
                "--naive and --explicit are mutually exclusive".to_string(),
            ));
        }
        if (self.naive || self.explicit) && self.wants_aig() {
            return Err(Error::Config(
                "--naive and --explicit are incompatible with generating the AIG".to_string(),
            ));
        }
        if (self.naive || self.explicit) && (self.print_kiss || self.print_witness) {
            return Err(Error::Config(
                "--print-kiss and --print-witness need the symbolic strategy".to_string(),
            ));
        }
        if self.write_ascii && self.write_binary {
            return Err(Error::Config(
                "choose one of --write-ascii and --write-binary".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run the pipeline on the configured input; returns the process exit code
pub fn run(cli: &Cli) -> Result<i32> {
    cli.check()?;
    let input = match &cli.file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| Error::resource(path, e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| Error::command("stdin", e))?;
            buf
        }
    };
    run_with_input(cli, &input)
}

/// Run the pipeline on HOA text
pub fn run_with_input(cli: &Cli, input: &str) -> Result<i32> {
    cli.check()?;
    let t_start = Instant::now();
    let automaton = hoa::parse(input)?;
    info!(
        "finished parsing automaton in {:.6} sec.",
        t_start.elapsed().as_secs_f64()
    );
    info!("automaton has {} states.", automaton.states.len());

    let mut man = Manager::new(26);
    let bisim_game = cli.bisim || cli.bisim_game;
    let bisim_sol = cli.bisim || cli.bisim_sol;

    let mut sym: Option<SymGame> = None;
    let realizable;

    if !cli.sym {
        // explicit engine path
        let mut cubes: FxHashMap<u32, Ref> = FxHashMap::default();
        let mut choice_vertices: Vec<u32> = Vec::new();
        let t_split = Instant::now();
        let (mut game, vstart) = if cli.naive {
            build_naive(&automaton)
        } else if cli.explicit {
            build_explicit(&mut man, &automaton)
        } else {
            let mut g = build_symbolic(&mut man, &automaton, StateEncoding::Binary);
            if bisim_game {
                let partition = min_lts_strong(&mut man, &g, false);
                minimize(&mut man, &mut g, &partition);
            }
            let ExplicitExport {
                game,
                cubes: c,
                choice_vertices: cv,
            } = g.to_explicit(&mut man);
            sym = Some(g);
            cubes = c;
            choice_vertices = cv;
            (game, 0)
        };
        info!(
            "finished constructing game in {:.6} sec.",
            t_split.elapsed().as_secs_f64()
        );
        info!(
            "constructed game has {} vertices and {} edges.",
            game.num_vertices(),
            game.num_edges()
        );

        if cli.print_game {
            game.set_label(vstart, "initial");
            game.write_pgsolver(&mut std::io::stdout())
                .map_err(|e| Error::command("stdout", e))?;
            return Ok(0);
        }
        if cli.no_solve {
            return Ok(0);
        }

        // sort so the engine sees priorities in order, then undo
        let t_solve = Instant::now();
        let mapping = game.sort();
        let solution = ZielonkaSolver.solve(&game);
        game.permute(&mapping);
        let mut inverse = vec![0u32; mapping.len()];
        for (old, &new) in mapping.iter().enumerate() {
            inverse[new as usize] = old as u32;
        }
        let winner: Vec<Owner> = (0..mapping.len())
            .map(|v| solution.winner[mapping[v] as usize])
            .collect();
        let strategy: Vec<Option<u32>> = (0..mapping.len())
            .map(|v| solution.strategy[mapping[v] as usize].map(|s| inverse[s as usize]))
            .collect();
        info!(
            "finished solving game in {:.6} sec.",
            t_solve.elapsed().as_secs_f64()
        );

        realizable = winner[vstart as usize] == Owner::Controller;
        if realizable {
            if let Some(g) = sym.as_mut() {
                let mut pairs = Vec::new();
                for &v in &choice_vertices {
                    if winner[v as usize] == Owner::Controller {
                        let succ = strategy[v as usize]
                            .expect("a winning controller vertex has a chosen successor");
                        pairs.push((cubes[&v], cubes[&succ]));
                    }
                }
                g.apply_strategy(&mut man, &pairs);
            }
        }
    } else {
        let t_construct = Instant::now();
        let mut g = build_symbolic(&mut man, &automaton, StateEncoding::Binary);
        info!(
            "finished constructing symbolic game in {:.6} sec.",
            t_construct.elapsed().as_secs_f64()
        );
        if bisim_game {
            let t_bisim = Instant::now();
            let partition = min_lts_strong(&mut man, &g, false);
            minimize(&mut man, &mut g, &partition);
            info!("after bisimulation minimisation: {} blocks.", partition.num_blocks);
            info!(
                "finished bisimulation minimisation of game in {:.6} sec.",
                t_bisim.elapsed().as_secs_f64()
            );
        }
        if cli.print_game {
            let export = g.to_explicit(&mut man);
            export
                .game
                .write_pgsolver(&mut std::io::stdout())
                .map_err(|e| Error::command("stdout", e))?;
            return Ok(0);
        }
        if cli.no_solve {
            return Ok(0);
        }
        let t_solve = Instant::now();
        realizable = g.solve(&mut man);
        info!(
            "finished solving game in {:.6} sec.",
            t_solve.elapsed().as_secs_f64()
        );
        sym = Some(g);
    }

    if cli.real {
        println!("{}", if realizable { "REALIZABLE" } else { "UNREALIZABLE" });
        info!("total time was {:.6} sec.", t_start.elapsed().as_secs_f64());
        return Ok(if realizable { 10 } else { 20 });
    }

    if !realizable {
        info!("game is unrealizable!");
        return Ok(20);
    }
    info!("game is realizable!");

    if cli.naive || cli.explicit {
        // nothing to synthesise from without the symbolic game
        return Ok(10);
    }
    let mut game = sym.expect("symbolic game on the synthesis path");

    let t_post = Instant::now();
    game.post_process(&mut man);
    info!(
        "finished post processing in {:.6} sec.",
        t_post.elapsed().as_secs_f64()
    );

    if cli.best {
        return best_mode(cli, &mut man, &game);
    }

    if bisim_sol {
        let t_bisim = Instant::now();
        let partition = min_lts_strong(&mut man, &game, true);
        minimize(&mut man, &mut game, &partition);
        info!(
            "finished bisimulation minimisation of solution in {:.6} sec.",
            t_bisim.elapsed().as_secs_f64()
        );
    }

    if cli.print_kiss {
        game.write_kiss(&mut man, &mut std::io::stdout())
            .map_err(|e| Error::command("stdout", e))?;
        return Ok(10);
    }
    if cli.print_witness {
        let witness = game.strategy_to_pg(&mut man);
        witness
            .write_pgsolver(&mut std::io::stdout())
            .map_err(|e| Error::command("stdout", e))?;
        return Ok(10);
    }

    let t_encode = Instant::now();
    let mut encoder = AigEncoder::new(&game);
    if cli.isop {
        encoder = encoder.set_isop();
    }
    if cli.onehot {
        encoder = encoder.set_onehot();
    }
    if cli.sop {
        encoder = encoder.set_sop();
    }
    let mut circuit = encoder.encode(&mut man);
    info!("finished encoding in {:.6} sec.", t_encode.elapsed().as_secs_f64());

    apply_rewrites(cli, &mut circuit)?;
    info!("final size of AIG: {} gates.", circuit.num_ands());

    write_circuit(cli, &circuit)?;
    info!("total time was {:.6} sec.", t_start.elapsed().as_secs_f64());
    Ok(10)
}

fn apply_rewrites(cli: &Cli, circuit: &mut Aig) -> Result<()> {
    if cli.drewrite {
        let before = circuit.num_ands();
        circuit.drewrite(&AbcRewriter::default())?;
        info!(
            "size of AIG after drw+drf: {} gates (was {}).",
            circuit.num_ands(),
            before
        );
    }
    if cli.compress {
        let before = circuit.num_ands();
        circuit.compress(&AbcRewriter::default())?;
        info!(
            "size of AIG after compression: {} gates (was {}).",
            circuit.num_ands(),
            before
        );
    }
    Ok(())
}

fn write_circuit(cli: &Cli, circuit: &Aig) -> Result<()> {
    let mut out = std::io::stdout();
    let res = if cli.write_binary {
        circuit.write_binary(&mut out)
    } else if cli.write_ascii {
        circuit.write_ascii(&mut out)
    } else {
        Ok(())
    };
    res.map_err(|e| Error::command("stdout", e))
}

/// Encode every combination of encoder and solution minimisation, rewrite
/// each when requested, and keep the smallest
fn best_mode(cli: &Cli, man: &mut Manager, game: &SymGame) -> Result<i32> {
    let mut variants = vec![
        ("no bisim, ite", AigEncoder::new(game).encode(man)),
        ("no bisim, isop", AigEncoder::new(game).set_isop().encode(man)),
        ("no bisim, oh", AigEncoder::new(game).set_onehot().encode(man)),
    ];

    let t_bisim = Instant::now();
    let mut reduced = game.clone();
    let partition = min_lts_strong(man, &reduced, true);
    minimize(man, &mut reduced, &partition);
    info!(
        "finished bisimulation minimisation of solution in {:.6} sec.",
        t_bisim.elapsed().as_secs_f64()
    );

    variants.push(("bisim, ite", AigEncoder::new(&reduced).encode(man)));
    variants.push(("bisim, isop", AigEncoder::new(&reduced).set_isop().encode(man)));
    variants.push(("bisim, oh", AigEncoder::new(&reduced).set_onehot().encode(man)));

    for (name, circuit) in variants.iter_mut() {
        apply_rewrites(cli, circuit)?;
        info!("{}: {}", name, circuit.num_ands());
    }

    let smallest = variants
        .iter()
        .map(|(_, c)| c.num_ands())
        .min()
        .expect("six encoded variants");
    let chosen = variants
        .iter()
        .find(|(_, c)| c.num_ands() == smallest)
        .expect("six encoded variants");
    write_circuit(cli, &chosen.1)?;
    Ok(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::AigLit;
    use crate::automaton::Tv;
    use crate::builder::adjust_priority;
    use crate::game::ParityGame;

    const TOGGLE: &str = r#"
HOA: v1
States: 2
Start: 0
AP: 2 "r" "g"
acc-name: parity max even 1
Acceptance: 1 Inf(0)
controllable-AP: 1
--BODY--
State: 0
[0 & !1] 1 {0}
[!0 & !1] 0 {0}
State: 1
[0 & 1] 1 {0}
[!0 & 1] 0 {0}
--END--
"#;

    const UNREALIZABLE: &str = r#"
HOA: v1
States: 1
Start: 0
AP: 1 "a"
acc-name: parity max even 2
Acceptance: 2 Fin(1) & Inf(0)
--BODY--
State: 0
[t] 0 {1}
--END--
"#;

    const TRIVIAL: &str = r#"
HOA: v1
States: 1
Start: 0
AP: 0
acc-name: parity min even 1
Acceptance: 1 Inf(0)
--BODY--
State: 0
[t] 0 {0}
--END--
"#;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["aigsynt"];
        full.extend(args);
        Cli::parse_from(full)
    }

    #[test]
    fn test_realizability_agrees_across_modes() {
        for input in [TOGGLE, UNREALIZABLE, TRIVIAL] {
            let expected = run_with_input(&cli(&["--real", "--sym"]), input).unwrap();
            for flags in [
                vec!["--real"],
                vec!["--real", "--naive"],
                vec!["--real", "--explicit"],
                vec!["--real", "--sym", "--bisim-game"],
                vec!["--real", "--bisim-game"],
            ] {
                let code = run_with_input(&cli(&flags), input).unwrap();
                assert_eq!(code, expected, "flags {:?}", flags);
            }
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(run_with_input(&cli(&["--real"]), TRIVIAL).unwrap(), 10);
        assert_eq!(run_with_input(&cli(&["--real"]), UNREALIZABLE).unwrap(), 20);
        assert_eq!(run_with_input(&cli(&["--real", "--sym"]), TOGGLE).unwrap(), 10);
        assert_eq!(run_with_input(&cli(&["--sym"]), UNREALIZABLE).unwrap(), 20);
    }

    #[test]
    fn test_sym_takes_precedence_over_splitting_flags() {
        // the splitting flags are ignored on the symbolic path
        assert_eq!(run_with_input(&cli(&["--real", "--sym", "--naive"]), TOGGLE).unwrap(), 10);
        assert_eq!(
            run_with_input(&cli(&["--real", "--sym", "--explicit"]), UNREALIZABLE).unwrap(),
            20
        );
    }

    #[test]
    fn test_config_rejections() {
        assert!(matches!(
            run_with_input(&cli(&["--naive", "-a"]), TOGGLE),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            run_with_input(&cli(&["--explicit", "--best"]), TOGGLE),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            run_with_input(&cli(&["--naive", "--explicit"]), TOGGLE),
            Err(Error::Config(_))
        ));
    }

    /// Evaluate a sequential circuit for one step
    fn step_aig(aig: &Aig, inputs: &[bool], latches: &[bool]) -> (Vec<bool>, Vec<bool>) {
        let mut values = vec![false; aig.max_var() as usize + 1];
        for (k, (lit, _)) in aig.inputs().iter().enumerate() {
            values[lit.var() as usize] = inputs[k];
        }
        for (k, latch) in aig.latches().iter().enumerate() {
            values[latch.lit.var() as usize] = latches[k];
        }
        let eval =
            |values: &[bool], lit: AigLit| -> bool { values[lit.var() as usize] ^ lit.is_inverted() };
        for gate in aig.ands() {
            values[gate.lhs.var() as usize] = eval(&values, gate.rhs0) && eval(&values, gate.rhs1);
        }
        let outputs = aig
            .outputs()
            .iter()
            .map(|&(lit, _)| eval(&values, lit))
            .collect();
        let next = aig.latches().iter().map(|l| eval(&values, l.next)).collect();
        (outputs, next)
    }

    /// Model-check the synthesised circuit against the automaton: build the
    /// product as a one-player parity game and require the controller to
    /// win it everywhere
    #[test]
    fn test_strategy_soundness_toggle() {
        let automaton = hoa::parse(TOGGLE).unwrap();
        let mut man = Manager::new(20);
        let mut game = build_symbolic(&mut man, &automaton, StateEncoding::Binary);
        assert!(game.solve(&mut man));
        game.post_process(&mut man);

        for variant in 0..4 {
            let mut encoder = AigEncoder::new(&game);
            encoder = match variant {
                1 => encoder.set_isop(),
                2 => encoder.set_onehot(),
                3 => encoder.set_sop(),
                _ => encoder,
            };
            let aig = encoder.encode(&mut man);

            let mut product = ParityGame::new();
            let mut ids: FxHashMap<(Vec<bool>, u32), u32> = FxHashMap::default();
            let initial = (vec![false; aig.num_latches()], 0u32);
            let start = product.add_vertex(0, Owner::Environment, None);
            ids.insert(initial.clone(), start);
            let mut todo = vec![initial];
            while let Some(key) = todo.pop() {
                let (latches, auto_state) = key.clone();
                let from = ids[&key];
                for r in [false, true] {
                    let (outputs, next_latches) = step_aig(&aig, &[r], &latches);
                    let g = outputs[0];
                    let state = &automaton.states[auto_state as usize];
                    let matching: Vec<_> = state
                        .transitions
                        .iter()
                        .filter(|t| {
                            let label = automaton.effective_label(state, t);
                            label.eval_naive(&[0, 1], (r as u64) | ((g as u64) << 1)) == Tv::True
                        })
                        .collect();
                    assert_eq!(matching.len(), 1, "circuit output violates the automaton");
                    let trans = matching[0];
                    let prio = adjust_priority(
                        trans.acc_sig.unwrap(),
                        automaton.parity.max,
                        !automaton.parity.even,
                        automaton.num_acc_sets,
                    );
                    let next_key = (next_latches.clone(), trans.successor);
                    let to = match ids.get(&next_key) {
                        Some(&v) => v,
                        None => {
                            let v = product.add_vertex(0, Owner::Environment, None);
                            ids.insert(next_key.clone(), v);
                            todo.push(next_key);
                            v
                        }
                    };
                    let mid = product.add_vertex(prio, Owner::Environment, None);
                    product.add_edge(from, mid);
                    product.add_edge(mid, to);
                }
            }
            let solution = ZielonkaSolver.solve(&product);
            assert_eq!(solution.winner[start as usize], Owner::Controller);
        }
    }
}
