//! Reactive synthesis from parity automata to And-Inverter Graphs
//!
//! This crate decides whether a controller exists for a deterministic
//! parity automaton whose atomic propositions are split into environment
//! and system inputs, and emits a sequential AIGER circuit implementing a
//! winning Mealy strategy when one does.
//!
//! # Usage
//!
//! The command line tool reads a HOA automaton and prints the circuit:
//! ```bash
//! aigsynt --sym -a controller.hoa
//! ```
//! Realizability checking alone exits with code 10 or 20:
//! ```bash
//! aigsynt --real controller.hoa
//! ```
//!
//! # Pipeline
//!
//! The automaton is lifted into a two-player parity game, either explicitly
//! (one vertex per state and input valuation) or symbolically as decision
//! diagram relations. The game is solved by the internal fixed-point solver
//! or by an explicit engine behind the [`game::Solver`] interface. A winning
//! strategy is post-processed, optionally minimised by signature-refinement
//! bisimulation, and encoded gate by gate into an [`aig::Aig`], through
//! memoised Shannon expansion or irredundant sum-of-products covers. The
//! resulting circuit can be handed to an external rewriter for compression.
//!
//! All decision-diagram work goes through the in-crate [`dd::Manager`], a
//! content-addressed store of complement-edge BDDs, integer-leaf MTBDDs and
//! zero-suppressed covers.

#![warn(missing_docs)]

pub mod aig;
pub mod automaton;
pub mod bisim;
pub mod builder;
pub mod cmd;
pub mod dd;
pub mod encoder;
pub mod error;
pub mod game;
pub mod hoa;
pub mod symgame;

pub use aig::{Aig, AigLit};
pub use automaton::Automaton;
pub use error::{Error, Result};
pub use symgame::SymGame;
