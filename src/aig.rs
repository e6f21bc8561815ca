//! And-Inverter Graph circuits and their AIGER serialisation

mod circuit;
mod compress;
mod literal;

pub use circuit::{Aig, AndGate, Latch};
pub use compress::{AbcRewriter, Rewriter, COMPRESS_COMMANDS, DREWRITE_COMMANDS};
pub use literal::AigLit;
