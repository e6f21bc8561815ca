use std::io::Write;

use rustc_hash::FxHashMap;

use crate::aig::literal::AigLit;
use crate::error::{Error, Result};

/// A latch: its state literal, the literal of its next-state function and an
/// optional symbol-table name
#[derive(Debug, Clone)]
pub struct Latch {
    /// Current-state literal, always positive
    pub lit: AigLit,
    /// Next-state literal
    pub next: AigLit,
    /// Symbol-table name, empty when anonymous
    pub name: String,
}

/// A two-input AND gate
#[derive(Debug, Clone, Copy)]
pub struct AndGate {
    /// Defined literal, always positive
    pub lhs: AigLit,
    /// Larger operand
    pub rhs0: AigLit,
    /// Smaller operand
    pub rhs1: AigLit,
}

/// An And-Inverter Graph with input, latch and output tables.
///
/// Literals are allocated inputs first, latches second, gates last, so the
/// AND table is topological by construction and can be serialised to binary
/// AIGER directly. A dedup cache keyed on the normalised operand pair keeps
/// the gate table structurally unique.
#[derive(Debug, Clone, Default)]
pub struct Aig {
    inputs: Vec<(AigLit, String)>,
    latches: Vec<Latch>,
    outputs: Vec<(AigLit, String)>,
    ands: Vec<AndGate>,
    cache: FxHashMap<u64, AigLit>,
    num_vars: u32,
}

impl Aig {
    /// Create an empty circuit
    pub fn new() -> Aig {
        Aig::default()
    }

    fn fresh_lit(&mut self) -> AigLit {
        self.num_vars += 1;
        AigLit::from_var(self.num_vars)
    }

    /// Number of primary inputs
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of latches
    pub fn num_latches(&self) -> usize {
        self.latches.len()
    }

    /// Number of primary outputs
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Number of AND gates
    pub fn num_ands(&self) -> usize {
        self.ands.len()
    }

    /// Largest variable in use
    pub fn max_var(&self) -> u32 {
        self.num_vars
    }

    /// The AND gate table
    pub fn ands(&self) -> &[AndGate] {
        &self.ands
    }

    /// The latch table
    pub fn latches(&self) -> &[Latch] {
        &self.latches
    }

    /// The output table
    pub fn outputs(&self) -> &[(AigLit, String)] {
        &self.outputs
    }

    /// The input table
    pub fn inputs(&self) -> &[(AigLit, String)] {
        &self.inputs
    }

    /// Add a primary input
    pub fn add_input(&mut self, name: impl Into<String>) -> AigLit {
        assert!(
            self.latches.is_empty() && self.ands.is_empty(),
            "inputs must be allocated before latches and gates"
        );
        let lit = self.fresh_lit();
        self.inputs.push((lit, name.into()));
        lit
    }

    /// Reserve a latch; its next-state literal is connected later
    pub fn add_latch(&mut self, name: impl Into<String>) -> AigLit {
        assert!(self.ands.is_empty(), "latches must be allocated before gates");
        let lit = self.fresh_lit();
        self.latches.push(Latch {
            lit,
            next: AigLit::zero(),
            name: name.into(),
        });
        lit
    }

    /// Connect the next-state function of latch `i`
    pub fn connect_latch(&mut self, i: usize, next: AigLit) {
        self.latches[i].next = next;
    }

    /// Add a primary output
    pub fn add_output(&mut self, lit: AigLit, name: impl Into<String>) {
        self.outputs.push((lit, name.into()));
    }

    /// AND of two literals with constant short-circuits and structural
    /// deduplication
    pub fn and(&mut self, a: AigLit, b: AigLit) -> AigLit {
        let (small, large) = if a.raw() <= b.raw() { (a, b) } else { (b, a) };
        if small == AigLit::zero() {
            return AigLit::zero();
        }
        if small == AigLit::one() {
            return large;
        }
        let key = ((large.raw() as u64) << 32) | small.raw() as u64;
        if let Some(&lit) = self.cache.get(&key) {
            return lit;
        }
        let lhs = self.fresh_lit();
        self.ands.push(AndGate {
            lhs,
            rhs0: large,
            rhs1: small,
        });
        self.cache.insert(key, lhs);
        lhs
    }

    /// Look up the gate of a normalised operand pair without creating one
    pub fn cached_and(&self, a: AigLit, b: AigLit) -> Option<AigLit> {
        let (small, large) = if a.raw() <= b.raw() { (a, b) } else { (b, a) };
        if small == AigLit::zero() {
            return Some(AigLit::zero());
        }
        if small == AigLit::one() {
            return Some(large);
        }
        let key = ((large.raw() as u64) << 32) | small.raw() as u64;
        self.cache.get(&key).copied()
    }

    /// Write the circuit in ASCII AIGER format
    pub fn write_ascii(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "aag {} {} {} {} {}",
            self.max_var(),
            self.num_inputs(),
            self.num_latches(),
            self.num_outputs(),
            self.num_ands()
        )?;
        for (lit, _) in &self.inputs {
            writeln!(out, "{}", lit)?;
        }
        for latch in &self.latches {
            writeln!(out, "{} {}", latch.lit, latch.next)?;
        }
        for (lit, _) in &self.outputs {
            writeln!(out, "{}", lit)?;
        }
        for gate in &self.ands {
            writeln!(out, "{} {} {}", gate.lhs, gate.rhs0, gate.rhs1)?;
        }
        self.write_symbols(out)
    }

    /// Write the circuit in binary AIGER format
    pub fn write_binary(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            out,
            "aig {} {} {} {} {}",
            self.max_var(),
            self.num_inputs(),
            self.num_latches(),
            self.num_outputs(),
            self.num_ands()
        )?;
        for latch in &self.latches {
            writeln!(out, "{}", latch.next)?;
        }
        for (lit, _) in &self.outputs {
            writeln!(out, "{}", lit)?;
        }
        let base = (self.num_inputs() + self.num_latches()) as u32;
        for (i, gate) in self.ands.iter().enumerate() {
            let lhs = AigLit::from_var(base + 1 + i as u32);
            assert_eq!(gate.lhs, lhs, "gate table is not in topological order");
            let delta0 = gate.lhs.raw() - gate.rhs0.raw();
            let delta1 = gate.rhs0.raw() - gate.rhs1.raw();
            write_varint(out, delta0)?;
            write_varint(out, delta1)?;
        }
        self.write_symbols(out)
    }

    fn write_symbols(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for (k, (_, name)) in self.inputs.iter().enumerate() {
            if !name.is_empty() {
                writeln!(out, "i{} {}", k, name)?;
            }
        }
        for (k, latch) in self.latches.iter().enumerate() {
            if !latch.name.is_empty() {
                writeln!(out, "l{} {}", k, latch.name)?;
            }
        }
        for (k, (_, name)) in self.outputs.iter().enumerate() {
            if !name.is_empty() {
                writeln!(out, "o{} {}", k, name)?;
            }
        }
        Ok(())
    }

    /// Read a circuit in either AIGER format; comments are dropped
    pub fn read(bytes: &[u8]) -> Result<Aig> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let header = cursor.line()?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() != 6 || (fields[0] != "aag" && fields[0] != "aig") {
            return Err(Error::command("aiger", format!("bad header: {header}")));
        }
        let binary = fields[0] == "aig";
        let nums: Vec<u32> = fields[1..]
            .iter()
            .map(|f| {
                f.parse()
                    .map_err(|_| Error::command("aiger", format!("bad header: {header}")))
            })
            .collect::<Result<_>>()?;
        let (m, i, l, o, a) = (nums[0], nums[1], nums[2], nums[3], nums[4]);

        let mut aig = Aig::new();
        if binary {
            for _ in 0..i {
                aig.add_input("");
            }
        } else {
            for _ in 0..i {
                let line = cursor.line()?;
                let lit = parse_lit(&line)?;
                let input = aig.add_input("");
                if input != lit {
                    return Err(Error::command("aiger", "inputs are not in canonical order"));
                }
            }
        }
        for k in 0..l {
            let line = cursor.line()?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (cur, rest) = if binary {
                (AigLit::from_var(i + k + 1), &fields[..])
            } else {
                if fields.is_empty() {
                    return Err(Error::command("aiger", "truncated latch table"));
                }
                (parse_lit(fields[0])?, &fields[1..])
            };
            if rest.is_empty() {
                return Err(Error::command("aiger", "truncated latch table"));
            }
            let next = parse_lit(rest[0])?;
            if let Some(&init) = rest.get(1) {
                if init != "0" {
                    return Err(Error::command("aiger", "unsupported latch reset value"));
                }
            }
            let latch = aig.add_latch("");
            if latch != cur {
                return Err(Error::command("aiger", "latches are not in canonical order"));
            }
            aig.latches[k as usize].next = next;
        }
        let mut output_lits = Vec::new();
        for _ in 0..o {
            let line = cursor.line()?;
            output_lits.push(parse_lit(&line)?);
        }
        for k in 0..a {
            let (lhs, rhs0, rhs1) = if binary {
                let lhs = AigLit::from_var(i + l + 1 + k);
                let delta0 = cursor.varint()?;
                let delta1 = cursor.varint()?;
                let rhs0 = lhs.raw().checked_sub(delta0);
                let rhs1 = rhs0.and_then(|r| r.checked_sub(delta1));
                match (rhs0, rhs1) {
                    (Some(r0), Some(r1)) => {
                        (lhs, AigLit::from_raw(r0), AigLit::from_raw(r1))
                    }
                    _ => return Err(Error::command("aiger", "bad gate delta encoding")),
                }
            } else {
                let line = cursor.line()?;
                let fields: Vec<&str> = line.split_whitespace().collect();
                if fields.len() != 3 {
                    return Err(Error::command("aiger", format!("bad gate line: {line}")));
                }
                (
                    parse_lit(fields[0])?,
                    parse_lit(fields[1])?,
                    parse_lit(fields[2])?,
                )
            };
            if lhs.var() > m || lhs.is_inverted() {
                return Err(Error::command("aiger", "bad gate literal"));
            }
            let expected = aig.fresh_lit();
            if expected != lhs {
                return Err(Error::command("aiger", "gates are not in canonical order"));
            }
            let (small, large) = if rhs0.raw() <= rhs1.raw() {
                (rhs0, rhs1)
            } else {
                (rhs1, rhs0)
            };
            aig.ands.push(AndGate {
                lhs,
                rhs0: large,
                rhs1: small,
            });
            let key = ((large.raw() as u64) << 32) | small.raw() as u64;
            aig.cache.entry(key).or_insert(lhs);
        }
        for lit in output_lits {
            aig.outputs.push((lit, String::new()));
        }

        // symbol table, then comments which are dropped
        while let Ok(line) = cursor.line() {
            if line == "c" {
                break;
            }
            if line.len() < 2 || !line.is_ascii() {
                continue;
            }
            let (kind, rest) = line.split_at(1);
            let Some((index, name)) = rest.split_once(' ') else {
                continue;
            };
            let Ok(index) = index.parse::<usize>() else {
                continue;
            };
            match kind {
                "i" if index < aig.inputs.len() => aig.inputs[index].1 = name.to_string(),
                "l" if index < aig.latches.len() => aig.latches[index].name = name.to_string(),
                "o" if index < aig.outputs.len() => aig.outputs[index].1 = name.to_string(),
                _ => (),
            }
        }
        Ok(aig)
    }
}

fn parse_lit(s: &str) -> Result<AigLit> {
    s.trim()
        .parse()
        .map(AigLit::from_raw)
        .map_err(|_| Error::command("aiger", format!("bad literal: {s}")))
}

fn write_varint(out: &mut dyn Write, mut value: u32) -> std::io::Result<()> {
    while value >= 0x80 {
        out.write_all(&[(value & 0x7f) as u8 | 0x80])?;
        value >>= 7;
    }
    out.write_all(&[value as u8])
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn line(&mut self) -> Result<String> {
        if self.pos >= self.bytes.len() {
            return Err(Error::command("aiger", "unexpected end of file"));
        }
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        let line = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        if self.pos < self.bytes.len() {
            self.pos += 1;
        }
        Ok(line.trim_end().to_string())
    }

    fn varint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(Error::command("aiger", "truncated gate section"));
            }
            let byte = self.bytes[self.pos];
            self.pos += 1;
            value |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                return Err(Error::command("aiger", "gate delta is out of range"));
            }
        }
    }
}

impl std::fmt::Display for Aig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Aig with {} inputs, {} latches, {} outputs, {} gates",
            self.num_inputs(),
            self.num_latches(),
            self.num_outputs(),
            self.num_ands()
        )?;
        for gate in &self.ands {
            writeln!(f, "\t{:?} = {:?} & {:?}", gate.lhs, gate.rhs0, gate.rhs1)?;
        }
        for (k, (lit, name)) in self.outputs.iter().enumerate() {
            writeln!(f, "\to{} ({}) = {:?}", k, name, lit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Aig {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        let latch = aig.add_latch("");
        let g = aig.and(a, b);
        let h = aig.and(g, !latch);
        aig.connect_latch(0, h);
        aig.add_output(!g, "out");
        aig
    }

    #[test]
    fn test_dedup_and_constants() {
        let mut aig = Aig::new();
        let a = aig.add_input("a");
        let b = aig.add_input("b");
        assert_eq!(aig.and(a, AigLit::zero()), AigLit::zero());
        assert_eq!(aig.and(AigLit::one(), b), b);
        let g1 = aig.and(a, b);
        let g2 = aig.and(b, a);
        assert_eq!(g1, g2);
        assert_eq!(aig.num_ands(), 1);
        // structural uniqueness over the whole table
        let pairs: Vec<(u32, u32)> = aig
            .ands()
            .iter()
            .map(|g| (g.rhs1.raw(), g.rhs0.raw()))
            .collect();
        let mut dedup = pairs.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(pairs.len(), dedup.len());
    }

    #[test]
    fn test_ascii_round_trip() {
        let aig = sample();
        let mut buf = Vec::new();
        aig.write_ascii(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("aag 5 2 1 1 2\n"));
        assert!(text.contains("i0 a"));
        assert!(text.contains("o0 out"));
        let back = Aig::read(&buf).unwrap();
        assert_eq!(back.num_inputs(), 2);
        assert_eq!(back.num_latches(), 1);
        assert_eq!(back.num_ands(), 2);
        assert_eq!(back.outputs()[0].0, aig.outputs()[0].0);
        let mut buf2 = Vec::new();
        back.write_ascii(&mut buf2).unwrap();
        assert_eq!(buf, buf2);
    }

    #[test]
    fn test_binary_round_trip() {
        let aig = sample();
        let mut buf = Vec::new();
        aig.write_binary(&mut buf).unwrap();
        let back = Aig::read(&buf).unwrap();
        assert_eq!(back.num_inputs(), 2);
        assert_eq!(back.num_latches(), 1);
        assert_eq!(back.num_ands(), 2);
        assert_eq!(back.latches()[0].next, aig.latches()[0].next);
        let mut ascii_orig = Vec::new();
        aig.write_ascii(&mut ascii_orig).unwrap();
        let mut ascii_back = Vec::new();
        back.write_ascii(&mut ascii_back).unwrap();
        assert_eq!(ascii_orig, ascii_back);
    }

    #[test]
    fn test_varint() {
        for value in [0u32, 1, 127, 128, 255, 300, 1 << 20] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value).unwrap();
            let mut cursor = Cursor { bytes: &buf, pos: 0 };
            assert_eq!(cursor.varint().unwrap(), value);
        }
    }
}
