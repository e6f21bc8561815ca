//! Parser for parity automata in HOA form
//!
//! Supports the deterministic-parity subset used for synthesis: header
//! items, `controllable-AP:`, aliases, state or transition labels, and a
//! single acceptance set per transition. Anything outside the parity
//! fragment is rejected with an input error carrying the offending line.

use rustc_hash::FxHashMap;

use crate::automaton::{Automaton, Label, ParityAcceptance, State, Transition};
use crate::error::{Error, Result};

/// Parse an automaton from HOA text
pub fn parse(input: &str) -> Result<Automaton> {
    let mut parser = Parser {
        aliases: FxHashMap::default(),
        num_states: None,
        start: None,
        ap_names: Vec::new(),
        controllable: Vec::new(),
        num_acc_sets: None,
        parity: None,
    };
    let mut lines = input.lines().enumerate();

    // header section
    loop {
        let Some((idx, line)) = lines.next() else {
            return Err(Error::input("missing --BODY-- marker"));
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "--BODY--" {
            break;
        }
        parser.header_line(idx + 1, line)?;
    }

    let parity = parser
        .parity
        .ok_or_else(|| Error::input("automaton acceptance is not parity"))?;
    let num_acc_sets = parser
        .num_acc_sets
        .ok_or_else(|| Error::input("missing Acceptance: header"))?;

    // body section
    let mut states: Vec<State> = Vec::new();
    for (idx, line) in lines {
        let lineno = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "--END--" {
            break;
        }
        if let Some(rest) = line.strip_prefix("State:") {
            states.push(parser.state_line(lineno, rest.trim())?);
        } else {
            let state = states
                .last_mut()
                .ok_or_else(|| Error::input_at(lineno, "transition before any State:"))?;
            state.transitions.push(parser.transition_line(lineno, line)?);
        }
    }

    if let Some(n) = parser.num_states {
        if states.len() != n {
            return Err(Error::input(format!(
                "header declares {} states but the body has {}",
                n,
                states.len()
            )));
        }
    }

    let automaton = Automaton {
        ap_names: parser.ap_names,
        controllable: parser.controllable,
        num_acc_sets,
        parity,
        start: parser.start.ok_or_else(|| Error::input("missing Start: header"))?,
        states,
    };
    automaton.validate()?;
    Ok(automaton)
}

struct Parser {
    aliases: FxHashMap<String, Label>,
    num_states: Option<usize>,
    start: Option<u32>,
    ap_names: Vec<String>,
    controllable: Vec<u32>,
    num_acc_sets: Option<u32>,
    parity: Option<ParityAcceptance>,
}

impl Parser {
    fn header_line(&mut self, lineno: usize, line: &str) -> Result<()> {
        let Some((key, rest)) = line.split_once(':') else {
            return Err(Error::input_at(lineno, format!("unexpected header line: {line}")));
        };
        let rest = rest.trim();
        match key {
            "HOA" | "name" | "tool" | "properties" | "spot-state-player" => (),
            "States" => {
                self.num_states = Some(parse_int(lineno, rest)? as usize);
            }
            "Start" => {
                if rest.split_whitespace().count() != 1 {
                    return Err(Error::input_at(lineno, "expected a single initial state"));
                }
                self.start = Some(parse_int(lineno, rest)?);
            }
            "AP" => {
                let mut scanner = Scanner::new(rest, lineno);
                let count = scanner.int()? as usize;
                for _ in 0..count {
                    self.ap_names.push(scanner.quoted_string()?);
                }
            }
            "controllable-AP" => {
                for tok in rest.split_whitespace() {
                    self.controllable.push(parse_int(lineno, tok)?);
                }
            }
            "Acceptance" => {
                let count = rest
                    .split_whitespace()
                    .next()
                    .ok_or_else(|| Error::input_at(lineno, "empty Acceptance: header"))?;
                self.num_acc_sets = Some(parse_int(lineno, count)?);
            }
            "acc-name" => {
                let words: Vec<&str> = rest.split_whitespace().collect();
                if words.first() != Some(&"parity") || words.len() < 3 {
                    return Err(Error::input_at(
                        lineno,
                        format!("unsupported acceptance: {rest}"),
                    ));
                }
                let max = match words[1] {
                    "max" => true,
                    "min" => false,
                    other => {
                        return Err(Error::input_at(lineno, format!("unknown parity kind {other}")))
                    }
                };
                let even = match words[2] {
                    "even" => true,
                    "odd" => false,
                    other => {
                        return Err(Error::input_at(lineno, format!("unknown parity kind {other}")))
                    }
                };
                self.parity = Some(ParityAcceptance { max, even });
            }
            "Alias" => {
                let mut scanner = Scanner::new(rest, lineno);
                let name = scanner.alias_name()?;
                let label = scanner.label_expr(&self.aliases)?;
                self.aliases.insert(name, label);
            }
            other => {
                return Err(Error::input_at(lineno, format!("unknown header item {other}:")));
            }
        }
        Ok(())
    }

    fn state_line(&mut self, lineno: usize, rest: &str) -> Result<State> {
        let mut scanner = Scanner::new(rest, lineno);
        let label = if scanner.peek() == Some('[') {
            Some(scanner.bracketed_label(&self.aliases)?)
        } else {
            None
        };
        let id = scanner.int()?;
        let name = if scanner.peek() == Some('"') {
            Some(scanner.quoted_string()?)
        } else {
            None
        };
        let acc_sig = if scanner.peek() == Some('{') {
            Some(scanner.acc_set()?)
        } else {
            None
        };
        scanner.end()?;
        Ok(State {
            id,
            name,
            label,
            acc_sig,
            transitions: Vec::new(),
        })
    }

    fn transition_line(&self, lineno: usize, line: &str) -> Result<Transition> {
        let mut scanner = Scanner::new(line, lineno);
        let label = if scanner.peek() == Some('[') {
            Some(scanner.bracketed_label(&self.aliases)?)
        } else {
            None
        };
        let successor = scanner.int()?;
        if scanner.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            return Err(Error::input_at(lineno, "transition has several successors"));
        }
        let acc_sig = if scanner.peek() == Some('{') {
            Some(scanner.acc_set()?)
        } else {
            None
        };
        scanner.end()?;
        Ok(Transition {
            label,
            successor,
            acc_sig,
        })
    }
}

fn parse_int(lineno: usize, s: &str) -> Result<u32> {
    s.trim()
        .parse()
        .map_err(|_| Error::input_at(lineno, format!("expected an integer, got {s:?}")))
}

/// Character scanner over a single line
struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    lineno: usize,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str, lineno: usize) -> Scanner<'a> {
        Scanner {
            chars: s.chars().peekable(),
            lineno,
        }
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::input_at(self.lineno, msg)
    }

    fn skip_spaces(&mut self) {
        while self.chars.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
            self.chars.next();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_spaces();
        self.chars.peek().copied()
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.peek() != Some(c) {
            return Err(self.err(format!("expected {c:?}")));
        }
        self.chars.next();
        Ok(())
    }

    fn int(&mut self) -> Result<u32> {
        self.skip_spaces();
        let mut digits = String::new();
        while self.chars.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            digits.push(self.chars.next().unwrap());
        }
        if digits.is_empty() {
            return Err(self.err("expected an integer"));
        }
        digits
            .parse()
            .map_err(|_| self.err(format!("integer {digits} is out of range")))
    }

    fn quoted_string(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some('"') => return Ok(s),
                Some('\\') => match self.chars.next() {
                    Some(c) => s.push(c),
                    None => return Err(self.err("unterminated string")),
                },
                Some(c) => s.push(c),
                None => return Err(self.err("unterminated string")),
            }
        }
    }

    fn acc_set(&mut self) -> Result<u32> {
        self.expect('{')?;
        let first = self.int()?;
        if self.peek() != Some('}') {
            return Err(self.err("at most one acceptance set per transition"));
        }
        self.expect('}')?;
        Ok(first)
    }

    fn alias_name(&mut self) -> Result<String> {
        self.expect('@')?;
        let mut name = String::new();
        while self
            .chars
            .peek()
            .map(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .unwrap_or(false)
        {
            name.push(self.chars.next().unwrap());
        }
        if name.is_empty() {
            return Err(self.err("empty alias name"));
        }
        Ok(name)
    }

    fn bracketed_label(&mut self, aliases: &FxHashMap<String, Label>) -> Result<Label> {
        self.expect('[')?;
        let label = self.label_expr(aliases)?;
        self.expect(']')?;
        Ok(label)
    }

    /// Disjunction level of the label grammar
    fn label_expr(&mut self, aliases: &FxHashMap<String, Label>) -> Result<Label> {
        let mut left = self.label_conj(aliases)?;
        while self.peek() == Some('|') {
            self.chars.next();
            let right = self.label_conj(aliases)?;
            left = Label::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn label_conj(&mut self, aliases: &FxHashMap<String, Label>) -> Result<Label> {
        let mut left = self.label_atom(aliases)?;
        while self.peek() == Some('&') {
            self.chars.next();
            let right = self.label_atom(aliases)?;
            left = Label::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn label_atom(&mut self, aliases: &FxHashMap<String, Label>) -> Result<Label> {
        match self.peek() {
            Some('!') => {
                self.chars.next();
                let inner = self.label_atom(aliases)?;
                Ok(Label::Not(Box::new(inner)))
            }
            Some('(') => {
                self.chars.next();
                let inner = self.label_expr(aliases)?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('t') => {
                self.chars.next();
                Ok(Label::Bool(true))
            }
            Some('f') => {
                self.chars.next();
                Ok(Label::Bool(false))
            }
            Some('@') => {
                let name = self.alias_name()?;
                aliases
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| self.err(format!("unknown alias @{name}")))
            }
            Some(c) if c.is_ascii_digit() => {
                let id = self.int()?;
                Ok(Label::Ap(id))
            }
            _ => Err(self.err("expected a label expression")),
        }
    }

    fn end(&mut self) -> Result<()> {
        if let Some(c) = self.peek() {
            return Err(self.err(format!("unexpected trailing {c:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Tv;

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

    #[test]
    fn test_parse_toggle() {
        let auto = parse(TOGGLE).unwrap();
        assert_eq!(auto.num_aps(), 2);
        assert_eq!(auto.controllable, vec![1]);
        assert_eq!(auto.uncontrollable(), vec![0]);
        assert_eq!(auto.states.len(), 2);
        assert_eq!(auto.start, 0);
        assert!(auto.parity.max);
        assert!(auto.parity.even);
        assert_eq!(auto.states[0].transitions.len(), 2);
        assert_eq!(auto.states[0].transitions[0].successor, 1);
        assert_eq!(auto.states[0].transitions[0].acc_sig, Some(0));
    }

    #[test]
    fn test_parse_alias_and_names() {
        let text = r#"
HOA: v1
States: 1
Start: 0
AP: 2 "a" "b"
Alias: @both 0 & 1
acc-name: parity min odd 2
Acceptance: 2 Fin(1) & Inf(0)
--BODY--
State: 0 "only"
[@both | !0] 0 {1}
[0 & !1] 0 {0}
--END--
"#;
        let auto = parse(text).unwrap();
        assert_eq!(auto.states[0].name.as_deref(), Some("only"));
        assert!(!auto.parity.max);
        assert!(!auto.parity.even);
        let label = auto.states[0].transitions[0].label.as_ref().unwrap();
        // @both | !0 under a=1, b=1
        assert_eq!(label.eval_naive(&[0, 1], 0b11), Tv::True);
        assert_eq!(label.eval_naive(&[0, 1], 0b01), Tv::False);
    }

    #[test]
    fn test_reject_non_parity() {
        let text = r#"
HOA: v1
States: 1
Start: 0
AP: 0
acc-name: Buchi
Acceptance: 1 Inf(0)
--BODY--
State: 0
[t] 0 {0}
--END--
"#;
        assert!(parse(text).is_err());
    }

    #[test]
    fn test_reject_several_successors() {
        let text = r#"
HOA: v1
States: 1
Start: 0
AP: 1 "a"
acc-name: parity max even 1
Acceptance: 1 Inf(0)
--BODY--
State: 0
[t] 0 0 {0}
--END--
"#;
        assert!(parse(text).is_err());
    }
}
