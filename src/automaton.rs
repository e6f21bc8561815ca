//! In-memory model of a deterministic parity automaton

use crate::error::{Error, Result};

/// Boolean combination of atomic propositions labelling a transition.
///
/// Aliases are resolved by the parser and never reach the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    /// Constant true or false
    Bool(bool),
    /// A single atomic proposition, by index
    Ap(u32),
    /// Negation
    Not(Box<Label>),
    /// Conjunction
    And(Box<Label>, Box<Label>),
    /// Disjunction
    Or(Box<Label>, Box<Label>),
}

/// Three-valued result of evaluating a label under a partial valuation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tv {
    /// The label is true under every completion of the valuation
    True,
    /// The label is false under every completion
    False,
    /// The value depends on the unassigned propositions
    Unknown,
}

impl Label {
    /// Evaluate under a valuation of the listed atomic propositions: bit `i`
    /// of `value` is the value of proposition `aps[i]`. Propositions not in
    /// `aps` are unassigned.
    pub fn eval_naive(&self, aps: &[u32], value: u64) -> Tv {
        match self {
            Label::Bool(b) => {
                if *b {
                    Tv::True
                } else {
                    Tv::False
                }
            }
            Label::Ap(id) => match aps.iter().position(|a| a == id) {
                Some(i) => {
                    if (value >> i) & 1 != 0 {
                        Tv::True
                    } else {
                        Tv::False
                    }
                }
                None => Tv::Unknown,
            },
            Label::Not(inner) => match inner.eval_naive(aps, value) {
                Tv::True => Tv::False,
                Tv::False => Tv::True,
                Tv::Unknown => Tv::Unknown,
            },
            Label::And(l, r) => match (l.eval_naive(aps, value), r.eval_naive(aps, value)) {
                (Tv::False, _) | (_, Tv::False) => Tv::False,
                (Tv::Unknown, _) | (_, Tv::Unknown) => Tv::Unknown,
                _ => Tv::True,
            },
            Label::Or(l, r) => match (l.eval_naive(aps, value), r.eval_naive(aps, value)) {
                (Tv::True, _) | (_, Tv::True) => Tv::True,
                (Tv::Unknown, _) | (_, Tv::Unknown) => Tv::Unknown,
                _ => Tv::False,
            },
        }
    }
}

/// A transition to a single successor state
#[derive(Debug, Clone)]
pub struct Transition {
    /// Transition-level label; absent when the state carries the label
    pub label: Option<Label>,
    /// The unique successor
    pub successor: u32,
    /// Transition-level acceptance set
    pub acc_sig: Option<u32>,
}

/// An automaton state and its outgoing transitions
#[derive(Debug, Clone)]
pub struct State {
    /// State id; equals the index in [`Automaton::states`]
    pub id: u32,
    /// Optional display name
    pub name: Option<String>,
    /// State-level label, exclusive with transition labels
    pub label: Option<Label>,
    /// State-level acceptance set, exclusive with transition acceptance
    pub acc_sig: Option<u32>,
    /// Outgoing transitions
    pub transitions: Vec<Transition>,
}

/// Parity acceptance condition of the automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParityAcceptance {
    /// Max parity when true, min parity otherwise
    pub max: bool,
    /// The controller wins on even priorities when true
    pub even: bool,
}

/// A deterministic parity automaton with its propositions split into
/// uncontrollable (environment) and controllable (system) inputs
#[derive(Debug, Clone)]
pub struct Automaton {
    /// Names of the atomic propositions, by index
    pub ap_names: Vec<String>,
    /// Indices of the controllable propositions
    pub controllable: Vec<u32>,
    /// Number of acceptance sets
    pub num_acc_sets: u32,
    /// The parity condition
    pub parity: ParityAcceptance,
    /// Initial state
    pub start: u32,
    /// States, indexed by id
    pub states: Vec<State>,
}

impl Automaton {
    /// Number of atomic propositions
    pub fn num_aps(&self) -> usize {
        self.ap_names.len()
    }

    /// Indices of the uncontrollable propositions, in increasing order
    pub fn uncontrollable(&self) -> Vec<u32> {
        (0..self.num_aps() as u32)
            .filter(|i| !self.controllable.contains(i))
            .collect()
    }

    /// Returns true if priorities sit on states rather than transitions
    pub fn state_priorities(&self) -> bool {
        self.states.first().map(|s| s.acc_sig.is_some()).unwrap_or(false)
    }

    /// Check the structural invariants of the automaton
    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(Error::input("automaton has no states"));
        }
        if self.start as usize >= self.states.len() {
            return Err(Error::input(format!("initial state {} is out of range", self.start)));
        }
        for &c in &self.controllable {
            if c as usize >= self.num_aps() {
                return Err(Error::input(format!("controllable AP {c} is out of range")));
            }
        }
        let state_priorities = self.state_priorities();
        for (i, state) in self.states.iter().enumerate() {
            if state.id != i as u32 {
                return Err(Error::input(format!(
                    "state {} has an invalid id {}",
                    i, state.id
                )));
            }
            if state.acc_sig.is_some() != state_priorities {
                return Err(Error::input("not every state has a priority"));
            }
            if state.transitions.is_empty() {
                return Err(Error::input(format!("state {} has no transitions", i)));
            }
            for trans in &state.transitions {
                if trans.successor as usize >= self.states.len() {
                    return Err(Error::input(format!(
                        "state {} has a transition to unknown state {}",
                        i, trans.successor
                    )));
                }
                match (&state.label, &trans.label) {
                    (Some(_), Some(_)) => {
                        return Err(Error::input(format!(
                            "state {} mixes state and transition labels",
                            i
                        )))
                    }
                    (None, None) => {
                        return Err(Error::input(format!(
                            "state {} has a transition without a label",
                            i
                        )))
                    }
                    _ => (),
                }
                if state_priorities {
                    if trans.acc_sig.is_some() {
                        return Err(Error::input(
                            "automaton mixes state and transition priorities",
                        ));
                    }
                } else if trans.acc_sig.is_none() {
                    return Err(Error::input(format!(
                        "state {} has a transition without an acceptance set",
                        i
                    )));
                }
                if let Some(a) = trans.acc_sig.or(state.acc_sig) {
                    if a >= self.num_acc_sets {
                        return Err(Error::input(format!(
                            "acceptance set {a} is out of range"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// The label in effect for a transition of a state
    pub fn effective_label<'a>(&self, state: &'a State, trans: &'a Transition) -> &'a Label {
        state
            .label
            .as_ref()
            .or(trans.label.as_ref())
            .expect("validated automaton has a label per transition")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ap(i: u32) -> Label {
        Label::Ap(i)
    }

    #[test]
    fn test_eval_naive() {
        // a & !b with a assigned true, b unassigned
        let label = Label::And(Box::new(ap(0)), Box::new(Label::Not(Box::new(ap(1)))));
        assert_eq!(label.eval_naive(&[0], 1), Tv::Unknown);
        assert_eq!(label.eval_naive(&[0], 0), Tv::False);
        assert_eq!(label.eval_naive(&[0, 1], 0b01), Tv::True);
        assert_eq!(label.eval_naive(&[0, 1], 0b11), Tv::False);
        // constants dominate
        let t = Label::Or(Box::new(Label::Bool(true)), Box::new(ap(5)));
        assert_eq!(t.eval_naive(&[], 0), Tv::True);
    }

    #[test]
    fn test_validate_rejects_mixed_priorities() {
        let auto = Automaton {
            ap_names: vec!["a".into()],
            controllable: vec![],
            num_acc_sets: 2,
            parity: ParityAcceptance { max: true, even: true },
            start: 0,
            states: vec![
                State {
                    id: 0,
                    name: None,
                    label: None,
                    acc_sig: Some(0),
                    transitions: vec![Transition {
                        label: Some(Label::Bool(true)),
                        successor: 0,
                        acc_sig: Some(1),
                    }],
                },
            ],
        };
        assert!(auto.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_simple() {
        let auto = Automaton {
            ap_names: vec!["a".into()],
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
        };
        assert!(auto.validate().is_ok());
    }
}
