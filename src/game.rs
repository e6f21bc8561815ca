//! Explicit parity games and their solvers

mod solve;

use std::io::Write;

use itertools::Itertools;

pub use solve::{Solution, Solver, ZielonkaSolver};

use crate::error::{Error, Result};

/// Owner of a game vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// The controller, winning on even priorities
    Controller,
    /// The environment, winning on odd priorities
    Environment,
}

impl Owner {
    /// Numeric encoding used by the PGSolver format
    pub fn index(self) -> u32 {
        match self {
            Owner::Controller => 0,
            Owner::Environment => 1,
        }
    }
}

/// A game vertex: priority, owner, successor list and an optional label
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Priority of the vertex, non-negative, max-even convention
    pub priority: u32,
    /// Owning player
    pub owner: Owner,
    /// Display label
    pub label: Option<String>,
    /// Outgoing edges
    pub edges: Vec<u32>,
}

/// An explicit parity game in max-even convention
#[derive(Debug, Clone, Default)]
pub struct ParityGame {
    vertices: Vec<Vertex>,
}

impl ParityGame {
    /// Create an empty game
    pub fn new() -> ParityGame {
        ParityGame::default()
    }

    /// Number of vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges
    pub fn num_edges(&self) -> usize {
        self.vertices.iter().map(|v| v.edges.len()).sum()
    }

    /// Access a vertex
    pub fn vertex(&self, i: u32) -> &Vertex {
        &self.vertices[i as usize]
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, priority: u32, owner: Owner, label: Option<String>) -> u32 {
        self.vertices.push(Vertex {
            priority,
            owner,
            label,
            edges: Vec::new(),
        });
        (self.vertices.len() - 1) as u32
    }

    /// Add an edge between existing vertices
    pub fn add_edge(&mut self, from: u32, to: u32) {
        self.vertices[from as usize].edges.push(to);
    }

    /// Set the label of a vertex
    pub fn set_label(&mut self, i: u32, label: impl Into<String>) {
        self.vertices[i as usize].label = Some(label.into());
    }

    /// Check that every vertex has at least one outgoing edge and that all
    /// edges are in range
    pub fn check(&self) -> Result<()> {
        for (i, v) in self.vertices.iter().enumerate() {
            if v.edges.is_empty() {
                return Err(Error::input(format!("game vertex {i} has no successor")));
            }
            for &e in &v.edges {
                if e as usize >= self.vertices.len() {
                    return Err(Error::input(format!(
                        "game vertex {i} has an edge to unknown vertex {e}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Sort vertices by priority, then by index. Returns the mapping from
    /// old index to new index; [`ParityGame::permute`] with the same mapping
    /// restores the original order.
    pub fn sort(&mut self) -> Vec<u32> {
        let order: Vec<u32> = (0..self.num_vertices() as u32)
            .sorted_by_key(|&i| (self.vertices[i as usize].priority, i))
            .collect();
        // order[new] = old; invert to get the old -> new mapping
        let mut mapping = vec![0u32; order.len()];
        for (new, &old) in order.iter().enumerate() {
            mapping[old as usize] = new as u32;
        }
        self.apply_mapping(&mapping);
        mapping
    }

    /// Undo a sort: move each vertex from `mapping[old]` back to `old`
    pub fn permute(&mut self, mapping: &[u32]) {
        // invert the old -> new mapping
        let mut inverse = vec![0u32; mapping.len()];
        for (old, &new) in mapping.iter().enumerate() {
            inverse[new as usize] = old as u32;
        }
        self.apply_mapping(&inverse);
    }

    /// Move every vertex `i` to position `mapping[i]`, remapping edges
    fn apply_mapping(&mut self, mapping: &[u32]) {
        let mut new_vertices: Vec<Option<Vertex>> = vec![None; self.vertices.len()];
        for (old, vertex) in self.vertices.drain(..).enumerate() {
            let mut vertex = vertex;
            for e in vertex.edges.iter_mut() {
                *e = mapping[*e as usize];
            }
            new_vertices[mapping[old] as usize] = Some(vertex);
        }
        self.vertices = new_vertices.into_iter().map(|v| v.unwrap()).collect();
    }

    /// Write the game in PGSolver format
    pub fn write_pgsolver(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "parity {};", self.num_vertices().saturating_sub(1))?;
        for (i, v) in self.vertices.iter().enumerate() {
            let succs = v.edges.iter().map(|e| e.to_string()).join(",");
            match &v.label {
                Some(label) => writeln!(
                    out,
                    "{} {} {} {} \"{}\";",
                    i,
                    v.priority,
                    v.owner.index(),
                    succs,
                    label
                )?,
                None => writeln!(out, "{} {} {} {};", i, v.priority, v.owner.index(), succs)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertex_game() -> ParityGame {
        let mut game = ParityGame::new();
        let a = game.add_vertex(3, Owner::Controller, None);
        let b = game.add_vertex(1, Owner::Environment, Some("env".to_string()));
        game.add_edge(a, b);
        game.add_edge(b, a);
        game.add_edge(b, b);
        game
    }

    #[test]
    fn test_check() {
        let mut game = two_vertex_game();
        assert!(game.check().is_ok());
        game.add_vertex(0, Owner::Controller, None);
        assert!(game.check().is_err());
    }

    #[test]
    fn test_sort_permute_round_trip() {
        let mut game = two_vertex_game();
        let mapping = game.sort();
        // lower priority first: the environment vertex moved to index 0
        assert_eq!(game.vertex(0).priority, 1);
        assert_eq!(game.vertex(1).priority, 3);
        assert_eq!(mapping, vec![1, 0]);
        game.permute(&mapping);
        assert_eq!(game.vertex(0).priority, 3);
        assert_eq!(game.vertex(1).priority, 1);
        assert_eq!(game.vertex(0).edges, vec![1]);
        assert_eq!(game.vertex(1).edges, vec![0, 1]);
    }

    #[test]
    fn test_pgsolver_output() {
        let game = two_vertex_game();
        let mut buf = Vec::new();
        game.write_pgsolver(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "parity 1;\n0 3 0 1;\n1 1 1 0,1 \"env\";\n"
        );
    }
}
