use crate::game::{Owner, ParityGame};

/// Result of solving an explicit parity game: the winner of every vertex
/// and, for each vertex whose owner wins it, a chosen successor
#[derive(Debug, Clone)]
pub struct Solution {
    /// Winning player per vertex
    pub winner: Vec<Owner>,
    /// Chosen successor, set exactly when the vertex owner wins it
    pub strategy: Vec<Option<u32>>,
}

/// Narrow interface to an explicit parity-game engine
pub trait Solver {
    /// Solve a max-even parity game
    fn solve(&self, game: &ParityGame) -> Solution;
}

/// Recursive Zielonka solver with attractor strategy recording
#[derive(Debug, Default)]
pub struct ZielonkaSolver;

impl Solver for ZielonkaSolver {
    fn solve(&self, game: &ParityGame) -> Solution {
        let n = game.num_vertices();
        let mut preds: Vec<Vec<u32>> = vec![Vec::new(); n];
        for v in 0..n as u32 {
            for &e in &game.vertex(v).edges {
                preds[e as usize].push(v);
            }
        }
        let mut strategy = vec![None; n];
        let region = vec![true; n];
        let (w0, _w1) = zielonka(game, &preds, region, &mut strategy);
        let winner: Vec<Owner> = (0..n)
            .map(|v| if w0[v] { Owner::Controller } else { Owner::Environment })
            .collect();
        for v in 0..n {
            if game.vertex(v as u32).owner != winner[v] {
                strategy[v] = None;
            }
        }
        Solution { winner, strategy }
    }
}

fn zielonka(
    game: &ParityGame,
    preds: &[Vec<u32>],
    region: Vec<bool>,
    strategy: &mut Vec<Option<u32>>,
) -> (Vec<bool>, Vec<bool>) {
    let n = region.len();
    let empty = vec![false; n];
    let Some(d) = (0..n)
        .filter(|&v| region[v])
        .map(|v| game.vertex(v as u32).priority)
        .max()
    else {
        return (empty.clone(), empty);
    };
    let player = if d % 2 == 0 { Owner::Controller } else { Owner::Environment };

    // attract to the vertices of the highest priority
    let mut a: Vec<bool> = (0..n)
        .map(|v| region[v] && game.vertex(v as u32).priority == d)
        .collect();
    attract(game, preds, &region, player, &mut a, strategy);

    let sub: Vec<bool> = (0..n).map(|v| region[v] && !a[v]).collect();
    let (w0, w1) = zielonka(game, preds, sub, strategy);
    let (_wins, loses) = if player == Owner::Controller { (&w0, &w1) } else { (&w1, &w0) };

    if loses.iter().all(|&b| !b) {
        // the favoured player wins everywhere; vertices of priority d they
        // own may take any edge that stays in the region
        for v in 0..n {
            if region[v] && game.vertex(v as u32).priority == d {
                let vert = game.vertex(v as u32);
                if vert.owner == player {
                    strategy[v] = vert.edges.iter().copied().find(|&e| region[e as usize]);
                }
            }
        }
        if player == Owner::Controller {
            (region, empty)
        } else {
            (empty, region)
        }
    } else {
        let opponent = if player == Owner::Controller {
            Owner::Environment
        } else {
            Owner::Controller
        };
        let mut b = loses.clone();
        attract(game, preds, &region, opponent, &mut b, strategy);
        let sub2: Vec<bool> = (0..n).map(|v| region[v] && !b[v]).collect();
        let (w0s, w1s) = zielonka(game, preds, sub2, strategy);
        if player == Owner::Controller {
            let w1f = (0..n).map(|v| w1s[v] || b[v]).collect();
            (w0s, w1f)
        } else {
            let w0f = (0..n).map(|v| w0s[v] || b[v]).collect();
            (w0f, w1s)
        }
    }
}

/// Extend `set` to the attractor of `player` within `region`, recording the
/// attracting edge for vertices the player owns
fn attract(
    game: &ParityGame,
    preds: &[Vec<u32>],
    region: &[bool],
    player: Owner,
    set: &mut Vec<bool>,
    strategy: &mut Vec<Option<u32>>,
) {
    let mut queue: Vec<u32> = (0..region.len() as u32).filter(|&v| set[v as usize]).collect();
    // seeds keep any strategy assigned by the caller
    while let Some(v) = queue.pop() {
        for &u in &preds[v as usize] {
            let ui = u as usize;
            if !region[ui] || set[ui] {
                continue;
            }
            let vert = game.vertex(u);
            if vert.owner == player {
                set[ui] = true;
                strategy[ui] = Some(v);
                queue.push(u);
            } else if vert.edges.iter().all(|&e| !region[e as usize] || set[e as usize]) {
                set[ui] = true;
                strategy[ui] = None;
                queue.push(u);
            }
        }
    }
}
