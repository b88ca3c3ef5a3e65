//! Minimum s-t cut on a pixel graph (Dinic's max-flow)
//!
//! Arcs are stored in pairs so `arc ^ 1` is the reverse arc. Depth-first
//! augmentation is iterative to keep stack usage flat on large grids.

use std::collections::VecDeque;

const NONE: usize = usize::MAX;
const EPS: f64 = 1e-9;

#[derive(Debug)]
pub struct FlowGraph {
    first: Vec<usize>,
    next: Vec<usize>,
    to: Vec<usize>,
    capacity: Vec<f64>,
    source: usize,
    sink: usize,
}

impl FlowGraph {
    /// Graph with `nodes` inner nodes plus a source and a sink
    #[must_use]
    pub fn new(nodes: usize) -> Self {
        Self {
            first: vec![NONE; nodes + 2],
            next: Vec::new(),
            to: Vec::new(),
            capacity: Vec::new(),
            source: nodes,
            sink: nodes + 1,
        }
    }

    fn push_arc(&mut self, from: usize, to: usize, capacity: f64) {
        self.next.push(self.first[from]);
        self.first[from] = self.to.len();
        self.to.push(to);
        self.capacity.push(capacity);
    }

    /// Undirected edge between two inner nodes
    pub fn add_edge(&mut self, a: usize, b: usize, capacity: f64) {
        self.push_arc(a, b, capacity);
        self.push_arc(b, a, capacity);
    }

    /// Terminal links: `to_source` is paid if the node ends on the sink side,
    /// `to_sink` if it ends on the source side
    pub fn add_terminal(&mut self, node: usize, to_source: f64, to_sink: f64) {
        // Only the difference matters to the cut
        let shared = to_source.min(to_sink);
        let (s, t) = (to_source - shared, to_sink - shared);
        if s > EPS {
            self.push_arc(self.source, node, s);
            self.push_arc(node, self.source, 0.0);
        }
        if t > EPS {
            self.push_arc(node, self.sink, t);
            self.push_arc(self.sink, node, 0.0);
        }
    }

    fn levels(&self) -> Option<Vec<u32>> {
        let mut level = vec![u32::MAX; self.first.len()];
        let mut queue = VecDeque::new();
        level[self.source] = 0;
        queue.push_back(self.source);

        while let Some(v) = queue.pop_front() {
            let mut arc = self.first[v];
            while arc != NONE {
                let w = self.to[arc];
                if self.capacity[arc] > EPS && level[w] == u32::MAX {
                    level[w] = level[v] + 1;
                    queue.push_back(w);
                }
                arc = self.next[arc];
            }
        }

        (level[self.sink] != u32::MAX).then_some(level)
    }

    /// Push flow along level-graph paths until none remains
    fn blocking_flow(&mut self, level: &mut [u32]) -> f64 {
        let mut current = self.first.clone();
        let mut path: Vec<usize> = Vec::new();
        let mut total = 0.0;
        let mut v = self.source;

        loop {
            if v == self.sink {
                let bottleneck = path
                    .iter()
                    .map(|&arc| self.capacity[arc])
                    .fold(f64::INFINITY, f64::min);
                for &arc in &path {
                    self.capacity[arc] -= bottleneck;
                    self.capacity[arc ^ 1] += bottleneck;
                }
                total += bottleneck;

                // Resume from the tail of the first saturated arc
                let saturated = path
                    .iter()
                    .position(|&arc| self.capacity[arc] <= EPS)
                    .unwrap_or(0);
                path.truncate(saturated);
                v = path.last().map_or(self.source, |&arc| self.to[arc]);
                continue;
            }

            let mut advanced = false;
            while current[v] != NONE {
                let arc = current[v];
                let w = self.to[arc];
                if self.capacity[arc] > EPS && level[w] == level[v] + 1 {
                    path.push(arc);
                    v = w;
                    advanced = true;
                    break;
                }
                current[v] = self.next[arc];
            }
            if advanced {
                continue;
            }

            // Dead end: drop the node from the level graph and retreat
            level[v] = u32::MAX;
            match path.pop() {
                Some(arc) => {
                    v = self.to[arc ^ 1];
                    current[v] = self.next[current[v]];
                },
                None => return total,
            }
        }
    }

    /// Run max-flow and return the total flow
    pub fn max_flow(&mut self) -> f64 {
        let mut flow = 0.0;
        while let Some(mut level) = self.levels() {
            let pushed = self.blocking_flow(&mut level);
            if pushed <= EPS {
                break;
            }
            flow += pushed;
        }
        flow
    }

    /// Inner nodes reachable from the source in the residual graph
    #[must_use]
    pub fn source_side(&self) -> Vec<bool> {
        let mut seen = vec![false; self.first.len()];
        let mut queue = VecDeque::from([self.source]);
        seen[self.source] = true;

        while let Some(v) = queue.pop_front() {
            let mut arc = self.first[v];
            while arc != NONE {
                let w = self.to[arc];
                if self.capacity[arc] > EPS && !seen[w] {
                    seen[w] = true;
                    queue.push_back(w);
                }
                arc = self.next[arc];
            }
        }

        seen.truncate(self.source);
        seen
    }
}
