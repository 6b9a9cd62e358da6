//! Sorted byte-key to `u64` dictionary laid out as a compacted trie.
//!
//! Keys must be inserted in strictly ascending order. Each key adds one node
//! per byte beyond its shared prefix with the trie; equivalent suffixes are
//! not merged. The key's value is carried as the partial output of the first
//! new edge (minus the outputs already accumulated along the shared prefix),
//! so a lookup sums edge outputs along the path plus the terminal node's
//! final output. Arithmetic wraps, which keeps every sum exact modulo 2^64.

use crate::error::{FtsError, Result};

#[derive(Debug, Default)]
struct BuildNode {
    edges: Vec<BuildEdge>,
    final_output: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct BuildEdge {
    label: u8,
    target: u32,
    output: u64,
}

/// Incremental builder; see the module docs for the ordering contract
#[derive(Debug)]
pub struct FstBuilder {
    nodes: Vec<BuildNode>,
    last_key: Option<Vec<u8>>,
    len: usize,
}

impl Default for FstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FstBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![BuildNode::default()],
            last_key: None,
            len: 0,
        }
    }

    /// Number of keys inserted so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a key. Fails with `KeysNotSorted` unless `key` is strictly
    /// greater than the previously inserted key.
    pub fn insert(&mut self, key: &[u8], value: u64) -> Result<()> {
        if let Some(previous) = &self.last_key {
            if key <= previous.as_slice() {
                return Err(FtsError::KeysNotSorted {
                    previous: previous.clone(),
                    key: key.to_vec(),
                });
            }
        }

        let mut node = 0usize;
        let mut acc = 0u64;
        let mut depth = 0usize;

        // Walk the shared prefix. With sorted input only a node's last edge can match.
        while depth < key.len() {
            match self.nodes[node].edges.last() {
                Some(edge) if edge.label == key[depth] => {
                    acc = acc.wrapping_add(edge.output);
                    node = edge.target as usize;
                    depth += 1;
                }
                _ => break,
            }
        }

        let mut remainder = value.wrapping_sub(acc);
        for &label in &key[depth..] {
            let target = self.nodes.len() as u32;
            self.nodes.push(BuildNode::default());
            self.nodes[node].edges.push(BuildEdge {
                label,
                target,
                output: remainder,
            });
            remainder = 0;
            node = target as usize;
        }
        self.nodes[node].final_output = Some(remainder);

        self.last_key = Some(key.to_vec());
        self.len += 1;
        Ok(())
    }

    /// Compact the trie into flat arrays
    pub fn finish(self) -> Fst {
        let node_count = self.nodes.len();
        let edge_count: usize = self.nodes.iter().map(|n| n.edges.len()).sum();

        let mut fst = Fst {
            node_start: Vec::with_capacity(node_count + 1),
            labels: Vec::with_capacity(edge_count),
            targets: Vec::with_capacity(edge_count),
            outputs: Vec::with_capacity(edge_count),
            final_outputs: Vec::with_capacity(node_count),
            is_final: Vec::with_capacity(node_count),
            len: self.len,
        };

        for node in &self.nodes {
            fst.node_start.push(fst.labels.len() as u32);
            debug_assert!(node.edges.windows(2).all(|w| w[0].label < w[1].label));
            for edge in &node.edges {
                fst.labels.push(edge.label);
                fst.targets.push(edge.target);
                fst.outputs.push(edge.output);
            }
            fst.is_final.push(node.final_output.is_some());
            fst.final_outputs.push(node.final_output.unwrap_or(0));
        }
        fst.node_start.push(fst.labels.len() as u32);

        fst
    }
}

/// Immutable compacted dictionary
#[derive(Debug, Clone, Default)]
pub struct Fst {
    /// Edge range of node `n` is `node_start[n]..node_start[n + 1]`
    node_start: Vec<u32>,
    labels: Vec<u8>,
    targets: Vec<u32>,
    outputs: Vec<u64>,
    final_outputs: Vec<u64>,
    is_final: Vec<bool>,
    len: usize,
}

impl Fst {
    /// Look up a key, returning its value if the key was inserted
    pub fn get(&self, key: &[u8]) -> Option<u64> {
        if self.node_start.is_empty() {
            return None;
        }

        let mut node = 0usize;
        let mut acc = 0u64;

        for &byte in key {
            let start = self.node_start[node] as usize;
            let end = self.node_start[node + 1] as usize;
            let idx = start + self.labels[start..end].binary_search(&byte).ok()?;
            acc = acc.wrapping_add(self.outputs[idx]);
            node = self.targets[idx] as usize;
        }

        if self.is_final[node] {
            Some(acc.wrapping_add(self.final_outputs[node]))
        } else {
            None
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.is_final.len()
    }

    /// Approximate heap + inline footprint in bytes
    pub fn memory_bytes(&self) -> usize {
        self.node_start.len() * 4
            + self.labels.len()
            + self.targets.len() * 4
            + self.outputs.len() * 8
            + self.final_outputs.len() * 8
            + self.is_final.len()
            + std::mem::size_of::<Self>()
    }
}
