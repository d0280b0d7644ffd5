use std::collections::{HashMap, HashSet};

use sea_core::ir::{BlockId, Function};

/// Control-flow graph of one defined function.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub entry: BlockId,
    pub succs: HashMap<BlockId, Vec<BlockId>>,
    pub preds: HashMap<BlockId, Vec<BlockId>>,
    /// Reachable blocks in reverse postorder, entry first.
    pub rpo: Vec<BlockId>,
}

impl Cfg {
    /// Builds the graph; `None` for declarations.
    pub fn new(func: &Function) -> Option<Self> {
        let entry = func.entry_id()?;
        let succs: HashMap<BlockId, Vec<BlockId>> = func
            .blocks
            .iter()
            .map(|block| (block.id, block.successors()))
            .collect();
        let preds = func.predecessors();

        let mut postorder = Vec::with_capacity(func.blocks.len());
        let mut visited = HashSet::new();
        // iterative DFS: (block, next successor index)
        let mut stack = vec![(entry, 0usize)];
        visited.insert(entry);
        while let Some((block, next)) = stack.last_mut() {
            let block = *block;
            let targets = succs.get(&block).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&succ) = targets.get(*next) {
                *next += 1;
                if succs.contains_key(&succ) && visited.insert(succ) {
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(block);
                stack.pop();
            }
        }
        postorder.reverse();

        Some(Self {
            entry,
            succs,
            preds,
            rpo: postorder,
        })
    }

    pub fn reachable(&self) -> HashSet<BlockId> {
        self.rpo.iter().copied().collect()
    }

    pub fn succs(&self, block: BlockId) -> &[BlockId] {
        self.succs.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn preds(&self, block: BlockId) -> &[BlockId] {
        self.preds.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }
}
