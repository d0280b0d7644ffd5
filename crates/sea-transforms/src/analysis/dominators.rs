//! Iterative dominator computation over the reachable part of a CFG.

use std::collections::{HashMap, HashSet};

use sea_core::ir::BlockId;

use super::cfg::Cfg;

#[derive(Debug, Clone)]
pub struct DomTree {
    entry: BlockId,
    idom: HashMap<BlockId, BlockId>,
    children: HashMap<BlockId, Vec<BlockId>>,
    rpo_index: HashMap<BlockId, usize>,
}

impl DomTree {
    pub fn new(cfg: &Cfg) -> Self {
        let rpo_index: HashMap<BlockId, usize> = cfg
            .rpo
            .iter()
            .enumerate()
            .map(|(idx, block)| (*block, idx))
            .collect();
        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        idom.insert(cfg.entry, cfg.entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in cfg.rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &pred in cfg.preds(block) {
                    if !idom.contains_key(&pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_index, pred, current),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&block) != Some(&new_idom) {
                        idom.insert(block, new_idom);
                        changed = true;
                    }
                }
            }
        }

        let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for &block in &cfg.rpo {
            if block == cfg.entry {
                continue;
            }
            if let Some(parent) = idom.get(&block) {
                children.entry(*parent).or_default().push(block);
            }
        }

        Self {
            entry: cfg.entry,
            idom,
            children,
            rpo_index,
        }
    }

    /// Immediate dominator; `None` for the entry and unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        if block == self.entry {
            return None;
        }
        self.idom.get(&block).copied()
    }

    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.rpo_index.contains_key(&block)
    }

    /// Whether `a` dominates `b`. Every block dominates itself; nothing
    /// dominates an unreachable block except itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let mut current = b;
        while let Some(parent) = self.idom(current) {
            if parent == a {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Dominance frontier of every reachable block.
    pub fn frontiers(&self, cfg: &Cfg) -> HashMap<BlockId, HashSet<BlockId>> {
        let mut frontiers: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        for &block in &cfg.rpo {
            let preds: Vec<BlockId> = cfg
                .preds(block)
                .iter()
                .copied()
                .filter(|pred| self.is_reachable(*pred))
                .collect();
            if preds.len() < 2 {
                continue;
            }
            let Some(block_idom) = self.idom(block) else {
                continue;
            };
            for pred in preds {
                let mut runner = pred;
                while runner != block_idom {
                    frontiers.entry(runner).or_default().insert(block);
                    match self.idom(runner) {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }
        frontiers
    }
}

fn intersect(
    idom: &HashMap<BlockId, BlockId>,
    rpo_index: &HashMap<BlockId, usize>,
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    let index = |block: BlockId| rpo_index.get(&block).copied().unwrap_or(usize::MAX);
    while a != b {
        while index(a) > index(b) {
            match idom.get(&a) {
                Some(&next) if next != a => a = next,
                _ => return b,
            }
        }
        while index(b) > index(a) {
            match idom.get(&b) {
                Some(&next) if next != b => b = next,
                _ => return a,
            }
        }
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_core::ir::builder::FunctionBuilder;
    use sea_core::ir::{Function, Ty};

    /// entry -> header; header -> body | exit; body -> header
    fn loop_function() -> Function {
        let mut b = FunctionBuilder::new("loop", vec![Ty::I1], Ty::Void);
        let header = b.block();
        let body = b.block();
        let exit = b.block();
        b.br(header);
        b.switch_to(header);
        let cond = b.param(0);
        b.cond_br(cond, body, exit);
        b.switch_to(body);
        b.br(header);
        b.switch_to(exit);
        b.ret(None);
        b.finish()
    }

    #[test]
    fn loop_header_dominates_body_and_exit() {
        let func = loop_function();
        let cfg = Cfg::new(&func).unwrap();
        let dom = DomTree::new(&cfg);
        assert_eq!(dom.idom(2), Some(1));
        assert_eq!(dom.idom(3), Some(1));
        assert_eq!(dom.idom(1), Some(0));
        assert!(dom.dominates(0, 3));
        assert!(!dom.dominates(2, 3));
        let mut children = dom.children(1).to_vec();
        children.sort();
        assert_eq!(children, vec![2, 3]);
    }

    #[test]
    fn loop_header_is_in_its_own_frontier() {
        let func = loop_function();
        let cfg = Cfg::new(&func).unwrap();
        let dom = DomTree::new(&cfg);
        let frontiers = dom.frontiers(&cfg);
        assert!(frontiers[&2].contains(&1));
        assert!(frontiers[&1].contains(&1));
        assert!(!frontiers.contains_key(&0));
    }
}
