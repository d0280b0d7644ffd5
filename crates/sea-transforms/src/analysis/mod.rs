pub mod cfg;
pub mod dominators;

pub use cfg::Cfg;
pub use dominators::DomTree;
