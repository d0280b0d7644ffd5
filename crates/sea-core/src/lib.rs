pub mod diagnostics;
pub mod intrinsics;
pub mod ir;
pub mod pretty;
