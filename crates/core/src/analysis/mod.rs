//! Decoding and control-flow reconstruction.
//!
//! - `sweep`: linear-sweep decoding of an address range
//! - `function`: function extents, basic blocks, labels and callees
//! - `callgraph`: worklist expansion of callees into a call graph

pub mod callgraph;
pub mod function;
pub mod sweep;

pub use callgraph::build_call_graph;
pub use function::FunctionBuilder;
pub use sweep::sweep;
