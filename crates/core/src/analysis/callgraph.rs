use std::collections::VecDeque;

use tracing::debug;

use crate::analysis::function::FunctionBuilder;
use crate::model::{CallGraph, Function};

/// Expand `root` into every function reachable through direct calls.
///
/// The worklist is FIFO. A function whose name is already in the graph is
/// dropped, which is what terminates recursive and mutually recursive graphs.
pub fn build_call_graph(builder: &FunctionBuilder<'_>, root: Function) -> CallGraph {
    let mut graph = CallGraph::new(root.name.clone());
    let mut worklist = VecDeque::from([root]);

    while let Some(func) = worklist.pop_front() {
        if graph.contains(&func.name) {
            continue;
        }
        for callee in &func.callees {
            if graph.contains(&callee.name) {
                continue;
            }
            worklist.push_back(builder.build_callee(callee));
        }
        debug!(name = %func.name, pending = worklist.len(), "added function to call graph");
        graph.functions.insert(func.name.clone(), func);
    }
    graph
}
