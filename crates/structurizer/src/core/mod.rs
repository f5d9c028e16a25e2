mod block;
mod classify;
mod construct;
mod edge;
mod guard;
mod if_header;
mod label;
mod merge;
mod order;
mod replay;
mod switch;

#[cfg(test)]
mod tests;

use std::time::Instant;

use petgraph::{dot::Dot, graph::NodeIndex, Graph};
use tracing::{debug, info, warn};

pub use block::{BlockInfo, BlockRegistry};
pub use construct::{Construct, ConstructId, ConstructKind};
pub use edge::EdgeKind;
pub use guard::GuardPlan;

use crate::{
    core::{
        classify::classify_edges,
        guard::plan_guards,
        if_header::find_if_selection_internal_headers,
        label::label_constructs,
        merge::register_merges,
        order::{compute_block_order, verify_header_continue_merge_order},
        replay::StatementEmitter,
        switch::find_switch_case_headers,
    },
    error::Error,
    interfaces::{BlockId, Function, StructurizerArgs},
    ir::{emit::PseudoCodeEmitter, types::StructuredFunction},
};

/// The guard prefix used when none is configured.
pub const DEFAULT_GUARD_PREFIX: &str = "guard";

/// The printer indentation used when none is configured.
pub const DEFAULT_INDENT_WIDTH: usize = 4;

/// Structures a single function.
///
/// ```
/// use arbor_structurizer::{BasicBlock, Function, FunctionStructurizer, Terminator};
///
/// let function = Function::new(
///     "main",
///     vec![
///         BasicBlock::new(10, Terminator::conditional(1, 20, 99)).with_selection_merge(99),
///         BasicBlock::new(20, Terminator::branch(99)),
///         BasicBlock::new(99, Terminator::Return),
///     ],
/// );
///
/// let structured = FunctionStructurizer::new(&function).run().expect("failed to structurize");
/// assert_eq!(structured.name, "main");
/// ```
#[derive(Debug, Clone)]
pub struct FunctionStructurizer<'a> {
    function: &'a Function,
    guard_prefix: String,
    block_markers: bool,
}

impl<'a> FunctionStructurizer<'a> {
    /// Creates a structurizer for `function` with the default guard prefix and no block markers.
    pub fn new(function: &'a Function) -> Self {
        Self { function, guard_prefix: DEFAULT_GUARD_PREFIX.to_string(), block_markers: false }
    }

    /// Sets the prefix of synthesized guard variable names.
    pub fn guard_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.guard_prefix = prefix.into();
        self
    }

    /// Sets whether every basic block's statements are preceded by a block marker.
    pub fn block_markers(mut self, enabled: bool) -> Self {
        self.block_markers = enabled;
        self
    }

    /// Runs every analysis phase, validating the function's structured control flow.
    pub fn analyze(&self) -> Result<FunctionAnalysis<'a>, Error> {
        let name = &self.function.name;

        let start_time = Instant::now();
        let mut registry = BlockRegistry::new(self.function)?;
        register_merges(&mut registry)?;
        debug!("registering blocks of '{name}' took {:?}", start_time.elapsed());

        let start_order_time = Instant::now();
        let order = compute_block_order(&mut registry)?;
        verify_header_continue_merge_order(&registry, &order)?;
        debug!(
            "ordering {} reachable blocks of '{name}' took {:?}",
            order.len(),
            start_order_time.elapsed()
        );

        let start_label_time = Instant::now();
        let constructs = label_constructs(&mut registry, &order)?;
        find_switch_case_headers(&mut registry, &constructs)?;
        debug!(
            "labeling {} constructs of '{name}' took {:?}",
            constructs.len(),
            start_label_time.elapsed()
        );

        let start_classify_time = Instant::now();
        classify_edges(&mut registry, &order, &constructs)?;
        find_if_selection_internal_headers(&mut registry, &order, &constructs)?;
        let guards = plan_guards(&registry, &order, &self.guard_prefix)?;
        debug!("classifying edges of '{name}' took {:?}", start_classify_time.elapsed());

        Ok(FunctionAnalysis { registry, order, constructs, guards })
    }

    /// Analyzes the function and emits its structured statement tree.
    pub fn run(&self) -> Result<StructuredFunction, Error> {
        self.analyze()?.emit(self.block_markers)
    }
}

/// The validated control-flow facts of one function.
#[derive(Debug, Clone)]
pub struct FunctionAnalysis<'a> {
    registry: BlockRegistry<'a>,
    order: Vec<BlockId>,
    constructs: Vec<Construct>,
    guards: GuardPlan,
}

impl<'a> FunctionAnalysis<'a> {
    /// The per-block facts.
    pub fn registry(&self) -> &BlockRegistry<'a> {
        &self.registry
    }

    /// The reachable blocks in structured order.
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    /// The construct tree. The first construct is the function construct.
    pub fn constructs(&self) -> &[Construct] {
        &self.constructs
    }

    /// The guard variables the function needs.
    pub fn guards(&self) -> &GuardPlan {
        &self.guards
    }

    /// Replays the block order into a statement tree.
    pub fn emit(&self, block_markers: bool) -> Result<StructuredFunction, Error> {
        let start_time = Instant::now();
        let name = &self.registry.function().name;
        let body = StatementEmitter::new(
            &self.registry,
            &self.order,
            &self.constructs,
            &self.guards,
            block_markers,
        )
        .emit()?;
        debug!("emitting statements of '{name}' took {:?}", start_time.elapsed());

        Ok(StructuredFunction {
            name: name.clone(),
            guards: self.guards.iter().map(|(_, name)| name.to_string()).collect(),
            body,
        })
    }

    /// The classified control-flow graph: one node per ordered block, labelled with its id,
    /// position and innermost construct kind, and one edge per classified branch.
    pub fn graph(&self) -> Result<Graph<String, String>, Error> {
        let mut graph = Graph::new();
        let mut nodes: Vec<(BlockId, NodeIndex)> = Vec::with_capacity(self.order.len());

        for (pos, &id) in self.order.iter().enumerate() {
            let kind = self
                .registry
                .info(id)?
                .construct
                .and_then(|construct| self.constructs.get(construct.index()))
                .map(|construct| construct.kind)
                .unwrap_or(ConstructKind::Function);
            nodes.push((id, graph.add_node(format!("block {id} @ {pos} ({kind})"))));
        }

        let node_of = |id: BlockId| {
            nodes
                .iter()
                .find(|(block, _)| *block == id)
                .map(|(_, node)| *node)
                .ok_or_else(|| Error::Internal(format!("block {id} has no node in the graph")))
        };
        for &src in &self.order {
            for &(dest, kind) in &self.registry.info(src)?.succ_edge {
                graph.add_edge(node_of(src)?, node_of(dest)?, kind.to_string());
            }
        }

        Ok(graph)
    }
}

/// The outcome of structuring one function.
#[derive(Debug)]
pub struct FunctionOutcome {
    /// The function's name
    pub name: String,
    /// The statement tree, or the diagnostic that stopped the function
    pub result: Result<StructuredFunction, Error>,
    /// The classified control-flow graph, if analysis succeeded
    pub graph: Option<Graph<String, String>>,
}

/// Result of a structurize operation
///
/// Holds one outcome per requested function. A function failing to structure does not affect
/// the others.
#[derive(Debug)]
pub struct StructurizeResult {
    /// The per-function outcomes, in module order
    pub functions: Vec<FunctionOutcome>,
    indent_width: usize,
}

impl StructurizeResult {
    /// Renders every structured function as pseudo code. Failed functions are listed as
    /// comments naming the error.
    pub fn source(&self) -> String {
        let emitter = PseudoCodeEmitter::new(self.indent_width);
        self.functions
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(function) => emitter.emit(function),
                Err(e) => {
                    format!("// '{}' could not be structured ({}): {e}", outcome.name, e.category())
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Serializes the statement trees of the structured functions as pretty JSON.
    pub fn as_json(&self) -> Result<String, Error> {
        let functions: Vec<&StructuredFunction> = self.successes().collect();
        serde_json::to_string_pretty(&functions)
            .map_err(|e| Error::Eyre(eyre::eyre!("serializing statement trees failed: {e}")))
    }

    /// Renders the classified control-flow graph of the named function in DOT format.
    pub fn as_dot(&self, name: &str) -> Option<String> {
        self.functions
            .iter()
            .find(|outcome| outcome.name == name)
            .and_then(|outcome| outcome.graph.as_ref())
            .map(|graph| format!("{}", Dot::with_config(graph, &[])))
    }

    /// The structured functions.
    pub fn successes(&self) -> impl Iterator<Item = &StructuredFunction> {
        self.functions.iter().filter_map(|outcome| outcome.result.as_ref().ok())
    }

    /// The functions that failed, with their diagnostics.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.functions
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|e| (outcome.name.as_str(), e)))
    }
}

/// Structures the functions of a module
///
/// Loads the module named by `args.target`, then analyzes and structures every function (or
/// only the one named by `args.function`). Structuring errors are recorded per function; only
/// failing to load the module, or naming a function the module lacks, fails the whole
/// operation.
///
/// # Arguments
///
/// * `args` - Configuration parameters for the structurize operation
///
/// # Returns
///
/// A StructurizeResult with one outcome per function
pub fn structurize(args: StructurizerArgs) -> Result<StructurizeResult, Error> {
    let start_time = Instant::now();

    let start_load_time = Instant::now();
    let module = args
        .get_module()
        .map_err(|e| Error::InvalidInput(format!("loading target module failed: {e}")))?;
    debug!("loading target module took {:?}", start_load_time.elapsed());

    let functions: Vec<&Function> = module
        .functions
        .iter()
        .filter(|function| args.function.is_empty() || function.name == args.function)
        .collect();
    if functions.is_empty() {
        if !args.function.is_empty() {
            return Err(Error::InvalidInput(format!(
                "function '{}' does not exist in the target module",
                args.function
            )));
        }
        warn!("target module contains no functions");
    }

    let guard_prefix = match args.guard_prefix.is_empty() {
        true => DEFAULT_GUARD_PREFIX.to_string(),
        false => args.guard_prefix.clone(),
    };

    info!("structurizing {} function(s)", functions.len());
    let outcomes = functions
        .into_iter()
        .map(|function| {
            let structurizer =
                FunctionStructurizer::new(function).guard_prefix(guard_prefix.as_str());

            let (result, graph) = match structurizer.analyze() {
                Ok(analysis) => (analysis.emit(args.block_markers), analysis.graph().ok()),
                Err(e) => (Err(e), None),
            };
            if let Err(e) = &result {
                warn!("failed to structurize '{}': {}", function.name, e);
            }

            FunctionOutcome { name: function.name.clone(), result, graph }
        })
        .collect::<Vec<_>>();

    let failed = outcomes.iter().filter(|outcome| outcome.result.is_err()).count();
    info!("structurized {} function(s), {} failed", outcomes.len() - failed, failed);
    debug!("structurizing took {:?}", start_time.elapsed());

    Ok(StructurizeResult {
        functions: outcomes,
        indent_width: args.indent_width.unwrap_or(DEFAULT_INDENT_WIDTH),
    })
}
