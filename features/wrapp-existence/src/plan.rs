use std::fmt::Debug;

use crate::{
    context::GenerationContext,
    errors::{GraphErrors, ValidationErrors},
    graph::ComponentGraph,
    options::ResolverOptions,
    order::CreationOrder,
    resolver::{resolve, ResolutionResult},
    validator::{Diagnostic, Diagnostics, StructuralValidator},
};

/// Everything the code generator needs, computed once per build
///
/// Holds the existence of every component, the creation order of the present ones, their flag
/// names and the validation diagnostics.
#[derive(Clone)]
pub struct ExistencePlan {
    result: ResolutionResult,
    order: CreationOrder,
    context: GenerationContext,
    diagnostics: Diagnostics,
}
impl Debug for ExistencePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.result.graph();
        let mut map = f.debug_struct("ExistencePlan");
        for (id, existence) in self.result.evaluated() {
            let val = if existence.is_present() {
                "enabled"
            } else {
                "disabled"
            };
            map.field(graph.identity(id), &val);
        }
        map.finish()
    }
}

impl ExistencePlan {
    /// Builds the graph and runs resolution, ordering, naming and validation
    pub fn build(
        descriptors: impl IntoIterator<Item = crate::types::ComponentDescriptor>,
        options: ResolverOptions,
    ) -> Result<Self, GraphErrors> {
        let graph = ComponentGraph::from_descriptors(descriptors)?;
        Ok(Self::from_graph(graph, options))
    }

    pub fn from_graph(graph: ComponentGraph, options: ResolverOptions) -> Self {
        tracing::debug!("Planning component existence for {} components", graph.len());

        let result = resolve(&graph, &options);
        let order = result.creation_order();
        let context = GenerationContext::from_resolution(&result, &options);
        let diagnostics = StructuralValidator::new(&result)
            .with_order(&order)
            .with_context(&context)
            .validate();

        tracing::debug!(
            "Planned {} present and {} absent components",
            order.len(),
            graph.len() - order.len()
        );

        Self {
            result,
            order,
            context,
            diagnostics,
        }
    }

    pub fn result(&self) -> &ResolutionResult {
        &self.result
    }

    pub fn graph(&self) -> &ComponentGraph {
        self.result.graph()
    }

    pub fn creation_order(&self) -> &CreationOrder {
        &self.order
    }

    /// Identities of the present components in creation order
    pub fn creation_order_identities(&self) -> Vec<&str> {
        self.order.identities(self.result.graph())
    }

    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Fails if validation found errors, otherwise returns the plan with its warnings
    pub fn checked(self) -> Result<(Self, Vec<Diagnostic>), ValidationErrors> {
        let warnings = self.diagnostics.clone().into_result()?;
        Ok((self, warnings))
    }
}
