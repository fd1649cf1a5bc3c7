use crate::{
    errors::GraphErrors,
    graph::ComponentGraph,
    options::ResolverOptions,
    plan::ExistencePlan,
    types::ComponentDescriptor,
};

//////////////////////////////////////////////////////////////////////
///
/// Resolution consists of three parts.
/// 1. The builder where one registers all component descriptors
/// 2. The graph, which checks the input and derives eager edges
/// 3. The plan - existence, creation order, flag names and diagnostics

pub struct ExistenceGraphBuilder {
    /// Registered component descriptors, in declaration order
    pub(crate) registered_components: Vec<ComponentDescriptor>,
    pub(crate) options: ResolverOptions,
}
impl Default for ExistenceGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExistenceGraphBuilder {
    pub fn new() -> Self {
        ExistenceGraphBuilder {
            registered_components: Vec::new(),
            options: ResolverOptions::default(),
        }
    }
}
impl ExistenceGraphBuilder {
    pub fn add_component(mut self, descriptor: ComponentDescriptor) -> Self {
        self.registered_components.push(descriptor);
        self
    }

    pub fn add_components(
        mut self,
        descriptors: impl IntoIterator<Item = ComponentDescriptor>,
    ) -> Self {
        self.registered_components.extend(descriptors);
        self
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build_graph(self) -> Result<ComponentGraph, GraphErrors> {
        ComponentGraph::new(self)
    }

    /// Builds the graph and runs the whole resolution pipeline on it
    pub fn plan(self) -> Result<ExistencePlan, GraphErrors> {
        let options = self.options.clone();
        let graph = ComponentGraph::new(self)?;
        Ok(ExistencePlan::from_graph(graph, options))
    }
}
