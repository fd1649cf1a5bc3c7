use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{
    builder::ExistenceGraphBuilder,
    condition::ConditionExpression,
    errors::{GraphError, GraphErrors},
    types::{ComponentDescriptor, ComponentId},
};

/// Identities a descriptor eagerly depends on
///
/// Constructor, field and method injection points are unioned. Deferred, optional and value
/// references are left out. Duplicates are removed, declaration order is kept.
pub fn eager_targets(descriptor: &ComponentDescriptor) -> Vec<&str> {
    let mut targets: Vec<&str> = Vec::new();
    for dependency in descriptor.dependencies.iter().filter(|d| d.is_eager()) {
        if !targets.contains(&dependency.target.as_str()) {
            targets.push(&dependency.target);
        }
    }
    targets
}

/// Arena of all declared components and their eager edges
///
/// Cycles are not rejected here. Two components in a cycle are only a problem if both end up
/// present, which is decided later.
#[derive(Clone, PartialEq)]
pub struct ComponentGraph(Arc<ComponentGraphInner>);
#[derive(PartialEq)]
pub struct ComponentGraphInner {
    components: Vec<ComponentDescriptor>,
    by_identity: HashMap<String, ComponentId>,
    by_name: BTreeMap<String, Vec<ComponentId>>,
    /// Eager dependencies per component, indexed by [ComponentId]
    eager: Vec<Vec<ComponentId>>,
}
impl std::fmt::Debug for ComponentGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for id in self.ids() {
            let dependencies: Vec<&str> = self
                .eager_dependencies(id)
                .iter()
                .map(|dep| self.identity(*dep))
                .collect();
            map.entry(&self.identity(id), &dependencies);
        }
        map.finish()
    }
}

impl ComponentGraph {
    pub fn new(builder: ExistenceGraphBuilder) -> Result<Self, GraphErrors> {
        Self::from_descriptors(builder.registered_components)
    }

    /// Builds the graph, collecting every input issue instead of stopping at the first
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ComponentDescriptor>,
    ) -> Result<Self, GraphErrors> {
        let mut inner = ComponentGraphInner {
            components: Vec::new(),
            by_identity: HashMap::new(),
            by_name: BTreeMap::new(),
            eager: Vec::new(),
        };
        let mut errors = Vec::new();

        for descriptor in descriptors {
            if let Err(error) = inner.add(descriptor) {
                errors.push(error);
            }
        }

        inner.index_names();

        let mut eager = Vec::with_capacity(inner.components.len());
        for descriptor in &inner.components {
            let mut edges: Vec<ComponentId> = Vec::new();
            for target in eager_targets(descriptor) {
                match inner.lookup_reference(target, &descriptor.identity) {
                    // An identity and an alias may point at the same component
                    Ok(target) if !edges.contains(&target) => edges.push(target),
                    Ok(_) => {}
                    Err(error) => errors.push(error),
                }
            }
            eager.push(edges);

            // Deferred references add no edge, but still have to point somewhere
            for dependency in descriptor
                .dependencies
                .iter()
                .filter(|d| !d.is_eager() && d.requires_declared_target())
            {
                if let Err(error) = inner.lookup_reference(&dependency.target, &descriptor.identity)
                {
                    errors.push(error);
                }
            }

            if let Some(condition) = &descriptor.condition {
                check_condition(&descriptor.identity, condition, &mut errors);
            }
        }
        inner.eager = eager;

        if !errors.is_empty() {
            return Err(GraphErrors { errors });
        }

        let graph = Self(Arc::new(inner));
        tracing::debug!(
            "Built component graph with {} components ({} conditional) and {} eager edges",
            graph.len(),
            graph.ids().filter(|id| graph.is_conditional(*id)).count(),
            graph.edge_count()
        );

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.0.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.components.is_empty()
    }

    /// All ids, in declaration order
    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        (0..self.0.components.len()).map(ComponentId)
    }

    pub fn id_of(&self, identity: &str) -> Option<ComponentId> {
        self.0.by_identity.get(identity).copied()
    }

    /// Components matching `name` - either by identity or by one of their declared names
    pub fn components_named(&self, name: &str) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self.id_of(name).into_iter().collect();
        for id in self.0.by_name.get(name).into_iter().flatten() {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    /// # Panics
    ///
    /// If the id does not belong to this graph
    pub fn descriptor(&self, id: ComponentId) -> &ComponentDescriptor {
        &self.0.components[id.0]
    }

    pub fn identity(&self, id: ComponentId) -> &str {
        &self.descriptor(id).identity
    }

    pub fn condition(&self, id: ComponentId) -> Option<&ConditionExpression> {
        self.descriptor(id).condition.as_ref()
    }

    pub fn is_conditional(&self, id: ComponentId) -> bool {
        self.descriptor(id).is_conditional()
    }

    /// Components `id` must be constructed after
    pub fn eager_dependencies(&self, id: ComponentId) -> &[ComponentId] {
        &self.0.eager[id.0]
    }

    pub fn edge_count(&self) -> usize {
        self.0.eager.iter().map(Vec::len).sum()
    }
}

impl ComponentGraphInner {
    fn add(&mut self, descriptor: ComponentDescriptor) -> Result<(), GraphError> {
        if self.by_identity.contains_key(&descriptor.identity) {
            return Err(GraphError::Duplicate(descriptor.identity));
        }

        let id = ComponentId(self.components.len());
        self.by_identity.insert(descriptor.identity.clone(), id);
        self.components.push(descriptor);
        Ok(())
    }

    fn index_names(&mut self) {
        for (index, descriptor) in self.components.iter().enumerate() {
            for name in &descriptor.names {
                let ids = self.by_name.entry(name.clone()).or_default();
                if !ids.contains(&ComponentId(index)) {
                    ids.push(ComponentId(index));
                }
            }
        }
    }

    /// Resolves a dependency target - identity first, then unique name
    fn lookup_reference(&self, target: &str, required_by: &str) -> Result<ComponentId, GraphError> {
        if let Some(id) = self.by_identity.get(target) {
            return Ok(*id);
        }

        match self.by_name.get(target).map(Vec::as_slice) {
            Some([id]) => Ok(*id),
            Some(candidates) if !candidates.is_empty() => Err(GraphError::AmbiguousDependency {
                dependency: target.to_string(),
                required_by: required_by.to_string(),
                candidates: candidates
                    .iter()
                    .map(|id| self.components[id.0].identity.clone())
                    .collect(),
            }),
            _ => Err(GraphError::UnknownDependency {
                dependency: target.to_string(),
                required_by: required_by.to_string(),
            }),
        }
    }
}

/// Rejects condition leaves which could never be evaluated meaningfully
fn check_condition(component: &str, condition: &ConditionExpression, errors: &mut Vec<GraphError>) {
    for leaf in condition.leaves() {
        let error = match leaf {
            ConditionExpression::Presence(presence) if presence.is_empty() => {
                GraphError::EmptyPresenceCondition {
                    component: component.to_string(),
                }
            }
            ConditionExpression::Availability(availability) if availability.classes.is_empty() => {
                GraphError::EmptyAvailabilityCondition {
                    component: component.to_string(),
                }
            }
            ConditionExpression::Property(property) if property.name.trim().is_empty() => {
                GraphError::EmptyPropertyName {
                    component: component.to_string(),
                }
            }
            _ => continue,
        };
        errors.push(error);
    }
}
