use serde::Serialize;

use crate::{
    condition::{ConditionExpression, ExistenceFacts, Flag},
    graph::ComponentGraph,
    options::ResolverOptions,
    order::{creation_order, CreationOrder},
    types::ComponentId,
};

/// Final classification of a component
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Existence {
    Present,
    Absent,
}
impl Existence {
    pub fn from_bool(exists: bool) -> Self {
        if exists {
            Existence::Present
        } else {
            Existence::Absent
        }
    }

    pub fn is_present(self) -> bool {
        self == Existence::Present
    }
}

/// Running classification while the fixed point is computed - `None` = undecided
struct WorkingSet<'g> {
    graph: &'g ComponentGraph,
    status: &'g [Option<Existence>],
}
impl ExistenceFacts for WorkingSet<'_> {
    fn component_exists(&self, flag: &Flag) -> Option<bool> {
        component_exists(self.graph, flag, |id| self.status[id.0])
    }
}

/// Looks up a component fact
///
/// Components which are not declared at all are a known fact: absent.
fn component_exists(
    graph: &ComponentGraph,
    flag: &Flag,
    status: impl Fn(ComponentId) -> Option<Existence>,
) -> Option<bool> {
    match flag {
        Flag::Component(identity) => match graph.id_of(identity) {
            Some(id) => status(id).map(Existence::is_present),
            None => Some(false),
        },
        Flag::ComponentName(name) => {
            let mut undecided = false;
            for id in graph.components_named(name) {
                match status(id) {
                    Some(Existence::Present) => return Some(true),
                    Some(Existence::Absent) => {}
                    None => undecided = true,
                }
            }
            if undecided {
                None
            } else {
                Some(false)
            }
        }
        Flag::Property(_) | Flag::Class(_) => Some(true),
    }
}

/// Runs the fixed-point existence resolution once
///
/// 1. Every component without a condition is present
/// 2. Conditional components are evaluated as soon as all components their condition mentions
///    are classified, for at most `undecided + 1` passes
/// 3. Anything still undecided is absent
pub fn resolve(graph: &ComponentGraph, options: &ResolverOptions) -> ResolutionResult {
    let mut status: Vec<Option<Existence>> = vec![None; graph.len()];
    let mut undecided = Vec::new();

    for id in graph.ids() {
        match graph.condition(id) {
            None => status[id.0] = Some(Existence::Present),
            Some(_) => undecided.push(id),
        }
    }

    let bound = options.pass_bound(undecided.len());
    tracing::debug!(
        "Resolving {} conditional components (of {}) within {bound} passes",
        undecided.len(),
        graph.len()
    );

    let mut passes = 0;
    while !undecided.is_empty() && passes < bound {
        passes += 1;
        let before = undecided.len();
        let mut still_undecided = Vec::with_capacity(before);

        for id in undecided.drain(..) {
            let decided = match graph.condition(id) {
                Some(condition) => decide(graph, &status, condition),
                None => Some(Existence::Present),
            };

            match decided {
                Some(existence) => status[id.0] = Some(existence),
                None => still_undecided.push(id),
            }
        }

        let classified = before - still_undecided.len();
        tracing::debug!(
            "Pass {passes}: classified {classified}, {} components still undecided",
            still_undecided.len()
        );

        undecided = still_undecided;
        if classified == 0 {
            break;
        }
    }

    // Fail closed - what could not be proven present is absent
    for id in &undecided {
        tracing::warn!(
            "Condition of '{}' could not be decided after {passes} passes - treating it as absent",
            graph.identity(*id)
        );
        status[id.0] = Some(Existence::Absent);
    }

    ResolutionResult {
        graph: graph.clone(),
        existence: status
            .into_iter()
            .map(|status| status.unwrap_or(Existence::Absent))
            .collect(),
        unresolved: undecided,
        passes,
    }
}

fn decide(
    graph: &ComponentGraph,
    status: &[Option<Existence>],
    condition: &ConditionExpression,
) -> Option<Existence> {
    let facts = WorkingSet { graph, status };
    if !condition.is_decidable(&facts) {
        return None;
    }
    Some(Existence::from_bool(condition.evaluate(&facts)))
}

/// Outcome of the existence resolution
///
/// Every component is either present or absent. Components the resolver could not decide are
/// absent and additionally listed in [ResolutionResult::unresolved].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    graph: ComponentGraph,
    /// Indexed by [ComponentId]
    existence: Vec<Existence>,
    unresolved: Vec<ComponentId>,
    passes: usize,
}

impl ResolutionResult {
    pub fn graph(&self) -> &ComponentGraph {
        &self.graph
    }

    pub fn existence(&self, id: ComponentId) -> Existence {
        self.existence[id.0]
    }

    pub fn is_present(&self, id: ComponentId) -> bool {
        self.existence(id).is_present()
    }

    /// If the component with this identity exists - undeclared components do not
    pub fn exists(&self, identity: &str) -> bool {
        self.graph
            .id_of(identity)
            .is_some_and(|id| self.is_present(id))
    }

    pub fn is_conditional(&self, identity: &str) -> bool {
        self.graph
            .id_of(identity)
            .is_some_and(|id| self.graph.is_conditional(id))
    }

    pub fn condition(&self, identity: &str) -> Option<&ConditionExpression> {
        self.graph
            .id_of(identity)
            .and_then(|id| self.graph.condition(id))
    }

    /// Eager dependencies of a component, by identity
    pub fn dependencies(&self, identity: &str) -> Vec<&str> {
        self.graph
            .id_of(identity)
            .map(|id| {
                self.graph
                    .eager_dependencies(id)
                    .iter()
                    .map(|dep| self.graph.identity(*dep))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Present components in declaration order
    pub fn present(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.graph.ids().filter(move |id| self.is_present(*id))
    }

    /// Absent components in declaration order
    pub fn absent(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.graph.ids().filter(move |id| !self.is_present(*id))
    }

    pub fn present_identities(&self) -> Vec<&str> {
        self.present().map(|id| self.graph.identity(id)).collect()
    }

    pub fn absent_identities(&self) -> Vec<&str> {
        self.absent().map(|id| self.graph.identity(id)).collect()
    }

    /// Components left undecided at the pass bound, folded into absent
    pub fn unresolved(&self) -> &[ComponentId] {
        &self.unresolved
    }

    /// Every evaluated component - always the whole graph
    pub fn evaluated(&self) -> impl Iterator<Item = (ComponentId, Existence)> + '_ {
        self.graph.ids().map(move |id| (id, self.existence(id)))
    }

    /// Number of passes the fixed point iteration needed
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Orders the present components so each comes after its present eager dependencies
    pub fn creation_order(&self) -> CreationOrder {
        creation_order(&self.graph, |id| self.is_present(id))
    }
}

#[cfg(test)]
impl ResolutionResult {
    /// A result with hand-picked existence, bypassing resolution
    pub(crate) fn forced(graph: ComponentGraph, is_present: impl Fn(ComponentId) -> bool) -> Self {
        let existence = graph
            .ids()
            .map(|id| Existence::from_bool(is_present(id)))
            .collect();
        Self {
            graph,
            existence,
            unresolved: Vec::new(),
            passes: 0,
        }
    }
}

impl ExistenceFacts for ResolutionResult {
    fn component_exists(&self, flag: &Flag) -> Option<bool> {
        component_exists(&self.graph, flag, |id| Some(self.existence(id)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::types::{ComponentDescriptor, DependencyReference};

    fn resolve_all(descriptors: Vec<ComponentDescriptor>) -> ResolutionResult {
        let graph = ComponentGraph::from_descriptors(descriptors).expect("valid graph");
        resolve(&graph, &ResolverOptions::default())
    }

    #[test]
    fn unconditional_components_are_seeded_present() {
        let result = resolve_all(vec![
            ComponentDescriptor::new("A"),
            ComponentDescriptor::new("B").depends_on(DependencyReference::eager("A")),
        ]);

        assert_eq!(result.present_identities(), vec!["A", "B"]);
        assert!(result.absent_identities().is_empty());
        assert_eq!(result.passes(), 0);
    }

    #[test]
    fn chained_conditions_resolve_across_passes() {
        // Declared in reverse so each pass can only decide one more component
        let result = resolve_all(vec![
            ComponentDescriptor::new("C")
                .with_condition(ConditionExpression::on_component(["B"])),
            ComponentDescriptor::new("B")
                .with_condition(ConditionExpression::on_component(["A"])),
            ComponentDescriptor::new("A")
                .with_condition(ConditionExpression::property("feature.a")),
        ]);

        assert_eq!(result.present_identities(), vec!["C", "B", "A"]);
        assert!(result.unresolved().is_empty());
        assert_eq!(result.passes(), 3);
    }

    #[test]
    fn missing_component_condition() {
        let result = resolve_all(vec![
            ComponentDescriptor::new("RealPool"),
            ComponentDescriptor::new("FallbackPool")
                .with_condition(ConditionExpression::on_missing_component(["RealPool"])),
            ComponentDescriptor::new("InMemoryCache")
                .with_condition(ConditionExpression::on_missing_component(["RedisCache"])),
        ]);

        assert!(result.exists("RealPool"));
        assert!(!result.exists("FallbackPool"));
        assert!(result.exists("InMemoryCache"));
    }

    #[test]
    fn name_conditions_match_declared_names() {
        let result = resolve_all(vec![
            ComponentDescriptor::new("com.acme.PostgresPool").with_name("dataSource"),
            ComponentDescriptor::new("com.acme.Migrations")
                .with_condition(ConditionExpression::on_component_named("dataSource")),
            ComponentDescriptor::new("com.acme.MockPool")
                .with_condition(ConditionExpression::on_missing_component_named("dataSource")),
        ]);

        assert!(result.exists("com.acme.Migrations"));
        assert!(!result.exists("com.acme.MockPool"));
    }

    #[test]
    fn property_conditions_are_optimistic() {
        let result = resolve_all(vec![ComponentDescriptor::new("Feature").with_condition(
            ConditionExpression::property_having("feature.enabled", "true"),
        )]);
        assert!(result.exists("Feature"));
    }

    #[test]
    fn circular_conditions_fail_closed() {
        let result = resolve_all(vec![
            ComponentDescriptor::new("P").with_condition(ConditionExpression::on_component(["Q"])),
            ComponentDescriptor::new("Q").with_condition(ConditionExpression::on_component(["P"])),
        ]);

        assert_eq!(result.absent_identities(), vec!["P", "Q"]);
        assert_eq!(result.unresolved().len(), 2);
    }

    #[test]
    fn max_passes_cuts_resolution_short() {
        let graph = ComponentGraph::from_descriptors(vec![
            ComponentDescriptor::new("C")
                .with_condition(ConditionExpression::on_component(["B"])),
            ComponentDescriptor::new("B")
                .with_condition(ConditionExpression::on_component(["A"])),
            ComponentDescriptor::new("A")
                .with_condition(ConditionExpression::constant(true)),
        ])
        .unwrap();

        let result = resolve(&graph, &ResolverOptions::default().with_max_passes(1));
        assert_eq!(result.present_identities(), vec!["A"]);
        assert_eq!(result.unresolved().len(), 2);
    }

    #[test]
    fn result_answers_queries() {
        let result = resolve_all(vec![
            ComponentDescriptor::new("A"),
            ComponentDescriptor::new("B")
                .depends_on(DependencyReference::eager("A"))
                .with_condition(ConditionExpression::constant(false)),
        ]);

        assert!(result.is_conditional("B"));
        assert!(!result.is_conditional("A"));
        assert!(!result.is_conditional("Undeclared"));
        assert_eq!(result.condition("B"), Some(&ConditionExpression::constant(false)));
        assert_eq!(result.dependencies("B"), vec!["A"]);
        assert!(result.dependencies("Undeclared").is_empty());
        assert_eq!(result.evaluated().count(), 2);
        assert_eq!(
            result.component_exists(&Flag::Component("B".into())),
            Some(false)
        );
    }
}
