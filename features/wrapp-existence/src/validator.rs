use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::{
    condition::{ConditionExpression, Flag},
    context::GenerationContext,
    errors::ValidationErrors,
    order::CreationOrder,
    resolver::ResolutionResult,
    types::ComponentId,
};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Advisory only
    Warning,
    /// The build must fail
    Error,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A present component eagerly depends on a conditional component which is absent
    BrokenGuarantee,
    /// An unconditional component eagerly depends on a conditional one
    UnconditionalDependsOnConditional,
    /// A component without condition ended up absent
    UnreachableAbsent,
    /// One component requires the same target to be both present and absent
    ConflictingConditions,
    /// The condition could not be decided within the pass bound
    UndecidedCondition,
    /// Present components eagerly depend on each other in a cycle
    DependencyCycle,
    /// Several components share one flag name
    FlagCollision,
}
impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::BrokenGuarantee | DiagnosticKind::ConflictingConditions => {
                Severity::Error
            }
            DiagnosticKind::UnconditionalDependsOnConditional
            | DiagnosticKind::UnreachableAbsent
            | DiagnosticKind::UndecidedCondition
            | DiagnosticKind::DependencyCycle
            | DiagnosticKind::FlagCollision => Severity::Warning,
        }
    }

    fn code(self) -> &'static str {
        match self {
            DiagnosticKind::BrokenGuarantee => "broken-guarantee",
            DiagnosticKind::UnconditionalDependsOnConditional => "unconditional-depends-on-conditional",
            DiagnosticKind::UnreachableAbsent => "unreachable-absent",
            DiagnosticKind::ConflictingConditions => "conflicting-conditions",
            DiagnosticKind::UndecidedCondition => "undecided-condition",
            DiagnosticKind::DependencyCycle => "dependency-cycle",
            DiagnosticKind::FlagCollision => "flag-collision",
        }
    }
}

/// A build diagnostic, reported at the offending component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Identity of the offending component
    pub component: String,
    pub message: String,
}
impl Diagnostic {
    fn new(kind: DiagnosticKind, component: &str, message: String) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            component: component.to_string(),
            message,
        }
    }
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "{severity}[{}] '{}': {}",
            self.kind.code(),
            self.component,
            self.message
        )
    }
}

/// All diagnostics of a validation run, in the order they were found
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Diagnostics(Vec<Diagnostic>);
impl Diagnostics {
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(move |d| d.kind == kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fails with all errors, or hands back the warnings
    pub fn into_result(self) -> Result<Vec<Diagnostic>, ValidationErrors> {
        let (errors, warnings): (Vec<_>, Vec<_>) = self
            .0
            .into_iter()
            .partition(|d| d.severity == Severity::Error);

        if !errors.is_empty() {
            return Err(ValidationErrors { errors });
        }
        Ok(warnings)
    }
}
impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Read-only static analysis over a resolution
///
/// The creation order and the generation context are optional inputs, they enable the cycle
/// and flag collision checks.
pub struct StructuralValidator<'a> {
    result: &'a ResolutionResult,
    order: Option<&'a CreationOrder>,
    context: Option<&'a GenerationContext>,
}
impl<'a> StructuralValidator<'a> {
    pub fn new(result: &'a ResolutionResult) -> Self {
        Self {
            result,
            order: None,
            context: None,
        }
    }

    pub fn with_order(mut self, order: &'a CreationOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_context(mut self, context: &'a GenerationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn validate(&self) -> Diagnostics {
        let mut diagnostics = Vec::new();

        self.check_broken_guarantees(&mut diagnostics);
        self.check_unconditional_depends_on_conditional(&mut diagnostics);
        self.check_unreachable_absent(&mut diagnostics);
        self.check_conflicting_conditions(&mut diagnostics);
        self.check_undecided_conditions(&mut diagnostics);
        self.check_dependency_cycles(&mut diagnostics);
        self.check_flag_collisions(&mut diagnostics);

        let diagnostics = Diagnostics(diagnostics);
        tracing::debug!(
            "Validation found {} errors and {} warnings",
            diagnostics.errors().count(),
            diagnostics.warnings().count()
        );
        diagnostics
    }

    fn identity(&self, id: ComponentId) -> &str {
        self.result.graph().identity(id)
    }

    /// The declared component a presence flag refers to, if it is unambiguous
    fn target_of(&self, flag: Flag) -> Target {
        let graph = self.result.graph();
        let declared = match &flag {
            Flag::Component(identity) => graph.id_of(identity),
            Flag::ComponentName(name) => match graph.components_named(name).as_slice() {
                [id] => Some(*id),
                _ => None,
            },
            Flag::Property(_) | Flag::Class(_) => None,
        };
        match declared {
            Some(id) => Target::Declared(id),
            None => Target::Undeclared(flag),
        }
    }

    /// A present component must not eagerly depend on an absent conditional component
    fn check_broken_guarantees(&self, diagnostics: &mut Vec<Diagnostic>) {
        let graph = self.result.graph();
        for component in self.result.present() {
            for dependency in graph.eager_dependencies(component) {
                if self.result.is_present(*dependency) || !graph.is_conditional(*dependency) {
                    continue;
                }
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::BrokenGuarantee,
                    self.identity(component),
                    format!(
                        "depends on conditional component '{}', which does not exist - \
                         make the dependency optional or deferred",
                        self.identity(*dependency)
                    ),
                ));
            }
        }
    }

    fn check_unconditional_depends_on_conditional(&self, diagnostics: &mut Vec<Diagnostic>) {
        let graph = self.result.graph();
        for component in graph.ids().filter(|id| !graph.is_conditional(*id)) {
            for dependency in graph.eager_dependencies(component) {
                if !graph.is_conditional(*dependency) {
                    continue;
                }
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnconditionalDependsOnConditional,
                    self.identity(component),
                    format!(
                        "is unconditional but depends on conditional component '{}' - \
                         if its condition fails, the dependency will be missing",
                        self.identity(*dependency)
                    ),
                ));
            }
        }
    }

    fn check_unreachable_absent(&self, diagnostics: &mut Vec<Diagnostic>) {
        let graph = self.result.graph();
        for component in self.result.absent() {
            if graph.is_conditional(component) {
                continue;
            }
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnreachableAbsent,
                self.identity(component),
                "is absent but has no condition - the component graph is inconsistent"
                    .to_string(),
            ));
        }
    }

    fn check_conflicting_conditions(&self, diagnostics: &mut Vec<Diagnostic>) {
        let graph = self.result.graph();
        for component in graph.ids() {
            let Some(condition) = graph.condition(component) else {
                continue;
            };

            let mut requirements: BTreeMap<Flag, (bool, bool)> = BTreeMap::new();
            collect_requirements(condition, true, &mut requirements);

            // Type and name references to the same component are one target
            let mut targets: BTreeMap<Target, (bool, bool)> = BTreeMap::new();
            for (flag, (present, absent)) in requirements {
                let entry = targets.entry(self.target_of(flag)).or_default();
                entry.0 |= present;
                entry.1 |= absent;
            }

            for (target, _) in targets
                .iter()
                .filter(|(_, (present, absent))| *present && *absent)
            {
                let target = match target {
                    Target::Declared(id) => format!("component '{}'", self.identity(*id)),
                    Target::Undeclared(flag) => flag.to_string(),
                };
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::ConflictingConditions,
                    self.identity(component),
                    format!("requires {target} to be both present and absent"),
                ));
            }
        }
    }

    fn check_undecided_conditions(&self, diagnostics: &mut Vec<Diagnostic>) {
        let graph = self.result.graph();
        let unresolved = self.result.unresolved();
        for component in unresolved {
            let waiting_on: Vec<String> = graph
                .condition(*component)
                .map(ConditionExpression::component_flags)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|flag| match flag {
                    Flag::Component(identity) => graph
                        .id_of(&identity)
                        .filter(|id| unresolved.contains(id))
                        .map(|_| identity),
                    Flag::ComponentName(name) => graph
                        .components_named(&name)
                        .iter()
                        .any(|id| unresolved.contains(id))
                        .then_some(name),
                    _ => None,
                })
                .collect();

            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UndecidedCondition,
                self.identity(*component),
                format!(
                    "condition could not be decided, it waits on {waiting_on:?} - \
                     treated as absent"
                ),
            ));
        }
    }

    fn check_dependency_cycles(&self, diagnostics: &mut Vec<Diagnostic>) {
        let Some(order) = self.order else {
            return;
        };
        for edge in order.dropped_edges() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DependencyCycle,
                self.identity(edge.from),
                format!(
                    "is part of a dependency cycle through '{}' - it may be created first",
                    self.identity(edge.to)
                ),
            ));
        }
    }

    fn check_flag_collisions(&self, diagnostics: &mut Vec<Diagnostic>) {
        let Some(context) = self.context else {
            return;
        };
        for collision in context.collisions() {
            let Some((first, others)) = collision.components.split_first() else {
                continue;
            };
            for other in others {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::FlagCollision,
                    self.identity(*other),
                    format!(
                        "shares flag '{}' with '{}' - use qualified flag naming",
                        collision.flag,
                        self.identity(*first)
                    ),
                ));
            }
        }
    }
}

/// Key of a presence requirement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Target {
    Declared(ComponentId),
    Undeclared(Flag),
}

/// Collects hard presence requirements along the conjunctive part of a condition
///
/// `positive` tracks negation. Under negation, OR behaves like AND, and only single-target
/// presence checks turn into hard requirements.
fn collect_requirements(
    condition: &ConditionExpression,
    positive: bool,
    requirements: &mut BTreeMap<Flag, (bool, bool)>,
) {
    match condition {
        ConditionExpression::And { left, right } if positive => {
            collect_requirements(left, positive, requirements);
            collect_requirements(right, positive, requirements);
        }
        ConditionExpression::Or { left, right } if !positive => {
            collect_requirements(left, positive, requirements);
            collect_requirements(right, positive, requirements);
        }
        ConditionExpression::Not { operand } => {
            collect_requirements(operand, !positive, requirements);
        }
        ConditionExpression::Presence(presence) => {
            let targets: Vec<Flag> = presence.targets().collect();
            if !positive && targets.len() != 1 {
                return;
            }
            let must_be_present = presence.must_be_present == positive;
            for target in targets {
                let entry = requirements.entry(target).or_default();
                if must_be_present {
                    entry.0 = true;
                } else {
                    entry.1 = true;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        graph::ComponentGraph,
        options::ResolverOptions,
        resolver::resolve,
        types::{ComponentDescriptor, DependencyReference},
    };

    fn validate(descriptors: Vec<ComponentDescriptor>) -> Diagnostics {
        let graph = ComponentGraph::from_descriptors(descriptors).expect("valid graph");
        let options = ResolverOptions::default();
        let result = resolve(&graph, &options);
        let order = result.creation_order();
        let context = GenerationContext::from_resolution(&result, &options);
        StructuralValidator::new(&result)
            .with_order(&order)
            .with_context(&context)
            .validate()
    }

    fn kinds(diagnostics: &Diagnostics) -> Vec<(DiagnosticKind, &str)> {
        diagnostics
            .iter()
            .map(|d| (d.kind, d.component.as_str()))
            .collect()
    }

    #[test]
    fn clean_graph_has_no_diagnostics() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("A"),
            ComponentDescriptor::new("B").depends_on(DependencyReference::eager("A")),
            ComponentDescriptor::new("C")
                .with_condition(ConditionExpression::on_component(["A"]))
                .depends_on(DependencyReference::eager("B")),
        ]);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn conditional_to_conditional_absent_is_a_broken_guarantee() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("Feature")
                .with_condition(ConditionExpression::property("feature"))
                .depends_on(DependencyReference::eager("Disabled")),
            ComponentDescriptor::new("Disabled")
                .with_condition(ConditionExpression::constant(false)),
        ]);

        assert_eq!(
            kinds(&diagnostics),
            vec![(DiagnosticKind::BrokenGuarantee, "Feature")]
        );
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn deferred_references_are_not_checked() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("A").depends_on(DependencyReference::deferred("B")),
            ComponentDescriptor::new("B").with_condition(ConditionExpression::constant(false)),
        ]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn conflicting_presence_requirements() {
        let diagnostics = validate(vec![ComponentDescriptor::new("D").with_condition(
            ConditionExpression::on_component(["X"])
                .and(ConditionExpression::on_missing_component(["X"])),
        )]);

        let conflicts: Vec<_> = diagnostics
            .of_kind(DiagnosticKind::ConflictingConditions)
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].component, "D");
        assert_eq!(conflicts[0].severity, Severity::Error);
    }

    #[test]
    fn negations_are_followed_when_looking_for_conflicts() {
        let conflicting = ConditionExpression::on_component(["X"])
            .or(ConditionExpression::property("p"))
            .negate()
            .and(ConditionExpression::on_component(["X"]));
        let diagnostics = validate(vec![ComponentDescriptor::new("D").with_condition(conflicting)]);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::ConflictingConditions).count(), 1);

        // X present OR X absent is always satisfiable
        let tautology = ConditionExpression::on_component(["X"])
            .or(ConditionExpression::on_missing_component(["X"]));
        let diagnostics = validate(vec![ComponentDescriptor::new("D").with_condition(tautology)]);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::ConflictingConditions).count(), 0);

        // Different targets don't conflict
        let different = ConditionExpression::on_component(["X"])
            .and(ConditionExpression::on_missing_component(["Y"]));
        let diagnostics = validate(vec![ComponentDescriptor::new("D").with_condition(different)]);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::ConflictingConditions).count(), 0);
    }

    #[test]
    fn type_and_name_references_to_one_component_conflict() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("X").with_name("x"),
            ComponentDescriptor::new("D").with_condition(
                ConditionExpression::on_component(["X"])
                    .and(ConditionExpression::on_missing_component_named("x")),
            ),
            ComponentDescriptor::new("E").with_condition(
                ConditionExpression::on_component(["X"])
                    .and(ConditionExpression::on_missing_component_named("X")),
            ),
            // A name shared by several components is no single target
            ComponentDescriptor::new("Y").with_name("shared"),
            ComponentDescriptor::new("Z").with_name("shared"),
            ComponentDescriptor::new("F").with_condition(
                ConditionExpression::on_component(["Y"])
                    .and(ConditionExpression::on_missing_component_named("shared")),
            ),
        ]);

        let conflicts: Vec<_> = diagnostics
            .of_kind(DiagnosticKind::ConflictingConditions)
            .map(|d| (d.component.as_str(), d.message.as_str()))
            .collect();
        assert_eq!(
            conflicts,
            vec![
                ("D", "requires component 'X' to be both present and absent"),
                ("E", "requires component 'X' to be both present and absent"),
            ]
        );
    }

    #[test]
    fn undeclared_targets_conflict_by_flag() {
        let diagnostics = validate(vec![ComponentDescriptor::new("D").with_condition(
            ConditionExpression::on_component_named("ghost")
                .and(ConditionExpression::on_missing_component_named("ghost")),
        )]);

        let conflicts: Vec<_> = diagnostics
            .of_kind(DiagnosticKind::ConflictingConditions)
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].message,
            "requires component named 'ghost' to be both present and absent"
        );
    }

    #[test]
    fn unconditional_absent_component_is_reported() {
        let graph = ComponentGraph::from_descriptors(vec![
            ComponentDescriptor::new("A"),
            ComponentDescriptor::new("B"),
        ])
        .unwrap();
        let a = graph.id_of("A").unwrap();
        let result = ResolutionResult::forced(graph, |id| id != a);

        let diagnostics = StructuralValidator::new(&result).validate();
        assert_eq!(
            kinds(&diagnostics),
            vec![(DiagnosticKind::UnreachableAbsent, "A")]
        );
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn undecided_conditions_name_what_they_wait_on() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("P").with_condition(ConditionExpression::on_component(["Q"])),
            ComponentDescriptor::new("Q").with_condition(ConditionExpression::on_component(["P"])),
        ]);

        let undecided: Vec<_> = diagnostics
            .of_kind(DiagnosticKind::UndecidedCondition)
            .collect();
        assert_eq!(undecided.len(), 2);
        assert!(undecided[0].message.contains("\"Q\""));
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn dropped_cycle_edges_are_reported() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("A").depends_on(DependencyReference::eager("B")),
            ComponentDescriptor::new("B").depends_on(DependencyReference::eager("A")),
        ]);
        assert_eq!(
            kinds(&diagnostics),
            vec![(DiagnosticKind::DependencyCycle, "B")]
        );
    }

    #[test]
    fn flag_collisions_are_reported_on_the_later_component() {
        let diagnostics = validate(vec![
            ComponentDescriptor::new("com.a.Client"),
            ComponentDescriptor::new("com.b.Client"),
        ]);
        assert_eq!(
            kinds(&diagnostics),
            vec![(DiagnosticKind::FlagCollision, "com.b.Client")]
        );
    }

    #[test]
    fn into_result_splits_errors_from_warnings() {
        let warning = Diagnostic::new(
            DiagnosticKind::UnreachableAbsent,
            "A",
            "is absent".to_string(),
        );
        let error = Diagnostic::new(
            DiagnosticKind::ConflictingConditions,
            "B",
            "conflict".to_string(),
        );

        let ok = Diagnostics(vec![warning.clone()]).into_result();
        assert_eq!(ok, Ok(vec![warning.clone()]));

        let err = Diagnostics(vec![warning, error.clone()])
            .into_result()
            .unwrap_err();
        assert_eq!(err.errors, vec![error]);
        assert_eq!(
            err.to_string(),
            "The component conditions had one or more errors:\n\
             - error[conflicting-conditions] 'B': conflict"
        );
    }
}
