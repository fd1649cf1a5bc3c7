use serde::{Deserialize, Serialize};

use crate::condition::ConditionExpression;

/// Stable index of a component inside a [ComponentGraph](crate::graph::ComponentGraph)
///
/// Ids are assigned in declaration order, so iterating ids is deterministic.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);
impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}
impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle tag of a component
///
/// Carried through to the code generator, the resolver does not interpret it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Singleton,
    Prototype,
}

/// How a dependency reference is injected
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Must exist and be constructed before the dependent
    Eager,
    /// Provider / lazy style reference, does not force order or existence
    Deferred,
    /// Optional wrapper - the target may be missing entirely
    Optional,
    /// A configuration value, not a component reference at all
    Value,
}

/// Where a dependency is injected
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPoint {
    #[default]
    Constructor,
    Field,
    Method,
}

/// Information about a component dependency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyReference {
    /// Identity or name of the required component, or the value key for [DependencyKind::Value]
    pub target: String,
    pub kind: DependencyKind,
    #[serde(default)]
    pub injection_point: InjectionPoint,
}
impl DependencyReference {
    pub fn new(target: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            target: target.into(),
            kind,
            injection_point: InjectionPoint::Constructor,
        }
    }

    pub fn eager(target: impl Into<String>) -> Self {
        Self::new(target, DependencyKind::Eager)
    }

    pub fn deferred(target: impl Into<String>) -> Self {
        Self::new(target, DependencyKind::Deferred)
    }

    pub fn optional(target: impl Into<String>) -> Self {
        Self::new(target, DependencyKind::Optional)
    }

    pub fn value(key: impl Into<String>) -> Self {
        Self::new(key, DependencyKind::Value)
    }

    pub fn at(mut self, injection_point: InjectionPoint) -> Self {
        self.injection_point = injection_point;
        self
    }

    /// Only eager references become graph edges
    pub fn is_eager(&self) -> bool {
        self.kind == DependencyKind::Eager
    }

    /// If the reference has to point at a declared component
    pub(crate) fn requires_declared_target(&self) -> bool {
        matches!(self.kind, DependencyKind::Eager | DependencyKind::Deferred)
    }
}

/// A declared component, as handed over by the front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Unique identity, usually the fully qualified type name
    pub identity: String,
    /// Additional names the component can be referred to by
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub dependencies: Vec<DependencyReference>,
    #[serde(default)]
    pub condition: Option<ConditionExpression>,
}
impl ComponentDescriptor {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            names: Vec::new(),
            scope: Scope::default(),
            dependencies: Vec::new(),
            condition: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn depends_on(mut self, dependency: DependencyReference) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Sets the condition - a second call ANDs the new condition onto the existing one
    pub fn with_condition(mut self, condition: ConditionExpression) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// The unqualified part of the identity
    pub fn simple_name(&self) -> &str {
        simple_name(&self.identity)
    }
}

/// Strips any `.` or `::` separated qualification from an identity
pub fn simple_name(identity: &str) -> &str {
    let after_path = identity.rsplit("::").next().unwrap_or(identity);
    after_path.rsplit('.').next().unwrap_or(after_path)
}
