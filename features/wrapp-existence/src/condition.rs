use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// A symbolic fact a condition depends on
///
/// Only component facts can be undecided during resolution. Property and class facts are
/// known by construction and never block evaluation.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flag {
    /// Existence of the component with this identity
    Component(String),
    /// Existence of any component declared under this name
    ComponentName(String),
    /// A configuration property
    Property(String),
    /// Availability of a type in the build
    Class(String),
}
impl Flag {
    pub fn is_component_fact(&self) -> bool {
        matches!(self, Flag::Component(_) | Flag::ComponentName(_))
    }
}
impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Component(identity) => write!(f, "component '{identity}'"),
            Flag::ComponentName(name) => write!(f, "component named '{name}'"),
            Flag::Property(name) => write!(f, "property '{name}'"),
            Flag::Class(name) => write!(f, "class '{name}'"),
        }
    }
}

/// Source of component existence facts while conditions are evaluated
pub trait ExistenceFacts {
    /// `Some(exists)` once every component behind the flag is classified, `None` while undecided
    fn component_exists(&self, flag: &Flag) -> Option<bool>;
}

/// Condition on a configuration property
///
/// Property values are only known when the generated code runs, so the resolver treats
/// the condition as optimistically true.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyCondition {
    pub name: String,
    #[serde(default)]
    pub having_value: Option<String>,
    #[serde(default)]
    pub match_if_missing: bool,
}

/// Requires all listed components to be present (or all to be absent)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceCondition {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    pub must_be_present: bool,
}
impl PresenceCondition {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.names.is_empty()
    }

    /// Flags of all targets, types first
    pub fn targets(&self) -> impl Iterator<Item = Flag> + '_ {
        self.types
            .iter()
            .map(|t| Flag::Component(t.clone()))
            .chain(self.names.iter().map(|n| Flag::ComponentName(n.clone())))
    }
}

/// Requires types to be available in the build - always true once the build compiles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvailabilityCondition {
    pub classes: Vec<String>,
}

/// Closed set of declarative conditions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionExpression {
    Property(PropertyCondition),
    Presence(PresenceCondition),
    Availability(AvailabilityCondition),
    And {
        left: Box<ConditionExpression>,
        right: Box<ConditionExpression>,
    },
    Or {
        left: Box<ConditionExpression>,
        right: Box<ConditionExpression>,
    },
    Not {
        operand: Box<ConditionExpression>,
    },
    Constant {
        value: bool,
    },
}

// Constructors
impl ConditionExpression {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(PropertyCondition {
            name: name.into(),
            having_value: None,
            match_if_missing: false,
        })
    }

    pub fn property_having(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Property(PropertyCondition {
            name: name.into(),
            having_value: Some(value.into()),
            match_if_missing: false,
        })
    }

    /// Requires all given component identities to be present
    pub fn on_component<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::presence(types, true)
    }

    /// Requires all given component identities to be absent
    pub fn on_missing_component<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::presence(types, false)
    }

    /// Requires a component declared under `name` to be present
    pub fn on_component_named(name: impl Into<String>) -> Self {
        Self::Presence(PresenceCondition {
            types: Vec::new(),
            names: vec![name.into()],
            must_be_present: true,
        })
    }

    /// Requires no component declared under `name` to be present
    pub fn on_missing_component_named(name: impl Into<String>) -> Self {
        Self::Presence(PresenceCondition {
            types: Vec::new(),
            names: vec![name.into()],
            must_be_present: false,
        })
    }

    pub fn on_class<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Availability(AvailabilityCondition {
            classes: classes.into_iter().map(Into::into).collect(),
        })
    }

    pub fn constant(value: bool) -> Self {
        Self::Constant { value }
    }

    fn presence<I, S>(types: I, must_be_present: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Presence(PresenceCondition {
            types: types.into_iter().map(Into::into).collect(),
            names: Vec::new(),
            must_be_present,
        })
    }
}

// Combinators
impl ConditionExpression {
    pub fn and(self, other: ConditionExpression) -> Self {
        Self::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: ConditionExpression) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not {
            operand: Box::new(self),
        }
    }

    /// Left-folds with AND - an empty input is the identity `true`
    pub fn and_all(conditions: impl IntoIterator<Item = ConditionExpression>) -> Self {
        conditions
            .into_iter()
            .reduce(ConditionExpression::and)
            .unwrap_or(Self::constant(true))
    }

    /// Left-folds with OR - an empty input is the identity `false`
    pub fn or_all(conditions: impl IntoIterator<Item = ConditionExpression>) -> Self {
        conditions
            .into_iter()
            .reduce(ConditionExpression::or)
            .unwrap_or(Self::constant(false))
    }

    /// Operands of nested AND / OR nodes, NOT nodes are kept whole
    pub fn flatten(&self) -> Vec<&ConditionExpression> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(condition) = stack.pop() {
            match condition {
                Self::And { left, right } | Self::Or { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                other => leaves.push(other),
            }
        }
        leaves
    }

    /// All non-composite nodes, including the ones below NOT
    pub fn leaves(&self) -> Vec<&ConditionExpression> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(condition) = stack.pop() {
            match condition {
                Self::And { left, right } | Self::Or { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                Self::Not { operand } => stack.push(operand),
                other => leaves.push(other),
            }
        }
        leaves
    }
}

// Evaluation
impl ConditionExpression {
    /// Every symbolic flag this condition mentions, transitively
    pub fn required_flags(&self) -> BTreeSet<Flag> {
        let mut flags = BTreeSet::new();
        for leaf in self.leaves() {
            match leaf {
                Self::Property(property) => {
                    flags.insert(Flag::Property(property.name.clone()));
                }
                Self::Presence(presence) => flags.extend(presence.targets()),
                Self::Availability(availability) => {
                    flags.extend(availability.classes.iter().cloned().map(Flag::Class))
                }
                _ => {}
            }
        }
        flags
    }

    /// The flags which refer to other components
    pub fn component_flags(&self) -> BTreeSet<Flag> {
        self.required_flags()
            .into_iter()
            .filter(Flag::is_component_fact)
            .collect()
    }

    /// True once every component this condition mentions has been classified
    pub fn is_decidable(&self, facts: &impl ExistenceFacts) -> bool {
        self.component_flags()
            .iter()
            .all(|flag| facts.component_exists(flag).is_some())
    }

    /// Evaluates the condition against classified facts
    ///
    /// Undecided components count as absent, callers check [Self::is_decidable] first.
    pub fn evaluate(&self, facts: &impl ExistenceFacts) -> bool {
        match self {
            // Only known at runtime, assumed to hold
            Self::Property(_) => true,
            Self::Presence(presence) => presence.targets().all(|target| {
                let exists = facts.component_exists(&target).unwrap_or(false);
                exists == presence.must_be_present
            }),
            Self::Availability(_) => true,
            Self::And { left, right } => {
                let (left, right) = (left.evaluate(facts), right.evaluate(facts));
                left && right
            }
            Self::Or { left, right } => {
                let (left, right) = (left.evaluate(facts), right.evaluate(facts));
                left || right
            }
            Self::Not { operand } => !operand.evaluate(facts),
            Self::Constant { value } => *value,
        }
    }
}

impl fmt::Display for ConditionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(property) => {
                write!(f, "property({}", property.name)?;
                if let Some(value) = &property.having_value {
                    write!(f, " == {value:?}")?;
                }
                if property.match_if_missing {
                    f.write_str(", match_if_missing")?;
                }
                f.write_str(")")
            }
            Self::Presence(presence) => {
                let targets: Vec<String> = presence
                    .types
                    .iter()
                    .cloned()
                    .chain(presence.names.iter().map(|n| format!("name:{n}")))
                    .collect();
                let kind = if presence.must_be_present {
                    "present"
                } else {
                    "missing"
                };
                write!(f, "{kind}({})", targets.join(", "))
            }
            Self::Availability(availability) => {
                write!(f, "class({})", availability.classes.join(", "))
            }
            Self::And { left, right } => write!(f, "({left} && {right})"),
            Self::Or { left, right } => write!(f, "({left} || {right})"),
            Self::Not { operand } => write!(f, "!{operand}"),
            Self::Constant { value } => write!(f, "{value}"),
        }
    }
}
