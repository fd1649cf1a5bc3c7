use thiserror::Error;

use crate::validator::Diagnostic;

/// Malformed descriptor input
///
/// These are integration errors of the front-end, not resolution outcomes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("A component has been declared twice: '{0}'")]
    Duplicate(String),
    #[error("'{required_by}' needs '{dependency}' but it is not declared")]
    UnknownDependency {
        dependency: String,
        required_by: String,
    },
    #[error("'{required_by}' refers to '{dependency}' by name, but the name matches {candidates:?}")]
    AmbiguousDependency {
        dependency: String,
        required_by: String,
        candidates: Vec<String>,
    },
    #[error("'{component}' has a presence condition without any target")]
    EmptyPresenceCondition { component: String },
    #[error("'{component}' has an availability condition without any type")]
    EmptyAvailabilityCondition { component: String },
    #[error("'{component}' has a property condition without a property name")]
    EmptyPropertyName { component: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct GraphErrors {
    pub errors: Vec<GraphError>,
}
impl std::fmt::Display for GraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The component graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}
impl From<GraphError> for GraphErrors {
    fn from(error: GraphError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

/// Error severity diagnostics of the structural validator
///
/// The host build must fail when it receives this.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<Diagnostic>,
}
impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The component conditions had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_list_every_issue() {
        let errors = GraphErrors {
            errors: vec![
                GraphError::Duplicate("A".into()),
                GraphError::UnknownDependency {
                    dependency: "B".into(),
                    required_by: "C".into(),
                },
            ],
        };

        assert_eq!(
            errors.to_string(),
            "The component graph had one or more errors:\n\
             - A component has been declared twice: 'A'\n\
             - 'C' needs 'B' but it is not declared"
        );
    }
}
