//! Wrapp Existence decides, ahead of time, which conditionally declared components exist in an
//! assembled application and in which order the existing ones are created.
//!
//! The decision is made once per build over an immutable set of descriptors:
//! 1. [ComponentGraph]: checks the descriptors and derives the eager dependency edges
//! 2. [resolve]: fixed-point classification of every component as present or absent
//! 3. [CreationOrder]: dependencies-first order over the present components
//! 4. [GenerationContext]: deterministic flag names for the code generator
//! 5. [StructuralValidator]: diagnostics about conflicting or ill-founded conditions
//!
//! [ExistencePlan] runs all of them in one go.
//!
//! # Examples
//!
//! ```rust
//! use wrapp_existence::{
//!     ComponentDescriptor, ConditionExpression, DependencyReference, ExistenceGraphBuilder,
//! };
//!
//! let plan = ExistenceGraphBuilder::new()
//!     .add_component(ComponentDescriptor::new("app.Clock"))
//!     .add_component(
//!         ComponentDescriptor::new("app.Scheduler")
//!             .depends_on(DependencyReference::eager("app.Clock"))
//!             .with_condition(ConditionExpression::on_component(["app.Clock"])),
//!     )
//!     .add_component(
//!         ComponentDescriptor::new("app.FakeClock")
//!             .with_condition(ConditionExpression::on_missing_component(["app.Clock"])),
//!     )
//!     .plan()
//!     .expect("descriptors are well formed");
//!
//! assert_eq!(plan.creation_order_identities(), vec!["app.Clock", "app.Scheduler"]);
//! assert_eq!(plan.context().flag_value("HAS_COMPONENT_FAKECLOCK"), Some(false));
//! assert!(!plan.diagnostics().has_errors());
//! ```

pub mod builder;
pub mod condition;
pub mod context;
pub mod errors;
pub mod graph;
pub mod options;
pub mod order;
pub mod plan;
pub mod resolver;
pub mod types;
pub mod validator;

pub use builder::ExistenceGraphBuilder;
pub use condition::{ConditionExpression, ExistenceFacts, Flag};
pub use context::{flag_name, sanitize, GenerationContext};
pub use errors::{GraphError, GraphErrors, ValidationErrors};
pub use graph::{eager_targets, ComponentGraph};
pub use options::{FlagNaming, ResolverOptions};
pub use order::{creation_order, CreationOrder, DroppedEdge};
pub use plan::ExistencePlan;
pub use resolver::{resolve, Existence, ResolutionResult};
pub use types::{
    ComponentDescriptor, ComponentId, DependencyKind, DependencyReference, InjectionPoint, Scope,
};
pub use validator::{Diagnostic, DiagnosticKind, Diagnostics, Severity, StructuralValidator};
