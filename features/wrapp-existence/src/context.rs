use std::collections::BTreeMap;

use crate::{
    options::{FlagNaming, ResolverOptions},
    resolver::ResolutionResult,
    types::{simple_name, ComponentId},
};

/// Keeps identifier characters, maps `.` to `_`, drops everything else and uppercases
///
/// Identifier characters are any Unicode letters and digits plus `_`. An input without any
/// identifier character becomes `UNKNOWN`.
pub fn sanitize(identifier: &str) -> String {
    let mut sanitized = String::with_capacity(identifier.len());
    for c in identifier.chars() {
        match c {
            '.' => sanitized.push('_'),
            c if c.is_alphanumeric() || c == '_' => sanitized.extend(c.to_uppercase()),
            _ => {}
        }
    }

    if sanitized.is_empty() {
        "UNKNOWN".to_string()
    } else {
        sanitized
    }
}

/// Deterministic flag name of a component identity
pub fn flag_name(identity: &str, options: &ResolverOptions) -> String {
    let base = match options.flag_naming {
        FlagNaming::SimpleName => sanitize(simple_name(identity)),
        FlagNaming::QualifiedName => sanitize(&identity.replace("::", ".")),
    };
    format!("{}{}", options.flag_prefix, base)
}

/// Several components mapped onto one flag name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagCollision {
    pub flag: String,
    pub components: Vec<ComponentId>,
}

/// Symbolic names and existence values handed to the code generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    /// Flag of each component, indexed by [ComponentId]
    flags: Vec<String>,
    /// Existence of each component, indexed by [ComponentId]
    values: Vec<bool>,
    identities: Vec<String>,
    by_flag: BTreeMap<String, Vec<ComponentId>>,
}

impl GenerationContext {
    pub fn from_resolution(result: &ResolutionResult, options: &ResolverOptions) -> Self {
        let graph = result.graph();
        let mut context = GenerationContext {
            flags: Vec::with_capacity(graph.len()),
            values: Vec::with_capacity(graph.len()),
            identities: Vec::with_capacity(graph.len()),
            by_flag: BTreeMap::new(),
        };

        for (id, existence) in result.evaluated() {
            let identity = graph.identity(id);
            let flag = flag_name(identity, options);
            context.by_flag.entry(flag.clone()).or_default().push(id);
            context.flags.push(flag);
            context.values.push(existence.is_present());
            context.identities.push(identity.to_string());
        }

        for collision in context.collisions() {
            tracing::warn!(
                "Flag '{}' is shared by {} components",
                collision.flag,
                collision.components.len()
            );
        }

        context
    }

    fn id_of(&self, identity: &str) -> Option<usize> {
        self.identities.iter().position(|known| known == identity)
    }

    pub fn flag_for(&self, identity: &str) -> Option<&str> {
        self.id_of(identity).map(|index| self.flags[index].as_str())
    }

    pub fn flag_of(&self, id: ComponentId) -> &str {
        &self.flags[id.index()]
    }

    /// The first declared component carrying this flag
    pub fn component_for_flag(&self, flag: &str) -> Option<&str> {
        self.by_flag
            .get(flag)
            .and_then(|ids| ids.first())
            .map(|id| self.identities[id.index()].as_str())
    }

    /// Existence value of a flag - true if any component carrying it is present
    pub fn flag_value(&self, flag: &str) -> Option<bool> {
        self.by_flag
            .get(flag)
            .map(|ids| ids.iter().any(|id| self.values[id.index()]))
    }

    pub fn is_present(&self, identity: &str) -> bool {
        self.id_of(identity).is_some_and(|index| self.values[index])
    }

    pub fn is_absent(&self, identity: &str) -> bool {
        self.id_of(identity).is_some_and(|index| !self.values[index])
    }

    /// `(flag, value)` per component, in declaration order
    pub fn flags(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.flags
            .iter()
            .zip(self.values.iter())
            .map(|(flag, value)| (flag.as_str(), *value))
    }

    /// Flags shared by more than one component, in flag name order
    pub fn collisions(&self) -> Vec<FlagCollision> {
        self.by_flag
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(flag, ids)| FlagCollision {
                flag: flag.clone(),
                components: ids.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        condition::ConditionExpression, graph::ComponentGraph, resolver::resolve,
        types::ComponentDescriptor,
    };

    #[test]
    fn sanitize_keeps_identifier_characters() {
        assert_eq!(sanitize("com.acme.user_service"), "COM_ACME_USER_SERVICE");
        assert_eq!(sanitize("Cache<String>"), "CACHESTRING");
        assert_eq!(sanitize("$%-"), "UNKNOWN");
    }

    #[test]
    fn sanitize_keeps_non_ascii_letters() {
        assert_eq!(sanitize("Café"), "CAFÉ");
        assert_eq!(sanitize("Ünit"), "ÜNIT");
        assert_eq!(sanitize("com.acme.Größe"), "COM_ACME_GRÖSSE");
        assert_ne!(sanitize("Café"), sanitize("Caf"));
    }

    #[test]
    fn non_ascii_simple_names_do_not_collide() {
        let graph = ComponentGraph::from_descriptors(vec![
            ComponentDescriptor::new("menu.Café"),
            ComponentDescriptor::new("menu.Caf"),
        ])
        .unwrap();
        let options = ResolverOptions::default();
        let context = GenerationContext::from_resolution(&resolve(&graph, &options), &options);

        assert_eq!(context.flag_for("menu.Café"), Some("HAS_COMPONENT_CAFÉ"));
        assert_eq!(context.flag_for("menu.Caf"), Some("HAS_COMPONENT_CAF"));
        assert!(context.collisions().is_empty());
    }

    #[test]
    fn flag_names_use_the_simple_name_by_default() {
        let options = ResolverOptions::default();
        assert_eq!(flag_name("com.acme.UserService", &options), "HAS_COMPONENT_USERSERVICE");
        assert_eq!(flag_name("acme::UserService", &options), "HAS_COMPONENT_USERSERVICE");

        let qualified = options
            .with_flag_naming(FlagNaming::QualifiedName)
            .with_flag_prefix("HAS_BEAN_");
        assert_eq!(
            flag_name("com.acme.UserService", &qualified),
            "HAS_BEAN_COM_ACME_USERSERVICE"
        );
        assert_eq!(flag_name("acme::UserService", &qualified), "HAS_BEAN_ACME_USERSERVICE");
    }

    #[test]
    fn context_maps_flags_both_ways() {
        let graph = ComponentGraph::from_descriptors(vec![
            ComponentDescriptor::new("com.acme.Clock"),
            ComponentDescriptor::new("com.acme.Mock")
                .with_condition(ConditionExpression::constant(false)),
        ])
        .unwrap();
        let options = ResolverOptions::default();
        let context = GenerationContext::from_resolution(&resolve(&graph, &options), &options);

        assert_eq!(context.flag_for("com.acme.Clock"), Some("HAS_COMPONENT_CLOCK"));
        assert_eq!(context.component_for_flag("HAS_COMPONENT_MOCK"), Some("com.acme.Mock"));
        assert_eq!(context.flag_value("HAS_COMPONENT_CLOCK"), Some(true));
        assert_eq!(context.flag_value("HAS_COMPONENT_MOCK"), Some(false));
        assert_eq!(context.flag_value("HAS_COMPONENT_OTHER"), None);
        assert!(context.is_present("com.acme.Clock"));
        assert!(context.is_absent("com.acme.Mock"));
        assert_eq!(
            context.flags().collect::<Vec<_>>(),
            vec![("HAS_COMPONENT_CLOCK", true), ("HAS_COMPONENT_MOCK", false)]
        );
        assert!(context.collisions().is_empty());
    }

    #[test]
    fn shared_simple_names_collide() {
        let graph = ComponentGraph::from_descriptors(vec![
            ComponentDescriptor::new("com.a.Client"),
            ComponentDescriptor::new("com.b.Client"),
        ])
        .unwrap();
        let options = ResolverOptions::default();
        let context = GenerationContext::from_resolution(&resolve(&graph, &options), &options);

        let collisions = context.collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].flag, "HAS_COMPONENT_CLIENT");
        assert_eq!(collisions[0].components.len(), 2);

        let qualified = ResolverOptions::default().with_flag_naming(FlagNaming::QualifiedName);
        let context =
            GenerationContext::from_resolution(&resolve(&graph, &qualified), &qualified);
        assert!(context.collisions().is_empty());
    }
}
