/// How component identities are turned into flag names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagNaming {
    /// Only the unqualified simple name - two components sharing a simple name collide
    #[default]
    SimpleName,
    /// The whole qualified identity
    QualifiedName,
}

pub const DEFAULT_FLAG_PREFIX: &str = "HAS_COMPONENT_";

/// Options of a resolution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub flag_naming: FlagNaming,
    /// Marker prepended to every flag name
    pub flag_prefix: String,
    /// Upper bound on resolver passes - never raises the `undecided + 1` bound
    pub max_passes: Option<usize>,
}
impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            flag_naming: FlagNaming::default(),
            flag_prefix: DEFAULT_FLAG_PREFIX.to_string(),
            max_passes: None,
        }
    }
}

impl ResolverOptions {
    pub fn with_flag_naming(mut self, flag_naming: FlagNaming) -> Self {
        self.flag_naming = flag_naming;
        self
    }

    pub fn with_flag_prefix(mut self, flag_prefix: impl Into<String>) -> Self {
        self.flag_prefix = flag_prefix.into();
        self
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    /// Number of passes allowed for `undecided` conditional components
    pub(crate) fn pass_bound(&self, undecided: usize) -> usize {
        let bound = undecided + 1;
        match self.max_passes {
            Some(max) => bound.min(max),
            None => bound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_passes_only_tightens_the_bound() {
        let options = ResolverOptions::default();
        assert_eq!(options.pass_bound(4), 5);
        assert_eq!(options.clone().with_max_passes(2).pass_bound(4), 2);
        assert_eq!(options.with_max_passes(100).pass_bound(4), 5);
    }
}
