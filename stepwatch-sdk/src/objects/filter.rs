//! Filter specifications attached to event requests.
//!
//! Filters are declarative here; evaluation lives with the request state
//! in `stepwatch-core`.

use crate::ids::{ThreadId, TypeName};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// How a class filter selects declaring types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "match", content = "pattern", rename_all = "snake_case")]
pub enum ClassPattern {
    /// The named type and any of its subtypes.
    Type(TypeName),
    /// Only the named type itself.
    Exact(TypeName),
    /// A name pattern with at most one `*`, either leading or trailing.
    Glob(CompactString),
}

impl ClassPattern {
    /// Check a declaring type (and its supertype lineage) against the pattern.
    pub fn matches(&self, declaring_type: &TypeName, supertypes: &[TypeName]) -> bool {
        match self {
            ClassPattern::Type(name) => {
                declaring_type == name || supertypes.iter().any(|s| s == name)
            }
            ClassPattern::Exact(name) => declaring_type == name,
            ClassPattern::Glob(pattern) => glob_matches(pattern, declaring_type.as_str()),
        }
    }

    /// Whether the pattern is well formed.
    pub fn is_valid(&self) -> bool {
        match self {
            ClassPattern::Glob(pattern) => {
                let stars = pattern.matches('*').count();
                stars == 0
                    || (stars == 1 && (pattern.starts_with('*') || pattern.ends_with('*')))
            }
            _ => true,
        }
    }
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        name.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        pattern == name
    }
}

impl std::fmt::Display for ClassPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassPattern::Type(name) => write!(f, "{name}+"),
            ClassPattern::Exact(name) => write!(f, "{name}"),
            ClassPattern::Glob(pattern) => f.write_str(pattern),
        }
    }
}

/// A single filter added to a request.
///
/// Filters of different variants are combined with logical AND. Adding the
/// same variant again refines the request: the latest class or thread filter
/// replaces the previous one, and the latest count resets the shared counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "filter", content = "value", rename_all = "snake_case")]
pub enum FilterSpec {
    Class(ClassPattern),
    Thread(ThreadId),
    Count(u32),
}

impl FilterSpec {
    /// Class filter matching `name` and its subtypes.
    pub fn class(name: impl Into<TypeName>) -> Self {
        FilterSpec::Class(ClassPattern::Type(name.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_pattern_includes_subtypes() {
        let pattern = ClassPattern::Type(TypeName::new("pkg.Base"));
        let sub = TypeName::new("pkg.Derived");
        assert!(pattern.matches(&sub, &[TypeName::new("pkg.Base")]));
        assert!(!pattern.matches(&sub, &[]));
        assert!(!ClassPattern::Exact(TypeName::new("pkg.Base")).matches(&sub, &[TypeName::new("pkg.Base")]));
    }

    #[test]
    fn test_glob_patterns() {
        let name = TypeName::new("nsk.jdi.TestClass11");
        assert!(ClassPattern::Glob("nsk.jdi.*".into()).matches(&name, &[]));
        assert!(ClassPattern::Glob("*Class11".into()).matches(&name, &[]));
        assert!(!ClassPattern::Glob("*Class21".into()).matches(&name, &[]));
        assert!(ClassPattern::Glob("nsk.jdi.TestClass11".into()).matches(&name, &[]));
    }

    #[test]
    fn test_glob_validity() {
        assert!(ClassPattern::Glob("java.*".into()).is_valid());
        assert!(ClassPattern::Glob("*Test".into()).is_valid());
        assert!(!ClassPattern::Glob("a*b".into()).is_valid());
        assert!(!ClassPattern::Glob("*a*".into()).is_valid());
    }

    #[test]
    fn test_filter_spec_json_shape() {
        let json = serde_json::to_string(&FilterSpec::Count(1)).unwrap();
        assert_eq!(json, r#"{"filter":"count","value":1}"#);
    }
}
