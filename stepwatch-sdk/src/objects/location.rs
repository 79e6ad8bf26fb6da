use crate::ids::TypeName;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A code position inside the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub declaring_type: TypeName,
    pub method: CompactString,
    pub line: u32,
}

impl Location {
    pub fn new(declaring_type: impl Into<TypeName>, method: impl Into<CompactString>, line: u32) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method: method.into(),
            line,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}:{}", self.declaring_type, self.method, self.line)
    }
}
