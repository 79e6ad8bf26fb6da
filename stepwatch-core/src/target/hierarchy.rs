//! Declaring-type hierarchy of the target.

use smallvec::SmallVec;
use std::collections::HashMap;
use stepwatch_sdk::ids::TypeName;

/// Maps each loaded type to its direct supertype.
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    supertypes: HashMap<TypeName, TypeName>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name`, optionally with a direct supertype.
    pub fn define(&mut self, name: impl Into<TypeName>, supertype: Option<TypeName>) {
        let name = name.into();
        match supertype {
            Some(supertype) => {
                self.supertypes.insert(name, supertype);
            }
            None => {
                self.supertypes.remove(&name);
            }
        }
    }

    /// Supertypes of `name`, nearest first. Stops on a cycle.
    pub fn lineage(&self, name: &TypeName) -> SmallVec<[TypeName; 4]> {
        let mut lineage: SmallVec<[TypeName; 4]> = SmallVec::new();
        let mut current = name;
        while let Some(parent) = self.supertypes.get(current) {
            if parent == name || lineage.contains(parent) {
                break;
            }
            lineage.push(parent.clone());
            current = parent;
        }
        lineage
    }
}
