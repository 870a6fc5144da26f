// 🦖 Creature - identity, species, types and stat sheets

use crate::classifier::{self, TypeId};
use crate::sheet::StatSheet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    /// Stable identity
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Free text, matched exactly against special stat rules
    pub species: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tribe_id: Option<String>,

    #[serde(default)]
    pub types: BTreeSet<TypeId>,

    /// Wild-derived points
    #[serde(default)]
    pub base: StatSheet,

    /// Points gained through mutations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutations: Option<StatSheet>,
}

impl Creature {
    pub fn new(id: impl Into<String>, species: impl Into<String>) -> Self {
        Creature {
            id: id.into(),
            name: String::new(),
            species: species.into(),
            tribe_id: None,
            types: BTreeSet::new(),
            base: StatSheet::new(),
            mutations: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tribe(mut self, tribe_id: impl Into<String>) -> Self {
        self.tribe_id = Some(tribe_id.into());
        self
    }

    pub fn with_type(mut self, type_id: TypeId) -> Self {
        self.types.insert(type_id);
        self
    }

    pub fn with_base(mut self, base: StatSheet) -> Self {
        self.base = base;
        self
    }

    pub fn with_mutations(mut self, mutations: StatSheet) -> Self {
        self.mutations = Some(mutations);
        self
    }

    /// A mutation sheet that is absent or all zero means "not mutated"
    pub fn is_mutated(&self) -> bool {
        self.mutations
            .as_ref()
            .is_some_and(|sheet| !sheet.is_all_zero())
    }

    pub fn is_aquatic(&self) -> bool {
        classifier::is_aquatic(&self.types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StatId;

    #[test]
    fn test_is_mutated() {
        let rex = Creature::new("rex-1", "Rex");
        assert!(!rex.is_mutated());

        let zeroed = rex.clone().with_mutations(StatSheet::new().with(StatId::Health, 0));
        assert!(!zeroed.is_mutated());

        let mutated = rex.with_mutations(StatSheet::new().with(StatId::Health, 2));
        assert!(mutated.is_mutated());
    }

    #[test]
    fn test_deserialize_minimal() {
        let creature: Creature = serde_json::from_str(
            r#"{"id": "m-7", "species": "Mosasaurus", "types": [3],
                "base": {"oxygen": 40, "health": "12"}}"#,
        )
        .unwrap();

        assert!(creature.is_aquatic());
        assert_eq!(creature.base.get(StatId::Health), 12);
        assert!(creature.mutations.is_none());
        assert!(creature.tribe_id.is_none());
    }
}
