// 🌊 Type Classifier - creature categories that change level rules
//
// Exclusions are a table keyed by type id, not one boolean per category.

use crate::catalog::StatId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// TYPE IDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const LAND: TypeId = TypeId(1);
    pub const FLYER: TypeId = TypeId(2);
    pub const AQUATIC: TypeId = TypeId(3);
    pub const AMPHIBIOUS: TypeId = TypeId(4);
    pub const CAVE: TypeId = TypeId(5);
}

/// Display names for the known categories
pub fn type_name(id: TypeId) -> Option<&'static str> {
    match id {
        TypeId::LAND => Some("Land"),
        TypeId::FLYER => Some("Flyer"),
        TypeId::AQUATIC => Some("Aquatic"),
        TypeId::AMPHIBIOUS => Some("Amphibious"),
        TypeId::CAVE => Some("Cave"),
        _ => None,
    }
}

/// True iff the set contains the aquatic category
pub fn is_aquatic(types: &BTreeSet<TypeId>) -> bool {
    types.contains(&TypeId::AQUATIC)
}

/// Parse a `;`- or `,`-separated list of type ids. Blank or non-numeric
/// entries are skipped.
pub fn parse_type_list(text: &str) -> BTreeSet<TypeId> {
    text.split(|c| c == ';' || c == ',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .map(TypeId)
        .collect()
}

// ============================================================================
// TYPE RULES
// ============================================================================

/// Stats that stop counting toward level when a creature has a given type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRules {
    exclusions: BTreeMap<TypeId, BTreeSet<StatId>>,
}

impl TypeRules {
    pub fn new() -> Self {
        TypeRules {
            exclusions: BTreeMap::new(),
        }
    }

    /// Aquatic creatures do not level oxygen
    pub fn standard() -> Self {
        let mut rules = TypeRules::new();
        rules.exclude(TypeId::AQUATIC, StatId::Oxygen);
        rules
    }

    pub fn exclude(&mut self, type_id: TypeId, stat: StatId) {
        self.exclusions.entry(type_id).or_default().insert(stat);
    }

    /// Union of the exclusions of every type in the set. Aquatic creatures
    /// never count oxygen, whatever the table holds.
    pub fn excluded_stats(&self, types: &BTreeSet<TypeId>) -> BTreeSet<StatId> {
        let mut excluded: BTreeSet<StatId> = types
            .iter()
            .filter_map(|type_id| self.exclusions.get(type_id))
            .flatten()
            .copied()
            .collect();
        if is_aquatic(types) {
            excluded.insert(StatId::Oxygen);
        }
        excluded
    }

    /// Exclusions implied by the aquatic flag alone
    pub fn excluded_for_flag(&self, aquatic: bool) -> BTreeSet<StatId> {
        if aquatic {
            self.excluded_stats(&BTreeSet::from([TypeId::AQUATIC]))
        } else {
            BTreeSet::new()
        }
    }
}

impl Default for TypeRules {
    fn default() -> Self {
        Self::standard()
    }
}
