// 📈 Level Calculator
//
// level = 1 + every counted point on the sheet
//
// Counted points are the base stats not excluded by the creature's types,
// plus the special stats whose rule lists the creature's species. Mutation
// sheets use the same rules; their contribution is their level minus the
// existence point.

use crate::catalog::{StatCatalog, StatId};
use crate::classifier::TypeRules;
use crate::creature::Creature;
use crate::sheet::StatSheet;
use serde::Serialize;
use std::collections::BTreeSet;

/// The point every creature has for existing
pub const BASE_LEVEL: u64 = 1;

// ============================================================================
// LEVEL BREAKDOWN
// ============================================================================

/// One stat's share of a creature's level, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatContribution {
    pub stat: StatId,
    pub base_points: u32,
    pub mutation_points: u32,
    /// False when the creature's types exclude this stat
    pub counted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelBreakdown {
    pub base_level: u64,
    pub mutation_points: u64,
    /// Present only for mutated creatures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_level: Option<u64>,
    pub contributions: Vec<StatContribution>,
}

impl LevelBreakdown {
    /// Level shown on the creature card
    pub fn display_level(&self) -> u64 {
        self.total_level.unwrap_or(self.base_level)
    }
}

// ============================================================================
// LEVEL CALCULATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LevelCalculator {
    catalog: StatCatalog,
    type_rules: TypeRules,
}

impl LevelCalculator {
    pub fn new(catalog: StatCatalog, type_rules: TypeRules) -> Self {
        LevelCalculator {
            catalog,
            type_rules,
        }
    }

    pub fn catalog(&self) -> &StatCatalog {
        &self.catalog
    }

    /// Level of a single sheet. Always at least 1.
    pub fn calculate_level(&self, sheet: &StatSheet, species: &str, is_aquatic: bool) -> u64 {
        let excluded = self.type_rules.excluded_for_flag(is_aquatic);
        self.level_excluding(sheet, species, &excluded)
    }

    /// Base level plus the points on the mutation sheet
    pub fn calculate_total_level(
        &self,
        base: &StatSheet,
        mutations: Option<&StatSheet>,
        species: &str,
        is_aquatic: bool,
    ) -> u64 {
        let excluded = self.type_rules.excluded_for_flag(is_aquatic);
        self.level_excluding(base, species, &excluded)
            .saturating_add(self.mutation_points(mutations, species, &excluded))
    }

    /// Level with an explicit set of stats that do not count
    pub fn level_excluding(
        &self,
        sheet: &StatSheet,
        species: &str,
        excluded: &BTreeSet<StatId>,
    ) -> u64 {
        self.counted_points(sheet, species, excluded)
            .saturating_add(BASE_LEVEL)
    }

    fn mutation_points(
        &self,
        mutations: Option<&StatSheet>,
        species: &str,
        excluded: &BTreeSet<StatId>,
    ) -> u64 {
        match mutations {
            Some(sheet) => self.level_excluding(sheet, species, excluded) - BASE_LEVEL,
            None => 0,
        }
    }

    fn counted_points(&self, sheet: &StatSheet, species: &str, excluded: &BTreeSet<StatId>) -> u64 {
        self.counted_stats(species, excluded)
            .into_iter()
            .fold(0u64, |total, stat| total.saturating_add(sheet.get(stat) as u64))
    }

    /// Base stats in catalog order, then the species' special stats.
    /// Special stats are never base stats, so nothing is counted twice.
    fn counted_stats(&self, species: &str, excluded: &BTreeSet<StatId>) -> Vec<StatId> {
        self.catalog
            .list_base_stats()
            .iter()
            .map(|def| def.id)
            .chain(self.catalog.special_stats_for(species))
            .filter(|stat| !excluded.contains(stat))
            .collect()
    }

    /// Everything the creature card needs, with exclusions resolved from
    /// the creature's full type set
    pub fn creature_levels(&self, creature: &Creature) -> LevelBreakdown {
        let excluded = self.type_rules.excluded_stats(&creature.types);
        let species = creature.species.as_str();
        let mutations = creature.mutations.as_ref();

        let base_level = self.level_excluding(&creature.base, species, &excluded);
        let mutation_points = self.mutation_points(mutations, species, &excluded);
        let total_level = creature
            .is_mutated()
            .then(|| base_level.saturating_add(mutation_points));

        let contributions = self
            .catalog
            .list_base_stats()
            .iter()
            .map(|def| def.id)
            .chain(self.catalog.special_stats_for(species))
            .map(|stat| StatContribution {
                stat,
                base_points: creature.base.get(stat),
                mutation_points: mutations.map_or(0, |sheet| sheet.get(stat)),
                counted: !excluded.contains(&stat),
            })
            .collect();

        LevelBreakdown {
            base_level,
            mutation_points,
            total_level,
            contributions,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TypeId;

    fn all_fifty() -> StatSheet {
        [
            StatId::Health,
            StatId::Stamina,
            StatId::Oxygen,
            StatId::Food,
            StatId::Weight,
            StatId::Damage,
        ]
        .into_iter()
        .map(|stat| (stat, 50))
        .collect()
    }

    #[test]
    fn test_empty_sheet_is_level_one() {
        let calc = LevelCalculator::default();
        assert_eq!(calc.calculate_level(&StatSheet::new(), "Rex", false), 1);
        assert_eq!(calc.calculate_level(&StatSheet::new(), "Rex", true), 1);

        let zeros: StatSheet = StatId::ALL.into_iter().map(|s| (s, 0)).collect();
        assert_eq!(calc.calculate_level(&zeros, "Gacha", false), 1);
    }

    #[test]
    fn test_rex_all_fifty() {
        let calc = LevelCalculator::default();
        assert_eq!(calc.calculate_level(&all_fifty(), "Rex", false), 301);
        assert_eq!(calc.calculate_level(&all_fifty(), "Rex", true), 251);
    }

    #[test]
    fn test_aquatic_ignores_oxygen_magnitude() {
        let calc = LevelCalculator::default();
        let base = StatSheet::new().with(StatId::Health, 10);

        for oxygen in [0, 1, 77, u32::MAX] {
            let sheet = base.clone().with(StatId::Oxygen, oxygen);
            assert_eq!(calc.calculate_level(&sheet, "Megalodon", true), 11);
        }
    }

    #[test]
    fn test_aquatic_flag_with_custom_rules() {
        let mut rules = TypeRules::new();
        rules.exclude(TypeId::AQUATIC, StatId::Stamina);
        let calc = LevelCalculator::new(StatCatalog::standard(), rules);
        let sheet = StatSheet::new()
            .with(StatId::Oxygen, 40)
            .with(StatId::Stamina, 5)
            .with(StatId::Health, 2);

        assert_eq!(calc.calculate_level(&sheet, "Megalodon", true), 3);
        assert_eq!(calc.calculate_level(&sheet, "Megalodon", false), 48);

        let bare = LevelCalculator::new(StatCatalog::standard(), TypeRules::new());
        let oxygen_only = StatSheet::new().with(StatId::Oxygen, 40);
        assert_eq!(bare.calculate_level(&oxygen_only, "Megalodon", true), 1);
        assert_eq!(
            bare.calculate_total_level(&oxygen_only, Some(&oxygen_only), "Megalodon", true),
            1
        );
    }

    #[test]
    fn test_crafting_counts_for_eligible_species() {
        let calc = LevelCalculator::default();
        let sheet = StatSheet::new().with(StatId::Crafting, 20);

        assert_eq!(calc.calculate_level(&sheet, "Helicoprion", false), 21);
        assert_eq!(calc.calculate_level(&sheet, "Rex", false), 1);
    }

    #[test]
    fn test_non_aquatic_sum_formula() {
        let calc = LevelCalculator::default();
        let sheet = StatSheet::new()
            .with(StatId::Health, 3)
            .with(StatId::Oxygen, 4)
            .with(StatId::Damage, 11)
            .with(StatId::Crafting, 9);

        assert_eq!(calc.calculate_level(&sheet, "Raptor", false), 1 + 3 + 4 + 11);
        assert_eq!(calc.calculate_level(&sheet, "Gacha", false), 1 + 3 + 4 + 11 + 9);
    }

    #[test]
    fn test_total_level_with_mutations() {
        let calc = LevelCalculator::default();
        let mutations = StatSheet::new().with(StatId::Health, 20);

        assert_eq!(
            calc.calculate_total_level(&all_fifty(), Some(&mutations), "Rex", false),
            321
        );
        assert_eq!(calc.calculate_total_level(&all_fifty(), None, "Rex", false), 301);
        assert_eq!(
            calc.calculate_total_level(&all_fifty(), Some(&StatSheet::new()), "Rex", false),
            301
        );
    }

    #[test]
    fn test_mutation_distribution_invariance() {
        let calc = LevelCalculator::default();
        let budget_a = StatSheet::new().with(StatId::Health, 30);
        let budget_b = StatSheet::new()
            .with(StatId::Health, 4)
            .with(StatId::Damage, 16)
            .with(StatId::Weight, 10);
        let budget_c = StatSheet::new()
            .with(StatId::Stamina, 10)
            .with(StatId::Food, 10)
            .with(StatId::Oxygen, 10);

        let a = calc.calculate_total_level(&all_fifty(), Some(&budget_a), "Rex", false);
        let b = calc.calculate_total_level(&all_fifty(), Some(&budget_b), "Rex", false);
        let c = calc.calculate_total_level(&all_fifty(), Some(&budget_c), "Rex", false);

        assert_eq!(a, 331);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_mutated_crafting_points_add_like_base_points() {
        let calc = LevelCalculator::default();
        let base = StatSheet::new().with(StatId::Crafting, 10);
        let in_crafting = StatSheet::new().with(StatId::Crafting, 6);
        let in_health = StatSheet::new().with(StatId::Health, 6);

        let crafted = calc.calculate_total_level(&base, Some(&in_crafting), "Gacha", false);
        let healthy = calc.calculate_total_level(&base, Some(&in_health), "Gacha", false);
        assert_eq!(crafted, 17);
        assert_eq!(crafted, healthy);

        // Ineligible species: mutated crafting points are not counted either
        assert_eq!(
            calc.calculate_total_level(&base, Some(&in_crafting), "Rex", false),
            1
        );
    }

    #[test]
    fn test_creature_levels_breakdown() {
        let calc = LevelCalculator::default();
        let creature = Creature::new("m-1", "Mosasaurus")
            .with_type(TypeId::AQUATIC)
            .with_base(all_fifty())
            .with_mutations(StatSheet::new().with(StatId::Oxygen, 8).with(StatId::Damage, 2));

        let levels = calc.creature_levels(&creature);

        assert_eq!(levels.base_level, 251);
        assert_eq!(levels.mutation_points, 2);
        assert_eq!(levels.total_level, Some(253));
        assert_eq!(levels.display_level(), 253);

        let oxygen = levels
            .contributions
            .iter()
            .find(|c| c.stat == StatId::Oxygen)
            .unwrap();
        assert!(!oxygen.counted);
        assert_eq!(oxygen.mutation_points, 8);
        assert_eq!(levels.contributions.len(), 6);
    }

    #[test]
    fn test_unmutated_creature_has_no_total() {
        let calc = LevelCalculator::default();
        let creature = Creature::new("g-1", "Gacha")
            .with_base(StatSheet::new().with(StatId::Crafting, 4))
            .with_mutations(StatSheet::new());

        let levels = calc.creature_levels(&creature);
        assert_eq!(levels.base_level, 5);
        assert_eq!(levels.total_level, None);
        assert_eq!(levels.display_level(), 5);
        assert_eq!(levels.contributions.last().unwrap().stat, StatId::Crafting);
    }

    #[test]
    fn test_large_values_do_not_overflow() {
        let calc = LevelCalculator::default();
        let huge: StatSheet = StatId::ALL.into_iter().map(|s| (s, u32::MAX)).collect();
        let level = calc.calculate_total_level(&huge, Some(&huge), "Gacha", false);
        assert_eq!(level, 2 * (7 * u32::MAX as u64) + 1);
    }
}
