// 📚 Stat Catalog - Stats as Data
// Closed set of tracked stats plus the species-conditional special stat rules

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

// ============================================================================
// STAT IDENTIFIERS
// ============================================================================

/// Stable stat key.
///
/// Declaration order is the catalog order: base stats first, then special
/// stats. `Ord` follows it, so ordered maps keyed by `StatId` enumerate in
/// catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatId {
    Health,
    Stamina,
    Oxygen,
    Food,
    Weight,
    Damage,
    Crafting,
}

impl StatId {
    pub const ALL: [StatId; 7] = [
        StatId::Health,
        StatId::Stamina,
        StatId::Oxygen,
        StatId::Food,
        StatId::Weight,
        StatId::Damage,
        StatId::Crafting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatId::Health => "health",
            StatId::Stamina => "stamina",
            StatId::Oxygen => "oxygen",
            StatId::Food => "food",
            StatId::Weight => "weight",
            StatId::Damage => "damage",
            StatId::Crafting => "crafting",
        }
    }

    /// Look up a stat by its key. Unknown keys are `None`, never an error.
    pub fn parse(key: &str) -> Option<StatId> {
        StatId::ALL.iter().copied().find(|stat| stat.as_str() == key)
    }
}

impl fmt::Display for StatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ============================================================================
// STAT DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDefinition {
    pub id: StatId,

    /// Human-readable name shown on stat sheets
    pub name: String,

    /// Icon asset name
    pub icon: String,

    /// Display color (hex)
    pub color: String,
}

impl StatDefinition {
    pub fn new(id: StatId, name: &str, icon: &str, color: &str) -> Self {
        StatDefinition {
            id,
            name: name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }
}

// ============================================================================
// SPECIAL STAT RULES
// ============================================================================

/// A stat that only counts toward level for the listed species.
///
/// Species names match exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialStatRule {
    pub stat: StatId,
    pub species: BTreeSet<String>,
}

impl SpecialStatRule {
    pub fn new<I, S>(stat: StatId, species: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SpecialStatRule {
            stat,
            species: species.into_iter().map(Into::into).collect(),
        }
    }

    pub fn applies_to(&self, species: &str) -> bool {
        self.species.contains(species)
    }
}

/// On-disk catalog overrides. Base stats are closed, only the rule table is
/// configurable.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    special_rules: Vec<SpecialStatRule>,
}

// ============================================================================
// STAT CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCatalog {
    base_stats: Vec<StatDefinition>,
    special_stats: Vec<StatDefinition>,
    special_rules: Vec<SpecialStatRule>,
}

impl StatCatalog {
    /// The catalog the application ships with
    pub fn standard() -> Self {
        StatCatalog::with_rules(vec![SpecialStatRule::new(
            StatId::Crafting,
            ["Gacha", "Helicoprion"],
        )])
    }

    /// Standard stat definitions with a custom special rule table.
    ///
    /// Fails if a rule targets a base stat, since that stat would then be
    /// counted twice.
    pub fn from_rules(special_rules: Vec<SpecialStatRule>) -> Result<Self> {
        let catalog = StatCatalog::with_rules(special_rules);
        if let Some(rule) = catalog
            .special_rules
            .iter()
            .find(|rule| catalog.is_base_stat(rule.stat))
        {
            bail!("special stat rule targets base stat '{}'", rule.stat);
        }
        Ok(catalog)
    }

    /// Load the special rule table from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog file: {:?}", path.as_ref()))?;
        StatCatalog::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_json::from_str(content).context("Failed to parse catalog JSON")?;
        StatCatalog::from_rules(file.special_rules)
    }

    fn with_rules(special_rules: Vec<SpecialStatRule>) -> Self {
        StatCatalog {
            base_stats: vec![
                StatDefinition::new(StatId::Health, "Health", "health", "#e74c3c"),
                StatDefinition::new(StatId::Stamina, "Stamina", "stamina", "#f1c40f"),
                StatDefinition::new(StatId::Oxygen, "Oxygen", "oxygen", "#3498db"),
                StatDefinition::new(StatId::Food, "Food", "food", "#e67e22"),
                StatDefinition::new(StatId::Weight, "Weight", "weight", "#95a5a6"),
                StatDefinition::new(StatId::Damage, "Melee Damage", "damage", "#c0392b"),
            ],
            special_stats: vec![StatDefinition::new(
                StatId::Crafting,
                "Crafting Skill",
                "crafting",
                "#8e44ad",
            )],
            special_rules,
        }
    }

    /// Base stats in display (and summation) order
    pub fn list_base_stats(&self) -> &[StatDefinition] {
        &self.base_stats
    }

    pub fn list_special_stats(&self) -> &[StatDefinition] {
        &self.special_stats
    }

    pub fn special_rules(&self) -> &[SpecialStatRule] {
        &self.special_rules
    }

    pub fn definition(&self, stat: StatId) -> Option<&StatDefinition> {
        self.base_stats
            .iter()
            .chain(self.special_stats.iter())
            .find(|def| def.id == stat)
    }

    pub fn is_base_stat(&self, stat: StatId) -> bool {
        self.base_stats.iter().any(|def| def.id == stat)
    }

    /// True iff a rule for `stat` lists `species`
    pub fn is_special_stat(&self, stat: StatId, species: &str) -> bool {
        self.special_rules
            .iter()
            .any(|rule| rule.stat == stat && rule.applies_to(species))
    }

    /// Every special stat that counts toward level for `species`, in rule order
    pub fn special_stats_for(&self, species: &str) -> Vec<StatId> {
        let mut stats: Vec<StatId> = Vec::new();
        for rule in &self.special_rules {
            if rule.applies_to(species) && !stats.contains(&rule.stat) {
                stats.push(rule.stat);
            }
        }
        stats
    }
}

impl Default for StatCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_stat_order() {
        let catalog = StatCatalog::standard();
        let ids: Vec<StatId> = catalog.list_base_stats().iter().map(|d| d.id).collect();

        assert_eq!(
            ids,
            vec![
                StatId::Health,
                StatId::Stamina,
                StatId::Oxygen,
                StatId::Food,
                StatId::Weight,
                StatId::Damage,
            ]
        );
        assert!(!ids.contains(&StatId::Crafting));
    }

    #[test]
    fn test_special_stat_lookup() {
        let catalog = StatCatalog::standard();

        assert!(catalog.is_special_stat(StatId::Crafting, "Helicoprion"));
        assert!(catalog.is_special_stat(StatId::Crafting, "Gacha"));
        assert!(!catalog.is_special_stat(StatId::Crafting, "Rex"));
        // Exact match only
        assert!(!catalog.is_special_stat(StatId::Crafting, "helicoprion"));
        assert!(!catalog.is_special_stat(StatId::Health, "Gacha"));
    }

    #[test]
    fn test_special_stats_for_unknown_species() {
        let catalog = StatCatalog::standard();
        assert!(catalog.special_stats_for("Unknown Beast").is_empty());
        assert_eq!(catalog.special_stats_for("Gacha"), vec![StatId::Crafting]);
    }

    #[test]
    fn test_parse_stat_keys() {
        assert_eq!(StatId::parse("oxygen"), Some(StatId::Oxygen));
        assert_eq!(StatId::parse("crafting"), Some(StatId::Crafting));
        assert_eq!(StatId::parse("speed"), None);
        assert_eq!(StatId::parse("Health"), None);
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "special_rules": [
                { "stat": "crafting", "species": ["Castoroides", "Thorny Dragon"] }
            ]
        }"#;

        let catalog = StatCatalog::from_json(json).unwrap();
        assert!(catalog.is_special_stat(StatId::Crafting, "Castoroides"));
        assert!(!catalog.is_special_stat(StatId::Crafting, "Gacha"));
        assert_eq!(catalog.list_base_stats().len(), 6);
    }

    #[test]
    fn test_rule_on_base_stat_rejected() {
        let json = r#"{ "special_rules": [ { "stat": "oxygen", "species": ["Rex"] } ] }"#;
        assert!(StatCatalog::from_json(json).is_err());
    }

    #[test]
    fn test_only_listed_base_stats_are_rejected() {
        let catalog = StatCatalog::standard();
        for def in catalog.list_base_stats() {
            assert!(catalog.is_base_stat(def.id));
            let rule = SpecialStatRule::new(def.id, ["Rex"]);
            assert!(StatCatalog::from_rules(vec![rule]).is_err());
        }

        assert!(!catalog.is_base_stat(StatId::Crafting));
        let crafting = SpecialStatRule::new(StatId::Crafting, ["Rex"]);
        assert!(StatCatalog::from_rules(vec![crafting]).is_ok());
    }

    #[test]
    fn test_definition_lookup() {
        let catalog = StatCatalog::standard();
        assert_eq!(catalog.definition(StatId::Damage).unwrap().name, "Melee Damage");
        assert_eq!(catalog.definition(StatId::Crafting).unwrap().icon, "crafting");
    }
}
