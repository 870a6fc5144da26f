// 📋 Stat Sheet - stat id → non-negative points
//
// Raw sheets come from partially filled forms. Parsing never fails on a bad
// value: negatives, non-numbers and blanks become 0, unknown keys are dropped.

use crate::catalog::StatId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatSheet {
    points: BTreeMap<StatId, u32>,
}

impl StatSheet {
    pub fn new() -> Self {
        StatSheet::default()
    }

    /// Points for `stat`, 0 when absent
    pub fn get(&self, stat: StatId) -> u32 {
        self.points.get(&stat).copied().unwrap_or(0)
    }

    pub fn set(&mut self, stat: StatId, value: u32) {
        self.points.insert(stat, value);
    }

    /// Builder form of `set`
    pub fn with(mut self, stat: StatId, value: u32) -> Self {
        self.set(stat, value);
        self
    }

    pub fn contains(&self, stat: StatId) -> bool {
        self.points.contains_key(&stat)
    }

    /// Entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (StatId, u32)> + '_ {
        self.points.iter().map(|(stat, value)| (*stat, *value))
    }

    pub fn stats(&self) -> impl Iterator<Item = StatId> + '_ {
        self.points.keys().copied()
    }

    /// Empty and all-zero sheets are equivalent for every computation
    pub fn is_all_zero(&self) -> bool {
        self.points.values().all(|value| *value == 0)
    }

    /// Build a sheet from a raw JSON object, normalizing every value
    pub fn from_raw(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut sheet = StatSheet::new();
        for (key, value) in raw {
            match StatId::parse(key) {
                Some(stat) => sheet.set(stat, normalize_value(value)),
                None => tracing::debug!("Ignoring unknown stat key '{}'", key),
            }
        }
        sheet
    }

    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

impl FromIterator<(StatId, u32)> for StatSheet {
    fn from_iter<I: IntoIterator<Item = (StatId, u32)>>(iter: I) -> Self {
        StatSheet {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'de> Deserialize<'de> for StatSheet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(StatSheet::from_raw(&raw))
    }
}

/// Clamp a raw form value to a point count.
///
/// Numbers truncate toward zero and saturate at `u32::MAX`; numeric strings
/// are accepted; anything else is 0.
pub fn normalize_value(value: &serde_json::Value) -> u32 {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                u32::try_from(v).unwrap_or(u32::MAX)
            } else if let Some(v) = n.as_f64() {
                clamp_float(v)
            } else {
                0
            }
        }
        serde_json::Value::String(s) => normalize_text(s),
        _ => 0,
    }
}

/// Same rules as `normalize_value` for a text cell (CSV, query strings)
pub fn normalize_text(text: &str) -> u32 {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return u32::try_from(v).unwrap_or(u32::MAX);
    }
    trimmed.parse::<f64>().map(clamp_float).unwrap_or(0)
}

fn clamp_float(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        // `as` saturates at u32::MAX
        v.trunc() as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parse() {
        let sheet = StatSheet::from_json_str(
            r#"{"health": 12, "stamina": -4, "oxygen": "7", "food": "lots",
                "weight": null, "damage": 3.9, "speed": 40}"#,
        )
        .unwrap();

        assert_eq!(sheet.get(StatId::Health), 12);
        assert_eq!(sheet.get(StatId::Stamina), 0);
        assert_eq!(sheet.get(StatId::Oxygen), 7);
        assert_eq!(sheet.get(StatId::Food), 0);
        assert_eq!(sheet.get(StatId::Weight), 0);
        assert_eq!(sheet.get(StatId::Damage), 3);
        assert_eq!(sheet.iter().count(), 6);
    }

    #[test]
    fn test_missing_stat_is_zero() {
        let sheet = StatSheet::new().with(StatId::Health, 5);
        assert_eq!(sheet.get(StatId::Crafting), 0);
        assert!(!sheet.contains(StatId::Crafting));
    }

    #[test]
    fn test_all_zero_equivalence() {
        assert!(StatSheet::new().is_all_zero());
        assert!(StatSheet::new().with(StatId::Food, 0).is_all_zero());
        assert!(!StatSheet::new().with(StatId::Food, 1).is_all_zero());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(" 42 "), 42);
        assert_eq!(normalize_text(""), 0);
        assert_eq!(normalize_text("-3"), 0);
        assert_eq!(normalize_text("99999999999"), u32::MAX);
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let sheet = StatSheet::new().with(StatId::Damage, 55).with(StatId::Health, 50);
        let json = serde_json::to_string(&sheet).unwrap();
        assert_eq!(json, r#"{"health":50,"damage":55}"#);
    }
}
