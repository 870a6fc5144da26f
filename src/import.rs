// 📂 Roster Import - CSV → Creatures
//
// Header-based: id, name, species, tribe_id, types, one column per stat key,
// and optional `mut_<stat>` columns for the mutation sheet. Blank cells are 0.

use crate::catalog::StatId;
use crate::classifier::parse_type_list;
use crate::creature::Creature;
use crate::error::{Result, TrackerError};
use crate::sheet::{normalize_text, StatSheet};
use std::io::Read;
use std::path::Path;

const MUTATION_PREFIX: &str = "mut_";

pub fn load_creatures_csv(csv_path: &Path) -> Result<Vec<Creature>> {
    let rdr = csv::Reader::from_path(csv_path)?;
    read_creatures(rdr)
}

pub fn load_creatures_from_reader<R: Read>(reader: R) -> Result<Vec<Creature>> {
    read_creatures(csv::Reader::from_reader(reader))
}

fn read_creatures<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<Creature>> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut creatures = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = index + 2;

        let mut creature = Creature::new(String::new(), String::new());
        let mut mutations = StatSheet::new();
        let mut has_mutations = false;

        for (header, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            match header.as_str() {
                "id" => creature.id = cell.to_string(),
                "name" => creature.name = cell.to_string(),
                "species" => creature.species = cell.to_string(),
                "tribe_id" if !cell.is_empty() => creature.tribe_id = Some(cell.to_string()),
                "types" => creature.types = parse_type_list(cell),
                other => {
                    if let Some(stat) = other.strip_prefix(MUTATION_PREFIX).and_then(StatId::parse) {
                        has_mutations |= !cell.is_empty();
                        mutations.set(stat, normalize_text(cell));
                    } else if let Some(stat) = StatId::parse(other) {
                        creature.base.set(stat, normalize_text(cell));
                    }
                }
            }
        }

        if creature.id.is_empty() {
            return Err(TrackerError::InvalidRecord(format!("line {}: missing id", line)));
        }
        if creature.species.is_empty() {
            return Err(TrackerError::InvalidRecord(format!(
                "line {}: missing species for '{}'",
                line, creature.id
            )));
        }
        if has_mutations {
            creature.mutations = Some(mutations);
        }

        creatures.push(creature);
    }

    tracing::debug!("Loaded {} creatures from CSV", creatures.len());
    Ok(creatures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TypeId;

    const ROSTER: &str = "\
id,name,species,tribe_id,types,health,stamina,oxygen,food,weight,damage,crafting,mut_health,mut_damage
rex-1,Big Red,Rex,tribe-a,1,50,50,50,50,50,50,,20,
mosa-1,,Mosasaurus,,3;4,10,,99,-5,x,2,,,
";

    #[test]
    fn test_load_roster() {
        let creatures = load_creatures_from_reader(ROSTER.as_bytes()).unwrap();
        assert_eq!(creatures.len(), 2);

        let rex = &creatures[0];
        assert_eq!(rex.name, "Big Red");
        assert_eq!(rex.tribe_id.as_deref(), Some("tribe-a"));
        assert_eq!(rex.base.get(StatId::Damage), 50);
        assert!(rex.is_mutated());
        assert_eq!(rex.mutations.as_ref().unwrap().get(StatId::Health), 20);

        let mosa = &creatures[1];
        assert!(mosa.tribe_id.is_none());
        assert!(mosa.types.contains(&TypeId::AMPHIBIOUS));
        assert!(mosa.is_aquatic());
        assert_eq!(mosa.base.get(StatId::Oxygen), 99);
        assert_eq!(mosa.base.get(StatId::Food), 0);
        assert_eq!(mosa.base.get(StatId::Weight), 0);
        assert!(mosa.mutations.is_none());
    }

    #[test]
    fn test_missing_species_rejected() {
        let csv = "id,species,health\nrex-1,,5\n";
        let err = load_creatures_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidRecord(msg) if msg.contains("line 2")));
    }
}
