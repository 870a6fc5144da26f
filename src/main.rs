use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::env;
use std::path::Path;

use dino_tracker::{
    load_creatures_csv, type_name, Config, LevelCalculator, SqliteTaskStore, StatSheet,
    StatusFilter, TaskFilter, TaskStore, TypeRules,
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["init"] => run_init(&config),
        ["import", csv_path] => run_import(&config, Path::new(csv_path)),
        ["level", species, rest @ ..] => run_level(&config, species, rest),
        ["show", creature_id] => run_show(&config, creature_id),
        ["edit", creature_id, actor, base_json] => run_edit(&config, creature_id, actor, base_json, None),
        ["edit", creature_id, actor, base_json, mut_json] => {
            run_edit(&config, creature_id, actor, base_json, Some(*mut_json))
        }
        ["tasks"] => run_tasks(&config, "pending", None),
        ["tasks", status] => run_tasks(&config, status, None),
        ["tasks", status, tribe] => run_tasks(&config, status, Some(*tribe)),
        ["complete", task_id, actor] => run_complete(&config, task_id, actor),
        ["events"] => run_events(&config, 0),
        ["events", after] => {
            let after: i64 = after.parse().context("after-seq must be an integer")?;
            run_events(&config, after)
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🦖 Dino Tracker {}", dino_tracker::VERSION);
    println!();
    println!("Usage:");
    println!("  dino-tracker init");
    println!("  dino-tracker import <creatures.csv>");
    println!("  dino-tracker level <species> <base-json> [mutations-json] [--aquatic]");
    println!("  dino-tracker show <creature-id>");
    println!("  dino-tracker edit <creature-id> <actor> <base-json> [mutations-json, {{}} clears]");
    println!("  dino-tracker tasks [pending|completed|all] [tribe-id]");
    println!("  dino-tracker complete <task-id> <actor>");
    println!("  dino-tracker events [after-seq]");
}

fn open_store(config: &Config) -> Result<SqliteTaskStore> {
    SqliteTaskStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))
}

fn calculator(config: &Config) -> Result<LevelCalculator> {
    Ok(LevelCalculator::new(config.load_catalog()?, TypeRules::standard()))
}

fn parse_sheet(json: &str) -> Result<StatSheet> {
    StatSheet::from_json_str(json).with_context(|| format!("Invalid stat sheet JSON: {}", json))
}

fn run_init(config: &Config) -> Result<()> {
    open_store(config)?;
    println!("✓ Database initialized at {:?}", config.db_path);
    Ok(())
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    println!("📂 Loading roster...");
    let creatures = load_creatures_csv(csv_path)
        .with_context(|| format!("Failed to load roster {:?}", csv_path))?;
    println!("✓ Loaded {} creatures from CSV", creatures.len());

    let store = open_store(config)?;
    let calc = calculator(config)?;
    for creature in &creatures {
        store.upsert_creature(creature)?;
        let levels = calc.creature_levels(creature);
        println!(
            "  {:<16} {:<14} lvl {}",
            creature.id,
            creature.species,
            levels.display_level()
        );
    }

    println!("✓ Saved {} creatures", creatures.len());
    Ok(())
}

fn run_level(config: &Config, species: &str, rest: &[&str]) -> Result<()> {
    let aquatic = rest.contains(&"--aquatic");
    let sheets: Vec<&str> = rest.iter().copied().filter(|arg| *arg != "--aquatic").collect();

    let (base, mutations) = match sheets.as_slice() {
        [base] => (parse_sheet(base)?, None),
        [base, mutations] => (parse_sheet(base)?, Some(parse_sheet(mutations)?)),
        _ => bail!("level expects a base sheet and an optional mutation sheet"),
    };

    let calc = calculator(config)?;
    let base_level = calc.calculate_level(&base, species, aquatic);
    println!("Base level:  {}", base_level);

    if let Some(mutations) = mutations.filter(|sheet| !sheet.is_all_zero()) {
        let total = calc.calculate_total_level(&base, Some(&mutations), species, aquatic);
        println!("Total level: {} (+{} mutation points)", total, total - base_level);
    }

    Ok(())
}

fn run_show(config: &Config, creature_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let Some(creature) = store.get_creature(creature_id)? else {
        bail!("Creature not found: {}", creature_id);
    };

    let calc = calculator(config)?;
    let levels = calc.creature_levels(&creature);

    println!("🦖 {} ({})", creature.id, creature.species);
    if !creature.name.is_empty() {
        println!("   Name:  {}", creature.name);
    }
    if !creature.types.is_empty() {
        let types: Vec<String> = creature
            .types
            .iter()
            .map(|id| type_name(*id).map_or_else(|| format!("type {}", id.0), str::to_string))
            .collect();
        println!("   Types: {}", types.join(", "));
    }
    println!("   Level: {}", levels.base_level);
    if let Some(total) = levels.total_level {
        println!("   Total: {} (+{} mutations)", total, levels.mutation_points);
    }
    println!();

    for contribution in &levels.contributions {
        let name = calc
            .catalog()
            .definition(contribution.stat)
            .map(|def| def.name.as_str())
            .unwrap_or(contribution.stat.as_str());
        let marker = if contribution.counted { "" } else { "  (not counted)" };
        println!(
            "   {:<16} {:>4}  +{:<4}{}",
            name, contribution.base_points, contribution.mutation_points, marker
        );
    }

    Ok(())
}

fn run_edit(
    config: &Config,
    creature_id: &str,
    actor: &str,
    base_json: &str,
    mut_json: Option<&str>,
) -> Result<()> {
    let new_base = parse_sheet(base_json)?;
    let new_mutations = mut_json.map(parse_sheet).transpose()?;

    let mut store = open_store(config)?;
    let tasks = store.apply_stat_edit(creature_id, new_base, new_mutations, actor, Utc::now())?;

    if tasks.is_empty() {
        println!("✓ No stat changes");
    } else {
        println!("✓ {} task(s) created", tasks.len());
        for task in &tasks {
            println!(
                "  {} {:<8} {:<8} {} → {} ({:+})",
                task.id,
                task.sheet_kind.as_str(),
                task.stat,
                task.old_value,
                task.new_value,
                task.delta
            );
        }
    }

    Ok(())
}

fn run_tasks(config: &Config, status: &str, tribe: Option<&str>) -> Result<()> {
    let Some(status) = StatusFilter::parse(status) else {
        bail!("Unknown status filter '{}' (pending, completed, all)", status);
    };

    let store = open_store(config)?;
    let filter = TaskFilter {
        status,
        creature_id: None,
        tribe_id: tribe.map(str::to_string),
    };
    let tasks = store.list_tasks(&filter)?;

    println!("📋 {} task(s)", tasks.len());
    for task in &tasks {
        let done = match (&task.completed_by, task.completed_at) {
            (Some(by), Some(at)) => format!("  ✓ {} at {}", by, at.format("%Y-%m-%d %H:%M")),
            _ => String::new(),
        };
        println!(
            "  {} {:<12} {:<8} {:<8} {:+}{}",
            task.id,
            task.creature_id,
            task.sheet_kind.as_str(),
            task.stat,
            task.delta,
            done
        );
    }

    Ok(())
}

fn run_complete(config: &Config, task_id: &str, actor: &str) -> Result<()> {
    let mut store = open_store(config)?;
    let task = store.complete_task(task_id, actor, Utc::now())?;
    println!("✅ Task {} completed by {}", task.id, actor);
    Ok(())
}

fn run_events(config: &Config, after: i64) -> Result<()> {
    let store = open_store(config)?;
    for stored in store.events_since(after)? {
        println!(
            "{:>6} {} {:<15} {} {}",
            stored.seq,
            stored.event.timestamp.to_rfc3339(),
            stored.event.kind.as_str(),
            stored.event.task_id,
            stored.event.actor
        );
    }
    Ok(())
}
