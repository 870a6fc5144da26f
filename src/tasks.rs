// ✅ Change/Task Deriver
//
// One stat edit → one pending task per changed stat, so tribe members can
// complete them independently. Ids are assigned by the store, never here.

use crate::catalog::StatId;
use crate::error::{Result, TrackerError};
use crate::sheet::StatSheet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// SHEET KIND & STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    Base,
    Mutated,
}

impl SheetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetKind::Base => "base",
            SheetKind::Mutated => "mutated",
        }
    }

    pub fn parse(text: &str) -> Option<SheetKind> {
        match text {
            "base" => Some(SheetKind::Base),
            "mutated" => Some(SheetKind::Mutated),
            _ => None,
        }
    }
}

/// pending → completed, once. Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(text: &str) -> Option<TaskStatus> {
        match text {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

// ============================================================================
// TASK RECORDS
// ============================================================================

/// A derived change that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub creature_id: String,
    pub stat: StatId,
    pub sheet_kind: SheetKind,
    pub old_value: u32,
    pub new_value: u32,
    /// new − old
    pub delta: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl NewTask {
    /// Attach a store-assigned id. Every stored task starts pending.
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            creature_id: self.creature_id,
            stat: self.stat,
            sheet_kind: self.sheet_kind,
            old_value: self.old_value,
            new_value: self.new_value,
            delta: self.delta,
            created_by: self.created_by,
            created_at: self.created_at,
            status: TaskStatus::Pending,
            completed_by: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub creature_id: String,
    pub stat: StatId,
    pub sheet_kind: SheetKind,
    pub old_value: u32,
    pub new_value: u32,
    pub delta: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// The single pending → completed transition
    pub fn complete(&mut self, completer: &str, at: DateTime<Utc>) -> Result<()> {
        if self.status == TaskStatus::Completed {
            return Err(TrackerError::AlreadyCompleted(self.id.clone()));
        }
        self.status = TaskStatus::Completed;
        self.completed_by = Some(completer.to_string());
        self.completed_at = Some(at);
        Ok(())
    }
}

// ============================================================================
// DERIVATION
// ============================================================================

/// Before/after snapshot of one committed stat edit.
///
/// The caller guarantees the pair is consistent; a racing edit cannot be
/// detected from here.
#[derive(Debug, Clone, Copy)]
pub struct StatEdit<'a> {
    pub creature_id: &'a str,
    pub old_base: &'a StatSheet,
    pub new_base: &'a StatSheet,
    pub old_mutations: Option<&'a StatSheet>,
    pub new_mutations: Option<&'a StatSheet>,
    pub actor: &'a str,
}

/// Base sheet changes first, then mutation sheet changes, each in catalog
/// order. Unchanged stats produce nothing.
pub fn derive_tasks(edit: &StatEdit<'_>, now: DateTime<Utc>) -> Vec<NewTask> {
    let empty = StatSheet::new();
    let old_mutations = edit.old_mutations.unwrap_or(&empty);
    let new_mutations = edit.new_mutations.unwrap_or(&empty);

    let changes = diff_sheets(edit.old_base, edit.new_base)
        .into_iter()
        .map(|change| (SheetKind::Base, change))
        .chain(
            diff_sheets(old_mutations, new_mutations)
                .into_iter()
                .map(|change| (SheetKind::Mutated, change)),
        );

    changes
        .map(|(sheet_kind, (stat, old_value, new_value))| NewTask {
            creature_id: edit.creature_id.to_string(),
            stat,
            sheet_kind,
            old_value,
            new_value,
            delta: new_value as i64 - old_value as i64,
            created_by: edit.actor.to_string(),
            created_at: now,
        })
        .collect()
}

/// `(stat, old, new)` for every stat in either sheet whose value differs
pub fn diff_sheets(old: &StatSheet, new: &StatSheet) -> Vec<(StatId, u32, u32)> {
    let stats: BTreeSet<StatId> = old.stats().chain(new.stats()).collect();
    stats
        .into_iter()
        .map(|stat| (stat, old.get(stat), new.get(stat)))
        .filter(|(_, before, after)| before != after)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fifty_fifty() -> StatSheet {
        StatSheet::new()
            .with(StatId::Damage, 50)
            .with(StatId::Weight, 50)
    }

    fn edit<'a>(
        old_base: &'a StatSheet,
        new_base: &'a StatSheet,
        old_mutations: Option<&'a StatSheet>,
        new_mutations: Option<&'a StatSheet>,
    ) -> StatEdit<'a> {
        StatEdit {
            creature_id: "rex-1",
            old_base,
            new_base,
            old_mutations,
            new_mutations,
            actor: "alice",
        }
    }

    #[test]
    fn test_single_changed_stat() {
        let old = fifty_fifty();
        let new = fifty_fifty().with(StatId::Damage, 55);
        let now = Utc::now();

        let tasks = derive_tasks(&edit(&old, &new, None, None), now);

        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.stat, StatId::Damage);
        assert_eq!(task.sheet_kind, SheetKind::Base);
        assert_eq!((task.old_value, task.new_value, task.delta), (50, 55, 5));
        assert_eq!(task.created_by, "alice");
        assert_eq!(task.created_at, now);
    }

    #[test]
    fn test_unchanged_sheets_yield_nothing() {
        let base = fifty_fifty();
        let mutations = StatSheet::new().with(StatId::Health, 4);

        let tasks = derive_tasks(
            &edit(&base, &base, Some(&mutations), Some(&mutations)),
            Utc::now(),
        );
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_missing_is_zero() {
        let old = StatSheet::new();
        let new = StatSheet::new()
            .with(StatId::Food, 0)
            .with(StatId::Stamina, 3);

        let tasks = derive_tasks(&edit(&old, &new, None, None), Utc::now());

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].stat, StatId::Stamina);
        assert_eq!(tasks[0].delta, 3);
    }

    #[test]
    fn test_negative_delta_and_removed_stat() {
        let old = StatSheet::new().with(StatId::Health, 40).with(StatId::Oxygen, 12);
        let new = StatSheet::new().with(StatId::Health, 35);

        let tasks = derive_tasks(&edit(&old, &new, None, None), Utc::now());

        assert_eq!(tasks.len(), 2);
        assert_eq!((tasks[0].stat, tasks[0].delta), (StatId::Health, -5));
        assert_eq!((tasks[1].stat, tasks[1].delta), (StatId::Oxygen, -12));
    }

    #[test]
    fn test_base_and_mutation_changes_are_independent() {
        let base = fifty_fifty();
        let new_base = fifty_fifty().with(StatId::Weight, 52);
        let new_mutations = StatSheet::new().with(StatId::Weight, 2).with(StatId::Health, 2);

        let tasks = derive_tasks(
            &edit(&base, &new_base, None, Some(&new_mutations)),
            Utc::now(),
        );

        let kinds: Vec<(SheetKind, StatId)> =
            tasks.iter().map(|t| (t.sheet_kind, t.stat)).collect();
        assert_eq!(
            kinds,
            vec![
                (SheetKind::Base, StatId::Weight),
                (SheetKind::Mutated, StatId::Health),
                (SheetKind::Mutated, StatId::Weight),
            ]
        );
        assert!(tasks.iter().all(|t| t.delta != 0));
    }

    #[test]
    fn test_deterministic() {
        let old = fifty_fifty();
        let new = StatSheet::new().with(StatId::Damage, 1).with(StatId::Crafting, 9);
        let now = Utc::now();

        let first = derive_tasks(&edit(&old, &new, None, None), now);
        let second = derive_tasks(&edit(&old, &new, None, None), now);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_complete_once() {
        let old = fifty_fifty();
        let new = fifty_fifty().with(StatId::Damage, 51);
        let mut task = derive_tasks(&edit(&old, &new, None, None), Utc::now())
            .remove(0)
            .into_task("task-1".to_string());

        assert!(task.is_pending());
        let done_at = Utc::now();
        task.complete("bob", done_at).unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_by.as_deref(), Some("bob"));
        assert_eq!(task.completed_at, Some(done_at));

        let again = task.complete("carol", Utc::now());
        assert!(matches!(again, Err(TrackerError::AlreadyCompleted(id)) if id == "task-1"));
        assert_eq!(task.completed_by.as_deref(), Some("bob"));
    }

    #[test]
    fn test_status_and_kind_keys() {
        assert_eq!(TaskStatus::parse("pending"), Some(TaskStatus::Pending));
        assert_eq!(TaskStatus::parse("done"), None);
        assert_eq!(SheetKind::parse(SheetKind::Mutated.as_str()), Some(SheetKind::Mutated));
    }
}
