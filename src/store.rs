// 🗄️ Task Lifecycle Store - SQLite + WAL
//
// Persists creature sheets, tasks, and an append-only event feed of task
// lifecycle transitions. Clients follow the feed (`events_since`) instead
// of diffing polled pending counts.

use crate::catalog::StatId;
use crate::classifier::TypeId;
use crate::creature::Creature;
use crate::error::{Result, TrackerError};
use crate::sheet::StatSheet;
use crate::tasks::{derive_tasks, NewTask, SheetKind, StatEdit, Task, TaskStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    TaskCreated,
    TaskCompleted,
}

impl TaskEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEventKind::TaskCreated => "task_created",
            TaskEventKind::TaskCompleted => "task_completed",
        }
    }

    pub fn parse(text: &str) -> Option<TaskEventKind> {
        match text {
            "task_created" => Some(TaskEventKind::TaskCreated),
            "task_completed" => Some(TaskEventKind::TaskCompleted),
            _ => None,
        }
    }
}

/// Every lifecycle transition is an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: TaskEventKind,
    pub task_id: String,
    pub creature_id: String,
    pub actor: String,
    pub data: serde_json::Value,
}

impl TaskEvent {
    pub fn created(task: &Task) -> Self {
        TaskEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: task.created_at,
            kind: TaskEventKind::TaskCreated,
            task_id: task.id.clone(),
            creature_id: task.creature_id.clone(),
            actor: task.created_by.clone(),
            data: serde_json::json!({
                "stat": task.stat,
                "sheet_kind": task.sheet_kind,
                "old_value": task.old_value,
                "new_value": task.new_value,
                "delta": task.delta,
            }),
        }
    }

    pub fn completed(task: &Task, completer: &str, at: DateTime<Utc>) -> Self {
        TaskEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: at,
            kind: TaskEventKind::TaskCompleted,
            task_id: task.id.clone(),
            creature_id: task.creature_id.clone(),
            actor: completer.to_string(),
            data: serde_json::json!({ "stat": task.stat, "delta": task.delta }),
        }
    }
}

/// An event with its position in the feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    pub seq: i64,
    #[serde(flatten)]
    pub event: TaskEvent,
}

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    Pending,
    Completed,
    All,
}

impl StatusFilter {
    pub fn parse(text: &str) -> Option<StatusFilter> {
        match text {
            "all" => Some(StatusFilter::All),
            other => TaskStatus::parse(other).map(StatusFilter::from),
        }
    }

    fn status(&self) -> Option<TaskStatus> {
        match self {
            StatusFilter::Pending => Some(TaskStatus::Pending),
            StatusFilter::Completed => Some(TaskStatus::Completed),
            StatusFilter::All => None,
        }
    }
}

impl From<TaskStatus> for StatusFilter {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => StatusFilter::Pending,
            TaskStatus::Completed => StatusFilter::Completed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub creature_id: Option<String>,
    /// Tribe membership is resolved through the creature's tribe
    #[serde(default)]
    pub tribe_id: Option<String>,
}

impl TaskFilter {
    pub fn with_status(status: StatusFilter) -> Self {
        TaskFilter {
            status,
            ..TaskFilter::default()
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait TaskStore {
    /// Assign ids and persist; one `task_created` event per task
    fn record_tasks(&mut self, tasks: Vec<NewTask>) -> Result<Vec<Task>>;

    /// pending → completed; one `task_completed` event
    fn complete_task(&mut self, task_id: &str, completer: &str, at: DateTime<Utc>) -> Result<Task>;

    /// Newest first
    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    fn pending_count(&self, tribe_id: Option<&str>) -> Result<u64>;

    /// Events with `seq > after_seq`, oldest first
    fn events_since(&self, after_seq: i64) -> Result<Vec<StoredEvent>>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteTaskStore { conn })
    }

    // ------------------------------------------------------------------------
    // Creatures
    // ------------------------------------------------------------------------

    pub fn upsert_creature(&self, creature: &Creature) -> Result<()> {
        upsert_creature(&self.conn, creature, Utc::now())
    }

    pub fn get_creature(&self, id: &str) -> Result<Option<Creature>> {
        get_creature(&self.conn, id)
    }

    pub fn list_creatures(&self, tribe_id: Option<&str>) -> Result<Vec<Creature>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, species, tribe_id, types, base, mutations
             FROM creatures
             WHERE (?1 IS NULL OR tribe_id = ?1)
             ORDER BY name, id",
        )?;

        let creatures = stmt
            .query_map(params![tribe_id], creature_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(creatures)
    }

    /// Commit new sheets for a creature and record the tasks the change
    /// implies. The old snapshot is read inside the same write transaction,
    /// so concurrent edits to one creature serialize.
    ///
    /// `new_mutations: None` keeps the stored mutation sheet; pass an empty
    /// sheet to clear it.
    pub fn apply_stat_edit(
        &mut self,
        creature_id: &str,
        new_base: StatSheet,
        new_mutations: Option<StatSheet>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut creature =
            get_creature(&tx, creature_id)?.ok_or_else(|| TrackerError::creature_not_found(creature_id))?;

        let new_mutations = new_mutations.or_else(|| creature.mutations.clone());
        let drafts = derive_tasks(
            &StatEdit {
                creature_id,
                old_base: &creature.base,
                new_base: &new_base,
                old_mutations: creature.mutations.as_ref(),
                new_mutations: new_mutations.as_ref(),
                actor,
            },
            now,
        );

        creature.base = new_base;
        creature.mutations = new_mutations;
        upsert_creature(&tx, &creature, now)?;

        let tasks = insert_new_tasks(&tx, drafts)?;
        tx.commit()?;

        tracing::info!(
            creature_id = %creature_id,
            actor = %actor,
            tasks = tasks.len(),
            "Applied stat edit"
        );
        Ok(tasks)
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        get_task(&self.conn, task_id)
    }
}

impl TaskStore for SqliteTaskStore {
    fn record_tasks(&mut self, tasks: Vec<NewTask>) -> Result<Vec<Task>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = insert_new_tasks(&tx, tasks)?;
        tx.commit()?;
        Ok(stored)
    }

    fn complete_task(&mut self, task_id: &str, completer: &str, at: DateTime<Utc>) -> Result<Task> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut task = get_task(&tx, task_id)?.ok_or_else(|| TrackerError::task_not_found(task_id))?;
        task.complete(completer, at)?;

        let updated = tx.execute(
            "UPDATE tasks
             SET status = ?1, completed_by = ?2, completed_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                TaskStatus::Completed.as_str(),
                completer,
                format_time(at),
                task_id,
                TaskStatus::Pending.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(TrackerError::AlreadyCompleted(task_id.to_string()));
        }

        insert_event(&tx, &TaskEvent::completed(&task, completer, at))?;
        tx.commit()?;

        tracing::info!(task_id = %task_id, completer = %completer, "Task completed");
        Ok(task)
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.creature_id, t.stat, t.sheet_kind, t.old_value, t.new_value,
                    t.delta, t.created_by, t.created_at, t.status, t.completed_by, t.completed_at
             FROM tasks t
             LEFT JOIN creatures c ON c.id = t.creature_id
             WHERE (?1 IS NULL OR t.status = ?1)
               AND (?2 IS NULL OR t.creature_id = ?2)
               AND (?3 IS NULL OR c.tribe_id = ?3)
             ORDER BY t.created_at DESC, t.rowid DESC",
        )?;

        let tasks = stmt
            .query_map(
                params![
                    filter.status.status().map(|s| s.as_str()),
                    filter.creature_id,
                    filter.tribe_id,
                ],
                task_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    fn pending_count(&self, tribe_id: Option<&str>) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM tasks t
             LEFT JOIN creatures c ON c.id = t.creature_id
             WHERE t.status = ?1 AND (?2 IS NULL OR c.tribe_id = ?2)",
            params![TaskStatus::Pending.as_str(), tribe_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn events_since(&self, after_seq: i64) -> Result<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, event_id, timestamp, event_type, task_id, creature_id, actor, data
             FROM events
             WHERE seq > ?1
             ORDER BY seq",
        )?;

        let events = stmt
            .query_map(params![after_seq], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory"
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!("SQLite journal mode: {}", mode);

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS creatures (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            species TEXT NOT NULL,
            tribe_id TEXT,
            types TEXT NOT NULL DEFAULT '[]',
            base TEXT NOT NULL DEFAULT '{}',
            mutations TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            creature_id TEXT NOT NULL,
            stat TEXT NOT NULL,
            sheet_kind TEXT NOT NULL,
            old_value INTEGER NOT NULL,
            new_value INTEGER NOT NULL,
            delta INTEGER NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            completed_by TEXT,
            completed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            task_id TEXT NOT NULL,
            creature_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            data TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_creatures_tribe ON creatures(tribe_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_creature ON tasks(creature_id);
        CREATE INDEX IF NOT EXISTS idx_events_task ON events(task_id);",
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS
// ============================================================================

fn upsert_creature(conn: &Connection, creature: &Creature, now: DateTime<Utc>) -> Result<()> {
    let types_json = serde_json::to_string(&creature.types)?;
    let base_json = serde_json::to_string(&creature.base)?;
    let mutations_json = creature
        .mutations
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO creatures (id, name, species, tribe_id, types, base, mutations, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            species = excluded.species,
            tribe_id = excluded.tribe_id,
            types = excluded.types,
            base = excluded.base,
            mutations = excluded.mutations,
            updated_at = excluded.updated_at",
        params![
            creature.id,
            creature.name,
            creature.species,
            creature.tribe_id,
            types_json,
            base_json,
            mutations_json,
            format_time(now),
        ],
    )?;

    Ok(())
}

fn get_creature(conn: &Connection, id: &str) -> Result<Option<Creature>> {
    let creature = conn
        .query_row(
            "SELECT id, name, species, tribe_id, types, base, mutations
             FROM creatures WHERE id = ?1",
            params![id],
            creature_from_row,
        )
        .optional()?;
    Ok(creature)
}

fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT id, creature_id, stat, sheet_kind, old_value, new_value,
                    delta, created_by, created_at, status, completed_by, completed_at
             FROM tasks WHERE id = ?1",
            params![id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

fn insert_new_tasks(conn: &Connection, drafts: Vec<NewTask>) -> Result<Vec<Task>> {
    let mut stored = Vec::with_capacity(drafts.len());

    for draft in drafts {
        let task = draft.into_task(uuid::Uuid::new_v4().to_string());

        conn.execute(
            "INSERT INTO tasks (
                id, creature_id, stat, sheet_kind, old_value, new_value,
                delta, created_by, created_at, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.creature_id,
                task.stat.as_str(),
                task.sheet_kind.as_str(),
                task.old_value,
                task.new_value,
                task.delta,
                task.created_by,
                format_time(task.created_at),
                task.status.as_str(),
            ],
        )?;
        insert_event(conn, &TaskEvent::created(&task))?;

        stored.push(task);
    }

    Ok(stored)
}

fn insert_event(conn: &Connection, event: &TaskEvent) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, task_id, creature_id, actor, data
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_time(event.timestamp),
            event.kind.as_str(),
            event.task_id,
            event.creature_id,
            event.actor,
            data_json,
        ],
    )?;

    Ok(())
}

fn creature_from_row(row: &Row<'_>) -> rusqlite::Result<Creature> {
    let types_json: String = row.get(4)?;
    let base_json: String = row.get(5)?;
    let mutations_json: Option<String> = row.get(6)?;

    let types: BTreeSet<TypeId> = parse_json_column(4, &types_json)?;
    let base: StatSheet = parse_json_column(5, &base_json)?;
    let mutations = mutations_json
        .map(|json| parse_json_column::<StatSheet>(6, &json))
        .transpose()?;

    Ok(Creature {
        id: row.get(0)?,
        name: row.get(1)?,
        species: row.get(2)?,
        tribe_id: row.get(3)?,
        types,
        base,
        mutations,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let stat: String = row.get(2)?;
    let sheet_kind: String = row.get(3)?;
    let created_at: String = row.get(8)?;
    let status: String = row.get(9)?;
    let completed_at: Option<String> = row.get(11)?;

    Ok(Task {
        id: row.get(0)?,
        creature_id: row.get(1)?,
        stat: StatId::parse(&stat).ok_or_else(|| invalid_column(2, "stat", &stat))?,
        sheet_kind: SheetKind::parse(&sheet_kind)
            .ok_or_else(|| invalid_column(3, "sheet kind", &sheet_kind))?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        delta: row.get(6)?,
        created_by: row.get(7)?,
        created_at: parse_time_column(8, &created_at)?,
        status: TaskStatus::parse(&status).ok_or_else(|| invalid_column(9, "status", &status))?,
        completed_by: row.get(10)?,
        completed_at: completed_at
            .map(|text| parse_time_column(11, &text))
            .transpose()?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEvent> {
    let timestamp: String = row.get(2)?;
    let kind: String = row.get(3)?;
    let data_json: String = row.get(7)?;

    Ok(StoredEvent {
        seq: row.get(0)?,
        event: TaskEvent {
            event_id: row.get(1)?,
            timestamp: parse_time_column(2, &timestamp)?,
            kind: TaskEventKind::parse(&kind).ok_or_else(|| invalid_column(3, "event type", &kind))?,
            task_id: row.get(4)?,
            creature_id: row.get(5)?,
            actor: row.get(6)?,
            data: parse_json_column(7, &data_json)?,
        },
    })
}

/// Fixed-width RFC 3339 with full precision, so text ordering matches time
/// ordering and stored times read back unchanged
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time_column(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json_column<T: serde::de::DeserializeOwned>(idx: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_column(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {}: '{}'", what, value).into(),
    )
}

// ============================================================================
// TESTS
// ============================================================================
