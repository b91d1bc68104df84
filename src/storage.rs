use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{
    Assignment, Chore, ChoreInstance, MemberId, NewAssignment, NewChore, NewChoreInstance,
    NewRecurrenceRule, RecurrenceRule, TenantId,
};
use crate::recurrence::validate_pattern;

/// Persistence operations the scheduler consumes.
pub trait Store {
    /// Active rules whose watermark is strictly before `before`, plus active
    /// rules generated through their end date, which are still due an
    /// expiry check.
    fn list_active_rules(&self, before: NaiveDate) -> Result<Vec<RecurrenceRule>, StoreError>;

    fn find_rule(&self, rule_id: u64) -> Result<Option<RecurrenceRule>, StoreError>;

    fn find_template(&self, template_id: u64) -> Result<Option<Chore>, StoreError>;

    fn deactivate_rule(&self, rule_id: u64) -> Result<(), StoreError>;

    /// Dedup check: the assignment for `(template, assignee, due_date)`, if any.
    fn find_assignment(
        &self,
        template_id: u64,
        assignee_id: MemberId,
        due_date: NaiveDate,
    ) -> Result<Option<Assignment>, StoreError>;

    /// Persists an instance and its assignment as one unit. Neither is
    /// written if the other cannot be.
    fn create_instance_and_assignment(
        &self,
        instance: NewChoreInstance,
        assignment: NewAssignment,
    ) -> Result<Assignment, StoreError>;

    /// Moves a rule's watermark forward. Never moves it backwards.
    fn advance_watermark(&self, rule_id: u64, date: NaiveDate) -> Result<(), StoreError>;

    fn create_rule(&self, rule: NewRecurrenceRule) -> Result<RecurrenceRule, StoreError>;
}

macro_rules! forward_store {
    ($($ty:ty),*) => {$(
        impl<S: Store + ?Sized> Store for $ty {
            fn list_active_rules(&self, before: NaiveDate) -> Result<Vec<RecurrenceRule>, StoreError> {
                (**self).list_active_rules(before)
            }

            fn find_rule(&self, rule_id: u64) -> Result<Option<RecurrenceRule>, StoreError> {
                (**self).find_rule(rule_id)
            }

            fn find_template(&self, template_id: u64) -> Result<Option<Chore>, StoreError> {
                (**self).find_template(template_id)
            }

            fn deactivate_rule(&self, rule_id: u64) -> Result<(), StoreError> {
                (**self).deactivate_rule(rule_id)
            }

            fn find_assignment(
                &self,
                template_id: u64,
                assignee_id: MemberId,
                due_date: NaiveDate,
            ) -> Result<Option<Assignment>, StoreError> {
                (**self).find_assignment(template_id, assignee_id, due_date)
            }

            fn create_instance_and_assignment(
                &self,
                instance: NewChoreInstance,
                assignment: NewAssignment,
            ) -> Result<Assignment, StoreError> {
                (**self).create_instance_and_assignment(instance, assignment)
            }

            fn advance_watermark(&self, rule_id: u64, date: NaiveDate) -> Result<(), StoreError> {
                (**self).advance_watermark(rule_id, date)
            }

            fn create_rule(&self, rule: NewRecurrenceRule) -> Result<RecurrenceRule, StoreError> {
                (**self).create_rule(rule)
            }
        }
    )*};
}

forward_store!(&S, Arc<S>);

/// Full persisted state.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Database {
    #[serde(default)]
    pub chores: Vec<Chore>,
    #[serde(default)]
    pub rules: Vec<RecurrenceRule>,
    #[serde(default)]
    pub instances: Vec<ChoreInstance>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl Database {
    pub fn add_chore(&mut self, chore: NewChore) -> Chore {
        let chore = Chore {
            id: next_id(self.chores.iter().map(|c| c.id)),
            tenant_id: chore.tenant_id,
            title: chore.title,
            description: chore.description,
            points: chore.points,
            difficulty: chore.difficulty,
            duration_minutes: chore.duration_minutes,
            active: true,
        };
        self.chores.push(chore.clone());
        chore
    }

    /// Flips the soft-delete flag of a chore.
    pub fn set_chore_active(&mut self, chore_id: u64, active: bool) -> Result<(), StoreError> {
        let chore = self
            .chores
            .iter_mut()
            .find(|c| c.id == chore_id)
            .ok_or(StoreError::ChoreNotFound(chore_id))?;
        chore.active = active;
        Ok(())
    }

    pub fn add_rule(&mut self, rule: NewRecurrenceRule) -> Result<RecurrenceRule, StoreError> {
        validate_pattern(&rule.pattern)?;
        if !self.chores.iter().any(|c| c.id == rule.chore_id) {
            return Err(StoreError::ChoreNotFound(rule.chore_id));
        }
        let rule = RecurrenceRule {
            id: next_id(self.rules.iter().map(|r| r.id)),
            tenant_id: rule.tenant_id,
            chore_id: rule.chore_id,
            assignee_id: rule.assignee_id,
            assigner_id: rule.assigner_id,
            pattern: rule.pattern,
            priority: rule.priority,
            active: true,
            last_generated_date: rule.last_generated_date,
        };
        self.rules.push(rule.clone());
        Ok(rule)
    }

    pub fn active_rules_before(&self, before: NaiveDate) -> Vec<RecurrenceRule> {
        self.rules
            .iter()
            .filter(|r| {
                r.active
                    && (r.last_generated_date < before
                        || r.pattern.end_date.is_some_and(|end| end <= r.last_generated_date))
            })
            .cloned()
            .collect()
    }

    pub fn rule(&self, rule_id: u64) -> Option<&RecurrenceRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    pub fn chore(&self, chore_id: u64) -> Option<&Chore> {
        self.chores.iter().find(|c| c.id == chore_id)
    }

    pub fn deactivate_rule(&mut self, rule_id: u64) -> Result<(), StoreError> {
        self.rule_mut(rule_id)?.active = false;
        Ok(())
    }

    pub fn advance_watermark(&mut self, rule_id: u64, date: NaiveDate) -> Result<(), StoreError> {
        let rule = self.rule_mut(rule_id)?;
        if date > rule.last_generated_date {
            rule.last_generated_date = date;
        }
        Ok(())
    }

    pub fn find_assignment(
        &self,
        template_id: u64,
        assignee_id: MemberId,
        due_date: NaiveDate,
    ) -> Option<&Assignment> {
        self.assignments.iter().find(|a| {
            a.template_id == Some(template_id) && a.assignee_id == assignee_id && a.due_date == due_date
        })
    }

    /// Inserts the instance/assignment pair. Rejects a second assignment for
    /// an existing dedup key.
    pub fn insert_instance_and_assignment(
        &mut self,
        instance: NewChoreInstance,
        assignment: NewAssignment,
    ) -> Result<Assignment, StoreError> {
        if let Some(template_id) = assignment.template_id {
            if self
                .find_assignment(template_id, assignment.assignee_id, assignment.due_date)
                .is_some()
            {
                return Err(StoreError::DuplicateAssignment {
                    template_id,
                    assignee_id: assignment.assignee_id,
                    due_date: assignment.due_date,
                });
            }
        }

        let instance = ChoreInstance {
            id: next_id(self.instances.iter().map(|i| i.id)),
            tenant_id: instance.tenant_id,
            template_id: instance.template_id,
            title: instance.title,
            description: instance.description,
            points: instance.points,
            difficulty: instance.difficulty,
            duration_minutes: instance.duration_minutes,
        };
        let assignment = Assignment {
            id: next_id(self.assignments.iter().map(|a| a.id)),
            tenant_id: assignment.tenant_id,
            instance_id: instance.id,
            template_id: assignment.template_id,
            assignee_id: assignment.assignee_id,
            assigner_id: assignment.assigner_id,
            due_date: assignment.due_date,
            priority: assignment.priority,
            status: assignment.status,
            rule_id: assignment.rule_id,
            created_at: Local::now().to_rfc3339(),
        };
        self.instances.push(instance);
        self.assignments.push(assignment.clone());
        Ok(assignment)
    }

    pub fn instance(&self, instance_id: u64) -> Option<&ChoreInstance> {
        self.instances.iter().find(|i| i.id == instance_id)
    }

    /// Assignments sorted by due date, optionally restricted to a tenant and
    /// an inclusive date range.
    pub fn assignments_between(
        &self,
        tenant_id: Option<TenantId>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Vec<Assignment> {
        let mut out: Vec<Assignment> = self
            .assignments
            .iter()
            .filter(|a| tenant_id.map_or(true, |t| a.tenant_id == t))
            .filter(|a| from.map_or(true, |f| a.due_date >= f))
            .filter(|a| to.map_or(true, |t| a.due_date <= t))
            .cloned()
            .collect();
        out.sort_by_key(|a| (a.due_date, a.assignee_id, a.id));
        out
    }

    fn rule_mut(&mut self, rule_id: u64) -> Result<&mut RecurrenceRule, StoreError> {
        self.rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or(StoreError::RuleNotFound(rule_id))
    }
}

fn next_id(ids: impl Iterator<Item = u64>) -> u64 {
    ids.max().unwrap_or(0) + 1
}

/// A [`Store`] backed by a single JSON file.
///
/// Every mutation takes an exclusive lock on `<path>.lock`, reads the file,
/// applies the change and writes the whole database back through a temporary
/// file that is renamed into place, so an instance and its assignment always
/// land together. Reads take a shared lock.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Opens the store at the configured database path.
    pub fn open_default() -> Self {
        Self::new(crate::config::db_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file guarding the database. Every JSON store on the same path
    /// coordinates through it, across threads and processes.
    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn sibling(&self, suffix: impl AsRef<OsStr>) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }

    /// Takes an advisory lock on the lock file. Released when the returned
    /// handle is dropped.
    fn lock(&self, exclusive: bool) -> Result<File, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;
        if exclusive {
            FileExt::lock_exclusive(&lock_file)?;
        } else {
            FileExt::lock_shared(&lock_file)?;
        }
        Ok(lock_file)
    }

    /// Loads the whole database under a shared lock.
    ///
    /// Returns an empty database if the file does not exist yet.
    pub fn load(&self) -> Result<Database, StoreError> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let lock_file = self.lock(false)?;
        let db = self.read_file();
        drop(lock_file);
        db
    }

    /// Applies `f` to the loaded database and persists the result if `f`
    /// succeeds. The exclusive lock is held from the read to the rename, so
    /// concurrent updates never overwrite each other.
    pub fn update<R>(&self, f: impl FnOnce(&mut Database) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let lock_file = self.lock(true)?;
        let mut db = self.read_file()?;
        let out = f(&mut db)?;
        self.write_file(&db)?;
        drop(lock_file);
        Ok(out)
    }

    /// Deletes the database file.
    pub fn delete(&self) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        let lock_file = self.lock(true)?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        drop(lock_file);
        Ok(())
    }

    fn read_file(&self) -> Result<Database, StoreError> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let mut f = OpenOptions::new().read(true).open(&self.path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Database::default());
        }
        Ok(serde_json::from_str(&s)?)
    }

    fn write_file(&self, db: &Database) -> Result<(), StoreError> {
        let s = serde_json::to_string_pretty(db)?;
        let tmp = self.sibling(".tmp");
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(s.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn list_active_rules(&self, before: NaiveDate) -> Result<Vec<RecurrenceRule>, StoreError> {
        Ok(self.load()?.active_rules_before(before))
    }

    fn find_rule(&self, rule_id: u64) -> Result<Option<RecurrenceRule>, StoreError> {
        Ok(self.load()?.rule(rule_id).cloned())
    }

    fn find_template(&self, template_id: u64) -> Result<Option<Chore>, StoreError> {
        Ok(self.load()?.chore(template_id).cloned())
    }

    fn deactivate_rule(&self, rule_id: u64) -> Result<(), StoreError> {
        self.update(|db| db.deactivate_rule(rule_id))
    }

    fn find_assignment(
        &self,
        template_id: u64,
        assignee_id: MemberId,
        due_date: NaiveDate,
    ) -> Result<Option<Assignment>, StoreError> {
        Ok(self.load()?.find_assignment(template_id, assignee_id, due_date).cloned())
    }

    fn create_instance_and_assignment(
        &self,
        instance: NewChoreInstance,
        assignment: NewAssignment,
    ) -> Result<Assignment, StoreError> {
        self.update(|db| db.insert_instance_and_assignment(instance, assignment))
    }

    fn advance_watermark(&self, rule_id: u64, date: NaiveDate) -> Result<(), StoreError> {
        self.update(|db| db.advance_watermark(rule_id, date))
    }

    fn create_rule(&self, rule: NewRecurrenceRule) -> Result<RecurrenceRule, StoreError> {
        self.update(|db| db.add_rule(rule))
    }
}

/// An in-process [`Store`]. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    db: Mutex<Database>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_database(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> Result<Database, StoreError> {
        self.read(|db| db.clone())
    }

    pub fn read<R>(&self, f: impl FnOnce(&Database) -> R) -> Result<R, StoreError> {
        let db = self
            .db
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        Ok(f(&db))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Database) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let mut db = self
            .db
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))?;
        // Work on a copy so a failing closure leaves no partial write behind.
        let mut next = db.clone();
        let out = f(&mut next)?;
        *db = next;
        Ok(out)
    }
}

impl Store for MemoryStore {
    fn list_active_rules(&self, before: NaiveDate) -> Result<Vec<RecurrenceRule>, StoreError> {
        self.read(|db| db.active_rules_before(before))
    }

    fn find_rule(&self, rule_id: u64) -> Result<Option<RecurrenceRule>, StoreError> {
        self.read(|db| db.rule(rule_id).cloned())
    }

    fn find_template(&self, template_id: u64) -> Result<Option<Chore>, StoreError> {
        self.read(|db| db.chore(template_id).cloned())
    }

    fn deactivate_rule(&self, rule_id: u64) -> Result<(), StoreError> {
        self.update(|db| db.deactivate_rule(rule_id))
    }

    fn find_assignment(
        &self,
        template_id: u64,
        assignee_id: MemberId,
        due_date: NaiveDate,
    ) -> Result<Option<Assignment>, StoreError> {
        self.read(|db| db.find_assignment(template_id, assignee_id, due_date).cloned())
    }

    fn create_instance_and_assignment(
        &self,
        instance: NewChoreInstance,
        assignment: NewAssignment,
    ) -> Result<Assignment, StoreError> {
        self.update(|db| db.insert_instance_and_assignment(instance, assignment))
    }

    fn advance_watermark(&self, rule_id: u64, date: NaiveDate) -> Result<(), StoreError> {
        self.update(|db| db.advance_watermark(rule_id, date))
    }

    fn create_rule(&self, rule: NewRecurrenceRule) -> Result<RecurrenceRule, StoreError> {
        self.update(|db| db.add_rule(rule))
    }
}
