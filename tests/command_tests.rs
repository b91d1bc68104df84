use chorust::commands::*;
use chorust::config::Config;
use chorust::models::{Difficulty, NewRecurrenceRule, Priority, RecurrencePattern};
use chorust::scheduler::{local_today, RuleOutcome, Scheduler, SkipReason};
use chorust::storage::{JsonStore, Store};
use chrono::{Duration, NaiveDate};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Barrier, Mutex};
use std::thread;

// Use a mutex to ensure tests run serially since they modify the environment variable
static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn with_test_db<F>(test_name: &str, f: F)
where
    F: FnOnce(JsonStore),
{
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut db_path = env::temp_dir();
    db_path.push(format!("chorust_test_{}.json", test_name));
    env::set_var("CHORUST_DB", db_path.to_str().unwrap());

    // Clean up before test
    if db_path.exists() {
        fs::remove_file(&db_path).unwrap();
    }

    // Run test
    f(JsonStore::open_default());

    // Clean up after test
    if db_path.exists() {
        fs::remove_file(&db_path).unwrap();
    }
    let mut lock_path = db_path.into_os_string();
    lock_path.push(".lock");
    let _ = fs::remove_file(lock_path);
    env::remove_var("CHORUST_DB");
}

fn add_chore(store: &JsonStore, title: &str) -> u64 {
    let chore = new_chore(7, title.into(), None, 5, Difficulty::Easy, Some(10)).unwrap();
    cmd_chore_add(store, chore, true).unwrap().id
}

fn daily_rule(chore_id: u64) -> RuleArgs {
    RuleArgs {
        tenant_id: 7,
        chore_id,
        assignee_id: 2,
        assigner_id: 1,
        every: "daily".into(),
        ..RuleArgs::default()
    }
}

#[test]
fn test_store_follows_env_path() {
    with_test_db("env_path", |store| {
        let expected = PathBuf::from(env::var("CHORUST_DB").unwrap());
        assert_eq!(store.path(), expected.as_path());
        add_chore(&store, "Water plants");
        assert!(expected.exists());
    });
}

#[test]
fn test_chore_add_and_deactivate() {
    with_test_db("chore_add", |store| {
        let id = add_chore(&store, "Take out trash");
        let chores = store.load().unwrap().chores;
        assert_eq!(chores.len(), 1);
        assert_eq!(chores[0].title, "Take out trash");
        assert_eq!(chores[0].tenant_id, 7);
        assert!(chores[0].active);

        cmd_chore_set_active(&store, id, false, true).unwrap();
        assert!(!store.load().unwrap().chores[0].active);

        assert!(cmd_chore_set_active(&store, 42, false, true).is_err());
        assert!(new_chore(7, "  ".into(), None, 1, Difficulty::Easy, None).is_err());
    });
}

#[test]
fn test_rule_add_materializes_first_window() {
    with_test_db("rule_add", |store| {
        let chore_id = add_chore(&store, "Feed the cat");
        let (rule, outcome) = cmd_rule_add(&store, 3, daily_rule(chore_id), true).unwrap();

        let today = local_today();
        match outcome {
            RuleOutcome::Generated(stats) => assert_eq!(stats.created.len(), 4),
            other => panic!("unexpected outcome {:?}", other),
        }

        let db = store.load().unwrap();
        assert_eq!(db.assignments.len(), 4);
        assert_eq!(db.instances.len(), 4);
        assert_eq!(db.assignments[0].due_date, today);
        assert_eq!(db.assignments[3].due_date, today + Duration::days(3));
        assert_eq!(db.rule(rule.id).unwrap().last_generated_date, today + Duration::days(3));
        assert_eq!(db.assignments[0].priority, Priority::Medium);
    });
}

#[test]
fn test_run_twice_creates_nothing_new() {
    with_test_db("run_twice", |store| {
        let chore_id = add_chore(&store, "Make bed");
        let mut args = daily_rule(chore_id);
        args.every = "weekly".into();
        args.days = vec!["sun,mon,tue,wed,thu,fri,sat".into()];
        cmd_rule_add(&store, 0, args, true).unwrap();
        assert_eq!(store.load().unwrap().assignments.len(), 1);

        let first = cmd_run(&store, 6, false, true).unwrap();
        assert_eq!(first.created, 6);
        let second = cmd_run(&store, 6, false, true).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(store.load().unwrap().assignments.len(), 7);
    });
}

#[test]
fn test_dry_run_writes_nothing() {
    with_test_db("dry_run", |store| {
        let chore_id = add_chore(&store, "Vacuum");
        cmd_rule_add(&store, 0, daily_rule(chore_id), true).unwrap();
        let before = store.load().unwrap();

        let report = cmd_run(&store, 5, true, true).unwrap();
        assert_eq!(report.created, 5);
        assert_eq!(store.load().unwrap(), before);
    });
}

#[test]
fn test_deactivated_rule_and_chore_stop_generation() {
    with_test_db("deactivate", |store| {
        let chore_id = add_chore(&store, "Walk the dog");
        let (rule, _) = cmd_rule_add(&store, 0, daily_rule(chore_id), true).unwrap();

        cmd_chore_set_active(&store, chore_id, false, true).unwrap();
        let report = cmd_run(&store, 5, false, true).unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(
            report.outcomes,
            vec![(rule.id, RuleOutcome::Skipped { reason: SkipReason::TemplateInactive })]
        );

        cmd_chore_set_active(&store, chore_id, true, true).unwrap();
        cmd_rule_deactivate(&store, rule.id, true).unwrap();
        let report = cmd_run(&store, 5, false, true).unwrap();
        assert_eq!(report.rules, 0);
        assert_eq!(store.load().unwrap().assignments.len(), 1);
        assert!(!store.find_rule(rule.id).unwrap().unwrap().active);
    });
}

#[test]
fn test_invalid_rule_arguments_are_rejected() {
    with_test_db("invalid_rule", |store| {
        let chore_id = add_chore(&store, "Dust shelves");

        let mut weekly = daily_rule(chore_id);
        weekly.every = "weekly".into();
        assert!(cmd_rule_add(&store, 14, weekly, true).is_err());

        let mut bad_date = daily_rule(chore_id);
        bad_date.start = Some("01/02/2025".into());
        assert!(cmd_rule_add(&store, 14, bad_date, true).is_err());

        let mut unknown = daily_rule(chore_id);
        unknown.every = "fortnightly".into();
        assert!(cmd_rule_add(&store, 14, unknown, true).is_err());

        assert!(cmd_rule_add(&store, 14, daily_rule(999), true).is_err());
        assert!(store.load().unwrap().rules.is_empty());
    });
}

#[test]
fn test_overlapping_runs_on_one_file_keep_every_occurrence() {
    with_test_db("overlap", |store| {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        for round in 0..10 {
            store.delete().unwrap();
            let chore_id = add_chore(&store, "Set the table");
            let rule_ids: Vec<u64> = (0..4)
                .map(|n| {
                    store
                        .create_rule(NewRecurrenceRule {
                            tenant_id: 7,
                            chore_id,
                            assignee_id: 10 + n,
                            assigner_id: 1,
                            pattern: RecurrencePattern::daily(),
                            priority: Priority::Medium,
                            last_generated_date: today.pred_opt().unwrap(),
                        })
                        .unwrap()
                        .id
                })
                .collect();

            // Two independent stores on the same path, as a daemon and a
            // manual run would have.
            let barrier = Barrier::new(2);
            thread::scope(|scope| {
                for _ in 0..2 {
                    scope.spawn(|| {
                        let scheduler = Scheduler::new(JsonStore::new(store.path())).with_window_days(6);
                        barrier.wait();
                        scheduler.run(today).unwrap();
                    });
                }
            });

            let db = store.load().unwrap();
            assert_eq!(db.assignments.len(), 28, "round {}", round);
            assert_eq!(db.instances.len(), 28, "round {}", round);
            for id in rule_ids {
                let rule = db.rule(id).unwrap();
                assert_eq!(rule.last_generated_date, today + Duration::days(6));
                let mut due: Vec<NaiveDate> = db
                    .assignments
                    .iter()
                    .filter(|a| a.rule_id == Some(id))
                    .map(|a| a.due_date)
                    .collect();
                due.sort();
                let expected: Vec<NaiveDate> = (0..7).map(|n| today + Duration::days(n)).collect();
                assert_eq!(due, expected, "round {}, rule {}", round, id);
            }
        }
    });
}

#[test]
fn test_corrupt_database_is_an_error() {
    with_test_db("corrupt", |store| {
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_err());
        assert!(cmd_run(&store, 14, false, true).is_err());
    });
}

#[test]
fn test_reset_force_deletes_database() {
    with_test_db("reset", |store| {
        add_chore(&store, "Fold laundry");
        assert!(store.path().exists());
        cmd_reset(&store, true).unwrap();
        assert!(!store.path().exists());
        assert!(store.load().unwrap().chores.is_empty());
    });
}

#[test]
fn test_config_from_env() {
    let _guard = TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    env::set_var("CHORUST_WINDOW_DAYS", "7");
    env::set_var("CHORUST_TICK_SECS", "60");
    let config = Config::from_env();
    assert_eq!(config.window_days, 7);
    assert_eq!(config.tick_interval.as_secs(), 60);

    env::set_var("CHORUST_WINDOW_DAYS", "soon");
    env::remove_var("CHORUST_TICK_SECS");
    let config = Config::from_env();
    assert_eq!(config.window_days, 14);
    assert_eq!(config.tick_interval.as_secs(), 24 * 60 * 60);
    env::remove_var("CHORUST_WINDOW_DAYS");
}
