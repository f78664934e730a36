//! Integration tests for repositories over `SqliteSession`.

use std::io::Write as _;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strata_core::{
  Error as CoreError, Identity, ReadOnlyRepository, Registry, Repository, WriteRepository,
  entity, store::Storage as _, value_object,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::{SqliteConfig, SqliteSession};

fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

fn session() -> SqliteSession {
  init_tracing();
  SqliteSession::open_in_memory().expect("in-memory session")
}

fn at(h: u32, m: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 5, 17, h, m, 0).unwrap() }

/// `(name, notnull)` for every column of `table`.
fn columns(session: &SqliteSession, table: &str) -> Vec<(String, bool)> {
  let mut stmt = session
    .connection()
    .prepare(&format!("PRAGMA table_info({table})"))
    .unwrap();
  stmt
    .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, bool>(3)?)))
    .unwrap()
    .collect::<rusqlite::Result<_>>()
    .unwrap()
}

fn count(session: &SqliteSession, table: &str) -> i64 {
  session
    .connection()
    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
    .unwrap()
}

// ─── Domain ──────────────────────────────────────────────────────────────────

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct SimpleFlat {
    guid:    Identity<Uuid>,
    name:    Option<String>,
    score:   i64,
    ratio:   f64,
    created: DateTime<Utc>,
  }
}

value_object! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Skill {
    skill_name: String,
    damage:     i64,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Dragon {
    name:  Identity<String>,
    skill: Skill,
    age:   i64,
  }
}

value_object! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Balance {
    amount:   Option<f64>,
    currency: Option<String>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Account {
    id:     Identity<i64>,
    owner:  String,
    wallet: Option<Balance>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Plan {
    id:       Identity<i64>,
    discount: f64,
  }
}

value_object! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Subscription {
    plan_id:  i64,
    start_at: DateTime<Utc>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Subscriber {
    id:      Identity<Uuid>,
    plan:    Plan,
    current: Option<Subscription>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Reseller {
    id:   Identity<i64>,
    plan: Option<Plan>,
  }
}

value_object! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Deadline {
    at:      DateTime<Utc>,
    penalty: i64,
  }
}

value_object! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Goal {
    assignee: String,
    deadline: Option<Deadline>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Board {
    id:   Identity<i64>,
    goal: Option<Goal>,
  }
}

value_object! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Tag {
    label: String,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Article {
    id:   Identity<i64>,
    tags: Vec<Tag>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Bundle {
    id:    Identity<i64>,
    plans: Vec<Plan>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Country {
    code: Identity<String>,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct City {
    id:      Identity<i64>,
    country: Country,
  }
}

entity! {
  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Warehouse {
    id:   Identity<i64>,
    city: Option<City>,
  }
}

// ─── Round trips ─────────────────────────────────────────────────────────────

#[test]
fn scalar_only_aggregate_round_trips() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<SimpleFlat, _>::new(&registry, &mut s).unwrap();

  let flat = SimpleFlat {
    guid:    Identity::new(Uuid::new_v4()),
    name:    None,
    score:   -3,
    ratio:   0.125,
    created: at(9, 15),
  };
  repo.save(&flat).unwrap();

  assert_eq!(repo.get(*flat.guid).unwrap(), flat);
}

#[test]
fn required_value_object_round_trips() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<Dragon, _>::new(&registry, &mut s).unwrap();

  let smaug = Dragon {
    name:  Identity::new("smaug".into()),
    skill: Skill { skill_name: "fire breath".into(), damage: 90 },
    age:   171,
  };
  repo.save(&smaug).unwrap();

  assert_eq!(repo.get("smaug").unwrap(), smaug);
}

#[test]
fn absent_optional_value_object_round_trips() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<Account, _>::new(&registry, &mut s).unwrap();

  let account = Account { id: Identity(1), owner: "ada".into(), wallet: None };
  repo.save(&account).unwrap();

  assert_eq!(repo.get(1_i64).unwrap(), account);
}

#[test]
fn partially_null_optional_value_object_round_trips() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<Account, _>::new(&registry, &mut s).unwrap();

  let account = Account {
    id:     Identity(2),
    owner:  "grace".into(),
    wallet: Some(Balance { amount: Some(12.5), currency: None }),
  };
  repo.save(&account).unwrap();

  assert_eq!(repo.get(2_i64).unwrap(), account);
}

#[test]
fn all_null_optional_value_object_comes_back_absent() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<Account, _>::new(&registry, &mut s).unwrap();

  let account = Account {
    id:     Identity(3),
    owner:  "edsger".into(),
    wallet: Some(Balance { amount: None, currency: None }),
  };
  repo.save(&account).unwrap();

  // Storage cannot tell this wallet apart from a missing one.
  let loaded = repo.get(3_i64).unwrap();
  assert_eq!(loaded.wallet, None);
  assert_eq!(loaded, Account { wallet: None, ..account });
}

#[test]
fn nested_entity_round_trips() {
  let registry = Registry::new();
  let mut s = session();
  let subscriber = Subscriber {
    id:      Identity::new(Uuid::new_v4()),
    plan:    Plan { id: Identity(10), discount: 0.2 },
    current: Some(Subscription { plan_id: 10, start_at: at(8, 0) }),
  };
  {
    let mut repo = Repository::<Subscriber, _>::new(&registry, &mut s).unwrap();
    repo.save(&subscriber).unwrap();
    assert_eq!(repo.get(*subscriber.id).unwrap(), subscriber);
  }

  assert_eq!(count(&s, "plans"), 1);
  assert_eq!(count(&s, "subscribers"), 1);
}

#[test]
fn optional_nested_entity_round_trips_both_ways() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<Reseller, _>::new(&registry, &mut s).unwrap();

  let with_plan = Reseller { id: Identity(1), plan: Some(Plan { id: Identity(5), discount: 0.3 }) };
  let without = Reseller { id: Identity(2), plan: None };
  repo.save(&with_plan).unwrap();
  repo.save(&without).unwrap();

  assert_eq!(repo.get(1_i64).unwrap(), with_plan);
  assert_eq!(repo.get(2_i64).unwrap(), without);
  assert_eq!(repo.all().unwrap().len(), 2);
}

#[test]
fn absent_optional_entity_with_required_child_round_trips() {
  let registry = Registry::new();
  let mut s = session();
  let empty = Warehouse { id: Identity(1), city: None };
  let stocked = Warehouse {
    id:   Identity(2),
    city: Some(City { id: Identity(30), country: Country { code: Identity("pt".into()) } }),
  };
  {
    let mut repo = Repository::<Warehouse, _>::new(&registry, &mut s).unwrap();
    repo.save(&empty).unwrap();
    repo.save(&stocked).unwrap();

    assert_eq!(repo.get(1_i64).unwrap(), empty);
    assert_eq!(repo.get(2_i64).unwrap(), stocked);
  }

  assert_eq!(count(&s, "cities"), 1);
  assert_eq!(count(&s, "countries"), 1);
}

#[test]
fn nested_value_objects_compose_prefixes() {
  let registry = Registry::new();
  let mut s = session();
  let board = Board {
    id:   Identity(1),
    goal: Some(Goal {
      assignee: "linus".into(),
      deadline: Some(Deadline { at: at(17, 0), penalty: 5 }),
    }),
  };
  {
    let mut repo = Repository::<Board, _>::new(&registry, &mut s).unwrap();
    repo.save(&board).unwrap();
    assert_eq!(repo.get(1_i64).unwrap(), board);
  }

  let names: Vec<String> = columns(&s, "boards").into_iter().map(|(n, _)| n).collect();
  assert_eq!(names, ["id", "goal_assignee", "goal_deadline_at", "goal_deadline_penalty"]);
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[test]
fn nullable_value_object_columns_are_nullable() {
  let registry = Registry::new();
  let mut s = session();
  Repository::<Account, _>::new(&registry, &mut s).unwrap();

  assert_eq!(columns(&s, "accounts"), [
    ("id".to_owned(), true),
    ("owner".to_owned(), true),
    ("wallet_amount".to_owned(), false),
    ("wallet_currency".to_owned(), false),
  ]);
}

#[test]
fn required_nested_entity_key_is_not_null() {
  let registry = Registry::new();
  let mut s = session();
  Repository::<Subscriber, _>::new(&registry, &mut s).unwrap();

  let subscribers = columns(&s, "subscribers");
  assert!(subscribers.contains(&("plan_id".to_owned(), true)));
  assert!(subscribers.contains(&("current_plan_id".to_owned(), false)));
  assert!(subscribers.contains(&("current_start_at".to_owned(), false)));
}

#[test]
fn list_nodes_are_rejected() {
  let registry = Registry::new();
  let mut s = session();

  let err = Repository::<Article, _>::new(&registry, &mut s).err().unwrap();
  assert!(matches!(err, CoreError::Unsupported { kind: "list of value objects", .. }));
  assert!(!registry.is_registered::<Article>());

  let err = Repository::<Bundle, _>::new(&registry, &mut s).err().unwrap();
  assert!(matches!(err, CoreError::Unsupported { kind: "list of entities", .. }));
  assert!(!registry.is_registered::<Bundle>());
}

// ─── Repository behaviour ────────────────────────────────────────────────────

#[test]
fn get_missing_identity_is_not_found() {
  let registry = Registry::new();
  let mut s = session();
  let mut repo = Repository::<Dragon, _>::new(&registry, &mut s).unwrap();

  let err = repo.get("glaurung").unwrap_err();
  assert!(err.is_not_found(), "unexpected error: {err}");
}

#[test]
fn saving_twice_updates_in_place() {
  let registry = Registry::new();
  let mut s = session();
  {
    let mut repo = Repository::<Reseller, _>::new(&registry, &mut s).unwrap();
    let mut reseller = Reseller {
      id:   Identity(1),
      plan: Some(Plan { id: Identity(5), discount: 0.3 }),
    };
    repo.save(&reseller).unwrap();
    repo.save(&reseller).unwrap();

    reseller.plan = None;
    repo.save(&reseller).unwrap();
    assert_eq!(repo.get(1_i64).unwrap().plan, None);
  }

  assert_eq!(count(&s, "resellers"), 1);
  assert_eq!(count(&s, "plans"), 1);
}

#[test]
fn rollback_discards_flushed_writes() {
  let registry = Registry::new();
  let mut s = session();
  let account = Account { id: Identity(9), owner: "barbara".into(), wallet: None };

  Repository::<Account, _>::new(&registry, &mut s).unwrap().save(&account).unwrap();
  s.rollback().unwrap();

  let mut repo = Repository::<Account, _>::new(&registry, &mut s).unwrap();
  assert!(repo.get(9_i64).unwrap_err().is_not_found());
}

#[test]
fn failed_flush_keeps_unwritten_merges() {
  let registry = Registry::new();
  let mut s = session();
  Repository::<Dragon, _>::new(&registry, &mut s).unwrap();

  let tree = strata_core::aet::build::<Dragon>().unwrap();
  for (name, age) in [("smaug", 171), ("glaurung", 300)] {
    let dragon = Dragon {
      name: Identity(name.into()),
      skill: Skill { skill_name: "fire".into(), damage: 9 },
      age,
    };
    s.merge(strata_core::dump::dump(&tree, &dragon).unwrap()).unwrap();
  }

  s.connection().execute_batch("ALTER TABLE dragons RENAME TO hoard").unwrap();
  assert!(s.flush().is_err());

  s.connection().execute_batch("ALTER TABLE hoard RENAME TO dragons").unwrap();
  s.flush().unwrap();
  assert_eq!(count(&s, "dragons"), 2);
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[test]
fn missing_config_file_falls_back_to_defaults() {
  let dir = tempfile::tempdir().unwrap();
  let cfg = SqliteConfig::load(dir.path().join("absent.toml")).unwrap();
  assert_eq!(cfg, SqliteConfig::default());
}

#[test]
fn committed_writes_survive_reopening() {
  init_tracing();
  let dir = tempfile::tempdir().unwrap();
  let db = dir.path().join("strata.db");

  let mut file = tempfile::Builder::new().suffix(".toml").tempfile_in(dir.path()).unwrap();
  writeln!(file, "path = {:?}\nbusy_timeout_ms = 250", db.display().to_string()).unwrap();

  let cfg = SqliteConfig::load(file.path()).unwrap();
  assert_eq!(cfg.path.as_deref(), Some(db.as_path()));
  assert_eq!(cfg.busy_timeout_ms, 250);
  assert!(cfg.foreign_keys);

  let smaug = Dragon {
    name:  Identity::new("smaug".into()),
    skill: Skill { skill_name: "fire breath".into(), damage: 90 },
    age:   171,
  };

  let registry = Registry::new();
  {
    let mut s = SqliteSession::open(&cfg).unwrap();
    Repository::<Dragon, _>::new(&registry, &mut s).unwrap().save(&smaug).unwrap();
    s.commit().unwrap();
  }

  let mut s = SqliteSession::open(&cfg).unwrap();
  let mut repo = Repository::<Dragon, _>::new(&registry, &mut s).unwrap();
  assert_eq!(repo.get("smaug").unwrap(), smaug);
}
