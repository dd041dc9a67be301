use crate::domain::models::StoredPlannerState;
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const PLANNER_STATE_KEY: &str = "study_planner_state";

/// Whole-record persistence. `load` hands back raw JSON so the caller can
/// default-fill field by field.
pub trait PlannerRepository: Send + Sync {
    fn load(&self) -> Result<Option<serde_json::Value>, InfraError>;
    fn save(&self, record: &StoredPlannerState) -> Result<(), InfraError>;
    fn clear(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqlitePlannerRepository {
    db_path: PathBuf,
}

impl SqlitePlannerRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl PlannerRepository for SqlitePlannerRepository {
    fn load(&self) -> Result<Option<serde_json::Value>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![PLANNER_STATE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|raw| parse_record(&raw)))
    }

    fn save(&self, record: &StoredPlannerState) -> Result<(), InfraError> {
        let payload = serde_json::to_string(record)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![PLANNER_STATE_KEY, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM kv_store WHERE key = ?1", params![PLANNER_STATE_KEY])?;
        Ok(())
    }
}

/// Process-local store for exercising services without a database file.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemoryPlannerRepository {
    record: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl InMemoryPlannerRepository {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            record: std::sync::Mutex::new(Some(raw.into())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, InfraError> {
        self.record
            .lock()
            .map_err(|error| InfraError::LockPoisoned(format!("planner record lock poisoned: {error}")))
    }
}

#[cfg(test)]
impl PlannerRepository for InMemoryPlannerRepository {
    fn load(&self) -> Result<Option<serde_json::Value>, InfraError> {
        let record = self.lock()?;
        Ok(record.as_deref().and_then(parse_record))
    }

    fn save(&self, record: &StoredPlannerState) -> Result<(), InfraError> {
        let payload = serde_json::to_string(record)?;
        *self.lock()? = Some(payload);
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        *self.lock()? = None;
        Ok(())
    }
}

fn parse_record(raw: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%error, "persisted planner record is not valid JSON; starting fresh");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PlannerState;
    use crate::infrastructure::storage::initialize_database;
    use chrono::NaiveDate;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DB: AtomicUsize = AtomicUsize::new(0);

    struct TempDb {
        dir: PathBuf,
        path: PathBuf,
    }

    impl TempDb {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DB.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "study-planner-repo-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp dir");
            let path = dir.join("planner.sqlite");
            initialize_database(&path).expect("initialize database");
            Self { dir, path }
        }
    }

    impl Drop for TempDb {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    fn sample_record() -> StoredPlannerState {
        let mut state = PlannerState::new(NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date"));
        state.coins = 125;
        state.streak = 2;
        StoredPlannerState::from(&state)
    }

    #[test]
    fn sqlite_repository_saves_and_overwrites_single_record() {
        let db = TempDb::new();
        let repository = SqlitePlannerRepository::new(&db.path);
        assert!(repository.load().expect("load empty").is_none());

        let mut record = sample_record();
        repository.save(&record).expect("save");
        record.coins = 200;
        repository.save(&record).expect("overwrite");

        let loaded = repository.load().expect("load").expect("record present");
        assert_eq!(loaded["coins"], 200);
        assert_eq!(loaded["lastDate"], "2026-02-16");

        repository.clear().expect("clear");
        assert!(repository.load().expect("load cleared").is_none());
    }

    #[test]
    fn corrupt_blob_loads_as_missing() {
        let repository = InMemoryPlannerRepository::with_raw("{not json");
        assert!(repository.load().expect("load").is_none());
    }

    #[test]
    fn in_memory_repository_roundtrips_record() {
        let repository = InMemoryPlannerRepository::default();
        let record = sample_record();
        repository.save(&record).expect("save");
        let loaded: StoredPlannerState =
            serde_json::from_value(repository.load().expect("load").expect("present"))
                .expect("decode record");
        assert_eq!(loaded, record);
    }
}
