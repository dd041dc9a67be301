use crate::domain::day::{DEFAULT_DAY_BOUNDARY, default_boundary};
use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub timezone: Option<Tz>,
    pub day_boundary: NaiveTime,
    pub backfill_missed_days: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            day_boundary: default_boundary(),
            backfill_missed_days: false,
        }
    }
}

fn default_files() -> [(&'static str, serde_json::Value); 1] {
    [(
        APP_JSON,
        serde_json::json!({
            "schema": 1,
            "appName": "StudyPlanner",
            "timezone": null,
            "dayBoundary": DEFAULT_DAY_BOUNDARY,
            "backfillMissedDays": false
        }),
    )]
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let app = read_config(&path)?;

    let timezone = match app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(name) => Some(name.parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timezone '{name}' in {}: {error}", path.display()))
        })?),
        None => None,
    };

    let day_boundary = match app.get("dayBoundary").and_then(serde_json::Value::as_str) {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
            InfraError::InvalidConfig(format!("dayBoundary must be HH:MM in {}", path.display()))
        })?,
        None => default_boundary(),
    };

    let backfill_missed_days = app
        .get("backfillMissedDays")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    Ok(AppConfig {
        timezone,
        day_boundary,
        backfill_missed_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "study-planner-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp dir");
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_once_and_loaded() {
        let dir = TempDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config, AppConfig::default());

        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema":1,"timezone":"Asia/Seoul","dayBoundary":"04:30","backfillMissedDays":true}"#,
        )
        .expect("overwrite config");
        ensure_default_configs(&dir.path).expect("keeps existing file");

        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config.timezone, Some(chrono_tz::Asia::Seoul));
        assert_eq!(config.day_boundary, NaiveTime::from_hms_opt(4, 30, 0).expect("valid time"));
        assert!(config.backfill_missed_days);
    }

    #[test]
    fn rejects_unknown_timezone_and_schema() {
        let dir = TempDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema":1,"timezone":"Mars/Olympus"}"#)
            .expect("write config");
        assert!(matches!(
            load_app_config(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));

        fs::write(dir.path.join(APP_JSON), r#"{"schema":2}"#).expect("write config");
        assert!(matches!(
            load_app_config(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_malformed_day_boundary() {
        let dir = TempDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema":1,"dayBoundary":"3am"}"#)
            .expect("write config");
        assert!(load_app_config(&dir.path).is_err());
    }
}
