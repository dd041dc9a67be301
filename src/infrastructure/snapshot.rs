use crate::domain::models::StoredPlannerState;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;

pub fn write_snapshot(path: &Path, record: &StoredPlannerState) -> Result<(), InfraError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let formatted = serde_json::to_string_pretty(record)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

/// Reads a snapshot file and checks it is structurally importable.
pub fn read_snapshot(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|error| {
        InfraError::InvalidSnapshot(format!("{} is not valid JSON: {error}", path.display()))
    })?;
    validate_snapshot(&value)?;
    Ok(value)
}

pub fn validate_snapshot(value: &serde_json::Value) -> Result<(), InfraError> {
    let Some(object) = value.as_object() else {
        return Err(InfraError::InvalidSnapshot(
            "snapshot must be a JSON object".to_string(),
        ));
    };
    if !object.get("tasks").is_some_and(serde_json::Value::is_array) {
        return Err(InfraError::InvalidSnapshot(
            "snapshot is missing a tasks array".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_tasks_array() {
        assert!(validate_snapshot(&serde_json::json!({ "tasks": [] })).is_ok());
        assert!(matches!(
            validate_snapshot(&serde_json::json!({ "coins": 10 })),
            Err(InfraError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            validate_snapshot(&serde_json::json!({ "tasks": {} })),
            Err(InfraError::InvalidSnapshot(_))
        ));
        assert!(matches!(
            validate_snapshot(&serde_json::json!("tasks")),
            Err(InfraError::InvalidSnapshot(_))
        ));
    }
}
