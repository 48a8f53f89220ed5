//! JSON snapshot of the persisted engagement keys.
//!
//! Only the known keys of each scope are exported or imported; anything else
//! in the stores belongs to someone else and is left alone.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::keys;
use crate::engagement::EngagementState;
use crate::persist::{Persistence, Scope};
use crate::time::now_iso8601;

pub const EXPORT_VERSION: &str = "1";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngagementExport {
    pub version: String,
    #[serde(default)]
    pub exported_at: String,
    /// Informational; recomputed from the milestones on import.
    #[serde(default)]
    pub explored_percentage: u8,
    #[serde(default)]
    pub session: BTreeMap<String, String>,
    #[serde(default)]
    pub persistent: BTreeMap<String, String>,
}

#[derive(Debug)]
pub enum ExportError {
    Json(serde_json::Error),
    UnsupportedVersion(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Json(e) => write!(f, "invalid export JSON: {e}"),
            ExportError::UnsupportedVersion(v) => write!(f, "unsupported export version: {v}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Json(e) => Some(e),
            ExportError::UnsupportedVersion(_) => None,
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Json(e)
    }
}

fn known(scope: Scope) -> &'static [&'static str] {
    match scope {
        Scope::Session => &keys::SESSION,
        Scope::Persistent => &keys::PERSISTENT,
    }
}

fn collect(store: &Persistence, scope: Scope) -> BTreeMap<String, String> {
    store
        .entries(scope)
        .into_iter()
        .filter(|(k, _)| known(scope).contains(&k.as_str()))
        .collect()
}

pub fn snapshot(store: &Persistence) -> EngagementExport {
    EngagementExport {
        version: EXPORT_VERSION.to_string(),
        exported_at: now_iso8601(),
        explored_percentage: EngagementState::rehydrate(store).exploration_percentage(),
        session: collect(store, Scope::Session),
        persistent: collect(store, Scope::Persistent),
    }
}

pub fn export_json(store: &Persistence) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&snapshot(store))
}

pub fn import_json(json: &str) -> Result<EngagementExport, ExportError> {
    let export: EngagementExport = serde_json::from_str(json)?;
    if export.version != EXPORT_VERSION {
        return Err(ExportError::UnsupportedVersion(export.version));
    }
    Ok(export)
}

/// Write the snapshot's known keys into `store`. Returns how many were written.
pub fn apply(export: &EngagementExport, store: &mut Persistence) -> usize {
    let mut written = 0;
    for (scope, entries) in [
        (Scope::Session, &export.session),
        (Scope::Persistent, &export.persistent),
    ] {
        for (key, value) in entries {
            if known(scope).contains(&key.as_str()) {
                store.write_raw(scope, key, value);
                written += 1;
            } else {
                tracing::warn!(scope = scope.as_str(), key = key.as_str(), "skipping unknown key");
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::Preferences;

    #[test]
    fn test_export_then_apply_into_fresh_store() {
        let mut src = Persistence::in_memory();
        src.write_flag(Scope::Session, keys::PORTFOLIO_SCROLL_COMPLETED, true);
        src.write_raw(Scope::Session, keys::VIEWED_CASE_STUDIES, r#"["ola","swiggy"]"#);
        src.write_flag(Scope::Persistent, keys::UNKNOWN_REALITY_DISCOVERED, true);
        src.write_raw(Scope::Session, "somebodyElse", "x");

        let json = export_json(&src).unwrap();
        let parsed = import_json(&json).unwrap();
        assert_eq!(parsed.explored_percentage, 55);
        assert!(!parsed.session.contains_key("somebodyElse"));

        let mut dst = Persistence::in_memory();
        assert_eq!(apply(&parsed, &mut dst), 3);
        assert_eq!(EngagementState::rehydrate(&dst), EngagementState::rehydrate(&src));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = import_json(r#"{"version":"99"}"#).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedVersion(v) if v == "99"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(import_json("nope"), Err(ExportError::Json(_))));
    }

    #[test]
    fn test_apply_skips_unknown_keys() {
        let export = EngagementExport {
            version: EXPORT_VERSION.into(),
            exported_at: String::new(),
            explored_percentage: 0,
            session: BTreeMap::from([("bogus".to_string(), "1".to_string())]),
            persistent: BTreeMap::new(),
        };
        let mut dst = Persistence::in_memory();
        assert_eq!(apply(&export, &mut dst), 0);
        assert!(dst.entries(Scope::Session).is_empty());
    }

    #[test]
    fn test_preferences_travel_with_the_snapshot() {
        let mut src = Persistence::in_memory();
        src.write_flag(Scope::Persistent, keys::IS_LITE_MODE, true);
        src.write_number(Scope::Persistent, keys::AUDIO_VOLUME, 0.3);
        src.write_flag(Scope::Session, keys::MOBILE_ALERT_SHOWN, true);

        let parsed = import_json(&export_json(&src).unwrap()).unwrap();
        assert_eq!(parsed.persistent["isLiteMode"], "true");
        assert_eq!(parsed.persistent["audioVolume"], "0.3");
        assert_eq!(parsed.session["mobileAlertShown"], "true");

        let mut dst = Persistence::in_memory();
        assert_eq!(apply(&parsed, &mut dst), 3);
        assert_eq!(Preferences::rehydrate(&dst), Preferences::rehydrate(&src));
    }
}
