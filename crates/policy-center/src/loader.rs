use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::apply_override_to_snapshot;
use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{PolicySnapshot, PolicySource};

const ENV_PREFIX: &str = "SEARCHADS_POLICY__";
const ENV_JSON: &str = "SEARCHADS_POLICY_OVERRIDE_JSON";
const ENV_CLI_OVERRIDES: &str = "SEARCHADS_POLICY_CLI_OVERRIDES";

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    pub include_cli_env: bool,
}

/// Defaults, then `path` (when it exists), then the environment.
pub fn load_snapshot(path: Option<&Path>) -> Result<PolicySnapshot, PolicyError> {
    let options = LoadOptions {
        paths: path.map(Path::to_path_buf).into_iter().collect(),
        include_env: true,
        include_cli_env: true,
    };
    load_snapshot_with_options(&options)
}

pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<PolicySnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    bootstrap_builtin_provenance(&mut snapshot)?;

    for path in &options.paths {
        if path.exists() {
            debug!(path = %path.display(), "loading policy file");
            apply_overlays(&mut snapshot, overlays_from_file(path)?)?;
        }
    }

    if options.include_env {
        apply_overlays(&mut snapshot, overlays_from_env()?)?;
    }

    if options.include_cli_env {
        apply_overlays(&mut snapshot, overlays_from_cli_env())?;
    }

    Ok(snapshot)
}

struct PolicyOverlay {
    path: String,
    value: Value,
    source: PolicySource,
}

fn apply_overlays(
    snapshot: &mut PolicySnapshot,
    overlays: Vec<PolicyOverlay>,
) -> Result<(), PolicyError> {
    for overlay in overlays {
        apply_override_to_snapshot(snapshot, &overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let content = fs::read_to_string(path)
        .map_err(|err| PolicyError::Io(format!("{}: {}", path.display(), err)))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, None, PolicySource::File))
}

fn overlays_from_env() -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        overlays.push(PolicyOverlay {
            path,
            value: parse_env_value(&raw),
            source: PolicySource::Env,
        });
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(format!("{ENV_JSON}: {err}")))?;
            overlays.extend(flatten_value(json_value, None, PolicySource::Env));
        }
    }

    Ok(overlays)
}

/// `path=value` pairs separated by commas. List values use `|` between items.
fn overlays_from_cli_env() -> Vec<PolicyOverlay> {
    let Ok(raw) = env::var(ENV_CLI_OVERRIDES) else {
        return Vec::new();
    };
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let (path, value_raw) = token.split_once('=').unwrap_or((token, ""));
            let path = path.trim();
            if path.is_empty() {
                return None;
            }
            Some(PolicyOverlay {
                path: path.to_string(),
                value: parse_env_value(value_raw.trim()),
                source: PolicySource::Cli,
            })
        })
        .collect()
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>, source: PolicySource) -> Vec<PolicyOverlay> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .flat_map(|(key, value)| {
                let segment = key.trim().to_ascii_lowercase();
                let next = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{segment}"),
                    _ => segment,
                };
                flatten_value(value, Some(next), source)
            })
            .collect(),
        other => match prefix {
            Some(path) => vec![PolicyOverlay {
                path,
                value: other,
                source,
            }],
            None => Vec::new(),
        },
    }
}

fn section_overlays<T: Serialize>(
    name: &str,
    section: &T,
) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let value = serde_json::to_value(section).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    Ok(flatten_value(value, Some(name.to_string()), PolicySource::Builtin))
}

fn bootstrap_builtin_provenance(snapshot: &mut PolicySnapshot) -> Result<(), PolicyError> {
    let mut overlays = Vec::new();
    overlays.extend(section_overlays("ads", &snapshot.ads)?);
    overlays.extend(section_overlays("features", &snapshot.features)?);
    overlays.extend(section_overlays("hosts", &snapshot.hosts)?);
    overlays.extend(section_overlays("ingest", &snapshot.ingest)?);
    overlays.extend(section_overlays("dispatch", &snapshot.dispatch)?);

    for overlay in overlays {
        snapshot.set_provenance(&overlay.path, overlay.source);
    }
    Ok(())
}
