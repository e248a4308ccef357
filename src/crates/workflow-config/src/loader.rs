//! YAML configuration loading with `$include` composition and
//! `${ENV:default}` expansion, adapted from `orchestrator::config::loader`.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::Path;

use crate::error::{ConfigError, Result};

/// Loads a YAML file, resolving `$include: path/to/file.yaml` directives
/// (replacing the including mapping entirely, the way `orchestrator` does
/// it) and expanding `${ENV_VAR:default}` references in every string value.
pub fn load_yaml_file<P: AsRef<Path>>(path: P) -> Result<YamlValue> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut value: YamlValue = serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml {
        path: path.display().to_string(),
        source: e,
    })?;

    let base_dir = path
        .parent()
        .ok_or_else(|| ConfigError::Include(format!("{} has no parent directory", path.display())))?;

    process_includes(&mut value, base_dir)?;
    expand_variables(&mut value);

    Ok(value)
}

/// Loads and deserializes a YAML file into `T` via an intermediate JSON
/// conversion (serde_yaml's own deserializer does not go through our
/// include/env-expansion pass).
pub fn load_yaml_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let yaml = load_yaml_file(path)?;
    let json = yaml_to_json(&yaml)?;
    Ok(serde_json::from_value(json)?)
}

fn process_includes(value: &mut YamlValue, base_dir: &Path) -> Result<()> {
    match value {
        YamlValue::Mapping(map) => {
            if let Some(YamlValue::String(include_path)) =
                map.get(&YamlValue::String("$include".to_string()))
            {
                let included = load_yaml_file(base_dir.join(include_path))?;
                *value = included;
                return Ok(());
            }
            for (_, v) in map.iter_mut() {
                process_includes(v, base_dir)?;
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                process_includes(item, base_dir)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn expand_variables(value: &mut YamlValue) {
    match value {
        YamlValue::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        YamlValue::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_variables(v);
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// Expands every `${ENV_VAR}` or `${ENV_VAR:default}` occurrence in `s`.
/// Returns `None` (leaving the caller's value untouched) when there is
/// nothing to expand.
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let re = regex::Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok()?;
    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        let full_match = cap.get(0)?.as_str();
        let var_name = cap.get(1)?.as_str();
        let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let value = env::var(var_name).unwrap_or_else(|_| default_value.to_string());
        result = result.replace(full_match, &value);
    }
    Some(result)
}

fn yaml_to_json(yaml: &YamlValue) -> Result<JsonValue> {
    match yaml {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(JsonValue::Number)
                    .ok_or_else(|| ConfigError::Include(format!("invalid number: {f}")))
            } else {
                Err(ConfigError::Include("invalid number".to_string()))
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s.clone())),
        YamlValue::Sequence(seq) => {
            let items: Result<Vec<JsonValue>> = seq.iter().map(yaml_to_json).collect();
            Ok(JsonValue::Array(items?))
        }
        YamlValue::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    YamlValue::String(s) => s.clone(),
                    other => return Err(ConfigError::Include(format!("non-string map key: {other:?}"))),
                };
                out.insert(key, yaml_to_json(v)?);
            }
            Ok(JsonValue::Object(out))
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn expands_env_var_with_default() {
        assert_eq!(
            expand_env_in_string("value: ${MISSING_TOTALLY:fallback}"),
            Some("value: fallback".to_string())
        );
    }

    #[test]
    fn expands_present_env_var_over_default() {
        std::env::set_var("WF_CONFIG_TEST_VAR", "present");
        assert_eq!(
            expand_env_in_string("${WF_CONFIG_TEST_VAR:fallback}"),
            Some("present".to_string())
        );
        std::env::remove_var("WF_CONFIG_TEST_VAR");
    }

    #[test]
    fn leaves_strings_without_placeholders_untouched() {
        assert_eq!(expand_env_in_string("plain value"), None);
    }

    #[test]
    fn resolves_include_directive() {
        let dir = tempfile::tempdir().unwrap();
        let included_path = dir.path().join("shared.yaml");
        let mut included = std::fs::File::create(&included_path).unwrap();
        writeln!(included, "backend: redis\nurl: redis://localhost:6379").unwrap();

        let main_path = dir.path().join("main.yaml");
        let mut main = std::fs::File::create(&main_path).unwrap();
        writeln!(main, "state_store:\n  $include: shared.yaml").unwrap();

        let value = load_yaml_file(&main_path).unwrap();
        let state_store = value.get("state_store").unwrap();
        assert_eq!(state_store.get("backend").unwrap().as_str(), Some("redis"));
    }
}
