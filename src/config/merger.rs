//! Layered configuration merging.
//!
//! Global, project and local config files are merged in that order:
//!
//! - mappings merge key by key, recursively
//! - sequences are replaced wholesale, so a local `upgrade_path` fully
//!   overrides the project one
//! - a `null` value removes the key it names
//! - a file that is empty (parses to `null`) changes nothing

use serde_yaml::{Mapping, Value};

/// Merge `overlay` onto `base`, returning the combined value.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (_, Value::Null) => base.clone(),
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                if value.is_null() {
                    merged.remove(key);
                    continue;
                }
                let combined = match base_map.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), combined);
            }
            Value::Mapping(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Fold a list of config layers, lowest priority first.
pub fn merge_configs(configs: &[Value]) -> Value {
    configs
        .iter()
        .fold(Value::Mapping(Mapping::new()), |acc, layer| {
            deep_merge(&acc, layer)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn local_settings_override_project_settings() {
        let project = yaml(
            r#"
settings:
  snapshot: true
  strict: false
handlers:
  build:
    command: "ng build"
    attempts: 2
"#,
        );
        let local = yaml(
            r#"
settings:
  strict: true
handlers:
  build:
    attempts: 5
"#,
        );

        let merged = deep_merge(&project, &local);

        assert_eq!(merged["settings"]["strict"], true);
        assert_eq!(merged["settings"]["snapshot"], true);
        assert_eq!(merged["handlers"]["build"]["command"], "ng build");
        assert_eq!(merged["handlers"]["build"]["attempts"], 5);
    }

    #[test]
    fn upgrade_path_is_replaced_not_appended() {
        let project = yaml("upgrade_path:\n  - version: '16.0.0'\n  - version: '17.0.0'\n");
        let local = yaml("upgrade_path:\n  - version: '18.0.0'\n");

        let merged = deep_merge(&project, &local);
        let hops = merged["upgrade_path"].as_sequence().unwrap();

        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0]["version"], "18.0.0");
    }

    #[test]
    fn null_removes_inherited_handler() {
        let global = yaml("handlers:\n  test:\n    command: jest\n  build:\n    command: tsc\n");
        let project = yaml("handlers:\n  test: null\n");

        let merged = deep_merge(&global, &project);

        assert!(merged["handlers"].get("test").is_none());
        assert_eq!(merged["handlers"]["build"]["command"], "tsc");
    }

    #[test]
    fn empty_file_changes_nothing() {
        let project = yaml("project:\n  target_version: '17.0.0'\n");
        let empty = yaml("");

        let merged = deep_merge(&project, &empty);
        assert_eq!(merged["project"]["target_version"], "17.0.0");
    }

    #[test]
    fn scalar_overlay_replaces_mapping() {
        let merged = deep_merge(&yaml("resolver:\n  provider: npm\n"), &yaml("resolver: disabled\n"));
        assert_eq!(merged["resolver"], "disabled");
    }

    #[test]
    fn layers_apply_in_order() {
        let layers = vec![
            yaml("project:\n  current_version: '14.0.0'\n  target_version: '16.0.0'\n"),
            yaml("project:\n  current_version: '15.0.0'\n"),
            yaml("project:\n  target_version: '17.0.0'\n"),
        ];

        let merged = merge_configs(&layers);

        assert_eq!(merged["project"]["current_version"], "15.0.0");
        assert_eq!(merged["project"]["target_version"], "17.0.0");
    }

    #[test]
    fn no_layers_is_an_empty_mapping() {
        assert!(merge_configs(&[]).as_mapping().unwrap().is_empty());
    }
}
