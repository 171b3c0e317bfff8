//! Applies scenario-file overrides to an [`EngineConfig`] before a run starts.
//!
//! Keys address a field by dotted path (`"jump_delay_days"` for a top-level
//! field, `"mining_scarcity.buffer_days"` for a nested config section), the
//! same shape scenario files already use for seeds and content paths. We
//! round-trip through `serde_json::Value` rather than hand-writing a match arm
//! per field, since `EngineConfig` has dozens of nested tunables and the
//! round-trip catches unknown keys and type mismatches the same way a match
//! arm would.

use anyhow::{bail, Context, Result};
use nebula4x_core::EngineConfig;
use std::collections::HashMap;

pub fn apply_overrides(config: &mut EngineConfig, overrides: &HashMap<String, serde_json::Value>) -> Result<()> {
    if overrides.is_empty() {
        return Ok(());
    }

    let mut value = serde_json::to_value(&*config).context("serializing engine config")?;
    for (key, new_value) in overrides {
        set_by_path(&mut value, key, new_value.clone()).with_context(|| format!("applying override '{key}'"))?;
    }
    *config = serde_json::from_value(value).context("deserializing overridden engine config")?;
    Ok(())
}

fn set_by_path(root: &mut serde_json::Value, path: &str, new_value: serde_json::Value) -> Result<()> {
    let mut cursor = root;
    let mut parts = path.split('.').peekable();

    while let Some(part) = parts.next() {
        let obj = cursor
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("'{part}' in override key '{path}' does not name an object"))?;

        if parts.peek().is_none() {
            if !obj.contains_key(part) {
                bail!("unknown override key '{path}'");
            }
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        cursor = obj
            .get_mut(part)
            .ok_or_else(|| anyhow::anyhow!("unknown override section '{part}' in key '{path}'"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_top_level_bool_override() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("enable_combat".to_string(), serde_json::json!(false))]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert!(!config.enable_combat);
    }

    #[test]
    fn test_apply_top_level_f64_override() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("jump_delay_days".to_string(), serde_json::json!(3.5))]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert!((config.jump_delay_days - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_nested_override() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("mining_scarcity.buffer_days".to_string(), serde_json::json!(10.0))]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert!((config.mining_scarcity.buffer_days - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_nested_bool_override() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("wrecks.enabled".to_string(), serde_json::json!(false))]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert!(!config.wrecks.enabled);
    }

    #[test]
    fn test_unknown_top_level_key_errors() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("nonexistent_field".to_string(), serde_json::json!(1.0))]);
        let result = apply_overrides(&mut config, &overrides);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("nonexistent_field"));
    }

    #[test]
    fn test_unknown_nested_section_errors() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("turrets.fire_rate".to_string(), serde_json::json!(10))]);
        let result = apply_overrides(&mut config, &overrides);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("turrets"));
    }

    #[test]
    fn test_unknown_nested_field_errors() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("mining_scarcity.nonexistent".to_string(), serde_json::json!(1.0))]);
        let result = apply_overrides(&mut config, &overrides);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("nonexistent"));
    }

    #[test]
    fn test_type_mismatch_errors() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([("jump_delay_days".to_string(), serde_json::json!("not_a_number"))]);
        let result = apply_overrides(&mut config, &overrides);
        assert!(result.is_err());
    }

    #[test]
    fn test_mixed_top_level_and_nested_overrides() {
        let mut config = EngineConfig::default();
        let overrides = HashMap::from([
            ("enable_combat".to_string(), serde_json::json!(false)),
            ("ship_heat.penalty_start_fraction".to_string(), serde_json::json!(0.5)),
        ]);
        apply_overrides(&mut config, &overrides).unwrap();
        assert!(!config.enable_combat);
        assert!((config.ship_heat.penalty_start_fraction - 0.5).abs() < f64::EPSILON);
    }
}
