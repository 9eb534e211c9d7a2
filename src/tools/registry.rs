//! Capability registry
//!
//! The allowlist boundary: only names registered here can ever become a
//! remote command line. Read-only after construction.

use crate::errors::{BridgeError, Result};
use crate::tools::catalog::builtin_capabilities;
use crate::tools::types::CapabilityDefinition;
use std::collections::HashMap;

/// Capability registry
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    /// Map of capability name to definition
    capabilities: HashMap<String, CapabilityDefinition>,
}

impl CapabilityRegistry {
    /// Registry with every built-in Termux capability
    pub fn builtin() -> Result<Self> {
        Self::from_definitions(builtin_capabilities()?)
    }

    /// Build a registry from explicit definitions, checking each for consistency
    pub fn from_definitions(definitions: Vec<CapabilityDefinition>) -> Result<Self> {
        let mut capabilities = HashMap::with_capacity(definitions.len());

        for definition in definitions {
            Self::check_definition(&definition)?;
            let name = definition.name.clone();
            if capabilities.insert(name.clone(), definition).is_some() {
                return Err(BridgeError::ConfigError(format!(
                    "Capability '{}' registered twice",
                    name
                )));
            }
        }

        Ok(Self { capabilities })
    }

    fn check_definition(definition: &CapabilityDefinition) -> Result<()> {
        for placeholder in definition.template.placeholders() {
            if definition.param_spec(placeholder).is_none() {
                return Err(BridgeError::ConfigError(format!(
                    "Capability '{}': placeholder '{}' has no parameter spec",
                    definition.name, placeholder
                )));
            }
        }

        // A placeholder outside any optional group must always have a value
        for placeholder in definition.template.mandatory_placeholders() {
            if let Some(spec) = definition.param_spec(placeholder) {
                if !spec.required && spec.default.is_none() {
                    return Err(BridgeError::ConfigError(format!(
                        "Capability '{}': '{}' is mandatory in the template but optional without a default",
                        definition.name, placeholder
                    )));
                }
            }
        }

        for name in &definition.one_of {
            if definition.param_spec(name).is_none() {
                return Err(BridgeError::ConfigError(format!(
                    "Capability '{}': exclusive parameter '{}' is not declared",
                    definition.name, name
                )));
            }
        }

        Ok(())
    }

    /// Drop capabilities from the allowlist. Unknown names are a configuration error.
    pub fn without(mut self, disabled: &[String]) -> Result<Self> {
        for name in disabled {
            if self.capabilities.remove(name).is_none() {
                return Err(BridgeError::ConfigError(format!(
                    "Cannot disable unknown capability '{}'",
                    name
                )));
            }
        }
        Ok(self)
    }

    /// Resolve a capability by name or by its published tool name
    pub fn lookup(&self, name: &str) -> Result<&CapabilityDefinition> {
        if let Some(definition) = self.capabilities.get(name) {
            return Ok(definition);
        }

        name.strip_prefix("termux_")
            .map(|rest| rest.replace('_', "-"))
            .and_then(|normalized| self.capabilities.get(&normalized))
            .ok_or_else(|| BridgeError::CommandNotAllowed {
                name: name.to_string(),
            })
    }

    /// Check if capability exists
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_ok()
    }

    /// All definitions, sorted by name
    pub fn definitions(&self) -> Vec<&CapabilityDefinition> {
        let mut defs: Vec<&CapabilityDefinition> = self.capabilities.values().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::{ParamKind, ParamSpec, ResultShape};

    #[test]
    fn test_builtin_registry() {
        let registry = CapabilityRegistry::builtin().unwrap();
        assert!(!registry.is_empty());
        assert!(registry.contains("battery-status"));
        assert!(registry.contains("get-battery-status"));
        assert!(registry.contains("send-message"));
        assert!(registry.contains("sms-list"));
    }

    #[test]
    fn test_lookup_by_tool_name() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let def = registry.lookup("termux_battery_status").unwrap();
        assert_eq!(def.name, "battery-status");

        let def = registry.lookup("termux_wifi_connectioninfo").unwrap();
        assert_eq!(def.name, "wifi-connectioninfo");
    }

    #[test]
    fn test_unknown_name_not_allowed() {
        let registry = CapabilityRegistry::builtin().unwrap();
        for name in ["rm", "termux_rm", "battery-status; reboot", "", "termux-battery-status"] {
            match registry.lookup(name) {
                Err(BridgeError::CommandNotAllowed { name: reported }) => assert_eq!(reported, name),
                other => panic!("expected CommandNotAllowed for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_without_disables() {
        let registry = CapabilityRegistry::builtin()
            .unwrap()
            .without(&["telephony-call".to_string()])
            .unwrap();
        assert!(!registry.contains("telephony-call"));
        assert!(registry.contains("sms-send"));

        let err = CapabilityRegistry::builtin()
            .unwrap()
            .without(&["no-such-thing".to_string()])
            .unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_definitions_sorted() {
        let registry = CapabilityRegistry::builtin().unwrap();
        let names: Vec<&str> = registry.definitions().iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(registry.definitions().len(), registry.len());
    }

    #[test]
    fn test_rejects_undeclared_placeholder() {
        let def = CapabilityDefinition::new("x", "x", "termux-x {missing}", ResultShape::RawText).unwrap();
        assert!(CapabilityRegistry::from_definitions(vec![def]).is_err());
    }

    #[test]
    fn test_rejects_optional_mandatory_placeholder() {
        let def = CapabilityDefinition::new("x", "x", "termux-x {value}", ResultShape::RawText)
            .unwrap()
            .param(ParamSpec::optional("value", ParamKind::text(10), ""));
        assert!(CapabilityRegistry::from_definitions(vec![def]).is_err());
    }

    #[test]
    fn test_rejects_duplicates() {
        let a = CapabilityDefinition::new("x", "x", "termux-x", ResultShape::RawText).unwrap();
        let b = a.clone();
        assert!(CapabilityRegistry::from_definitions(vec![a, b]).is_err());
    }
}
