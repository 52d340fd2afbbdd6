use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Codes accepted when the organization has not configured its own set.
pub const FALLBACK_LEAVE_TYPES: &[&str] = &["annual", "sick", "casual", "unpaid"];

/// Entitlement applied when neither the leave type nor the policy section
/// carries one.
pub fn fixed_default_entitlement() -> Decimal {
    Decimal::from(12)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaveTypePolicy {
    pub code: String,
    pub half_day_allowed: bool,
    pub requires_document: bool,
    pub entitlement_days: Option<Decimal>,
}

impl LeaveTypePolicy {
    pub fn fallback(code: &str) -> Self {
        Self {
            code: code.to_string(),
            half_day_allowed: true,
            requires_document: false,
            entitlement_days: None,
        }
    }
}

/// Lookup of configured leave types by normalized code, backed by the fixed
/// fallback set for organizations without their own configuration.
#[derive(Clone, Debug, Default)]
pub struct LeaveTypeRegistry {
    types: HashMap<String, LeaveTypePolicy>,
}

impl LeaveTypeRegistry {
    pub fn new(types: Vec<LeaveTypePolicy>) -> Self {
        let types = types.into_iter().map(|t| (normalize_code(&t.code), t)).collect();
        Self { types }
    }

    /// Resolves a submitted code against the configured set, then the
    /// fallback set. Returns the canonical policy or nothing when the code
    /// is unknown to both.
    pub fn resolve(&self, code: &str) -> Option<LeaveTypePolicy> {
        let key = normalize_code(code);
        if let Some(policy) = self.types.get(&key) {
            return Some(policy.clone());
        }
        FALLBACK_LEAVE_TYPES
            .iter()
            .find(|fallback| **fallback == key)
            .map(|fallback| LeaveTypePolicy::fallback(fallback))
    }

    pub fn entitlement_for(&self, code: &str, policy_default: Decimal) -> Decimal {
        self.resolve(code)
            .and_then(|t| t.entitlement_days)
            .unwrap_or(policy_default)
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{LeaveTypePolicy, LeaveTypeRegistry};

    fn registry() -> LeaveTypeRegistry {
        LeaveTypeRegistry::new(vec![
            LeaveTypePolicy {
                code: "Casual".to_string(),
                half_day_allowed: true,
                requires_document: false,
                entitlement_days: Some(Decimal::from(8)),
            },
            LeaveTypePolicy {
                code: "maternity".to_string(),
                half_day_allowed: false,
                requires_document: true,
                entitlement_days: Some(Decimal::from(90)),
            },
        ])
    }

    #[test]
    fn resolve_is_case_and_whitespace_insensitive() {
        let registry = registry();
        let policy = registry.resolve("  CASUAL ").expect("configured type");
        assert_eq!(policy.code, "Casual");
        assert_eq!(policy.entitlement_days, Some(Decimal::from(8)));
    }

    #[test]
    fn unconfigured_codes_fall_back_to_fixed_set() {
        let registry = registry();
        let policy = registry.resolve("sick").expect("fallback type");
        assert_eq!(policy.code, "sick");
        assert!(policy.half_day_allowed);
    }

    #[test]
    fn unknown_codes_resolve_to_none() {
        assert!(registry().resolve("sabbatical").is_none());
    }

    #[test]
    fn entitlement_prefers_type_override() {
        let registry = registry();
        assert_eq!(registry.entitlement_for("casual", Decimal::from(12)), Decimal::from(8));
        assert_eq!(registry.entitlement_for("sick", Decimal::from(12)), Decimal::from(12));
    }
}
