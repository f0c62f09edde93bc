use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceConfig;

/// `modules.vouchers` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VouchersConfig {
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,
    /// Upper bound on ids accepted by one bulk delete.
    #[serde(default = "default_max_bulk_delete")]
    pub max_bulk_delete: usize,
}

fn default_max_code_length() -> usize {
    32
}

fn default_max_bulk_delete() -> usize {
    500
}

impl Default for VouchersConfig {
    fn default() -> Self {
        Self {
            max_code_length: default_max_code_length(),
            max_bulk_delete: default_max_bulk_delete(),
        }
    }
}

impl From<&VouchersConfig> for ServiceConfig {
    fn from(cfg: &VouchersConfig) -> Self {
        Self {
            max_code_length: cfg.max_code_length,
            max_bulk_delete: cfg.max_bulk_delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg: VouchersConfig =
            serde_json::from_value(serde_json::json!({ "max_code_length": 12 })).unwrap();
        assert_eq!(cfg.max_code_length, 12);
        assert_eq!(cfg.max_bulk_delete, 500);
        assert_eq!(ServiceConfig::from(&cfg).max_code_length, 12);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let res: Result<VouchersConfig, _> =
            serde_json::from_value(serde_json::json!({ "max_len": 12 }));
        assert!(res.is_err());
    }
}
