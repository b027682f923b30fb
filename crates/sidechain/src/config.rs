use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid chain params: {0}")]
    Invalid(&'static str),
}

/// Consensus parameters shared by every sidechain on the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Blocks after an epoch ends during which its certificate may be mined.
    pub cert_submission_window_length: i32,
    /// Depth after which forward transfers join the sidechain balance.
    pub sc_coin_maturity: i32,
    /// Blocks of certificate history considered by the fee window.
    pub sc_num_blocks_for_fee_check: i32,
    pub min_withdrawal_epoch_length: i32,
    pub max_withdrawal_epoch_length: i32,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            cert_submission_window_length: 20,
            sc_coin_maturity: 10,
            sc_num_blocks_for_fee_check: 200,
            min_withdrawal_epoch_length: 100,
            max_withdrawal_epoch_length: 4032,
        }
    }
}

fn env_i32(key: &str) -> Option<i32> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self::default()
    }

    pub fn regtest() -> Self {
        Self {
            sc_coin_maturity: 1,
            min_withdrawal_epoch_length: 2,
            ..Self::default()
        }
    }

    /// Defaults overridden by `EEZO_SC_*` variables when present and parsable.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            cert_submission_window_length: env_i32("EEZO_SC_CERT_WINDOW")
                .unwrap_or(d.cert_submission_window_length),
            sc_coin_maturity: env_i32("EEZO_SC_COIN_MATURITY").unwrap_or(d.sc_coin_maturity),
            sc_num_blocks_for_fee_check: env_i32("EEZO_SC_FEE_CHECK_BLOCKS")
                .unwrap_or(d.sc_num_blocks_for_fee_check),
            min_withdrawal_epoch_length: env_i32("EEZO_SC_MIN_EPOCH_LEN")
                .unwrap_or(d.min_withdrawal_epoch_length),
            max_withdrawal_epoch_length: env_i32("EEZO_SC_MAX_EPOCH_LEN")
                .unwrap_or(d.max_withdrawal_epoch_length),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let params: ChainParams = serde_json::from_str(&raw)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cert_submission_window_length <= 0 {
            return Err(ConfigError::Invalid("submission window must be positive"));
        }
        if self.sc_coin_maturity < 0 {
            return Err(ConfigError::Invalid("coin maturity must not be negative"));
        }
        if self.sc_num_blocks_for_fee_check <= 0 {
            return Err(ConfigError::Invalid("fee check blocks must be positive"));
        }
        if self.min_withdrawal_epoch_length <= 0
            || self.min_withdrawal_epoch_length > self.max_withdrawal_epoch_length
        {
            return Err(ConfigError::Invalid("bad withdrawal epoch length bounds"));
        }
        Ok(())
    }

    /// Number of fee entries a sidechain with epoch length `epoch_len` keeps.
    pub fn fee_window_capacity(&self, epoch_len: i32) -> usize {
        if epoch_len <= 0 {
            return 1;
        }
        (self.sc_num_blocks_for_fee_check / epoch_len).max(1) as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    #[default]
    Strict,
    /// Skips the proof engine entirely; never for consensus.
    Loose,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierCfg {
    pub mode: VerificationMode,
    pub parallel: bool,   // uses rayon if the engine was built with it
    pub max_batch: usize, // chunk very large batches
}

impl Default for VerifierCfg {
    fn default() -> Self {
        Self {
            mode: VerificationMode::Strict,
            parallel: true,
            max_batch: 4096,
        }
    }
}

impl VerifierCfg {
    pub fn from_env() -> Self {
        let d = Self::default();
        let mode = match std::env::var("EEZO_SC_VERIFY_MODE").ok().as_deref() {
            Some("loose") => VerificationMode::Loose,
            Some("strict") => VerificationMode::Strict,
            _ => d.mode,
        };
        let parallel = std::env::var("EEZO_SC_VERIFY_PARALLEL")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(d.parallel);
        let max_batch = std::env::var("EEZO_SC_VERIFY_MAX_BATCH")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(d.max_batch);
        Self {
            mode,
            parallel,
            max_batch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fee_capacity_is_at_least_one() {
        let p = ChainParams::default();
        assert_eq!(p.fee_window_capacity(10), 20);
        assert_eq!(p.fee_window_capacity(1000), 1);
        assert_eq!(p.fee_window_capacity(0), 1);
    }

    #[test]
    fn json_partial_overrides_keep_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"cert_submission_window_length": 7}}"#).unwrap();
        let p = ChainParams::from_json_file(f.path()).unwrap();
        assert_eq!(p.cert_submission_window_length, 7);
        assert_eq!(p.sc_coin_maturity, ChainParams::default().sc_coin_maturity);
    }

    #[test]
    fn json_rejects_invalid_bounds() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"min_withdrawal_epoch_length": 50, "max_withdrawal_epoch_length": 10}}"#
        )
        .unwrap();
        assert!(matches!(
            ChainParams::from_json_file(f.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn verifier_mode_parses_lowercase() {
        let cfg: VerifierCfg = serde_json::from_str(r#"{"mode":"loose"}"#).unwrap();
        assert_eq!(cfg.mode, VerificationMode::Loose);
        assert_eq!(cfg.max_batch, 4096);
    }
}
