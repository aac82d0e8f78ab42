// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BotError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BotError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_accounts(cfg)?;
    validate_accounts(cfg)?;
    validate_timing(cfg)?;
    validate_emulator(cfg)?;
    validate_friend_ids(cfg)?;
    Ok(())
}

fn ensure_has_accounts(cfg: &RawConfigFile) -> Result<()> {
    if cfg.accounts.is_empty() {
        return Err(BotError::ConfigError(
            "config must contain at least one [[account]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_accounts(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for account in cfg.accounts.iter() {
        if !seen.insert(account.emulator_index) {
            return Err(BotError::ConfigError(format!(
                "emulator_index {} is used by more than one [[account]]",
                account.emulator_index
            )));
        }
    }
    Ok(())
}

fn validate_timing(cfg: &RawConfigFile) -> Result<()> {
    if cfg.timing.max_swipes == 0 {
        return Err(BotError::ConfigError(
            "[timing].max_swipes must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.timing.refresh_max_scrolls == 0 {
        return Err(BotError::ConfigError(
            "[timing].refresh_max_scrolls must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_emulator(cfg: &RawConfigFile) -> Result<()> {
    if cfg.emulator.resolution.iter().any(|v| *v == 0) {
        return Err(BotError::ConfigError(format!(
            "[emulator].resolution must be three non-zero values (got {:?})",
            cfg.emulator.resolution
        )));
    }
    Ok(())
}

fn validate_friend_ids(cfg: &RawConfigFile) -> Result<()> {
    for id in cfg.tasks.friend_ids.iter() {
        if !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(BotError::ConfigError(format!(
                "[tasks].friend_ids entry '{id}' is not a numeric account id"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> RawConfigFile {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn rejects_missing_accounts() {
        let err = ConfigFile::try_from(parse("")).unwrap_err();
        assert!(matches!(err, BotError::ConfigError(msg) if msg.contains("[[account]]")));
    }

    #[test]
    fn rejects_duplicate_emulator_index() {
        let raw = parse(
            "[[account]]\nemulator_index = 1\n[[account]]\nemulator_index = 1\n",
        );
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_zero_swipe_budget() {
        let raw = parse("[timing]\nmax_swipes = 0\n[[account]]\nemulator_index = 0\n");
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn rejects_non_numeric_friend_id() {
        let raw = parse(
            "[tasks]\nfriend_ids = [\"12a\"]\n[[account]]\nemulator_index = 0\n",
        );
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn friend_ids_are_capped() {
        let raw = parse(
            "[tasks]\nfriend_ids = \"1,2,3,4,5\"\n[[account]]\nemulator_index = 0\n",
        );
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.friend_ids(), vec!["1", "2", "3"]);
    }
}
