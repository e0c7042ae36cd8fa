use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Platform};

/// One account listed in the batch-harvest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub platform: Platform,
    /// Handle, profile URL, or (YouTube) channel id.
    pub handle: String,
    /// Caller-side account reference carried into storage.
    pub account_id: Option<String>,
    #[serde(default = "default_true")]
    pub fetch_content: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AccountsFile {
    pub accounts: Vec<AccountConfig>,
}

/// Load and validate the accounts list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_accounts(path: &Path) -> Result<AccountsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::AccountsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_accounts(&content)
}

fn parse_accounts(content: &str) -> Result<AccountsFile, ConfigError> {
    let accounts_file: AccountsFile =
        serde_yaml::from_str(content).map_err(ConfigError::AccountsFileParse)?;
    validate_accounts(&accounts_file)?;
    Ok(accounts_file)
}

fn validate_accounts(accounts_file: &AccountsFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for account in &accounts_file.accounts {
        let handle = account.handle.trim();
        if handle.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} account has an empty handle",
                account.platform
            )));
        }

        if !seen.insert((account.platform, handle.to_lowercase())) {
            return Err(ConfigError::Validation(format!(
                "duplicate account: {} '{}'",
                account.platform, account.handle
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_accounts_file() {
        let yaml = r"
accounts:
  - platform: instagram
    handle: creator1
  - platform: tiktok
    handle: '@creator1'
    account_id: acct-42
    fetch_content: false
";
        let file = parse_accounts(yaml).expect("valid accounts file");
        assert_eq!(file.accounts.len(), 2);
        assert_eq!(file.accounts[0].platform, Platform::Instagram);
        assert!(file.accounts[0].fetch_content);
        assert_eq!(file.accounts[1].account_id.as_deref(), Some("acct-42"));
        assert!(!file.accounts[1].fetch_content);
    }

    #[test]
    fn rejects_empty_handle() {
        let yaml = "accounts:\n  - platform: youtube\n    handle: '  '\n";
        let err = parse_accounts(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("empty handle")));
    }

    #[test]
    fn rejects_duplicate_accounts_case_insensitively() {
        let yaml = r"
accounts:
  - platform: tiktok
    handle: Creator1
  - platform: tiktok
    handle: creator1
";
        let err = parse_accounts(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn same_handle_on_different_platforms_is_allowed() {
        let yaml = r"
accounts:
  - platform: tiktok
    handle: creator1
  - platform: instagram
    handle: creator1
";
        assert!(parse_accounts(yaml).is_ok());
    }

    #[test]
    fn unknown_platform_is_a_parse_error() {
        let yaml = "accounts:\n  - platform: myspace\n    handle: tom\n";
        assert!(matches!(
            parse_accounts(yaml),
            Err(ConfigError::AccountsFileParse(_))
        ));
    }
}
