//! Operator-supplied input files: wallets, proxies and prompts.

use std::path::Path;

use anyhow::{bail, Context, Result};
use kite_models::PromptBook;
use tracing::{info, warn};

/// Trim, lower-case and drop blank wallet addresses, keeping first-seen order.
pub fn normalize_wallets<I>(raw: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut wallets: Vec<String> = Vec::new();
    for wallet in raw {
        let wallet = wallet.as_ref().trim().to_lowercase();
        if !wallet.is_empty() && !wallets.contains(&wallet) {
            wallets.push(wallet);
        }
    }
    wallets
}

/// One wallet address per line. A missing or empty file is fatal.
pub fn load_wallets(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read wallets: {}", path.display()))?;
    let wallets = normalize_wallets(raw.lines());
    if wallets.is_empty() {
        bail!("No wallets found in {}", path.display());
    }
    info!(count = wallets.len(), path = %path.display(), "Loaded wallets");
    Ok(wallets)
}

/// One proxy URI per line. A missing file means no proxies, not an error.
pub fn load_proxies(path: &Path) -> Result<Vec<String>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "No proxies found, using direct connection");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read proxies: {}", path.display()))
        }
    };

    let proxies: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if proxies.is_empty() {
        warn!(path = %path.display(), "Proxy file is empty, using direct connection");
    } else {
        info!(count = proxies.len(), "Loaded proxies");
    }
    Ok(proxies)
}

/// A JSON array of prompt strings. Missing, malformed or empty is fatal.
pub fn load_prompts(path: &Path) -> Result<PromptBook> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompts: {}", path.display()))?;
    let prompts: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse prompts (expected a JSON array of strings): {}", path.display()))?;
    let book = PromptBook::new(prompts)
        .with_context(|| format!("No prompts found in {}", path.display()))?;
    info!(count = book.len(), "Loaded prompts");
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn wallets_are_trimmed_and_lowercased() {
        let file = file_with("  0xABCdef \n\n0x123\n0xabcDEF\n");
        let wallets = load_wallets(file.path()).unwrap();
        assert_eq!(wallets, vec!["0xabcdef".to_string(), "0x123".to_string()]);
    }

    #[test]
    fn empty_wallet_file_is_fatal() {
        let file = file_with("\n   \n");
        assert!(load_wallets(file.path()).is_err());
    }

    #[test]
    fn missing_wallet_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_wallets(&dir.path().join("wallets.txt")).is_err());
    }

    #[test]
    fn missing_proxy_file_means_no_proxies() {
        let dir = tempfile::tempdir().unwrap();
        let proxies = load_proxies(&dir.path().join("proxies.txt")).unwrap();
        assert!(proxies.is_empty());
    }

    #[test]
    fn proxy_file_skips_blanks_and_comments() {
        let file = file_with("http://10.0.0.1:8080\n\n# spare\n socks5://u:p@10.0.0.2:1080 \n");
        let proxies = load_proxies(file.path()).unwrap();
        assert_eq!(
            proxies,
            vec![
                "http://10.0.0.1:8080".to_string(),
                "socks5://u:p@10.0.0.2:1080".to_string()
            ]
        );
    }

    #[test]
    fn prompts_load_from_json_array() {
        let file = file_with(r#"["What is staking?", "  ", "Explain gas fees"]"#);
        let book = load_prompts(file.path()).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn invalid_or_empty_prompts_are_fatal() {
        assert!(load_prompts(file_with("[]").path()).is_err());
        assert!(load_prompts(file_with("{\"q\": 1}").path()).is_err());
        let dir = tempfile::tempdir().unwrap();
        assert!(load_prompts(&dir.path().join("questions.json")).is_err());
    }
}
