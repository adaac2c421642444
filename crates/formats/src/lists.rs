//! Domain and opt-out list loading

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::Result;

/// Load a domain list: one domain per line, `#` lines are comments.
pub fn load_domain_list(path: &Path) -> Result<HashSet<String>> {
    let content = fs::read_to_string(path)?;
    let domains: HashSet<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_lowercase())
        .collect();
    info!("Loaded {} domains from {}", domains.len(), path.display());
    Ok(domains)
}

/// Load a domain list, returning an empty set (with a warning) when the
/// file is missing. Used for optional resources.
pub fn load_domain_list_or_empty(path: &Path) -> HashSet<String> {
    match load_domain_list(path) {
        Ok(domains) => domains,
        Err(err) => {
            warn!("Skipping domain list {}: {}", path.display(), err);
            HashSet::new()
        }
    }
}

/// Load an opt-out list: `domain` or `domain<TAB>reason` per line.
pub fn load_opt_out_list(path: &Path) -> Result<Vec<(String, String)>> {
    let content = fs::read_to_string(path)?;
    let entries: Vec<(String, String)> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|line| match line.split_once('\t') {
            Some((domain, reason)) => (domain.trim().to_lowercase(), reason.trim().to_string()),
            None => (line.to_lowercase(), "publisher opt-out".to_string()),
        })
        .collect();
    info!("Loaded {} opt-out entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Parse a comma-separated domain argument into a set.
pub fn parse_domain_arg(arg: &str) -> HashSet<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| d.to_lowercase())
        .collect()
}
