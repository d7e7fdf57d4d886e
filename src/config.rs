use std::env;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::filter::{DEFAULT_IGNORED_PREFIXES, PathFilter};

pub const ROOTS_ENV: &str = "KNOWN_DEFECTS_ROOTS";
pub const DEFAULT_ROOT: &str = "target/test-classes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub ignored_prefixes: Vec<String>,
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ignored_prefixes: DEFAULT_IGNORED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            follow_links: false,
        }
    }
}

impl ScanConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = Self::default();
        if cli.no_default_ignores {
            config.ignored_prefixes.clear();
        }
        config.ignored_prefixes.extend(cli.ignore.iter().cloned());
        config.follow_links = cli.follow_links;
        config
    }

    pub fn filter(&self) -> PathFilter {
        PathFilter::new(&self.ignored_prefixes)
    }
}

/// Roots from the command line, then `KNOWN_DEFECTS_ROOTS`, then
/// `target/test-classes` when it exists.
pub fn resolve_roots(cli: &Cli) -> Vec<PathBuf> {
    if !cli.roots.is_empty() {
        return cli.roots.clone();
    }

    if let Some(value) = env::var_os(ROOTS_ENV) {
        let roots: Vec<PathBuf> = env::split_paths(&value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if !roots.is_empty() {
            return roots;
        }
    }

    let default_root = Path::new(DEFAULT_ROOT);
    if default_root.is_dir() {
        return vec![default_root.to_path_buf()];
    }

    Vec::new()
}
