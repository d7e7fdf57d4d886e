//! Drives walking, decoding and extraction over a list of scan roots.

use std::path::Path;

use crate::classfile::parse_class;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::extract::extract_class;
use crate::filter::PathFilter;
use crate::log::ScanLog;
use crate::results::ScanResults;
use crate::walk::{ClassEntry, Walker};

pub struct Scanner<'a> {
    filter: PathFilter,
    follow_links: bool,
    log: &'a dyn ScanLog,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &ScanConfig, log: &'a dyn ScanLog) -> Self {
        Self {
            filter: config.filter(),
            follow_links: config.follow_links,
            log,
        }
    }

    /// Scan every root in order and merge the findings. The first failure
    /// anywhere aborts the whole scan.
    pub fn scan_roots<P: AsRef<Path>>(&self, roots: &[P]) -> Result<ScanResults> {
        let mut results = ScanResults::new();
        for root in roots {
            results.merge(self.scan_root(root.as_ref())?);
        }
        Ok(results)
    }

    pub fn scan_root(&self, root: &Path) -> Result<ScanResults> {
        if root.as_os_str().is_empty() {
            return Err(ScanError::InvalidArgument(
                "scan root path cannot be empty".to_string(),
            ));
        }

        self.log
            .info(&format!("looking for annotations in path {}", root.display()));

        let walker = Walker::new(&self.filter, self.log).follow_links(self.follow_links);
        let mut results = ScanResults::new();
        for entry in walker.walk(root)? {
            self.scan_class(&entry?, &mut results)?;
        }
        Ok(results)
    }

    fn scan_class(&self, entry: &ClassEntry, results: &mut ScanResults) -> Result<()> {
        let class = parse_class(&entry.bytes).map_err(|source| ScanError::MalformedClassFile {
            path: entry.path.clone(),
            source,
        })?;
        self.log.info(&format!("looking at class {}", class.name));

        for record in extract_class(&class) {
            results.add_result(&class.name, record)?;
        }
        Ok(())
    }
}
