use crate::log::ScanLog;

pub const CLASS_SUFFIX: &str = ".class";

/// Packages whose classes are never worth decoding.
pub const DEFAULT_IGNORED_PREFIXES: &[&str] = &["java", "javax", "sun", "com.sun", "javassist"];

/// Decides which files found under a scan root are class files to decode.
#[derive(Debug, Clone)]
pub struct PathFilter {
    /// Stored with the trailing dot so `javax` never matches `java`.
    ignored: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_PREFIXES.iter().copied())
    }
}

impl PathFilter {
    pub fn new<I, S>(ignored_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignored = ignored_prefixes
            .into_iter()
            .map(|p| p.as_ref().trim_end_matches('.').to_string())
            .filter(|p| !p.is_empty())
            .map(|p| format!("{p}."))
            .collect();
        Self { ignored }
    }

    /// `path` is `/`-separated and relative to the class-path root.
    pub fn accepts(&self, path: &str) -> bool {
        if !path.ends_with(CLASS_SUFFIX) {
            return false;
        }
        let path = path.strip_prefix('/').unwrap_or(path);
        let dotted = path.replace(['/', '\\'], ".");
        !self.ignored.iter().any(|p| dotted.starts_with(p.as_str()))
    }

    pub fn accepts_logged(&self, path: &str, log: &dyn ScanLog) -> bool {
        let accepted = self.accepts(path);
        if accepted {
            log.debug(&format!("{path} accepted by filter"));
        } else {
            log.debug(&format!("{path} rejected by filter"));
        }
        accepted
    }
}
