//! Module source providers.
//!
//! Two provenances supply source text:
//! - [`VirtualTree`]: the in-memory name -> source table built from settings
//! - [`SourceFetcher`]: remote `http(s)` fetch, implemented by the host crate

use std::collections::HashMap;

use url::Url;

use jsmod_common::{FetchError, ResolveError, Settings};

use crate::Deadline;

/// Returns `true` if the specifier names a remote module.
pub fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("http://") || specifier.starts_with("https://")
}

/// Qualify `specifier` against the module that imports it.
///
/// Only relative (`./`, `../`) and root-relative (`/`) specifiers imported
/// from a remote module are rewritten; everything else is returned verbatim.
pub fn qualify(specifier: &str, referrer: Option<&str>) -> String {
    let relative =
        specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/');

    match referrer {
        Some(base) if relative && is_remote(base) => Url::parse(base)
            .and_then(|base| base.join(specifier))
            .map_or_else(|_| specifier.to_string(), String::from),
        _ => specifier.to_string(),
    }
}

/// Fetches remote module source.
///
/// Called from the runtime instance thread; implementations block until the
/// body is read completely, the fetch times out, or `deadline` is cancelled.
pub trait SourceFetcher: Send + Sync {
    /// Fetch the module at `url`.
    fn fetch(&self, url: &str, deadline: Option<&Deadline>) -> Result<String, FetchError>;
}

/// A fetcher that refuses every remote module.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl SourceFetcher for NoFetcher {
    fn fetch(&self, url: &str, _deadline: Option<&Deadline>) -> Result<String, FetchError> {
        Err(FetchError::transport(url, "remote modules are disabled"))
    }
}

/// In-memory source tree.
#[derive(Debug, Clone, Default)]
pub struct VirtualTree {
    files: HashMap<String, String>,
}

impl VirtualTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the tree from settings, registering the main script as `main_module`.
    pub fn from_settings(settings: &Settings, main_module: &str) -> Self {
        let mut tree = Self::new();
        for module in &settings.modules {
            tree.insert(module.name.clone(), module.content.clone());
        }
        tree.insert(main_module, settings.script.content.clone());
        tree
    }

    /// Add or replace a file.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.files.insert(name.into(), source.into());
    }

    /// Read a file.
    pub fn read(&self, name: &str) -> Result<&str, ResolveError> {
        self.files
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ResolveError::not_found(name))
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the tree holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://cdn.jsdelivr.net/npm/x/+esm"));
        assert!(is_remote("http://localhost/x.js"));
        assert!(!is_remote("utils.js"));
        assert!(!is_remote("httpx.js"));
    }

    #[test]
    fn test_qualify_relative_to_remote() {
        let base = Some("https://cdn.example.com/npm/pkg/index.js");

        assert_eq!(
            qualify("./dep.js", base),
            "https://cdn.example.com/npm/pkg/dep.js"
        );
        assert_eq!(
            qualify("../other/dep.js", base),
            "https://cdn.example.com/npm/other/dep.js"
        );
        assert_eq!(
            qualify("/npm/abs@1/+esm", base),
            "https://cdn.example.com/npm/abs@1/+esm"
        );
    }

    #[test]
    fn test_qualify_leaves_other_specifiers() {
        assert_eq!(
            qualify("utils.js", Some("https://cdn.example.com/a.js")),
            "utils.js"
        );
        assert_eq!(qualify("./utils.js", Some("main.js")), "./utils.js");
        assert_eq!(qualify("./utils.js", None), "./utils.js");
    }

    #[test]
    fn test_tree_from_settings() {
        let settings = Settings::with_script("export default () => 1")
            .with_module("utils.js", "export const u = 1");
        let tree = VirtualTree::from_settings(&settings, "main.js");

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.read("main.js").unwrap(), "export default () => 1");
        assert_eq!(tree.read("utils.js").unwrap(), "export const u = 1");
        assert!(tree.read("Utils.js").unwrap_err().is_not_found());
    }

    #[test]
    fn test_no_fetcher() {
        let err = NoFetcher.fetch("https://a.example/x.js", None).unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
