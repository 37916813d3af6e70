//! Link sources
//!
//! The explorer only needs one question answered: which articles does this
//! article link to? [`LinkFetcher`] is that seam. A Wikipedia HTTP client
//! plugs in here; [`StaticLinks`] answers from an in-memory map, loadable from
//! YAML or JSON, for offline runs and tests.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Asynchronous source of outbound links for an article title
pub trait LinkFetcher {
    /// Fetch every outbound link of `title`.
    ///
    /// Failures abort the expansion that asked; nothing is applied.
    fn fetch_links(&self, title: &str) -> impl Future<Output = GraphResult<Vec<String>>> + Send;
}

/// Title → links map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticLinks {
    links: HashMap<String, Vec<String>>,
}

impl StaticLinks {
    pub fn new(links: HashMap<String, Vec<String>>) -> Self {
        Self { links }
    }

    /// Build from `(title, links)` pairs
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [&'a str])>,
    {
        let links = pairs
            .into_iter()
            .map(|(title, links)| {
                (
                    title.to_string(),
                    links.iter().map(|l| l.to_string()).collect(),
                )
            })
            .collect();
        Self { links }
    }

    /// Load from a `.yaml`/`.yml` or `.json` file mapping titles to link lists
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading link map from {}", path.display()))?;
        let map = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&text)?,
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                serde_yaml::from_str(&text)?
            }
            _ => anyhow::bail!("unsupported link map format: {}", path.display()),
        };
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl LinkFetcher for StaticLinks {
    async fn fetch_links(&self, title: &str) -> GraphResult<Vec<String>> {
        self.links
            .get(title)
            .cloned()
            .ok_or_else(|| GraphError::Fetch(format!("no links known for '{title}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_links_answer_known_titles() {
        let links = StaticLinks::from_pairs([("Rust", &["Cargo", "LLVM"][..])]);
        assert_eq!(
            links.fetch_links("Rust").await.unwrap(),
            vec!["Cargo".to_string(), "LLVM".to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_title_is_a_fetch_error() {
        let links = StaticLinks::default();
        assert!(matches!(
            links.fetch_links("Nowhere").await,
            Err(GraphError::Fetch(_))
        ));
    }

    #[test]
    fn loads_yaml_map() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("links.yaml");
        std::fs::write(&path, "Rust:\n  - Cargo\n  - LLVM\nCargo: []\n").unwrap();

        let links = StaticLinks::from_path(&path).unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("links.csv");
        std::fs::write(&path, "").unwrap();
        assert!(StaticLinks::from_path(&path).is_err());
    }
}
