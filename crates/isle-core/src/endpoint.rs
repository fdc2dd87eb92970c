//! URL contract of the script endpoint.
//!
//! Shared by the island bootstrap script and the on-demand import hook, so
//! both produce identical URLs (and therefore identical browser cache keys).

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// The script endpoint's path, e.g. `/_script`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEndpoint {
    path: String,
}

impl ScriptEndpoint {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `<path>?source=<source>[&sha=<stamp>]`
    #[must_use]
    pub fn url_for(&self, source: &str, build_stamp: Option<&str>) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("source", source);
        if let Some(stamp) = build_stamp {
            query.append_pair("sha", stamp);
        }
        format!("{}?{}", self.path, query.finish())
    }
}

impl Default for ScriptEndpoint {
    fn default() -> Self {
        Self::new("/_script")
    }
}
