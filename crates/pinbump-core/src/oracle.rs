//! "Latest version" lookups against PyPI and the GitHub API.
//!
//! Lookups never fail past this boundary: any network error, timeout,
//! non-2xx status or unexpected body is logged once and reported as `None`,
//! which callers treat as "leave the pin alone".

use crate::config::RegistryConfig;
use crate::error::{PinError, Result};
use crate::version::TagSelector;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Source of latest-version facts. The orchestrator only sees this trait.
pub trait VersionSource {
    fn latest_package_version(&self, package: &str) -> Option<String>;
    fn latest_action_version(&self, owner: &str, repo: &str) -> Option<String>;
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PypiProject {
    info: PypiInfo,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

// ---------------------------------------------------------------------------
// HttpOracle
// ---------------------------------------------------------------------------

pub struct HttpOracle {
    client: Client,
    pypi_url: String,
    github_api_url: String,
    token: Option<String>,
    tag_selector: Box<dyn TagSelector + Send + Sync>,
}

impl HttpOracle {
    /// `token` is attached as a bearer token to GitHub requests only.
    pub fn new(registry: &RegistryConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(registry.timeout_seconds))
            .user_agent(concat!("pinbump/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            pypi_url: registry.pypi_url.trim_end_matches('/').to_string(),
            github_api_url: registry.github_api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            tag_selector: registry.tag_strategy.selector(),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<T> {
        let response = request.send()?.error_for_status()?;
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| PinError::BadResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    fn github_request(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn pypi_version(&self, package: &str) -> Result<String> {
        let url = format!("{}/pypi/{package}/json", self.pypi_url);
        let project: PypiProject = self.fetch(self.client.get(&url), &url)?;
        Ok(project.info.version)
    }

    fn release_tag(&self, owner: &str, repo: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{owner}/{repo}/releases/latest",
            self.github_api_url
        );
        let release: Release = self.fetch(self.github_request(&url), &url)?;
        Ok(release.tag_name)
    }

    fn tag_names(&self, owner: &str, repo: &str) -> Result<Vec<String>> {
        let url = format!("{}/repos/{owner}/{repo}/tags", self.github_api_url);
        let tags: Vec<Tag> = self.fetch(self.github_request(&url), &url)?;
        Ok(tags.into_iter().map(|t| t.name).collect())
    }
}

impl VersionSource for HttpOracle {
    fn latest_package_version(&self, package: &str) -> Option<String> {
        match self.pypi_version(package) {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!("skipped {package}: {e}");
                None
            }
        }
    }

    fn latest_action_version(&self, owner: &str, repo: &str) -> Option<String> {
        match self.release_tag(owner, repo) {
            Ok(tag) => return Some(tag),
            Err(e) => {
                tracing::debug!("no latest release for {owner}/{repo} ({e}); listing tags");
            }
        }
        match self.tag_names(owner, repo) {
            Ok(tags) => {
                let selected = self.tag_selector.select(&tags);
                if selected.is_none() {
                    tracing::warn!("skipped action {owner}/{repo}: no releases or tags");
                }
                selected
            }
            Err(e) => {
                tracing::warn!("skipped action {owner}/{repo}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::TagStrategy;
    use mockito::{Matcher, Server};

    fn registry(server: &Server) -> RegistryConfig {
        RegistryConfig {
            pypi_url: server.url(),
            github_api_url: format!("{}/", server.url()),
            timeout_seconds: 5,
            tag_strategy: TagStrategy::FirstListed,
        }
    }

    #[test]
    fn pypi_version_is_read_from_info() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/pypi/requests/json")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"info": {"name": "requests", "version": "2.31.0"}, "releases": {}}"#)
            .create();

        let oracle = HttpOracle::new(&registry(&server), Some("secret".into())).unwrap();
        assert_eq!(
            oracle.latest_package_version("requests").as_deref(),
            Some("2.31.0")
        );
        mock.assert();
    }

    #[test]
    fn pypi_not_found_is_absent() {
        let mut server = Server::new();
        server
            .mock("GET", "/pypi/no-such-package/json")
            .with_status(404)
            .create();
        let oracle = HttpOracle::new(&registry(&server), None).unwrap();
        assert_eq!(oracle.latest_package_version("no-such-package"), None);
    }

    #[test]
    fn pypi_malformed_body_is_absent() {
        let mut server = Server::new();
        server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create();
        let oracle = HttpOracle::new(&registry(&server), None).unwrap();
        assert_eq!(oracle.latest_package_version("requests"), None);
    }

    #[test]
    fn pypi_missing_field_is_absent() {
        let mut server = Server::new();
        server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_body(r#"{"info": {"name": "requests"}}"#)
            .create();
        let oracle = HttpOracle::new(&registry(&server), None).unwrap();
        assert_eq!(oracle.latest_package_version("requests"), None);
    }

    #[test]
    fn unreachable_registry_is_absent() {
        let cfg = RegistryConfig {
            pypi_url: "http://127.0.0.1:1".into(),
            github_api_url: "http://127.0.0.1:1".into(),
            timeout_seconds: 1,
            tag_strategy: TagStrategy::FirstListed,
        };
        let oracle = HttpOracle::new(&cfg, None).unwrap();
        assert_eq!(oracle.latest_package_version("requests"), None);
        assert_eq!(oracle.latest_action_version("actions", "checkout"), None);
    }

    #[test]
    fn release_tag_with_bearer_token() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/repos/actions/checkout/releases/latest")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"tag_name": "v4.1.1", "name": "v4.1.1"}"#)
            .create();

        let oracle = HttpOracle::new(&registry(&server), Some("secret".into())).unwrap();
        assert!(oracle.has_token());
        assert_eq!(
            oracle.latest_action_version("actions", "checkout").as_deref(),
            Some("v4.1.1")
        );
        mock.assert();
    }

    #[test]
    fn blank_token_is_dropped() {
        let server = Server::new();
        let oracle = HttpOracle::new(&registry(&server), Some("  ".into())).unwrap();
        assert!(!oracle.has_token());
    }

    #[test]
    fn falls_back_to_first_listed_tag() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/org/tool/releases/latest")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create();
        let tags = server
            .mock("GET", "/repos/org/tool/tags")
            .with_status(200)
            .with_body(r#"[{"name": "v1.9.0"}, {"name": "v1.10.0"}]"#)
            .create();

        let oracle = HttpOracle::new(&registry(&server), None).unwrap();
        assert_eq!(
            oracle.latest_action_version("org", "tool").as_deref(),
            Some("v1.9.0")
        );
        tags.assert();
    }

    #[test]
    fn highest_version_strategy_sorts_fallback_tags() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/org/tool/releases/latest")
            .with_status(404)
            .create();
        server
            .mock("GET", "/repos/org/tool/tags")
            .with_status(200)
            .with_body(r#"[{"name": "v1.9.0"}, {"name": "v1.10.0"}]"#)
            .create();

        let mut cfg = registry(&server);
        cfg.tag_strategy = TagStrategy::HighestVersion;
        let oracle = HttpOracle::new(&cfg, None).unwrap();
        assert_eq!(
            oracle.latest_action_version("org", "tool").as_deref(),
            Some("v1.10.0")
        );
    }

    #[test]
    fn no_releases_and_no_tags_is_absent() {
        let mut server = Server::new();
        server
            .mock("GET", "/repos/org/empty/releases/latest")
            .with_status(404)
            .create();
        server
            .mock("GET", "/repos/org/empty/tags")
            .with_status(200)
            .with_body("[]")
            .create();
        let oracle = HttpOracle::new(&registry(&server), None).unwrap();
        assert_eq!(oracle.latest_action_version("org", "empty"), None);
    }
}
