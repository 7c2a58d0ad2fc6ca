use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

use crate::mirror::RepoLocation;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub wiki: WikiConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikiConfig {
    pub repo_url: String,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub knowledge_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// A config with no repository configured. Only useful as a base for
    /// [`Config::with_env_overrides`].
    pub fn minimal() -> Self {
        Self {
            wiki: WikiConfig {
                repo_url: String::new(),
                local_path: None,
                branch: None,
                knowledge_dir: None,
            },
            server: ServerConfig::default(),
        }
    }

    /// Apply `WIKI_*` environment variables on top of the file values.
    ///
    /// `AGENT_REPO_URL`, `AGENT_LOCAL_PATH` and `AGENT_KNOWLEDGE_DIR` are
    /// read when the matching `WIKI_*` variable is unset, so existing agent
    /// deployments work unchanged.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or_agent = |suffix: &str| {
            get(&format!("WIKI_{}", suffix)).or_else(|| get(&format!("AGENT_{}", suffix)))
        };

        if let Some(url) = get_or_agent("REPO_URL") {
            self.wiki.repo_url = url;
        }
        if let Some(path) = get_or_agent("LOCAL_PATH") {
            self.wiki.local_path = Some(PathBuf::from(path));
        }
        if let Some(branch) = get("WIKI_BRANCH") {
            self.wiki.branch = Some(branch);
        }
        if let Some(dir) = get_or_agent("KNOWLEDGE_DIR") {
            self.wiki.knowledge_dir = Some(PathBuf::from(dir));
        }
        if let Some(bind) = get("WIKI_BIND") {
            self.server.bind = bind;
        }
        self
    }

    /// Where the mirror lives on disk.
    ///
    /// Defaults to `.wiki-cache/<url hash>` so that two configs pointing at
    /// different remotes never share a checkout.
    pub fn local_path(&self) -> PathBuf {
        match &self.wiki.local_path {
            Some(path) => path.clone(),
            None => Path::new(".wiki-cache").join(short_hash(&self.wiki.repo_url)),
        }
    }

    pub fn repo_location(&self) -> RepoLocation {
        RepoLocation {
            url: self.wiki.repo_url.clone(),
            local_path: self.local_path(),
            branch: self.wiki.branch.clone(),
            knowledge_dir: self.wiki.knowledge_dir.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.wiki.repo_url.trim().is_empty() {
            bail!("wiki.repo_url must not be empty (set it in the config file or WIKI_REPO_URL)");
        }

        if let Some(branch) = &self.wiki.branch {
            if branch.trim().is_empty() {
                bail!("wiki.branch must not be empty when set");
            }
        }

        if let Some(dir) = &self.wiki.knowledge_dir {
            let escapes = dir
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                bail!(
                    "wiki.knowledge_dir must be a relative path inside the repository: {}",
                    dir.display()
                );
            }
        }

        if self.server.bind.trim().is_empty() {
            bail!("server.bind must not be empty");
        }

        Ok(())
    }
}

/// Load the TOML config at `path`, apply environment overrides and validate.
///
/// A missing file is tolerated when the environment alone supplies a
/// repository URL.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        Config::minimal()
    };

    let config = config.with_env_overrides();
    config
        .validate()
        .with_context(|| format!("Invalid configuration (config file: {})", path.display()))?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_config() {
        let cfg = parse_config(
            r#"
[wiki]
repo_url = "https://github.com/org/project.wiki.git"
local_path = "/tmp/wiki"
branch = "master"
knowledge_dir = "docs"

[server]
bind = "0.0.0.0:9000"
"#,
        )
        .unwrap();

        assert_eq!(cfg.wiki.repo_url, "https://github.com/org/project.wiki.git");
        assert_eq!(cfg.local_path(), PathBuf::from("/tmp/wiki"));
        assert_eq!(cfg.wiki.branch.as_deref(), Some("master"));
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        cfg.validate().unwrap();
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = parse_config("[wiki]\nrepo_url = \"https://example.com/a.git\"\n").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
        assert!(cfg.wiki.branch.is_none());
        assert!(cfg.wiki.knowledge_dir.is_none());

        let path = cfg.local_path();
        assert!(path.starts_with(".wiki-cache"));
        assert_eq!(path.file_name().unwrap().len(), 12);
    }

    #[test]
    fn test_default_local_path_differs_per_remote() {
        let a = parse_config("[wiki]\nrepo_url = \"https://example.com/a.git\"\n").unwrap();
        let b = parse_config("[wiki]\nrepo_url = \"https://example.com/b.git\"\n").unwrap();
        assert_ne!(a.local_path(), b.local_path());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("WIKI_REPO_URL", "https://example.com/env.git"),
            ("WIKI_LOCAL_PATH", "/srv/wiki"),
            ("WIKI_KNOWLEDGE_DIR", "docs"),
            ("WIKI_BIND", ""),
        ]
        .into_iter()
        .collect();

        let cfg = Config::minimal().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.wiki.repo_url, "https://example.com/env.git");
        assert_eq!(cfg.local_path(), PathBuf::from("/srv/wiki"));
        assert_eq!(cfg.wiki.knowledge_dir, Some(PathBuf::from("docs")));
        // empty values are ignored
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_agent_variables_are_fallbacks() {
        let env: HashMap<&str, &str> = [
            ("AGENT_REPO_URL", "https://example.com/agent.git"),
            ("AGENT_LOCAL_PATH", "./repo_data"),
            ("AGENT_KNOWLEDGE_DIR", "docs"),
            ("WIKI_KNOWLEDGE_DIR", "guides"),
        ]
        .into_iter()
        .collect();

        let cfg = Config::minimal().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.wiki.repo_url, "https://example.com/agent.git");
        assert_eq!(cfg.local_path(), PathBuf::from("./repo_data"));
        // WIKI_* wins when both are set
        assert_eq!(cfg.wiki.knowledge_dir, Some(PathBuf::from("guides")));
    }

    #[test]
    fn test_validate_rejects_missing_url() {
        let err = Config::minimal().validate().unwrap_err();
        assert!(err.to_string().contains("repo_url"));
    }

    #[test]
    fn test_validate_rejects_escaping_knowledge_dir() {
        let mut cfg = parse_config("[wiki]\nrepo_url = \"https://example.com/a.git\"\n").unwrap();
        cfg.wiki.knowledge_dir = Some(PathBuf::from("../outside"));
        assert!(cfg.validate().is_err());

        cfg.wiki.knowledge_dir = Some(PathBuf::from("/etc"));
        assert!(cfg.validate().is_err());

        cfg.wiki.knowledge_dir = Some(PathBuf::from("docs/aws"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_config_missing_file_without_env_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        // Only meaningful when the environment does not provide a URL.
        if std::env::var("WIKI_REPO_URL").is_err() && std::env::var("AGENT_REPO_URL").is_err() {
            assert!(load_config(&tmp.path().join("missing.toml")).is_err());
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_config("this is not toml = =").is_err());
    }
}
