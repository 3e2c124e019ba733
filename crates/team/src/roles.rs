//! Role configurations — the prompt and tool scope applied when a team
//! spawns a named sub-agent.
//!
//! Roles are resolved through an injected `RoleRepository`, never a
//! process-global cache, so tests stay deterministic. The TOML directory
//! repository loads each role file once and caches the result (hit or
//! miss) for the repository's lifetime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

/// A named role: prompt template plus tool scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,

    /// Prompt template; `{{personality}}` is substituted when set.
    pub prompt: String,

    /// Personality text for template substitution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,

    /// Legacy tool-name list (used only when `builtins` is empty).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Allow-list of builtin tools the spawned agent may use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub builtins: Vec<String>,
}

impl RoleConfig {
    /// The prompt with `{{personality}}` resolved.
    pub fn render_prompt(&self) -> String {
        match &self.personality {
            Some(p) => self.prompt.replace("{{personality}}", p),
            None => self.prompt.clone(),
        }
    }

    /// The tool allow-list in effect: `builtins` wins over the legacy
    /// `tools` list; None means "inherit everything".
    pub fn allow_list(&self) -> Option<&[String]> {
        if !self.builtins.is_empty() {
            Some(&self.builtins)
        } else if !self.tools.is_empty() {
            Some(&self.tools)
        } else {
            None
        }
    }
}

/// Resolves a role by name. Injected into `Team` at construction.
pub trait RoleRepository: Send + Sync {
    fn resolve(&self, name: &str) -> Option<RoleConfig>;
}

/// A repository that knows no roles: every spawn falls back to the
/// generic role prompt and the parent's full tool set.
pub struct NoRoles;

impl RoleRepository for NoRoles {
    fn resolve(&self, _name: &str) -> Option<RoleConfig> {
        None
    }
}

/// An in-memory role repository.
#[derive(Default)]
pub struct StaticRoles {
    roles: HashMap<String, RoleConfig>,
}

impl StaticRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: RoleConfig) -> Self {
        self.insert(role);
        self
    }

    pub fn insert(&mut self, role: RoleConfig) {
        self.roles.insert(role.name.clone(), role);
    }
}

impl RoleRepository for StaticRoles {
    fn resolve(&self, name: &str) -> Option<RoleConfig> {
        self.roles.get(name).cloned()
    }
}

/// A repository backed by a directory of `<name>.toml` files.
///
/// Each role is loaded at most once; both hits and misses are cached for
/// the repository's lifetime.
pub struct TomlRoleDir {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Option<RoleConfig>>>,
}

impl TomlRoleDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn load(&self, name: &str) -> Option<RoleConfig> {
        let path = self.dir.join(format!("{name}.toml"));
        let content = std::fs::read_to_string(&path).ok()?;
        match toml::from_str::<RoleConfig>(&content) {
            Ok(role) => {
                debug!(role = name, path = %path.display(), "Loaded role config");
                Some(role)
            }
            Err(e) => {
                warn!(role = name, path = %path.display(), error = %e, "Skipping malformed role file");
                None
            }
        }
    }
}

impl RoleRepository for TomlRoleDir {
    fn resolve(&self, name: &str) -> Option<RoleConfig> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(name.to_string())
            .or_insert_with(|| self.load(name))
            .clone()
    }
}
