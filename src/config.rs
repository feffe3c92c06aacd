// Copyright 2026 Roster Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

use crate::presentation::GroupTitles;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    /// Fallback tracing filter when `ROSTER_LOG` is unset.
    pub log_level: String,
    pub titles: GroupTitles,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("roster.db"),
            log_level: "warn".to_string(),
            titles: GroupTitles::default(),
        }
    }
}

/// Loaded settings plus the directory the store was found in.
#[derive(Debug, Clone)]
pub struct ConfigCtx {
    pub root: PathBuf,
    pub config: Config,
}

impl ConfigCtx {
    pub fn from_cwd(config: &Config) -> Result<Self> {
        let cwd = std::env::current_dir().context("get current dir")?;
        Self::locate(config, &cwd)
    }

    pub fn locate(config: &Config, start: &Path) -> Result<Self> {
        let root = find_store_root(start, &config.store_path)
            .context("store not found; run `roster init` first")?;
        Ok(Self {
            root,
            config: config.clone(),
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.root.join(&self.config.store_path)
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Per-platform base directory for settings, resolved through `var`.
fn config_base(var: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return var("APPDATA").map(PathBuf::from).or_else(|| {
            var("USERPROFILE").map(|profile| Path::new(&profile).join("AppData").join("Roaming"))
        });
    }
    if cfg!(target_os = "macos") {
        return var("HOME").map(|home| Path::new(&home).join("Library").join("Application Support"));
    }
    var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| var("HOME").map(|home| Path::new(&home).join(".config")))
}

pub fn global_config_path() -> Option<PathBuf> {
    config_base(env_var).map(|base| base.join("roster").join("roster.toml"))
}

/// Defaults when no settings file exists yet.
pub fn load_global_config() -> Result<Config> {
    match global_config_path() {
        Some(path) if path.is_file() => read_config(&path),
        _ => Ok(Config::default()),
    }
}

/// Nearest ancestor of `start` holding the store file. An absolute store
/// path is used as is.
pub fn find_store_root(start: &Path, store_path: &Path) -> Option<PathBuf> {
    if store_path.is_absolute() {
        return store_path
            .is_file()
            .then(|| store_path.parent().map(Path::to_path_buf))
            .flatten();
    }
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|dir| dir.join(store_path).is_file())
        .map(Path::to_path_buf)
}

pub fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut config: Config =
        toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    if config.log_level.trim().is_empty() {
        config.log_level = Config::default().log_level;
    }
    Ok(config)
}

pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config).context("serialize config")?;
    std::fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| vars.get(key).map(|value| value.to_string())
    }

    #[test]
    fn store_root_is_nearest_ancestor_with_store() {
        let dir = tempdir().expect("tempdir");
        let outer = dir.path().join("outer");
        let inner = outer.join("inner");
        let nested = inner.join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(outer.join("roster.db"), "stub").expect("write outer");
        std::fs::write(inner.join("roster.db"), "stub").expect("write inner");

        let found = find_store_root(&nested, Path::new("roster.db"));
        assert_eq!(found, Some(inner.canonicalize().expect("canonicalize")));
    }

    #[test]
    fn absolute_store_path_skips_discovery() {
        let dir = tempdir().expect("tempdir");
        let db = dir.path().join("elsewhere.db");
        assert_eq!(find_store_root(Path::new("/"), &db), None);
        std::fs::write(&db, "stub").expect("write db");
        assert_eq!(
            find_store_root(Path::new("/"), &db),
            Some(dir.path().to_path_buf())
        );
    }

    #[test]
    fn locate_errors_when_store_missing() {
        let work_dir = tempdir().expect("work dir");
        let err = ConfigCtx::locate(&Config::default(), work_dir.path()).unwrap_err();
        assert!(err.to_string().contains("store not found"));
    }

    #[test]
    fn locate_ignores_other_files_next_to_store() {
        let work_dir = tempdir().expect("work dir");
        let root = work_dir.path();
        std::fs::write(root.join("roster.db"), "stub").expect("write db");
        std::fs::write(root.join("roster.toml"), "log_level = \"trace\"").expect("write");
        let ctx = ConfigCtx::locate(&Config::default(), root).expect("locate");
        assert_eq!(ctx.config.log_level, "warn");
        assert!(ctx.store_path().ends_with("roster.db"));
    }

    #[test]
    fn config_base_follows_platform_conventions() {
        let base = config_base(lookup(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")]));
        let home_only = config_base(lookup(&[("HOME", "/home/u")]));
        if cfg!(target_os = "macos") {
            let expected = Path::new("/home/u").join("Library").join("Application Support");
            assert_eq!(base, Some(expected.clone()));
            assert_eq!(home_only, Some(expected));
        } else if !cfg!(target_os = "windows") {
            assert_eq!(base, Some(PathBuf::from("/xdg")));
            assert_eq!(home_only, Some(Path::new("/home/u").join(".config")));
        }
        assert_eq!(config_base(lookup(&[])), None);
    }

    #[test]
    fn titles_can_be_overridden_partially() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("roster.toml");
        std::fs::write(&path, "log_level = \"debug\"\n\n[titles]\ncontacts = \"Amis\"\n")
            .expect("write config");
        let config = read_config(&path).expect("load");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.titles.contacts, "Amis");
        assert_eq!(config.titles.feeds, "Joined Feeds");
        assert_eq!(config.store_path, PathBuf::from("roster.db"));
    }

    #[test]
    fn blank_log_level_falls_back_to_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("roster.toml");
        std::fs::write(&path, "log_level = \"  \"\n").expect("write config");
        assert_eq!(read_config(&path).expect("load").log_level, "warn");
    }

    #[test]
    fn write_then_read_keeps_settings() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("roster.toml");
        let mut config = Config::default();
        config.titles.feeds = "Feeds".to_string();
        write_config(&path, &config).expect("write");
        let loaded = read_config(&path).expect("read");
        assert_eq!(loaded.titles, config.titles);
        assert_eq!(loaded.log_level, "warn");
    }
}
