use std::env;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, SessionConfig};

pub const CONFIG_FILE_NAME: &str = ".bobble.toml";

/// A loaded session file together with where it came from.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSession {
    pub config_path: Option<PathBuf>,
    pub config: SessionConfig,
}

impl ResolvedSession {
    /// The configured stats path, made absolute against the config file's
    /// directory when it is relative.
    pub fn stats_path(&self) -> Option<PathBuf> {
        let stats = self.config.stats.as_ref()?;
        if stats.is_absolute() {
            return Some(stats.clone());
        }
        match self.config_path.as_deref().and_then(Path::parent) {
            Some(dir) => Some(dir.join(stats)),
            None => Some(stats.clone()),
        }
    }
}

/// Finds and loads the session config.
///
/// An explicit path wins, then `BOBBLE_CONFIG`, then the nearest
/// `.bobble.toml` in `start` or its ancestors. An explicit path that does not
/// exist is an error; finding nothing by search yields the defaults.
pub fn resolve_session(
    start: impl AsRef<Path>,
    config_path: Option<PathBuf>,
) -> Result<ResolvedSession, ConfigError> {
    let env_config = env::var_os("BOBBLE_CONFIG")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from);
    resolve_session_with_overrides(start, config_path, env_config)
}

/// [`resolve_session`] with the `BOBBLE_CONFIG` value passed in.
pub fn resolve_session_with_overrides(
    start: impl AsRef<Path>,
    config_path: Option<PathBuf>,
    env_config: Option<PathBuf>,
) -> Result<ResolvedSession, ConfigError> {
    if let Some(path) = config_path.or(env_config) {
        return load_resolved(path);
    }

    match find_config_from(start.as_ref()) {
        Some(path) => load_resolved(path),
        None => Ok(ResolvedSession::default()),
    }
}

pub fn load_session_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }

    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

fn load_resolved(path: PathBuf) -> Result<ResolvedSession, ConfigError> {
    let config = load_session_config(&path)?;
    Ok(ResolvedSession {
        config_path: Some(path),
        config,
    })
}

fn find_config_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|ancestor| ancestor.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::config::resolve::{
        find_config_from, load_session_config, resolve_session_with_overrides, CONFIG_FILE_NAME,
    };
    use crate::config::ConfigError;

    struct TempDir {
        root: PathBuf,
    }

    impl TempDir {
        fn new(label: &str) -> Self {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock before unix epoch")
                .as_nanos();
            let root = std::env::temp_dir().join(format!(
                "bobble-config-{label}-{}-{nanos}",
                std::process::id()
            ));
            fs::create_dir_all(&root).expect("create temp dir");
            Self { root }
        }

        fn write(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.root.join(name);
            fs::write(&path, contents).expect("write config");
            path
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn parses_every_section() {
        let dir = TempDir::new("sections");
        let path = dir.write(
            CONFIG_FILE_NAME,
            r#"
stats = "dist/stats.json"

[selection]
groups = ["main"]
group_pattern = "^page-"

[cuts]
nodes = ["./src/big.js"]
edges = ["./src/a.js => ./src/b.js"]

[output]
format = "flat"
show_unreachable = true
"#,
        );

        let config = load_session_config(&path).expect("load config");
        assert_eq!(config.stats, Some(PathBuf::from("dist/stats.json")));
        assert_eq!(config.selection.groups, vec!["main".to_string()]);
        assert_eq!(config.selection.group_pattern.as_deref(), Some("^page-"));
        assert_eq!(config.cuts.nodes, vec!["./src/big.js".to_string()]);
        assert_eq!(config.cuts.edges.len(), 1);
        assert_eq!(config.output.format.as_deref(), Some("flat"));
        assert!(config.output.show_unreachable);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let dir = TempDir::new("defaults");
        let path = dir.write(CONFIG_FILE_NAME, "");

        let config = load_session_config(&path).expect("load config");
        assert!(config.stats.is_none());
        assert!(config.selection.groups.is_empty());
        assert!(config.cuts.nodes.is_empty());
        assert!(!config.output.show_unreachable);
    }

    #[test]
    fn finds_config_in_an_ancestor_and_resolves_stats_next_to_it() {
        let dir = TempDir::new("ancestor");
        let nested = dir.root.join("packages").join("app");
        fs::create_dir_all(&nested).expect("create nested");
        let config_path = dir.write(CONFIG_FILE_NAME, "stats = \"build/stats.json\"\n");

        assert_eq!(find_config_from(&nested), Some(config_path.clone()));
        let resolved = resolve_session_with_overrides(&nested, None, None).expect("resolve");
        assert_eq!(resolved.config_path, Some(config_path));
        assert_eq!(
            resolved.stats_path(),
            Some(dir.root.join("build").join("stats.json"))
        );
    }

    #[test]
    fn env_config_beats_search_and_flag_beats_env() {
        let dir = TempDir::new("precedence");
        dir.write(CONFIG_FILE_NAME, "stats = \"found.json\"\n");
        let from_env = dir.write("env.toml", "stats = \"env.json\"\n");
        let from_flag = dir.write("flag.toml", "stats = \"flag.json\"\n");

        let resolved = resolve_session_with_overrides(&dir.root, None, Some(from_env.clone()))
            .expect("resolve env");
        assert_eq!(resolved.config_path, Some(from_env.clone()));

        let resolved =
            resolve_session_with_overrides(&dir.root, Some(from_flag.clone()), Some(from_env))
                .expect("resolve flag");
        assert_eq!(resolved.config_path, Some(from_flag));
        assert_eq!(resolved.stats_path(), Some(dir.root.join("flag.json")));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = TempDir::new("missing");
        let err = resolve_session_with_overrides(&dir.root, Some(dir.root.join("nope.toml")), None)
            .expect_err("missing");

        assert!(matches!(err, ConfigError::ConfigNotFound(_)));
    }

    #[test]
    fn malformed_config_reports_its_path() {
        let dir = TempDir::new("malformed");
        let path = dir.write(CONFIG_FILE_NAME, "stats = [");

        let err = load_session_config(&path).expect_err("malformed");
        assert!(matches!(err, ConfigError::Toml { path: ref p, .. } if *p == path));
    }
}
