//! Connection settings for the `client-api` command line tool.
//!
//! Each setting is taken from the first source that provides it, in this
//! order (with `name` the service name, `NAME` its uppercase form):
//!
//! 1. command line flags
//! 2. `$NAME_API` and `$NAME_TOKEN`
//! 3. `~/.name-api` and `~/.name-token` (whole file, trimmed)
//! 4. `~/.name-api.json`
//! 5. `~/.name-api.conf` (JSON as well)
//! 6. `/etc/name-api` and `/etc/name-token`
//! 7. `/etc/.name-api.json`
//! 8. `/etc/.name-api.conf`
//!
//! JSON files may set `api`, `token`, `header`, `token-prefix` and
//! `token-param`; other keys and non-string values are ignored.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use super::Client;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot find API service")]
    NoService,

    #[error("cannot find API URL in args, ${upper}_API, ~/.{name}-api or /etc/{name}-api")]
    MissingApi { name: String, upper: String },

    #[error("option --stdin cannot be used with a body argument")]
    StdinWithBody,

    #[error("reading request body: {0}")]
    Stdin(#[source] std::io::Error),
}

/// The settings a `Client` is built from. `None` means "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub api: Option<String>,
    pub token: Option<String>,
    pub header: Option<String>,
    pub token_prefix: Option<String>,
    pub token_param: Option<String>,
}

impl Settings {
    /// Take every setting still missing from `other`.
    pub fn fill(&mut self, other: Settings) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        take(&mut self.api, other.api);
        take(&mut self.token, other.token);
        take(&mut self.header, other.header);
        take(&mut self.token_prefix, other.token_prefix);
        take(&mut self.token_param, other.token_param);
    }

    fn from_json(object: &Map<String, Value>) -> Self {
        let get = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            api: get("api"),
            token: get("token"),
            header: get("header"),
            token_prefix: get("token-prefix"),
            token_param: get("token-param"),
        }
    }

    /// A client configured with these settings. Empty values count as unset.
    pub fn client(&self) -> Client {
        let mut client = Client::new(self.api.clone().unwrap_or_default());
        if let Some(token) = &self.token {
            client = client.with_token(token.as_str());
        }
        if let Some(header) = &self.header {
            client = client.with_header_token(header.as_str());
        }
        if let Some(prefix) = &self.token_prefix {
            client = client.with_token_prefix(prefix.as_str());
        }
        if let Some(param) = &self.token_param {
            client = client.with_param_token(param.as_str());
        }
        client
    }
}

/// Where settings are looked up besides the flags.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub env: HashMap<String, String>,
    pub home: Option<PathBuf>,
    pub etc: PathBuf,
}

impl Sources {
    /// The process environment, `$HOME` and `/etc`.
    pub fn system() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let home = env.get("HOME").map(PathBuf::from);
        Self {
            env,
            home,
            etc: PathBuf::from("/etc"),
        }
    }
}

/// Service name from the program name: `gitlab-api` → `gitlab`.
pub fn infer_name(program: &str) -> Option<String> {
    let base = Path::new(program).file_name()?.to_str()?;
    if !(base.ends_with("-api") || base.ends_with("-api.exe")) {
        return None;
    }
    let end = base.rfind("-api")?;
    Some(base[..end].to_owned()).filter(|name| !name.is_empty())
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_owned())
}

fn read_json(path: &Path) -> Settings {
    let Ok(content) = fs::read(path) else {
        return Settings::default();
    };
    match serde_json::from_slice::<Map<String, Value>>(&content) {
        Ok(object) => Settings::from_json(&object),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
            Settings::default()
        }
    }
}

fn plain_files(dir: &Path, prefix: &str, name: &str) -> Settings {
    Settings {
        api: read_trimmed(&dir.join(format!("{prefix}{name}-api"))),
        token: read_trimmed(&dir.join(format!("{prefix}{name}-token"))),
        ..Settings::default()
    }
}

/// Complete `flags` from the other sources and check that an API URL was
/// found.
pub fn resolve(name: Option<&str>, flags: Settings, sources: &Sources) -> Result<Settings, SettingsError> {
    let mut settings = flags;

    if let Some(name) = name.filter(|n| !n.is_empty()) {
        let upper = name.to_uppercase();
        settings.fill(Settings {
            api: sources.env.get(&format!("{upper}_API")).cloned(),
            token: sources.env.get(&format!("{upper}_TOKEN")).cloned(),
            ..Settings::default()
        });

        if let Some(home) = &sources.home {
            settings.fill(plain_files(home, ".", name));
            settings.fill(read_json(&home.join(format!(".{name}-api.json"))));
            settings.fill(read_json(&home.join(format!(".{name}-api.conf"))));
        }

        settings.fill(plain_files(&sources.etc, "", name));
        settings.fill(read_json(&sources.etc.join(format!(".{name}-api.json"))));
        settings.fill(read_json(&sources.etc.join(format!(".{name}-api.conf"))));
    }

    if settings.api.as_deref().is_some_and(|api| !api.is_empty()) {
        return Ok(settings);
    }
    match name.filter(|n| !n.is_empty()) {
        None => Err(SettingsError::NoService),
        Some(name) => Err(SettingsError::MissingApi {
            name: name.to_owned(),
            upper: name.to_uppercase(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _home: tempfile::TempDir,
        _etc: tempfile::TempDir,
        sources: Sources,
    }

    impl Fixture {
        fn new() -> Self {
            let home = tempfile::tempdir().unwrap();
            let etc = tempfile::tempdir().unwrap();
            let sources = Sources {
                env: HashMap::new(),
                home: Some(home.path().to_path_buf()),
                etc: etc.path().to_path_buf(),
            };
            Self {
                _home: home,
                _etc: etc,
                sources,
            }
        }

        fn home_file(&self, name: &str, content: &str) {
            fs::write(self.sources.home.as_ref().unwrap().join(name), content).unwrap();
        }

        fn etc_file(&self, name: &str, content: &str) {
            fs::write(self.sources.etc.join(name), content).unwrap();
        }
    }

    #[test]
    fn infers_name_from_program() {
        assert_eq!(infer_name("/usr/bin/gitlab-api").as_deref(), Some("gitlab"));
        assert_eq!(infer_name("hass-api.exe").as_deref(), Some("hass"));
        assert_eq!(infer_name("client-api").as_deref(), Some("client"));
        assert_eq!(infer_name("curl"), None);
        assert_eq!(infer_name("-api"), None);
    }

    #[test]
    fn flags_win_over_everything() {
        let mut fx = Fixture::new();
        fx.sources.env.insert("GITLAB_API".into(), "https://env".into());
        fx.home_file(".gitlab-api", "https://home\n");

        let flags = Settings {
            api: Some("https://flag".into()),
            ..Settings::default()
        };
        let settings = resolve(Some("gitlab"), flags, &fx.sources).unwrap();
        assert_eq!(settings.api.as_deref(), Some("https://flag"));
    }

    #[test]
    fn precedence_across_sources() {
        let mut fx = Fixture::new();
        fx.sources.env.insert("GITLAB_TOKEN".into(), "env-token".into());
        fx.home_file(".gitlab-token", "home-token");
        fx.home_file(".gitlab-api.json", r#"{"api": "https://home-json", "token-param": "private_token", "retries": 3}"#);
        fx.home_file(".gitlab-api.conf", r#"{"api": "https://home-conf", "header": "X-Conf"}"#);
        fx.etc_file("gitlab-api", "https://etc");
        fx.etc_file(".gitlab-api.json", r#"{"token-prefix": "Token", "header": "X-Etc"}"#);

        let settings = resolve(Some("gitlab"), Settings::default(), &fx.sources).unwrap();
        assert_eq!(
            settings,
            Settings {
                api: Some("https://home-json".into()),
                token: Some("env-token".into()),
                header: Some("X-Conf".into()),
                token_prefix: Some("Token".into()),
                token_param: Some("private_token".into()),
            }
        );
    }

    #[test]
    fn etc_files_are_last_resort() {
        let fx = Fixture::new();
        fx.etc_file("gitlab-api", "  https://etc  \n");
        fx.etc_file(".gitlab-api.conf", r#"{"token": "etc-token"}"#);

        let settings = resolve(Some("gitlab"), Settings::default(), &fx.sources).unwrap();
        assert_eq!(settings.api.as_deref(), Some("https://etc"));
        assert_eq!(settings.token.as_deref(), Some("etc-token"));
    }

    #[test]
    fn broken_json_is_skipped() {
        let fx = Fixture::new();
        fx.home_file(".gitlab-api.json", "{not json");
        fx.home_file(".gitlab-api.conf", r#"{"api": "https://conf"}"#);

        let settings = resolve(Some("gitlab"), Settings::default(), &fx.sources).unwrap();
        assert_eq!(settings.api.as_deref(), Some("https://conf"));
    }

    #[test]
    fn missing_api_errors() {
        let fx = Fixture::new();
        let err = resolve(None, Settings::default(), &fx.sources).unwrap_err();
        assert!(matches!(err, SettingsError::NoService));

        let err = resolve(Some("gitlab"), Settings::default(), &fx.sources).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot find API URL in args, $GITLAB_API, ~/.gitlab-api or /etc/gitlab-api"
        );
    }

    #[test]
    fn empty_api_flag_is_not_an_api() {
        let fx = Fixture::new();
        let flags = Settings {
            api: Some(String::new()),
            ..Settings::default()
        };
        assert!(resolve(Some("gitlab"), flags, &fx.sources).is_err());
    }

    #[test]
    fn client_from_settings() {
        let settings = Settings {
            api: Some("http://localhost/api".into()),
            token: Some("t0k".into()),
            ..Settings::default()
        };
        let (url, headers) = settings.client().url_and_headers("/x").unwrap();
        assert_eq!(url.as_str(), "http://localhost/api/x");
        assert_eq!(headers["authorization"], "Bearer t0k");
    }
}
