use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_REGISTRY_URL: &str = "https://replicate.npmjs.com";
pub const DEFAULT_OUTPUT_PATH: &str = "./data/npm_projects.json";
pub const DEFAULT_OUTPUT_DIR: &str = "./data/npm_projects";
pub const DEFAULT_PROGRESS_STRIDE: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// One JSON line per entry in a single file.
    Append,
    /// One JSON file per package inside a directory.
    PerEntry,
}

impl OutputMode {
    /// Where output goes when `OUTPUT_PATH` is unset.
    pub fn default_path(self) -> PathBuf {
        match self {
            OutputMode::Append => PathBuf::from(DEFAULT_OUTPUT_PATH),
            OutputMode::PerEntry => PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl FromStr for OutputMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(OutputMode::Append),
            "per-entry" | "per-entity" | "per-file" => Ok(OutputMode::PerEntry),
            _ => Err("expected `append` or `per-entry`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub registry_url: String,
    pub output_path: PathBuf,
    pub output_mode: OutputMode,
    pub progress_stride: u64,
    pub await_writes: bool,
    pub since_seq: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry_url: DEFAULT_REGISTRY_URL.to_owned(),
            output_path: OutputMode::Append.default_path(),
            output_mode: OutputMode::Append,
            progress_stride: DEFAULT_PROGRESS_STRIDE,
            await_writes: false,
            since_seq: None,
        }
    }
}

fn parse_var<T, F>(
    lookup: &F,
    var: &'static str,
    reason: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Invalid { var, value, reason }),
        },
    }
}

impl Config {
    /// Reads the configuration from the process environment. Call `dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let progress_stride =
            parse_var(&lookup, "PROGRESS_STRIDE", "expected a positive integer")?
                .unwrap_or(defaults.progress_stride);
        if progress_stride == 0 {
            return Err(ConfigError::Invalid {
                var: "PROGRESS_STRIDE",
                value: "0".into(),
                reason: "expected a positive integer",
            });
        }

        let output_mode = match lookup("OUTPUT_MODE") {
            None => defaults.output_mode,
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "OUTPUT_MODE",
                value,
                reason,
            })?,
        };

        Ok(Config {
            registry_url: lookup("REGISTRY_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.registry_url),
            output_path: lookup("OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| output_mode.default_path()),
            output_mode,
            progress_stride,
            await_writes: parse_var(&lookup, "AWAIT_WRITES", "expected true or false")?
                .unwrap_or(defaults.await_writes),
            since_seq: parse_var(&lookup, "SINCE_SEQ", "expected a sequence number")?,
        })
    }

    pub fn root_url(&self) -> &str {
        &self.registry_url
    }

    pub fn changes_url(&self) -> String {
        let base = format!(
            "{}/_changes?feed=continuous&style=main_only&include_docs=true",
            self.registry_url
        );
        match self.since_seq {
            Some(since) => format!("{}&since={}", base, since),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.output_mode, OutputMode::Append);
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert_eq!(config.progress_stride, 5);
        assert!(!config.await_writes);
        assert_eq!(
            config.changes_url(),
            "https://replicate.npmjs.com/_changes?feed=continuous&style=main_only&include_docs=true"
        );
    }

    #[test]
    fn overrides() {
        let config = from_pairs(&[
            ("REGISTRY_URL", "http://localhost:5984/"),
            ("OUTPUT_PATH", "/tmp/out"),
            ("OUTPUT_MODE", "per-file"),
            ("PROGRESS_STRIDE", "100"),
            ("AWAIT_WRITES", "true"),
            ("SINCE_SEQ", "42"),
        ])
        .unwrap();
        assert_eq!(config.root_url(), "http://localhost:5984");
        assert_eq!(config.output_path, PathBuf::from("/tmp/out"));
        assert_eq!(config.output_mode, OutputMode::PerEntry);
        assert_eq!(config.progress_stride, 100);
        assert!(config.await_writes);
        assert!(config.changes_url().ends_with("&since=42"));
    }

    #[test]
    fn per_entry_defaults_to_a_directory() {
        let config = from_pairs(&[("OUTPUT_MODE", "per-entry")]).unwrap();
        assert_eq!(config.output_mode, OutputMode::PerEntry);
        assert_eq!(config.output_path, PathBuf::from("./data/npm_projects"));
        assert_ne!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));

        let config = from_pairs(&[("OUTPUT_MODE", "per-entry"), ("OUTPUT_PATH", "/srv/out")]);
        assert_eq!(config.unwrap().output_path, PathBuf::from("/srv/out"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(from_pairs(&[("PROGRESS_STRIDE", "0")]).is_err());
        assert!(from_pairs(&[("PROGRESS_STRIDE", "five")]).is_err());
        assert!(from_pairs(&[("OUTPUT_MODE", "s3")]).is_err());
        assert!(from_pairs(&[("AWAIT_WRITES", "yes")]).is_err());
    }
}
