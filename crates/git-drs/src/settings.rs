use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid GIT_DRS_SERVER")]
    InvalidServer(#[source] url::ParseError),

    #[error("multipart_threshold_mib must be between 1 and 500, got {0}")]
    ThresholdOutOfRange(u64),

    #[error("no server configured; set `server` in git-drs.toml or GIT_DRS_SERVER")]
    MissingServer,

    #[error("no project configured; set `project` in git-drs.toml or GIT_DRS_PROJECT")]
    MissingProject,

    #[error(transparent)]
    Types(#[from] drs_types::TypeError),
}

/// Repository-level configuration, looked up as `<gitdir>/drs/config.toml`
/// then `git-drs.toml` at the repository root. `GIT_DRS_SERVER`,
/// `GIT_DRS_PROJECT`, and `GIT_DRS_PROFILE` override the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Settings {
    pub(crate) server: Option<Url>,
    pub(crate) project: Option<String>,
    pub(crate) profile: Option<String>,
    /// Explicit credential file; outranks `~/.gen3/<profile>.json`.
    pub(crate) credentials: Option<PathBuf>,
    /// Multipart threshold in MiB, between 1 and 500.
    pub(crate) multipart_threshold_mib: Option<u64>,
    pub(crate) max_concurrent_uploads: Option<usize>,
    pub(crate) replace_on_conflict: Option<bool>,
    pub(crate) cache_max_age_hours: Option<u64>,
}

impl Settings {
    pub(crate) fn load(git_dir: &Path, workdir: &Path) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        for candidate in [
            git_dir.join("drs").join("config.toml"),
            workdir.join("git-drs.toml"),
        ] {
            if candidate.exists() {
                let contents = fs_err::read_to_string(&candidate)?;
                settings = toml::from_str(&contents).map_err(|source| SettingsError::Parse {
                    path: candidate,
                    source,
                })?;
                break;
            }
        }

        if let Ok(server) = std::env::var("GIT_DRS_SERVER") {
            settings.server = Some(server.parse().map_err(SettingsError::InvalidServer)?);
        }
        if let Ok(project) = std::env::var("GIT_DRS_PROJECT") {
            settings.project = Some(project);
        }
        if let Ok(profile) = std::env::var("GIT_DRS_PROFILE") {
            settings.profile = Some(profile);
        }

        if let Some(mib) = settings.multipart_threshold_mib {
            if !(1..=500).contains(&mib) {
                return Err(SettingsError::ThresholdOutOfRange(mib));
            }
        }

        Ok(settings)
    }

    pub(crate) fn server(&self) -> Result<Url, SettingsError> {
        self.server.clone().ok_or(SettingsError::MissingServer)
    }

    pub(crate) fn project(&self) -> Result<drs_types::ProjectId, SettingsError> {
        let project = self
            .project
            .clone()
            .ok_or(SettingsError::MissingProject)?;
        Ok(project.parse()?)
    }

    pub(crate) fn multipart_threshold(&self) -> u64 {
        self.multipart_threshold_mib
            .map(|mib| mib * MIB)
            .unwrap_or(drs_upload::DEFAULT_MULTIPART_THRESHOLD)
    }

    pub(crate) fn cache_max_age(&self) -> Duration {
        self.cache_max_age_hours
            .map(|hours| Duration::from_secs(hours * 3600))
            .unwrap_or(drs_cache::DEFAULT_MAX_AGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("repo");
        let git_dir = workdir.join(".git");
        std::fs::create_dir_all(&workdir).unwrap();
        std::fs::create_dir_all(&git_dir).unwrap();
        std::fs::write(
            workdir.join("git-drs.toml"),
            r#"
server = "https://gen3.example.org"
project = "test-proj"
profile = "default"
multipart_threshold_mib = 64
"#,
        )
        .unwrap();

        let settings = Settings::load(&git_dir, &workdir).unwrap();
        assert_eq!(settings.project.as_deref(), Some("test-proj"));
        assert_eq!(settings.multipart_threshold(), 64 * MIB);
        assert_eq!(settings.cache_max_age(), Duration::from_secs(86_400));
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = dir.path().join("repo");
        let git_dir = workdir.join(".git");
        std::fs::create_dir_all(&workdir).unwrap();
        std::fs::create_dir_all(&git_dir).unwrap();
        std::fs::write(
            workdir.join("git-drs.toml"),
            "multipart_threshold_mib = 501\n",
        )
        .unwrap();

        assert!(matches!(
            Settings::load(&git_dir, &workdir),
            Err(SettingsError::ThresholdOutOfRange(501))
        ));
    }

    #[test]
    fn missing_server_and_project_are_usage_errors() {
        let settings = Settings::default();
        assert!(matches!(settings.server(), Err(SettingsError::MissingServer)));
        assert!(matches!(
            settings.project(),
            Err(SettingsError::MissingProject)
        ));
    }
}
