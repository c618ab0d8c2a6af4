use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::debug;

use drs_git::GitRepo;

use crate::commands::ExitStatus;
use crate::printer::Printer;
use crate::InitArgs;

const PRE_COMMIT_HOOK: &str = "#!/bin/sh\nexec git-drs pre-commit\n";
const PRE_PUSH_HOOK: &str = "#!/bin/sh\nexec git-drs pre-push\n";

/// Install the hook scripts and write the repository configuration.
pub(crate) async fn init(args: InitArgs, mut printer: Printer) -> Result<ExitStatus> {
    let repo = GitRepo::open(std::env::current_dir()?);
    let git_dir = repo.git_dir().await?;

    let hooks = git_dir.join("hooks");
    for (name, contents) in [("pre-commit", PRE_COMMIT_HOOK), ("pre-push", PRE_PUSH_HOOK)] {
        if let Some(conflict) = install_hook(&hooks.join(name), contents, args.force)? {
            #[allow(clippy::print_stderr)]
            {
                eprintln!(
                    "{}: hook {} already exists; pass --force to overwrite it",
                    "error".red().bold(),
                    conflict.display()
                );
            }
            return Ok(ExitStatus::Failure);
        }
    }

    let config_dir = git_dir.join("drs");
    fs_err::create_dir_all(&config_dir)?;
    let config_path = config_dir.join("config.toml");
    if config_path.exists() && !args.force {
        #[allow(clippy::print_stderr)]
        {
            eprintln!(
                "{}: {} already exists; pass --force to overwrite it",
                "error".red().bold(),
                config_path.display()
            );
        }
        return Ok(ExitStatus::Failure);
    }

    let mut config = String::new();
    writeln!(config, "server = \"{}\"", args.server)?;
    writeln!(config, "project = \"{}\"", args.project)?;
    if let Some(profile) = &args.profile {
        writeln!(config, "profile = \"{profile}\"")?;
    }
    fs_err::write(&config_path, config)?;
    debug!("wrote {}", config_path.display());

    writeln!(
        printer,
        "Initialized git-drs for {} ({})",
        args.project, args.server
    )?;
    Ok(ExitStatus::Success)
}

/// Write one hook script. Returns the path when an unrelated hook already
/// occupies it and `--force` was not given.
fn install_hook(path: &Path, contents: &str, force: bool) -> Result<Option<PathBuf>> {
    if path.exists() && !force {
        let existing = fs_err::read_to_string(path).unwrap_or_default();
        if existing == contents {
            return Ok(None);
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = fs_err::metadata(path)?.permissions();
        permissions.set_mode(0o755);
        fs_err::set_permissions(path, permissions)
            .with_context(|| format!("failed to mark {} executable", path.display()))?;
    }

    Ok(None)
}
