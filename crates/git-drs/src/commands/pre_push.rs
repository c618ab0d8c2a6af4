use std::fmt::Write;

use anyhow::Result;
use tokio::io::AsyncReadExt;

use drs_cache::PreCommitCache;
use drs_git::{plan_push, GitRepo, RefSpec};

use crate::commands::ExitStatus;
use crate::printer::Printer;
use crate::settings::Settings;

/// Consume the pre-push refs stream on stdin and emit the push plan, one
/// JSON object per line, on stdout.
pub(crate) async fn pre_push(mut printer: Printer) -> Result<ExitStatus> {
    let repo = GitRepo::open(std::env::current_dir()?);
    let git_dir = repo.git_dir().await?;
    let settings = Settings::load(&git_dir, repo.workdir())?;
    let cache = PreCommitCache::open(git_dir);

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let refs = RefSpec::parse_stream(&input)?;

    let plan = plan_push(&repo, &cache, &refs, settings.cache_max_age()).await?;
    for item in &plan {
        #[allow(clippy::print_stdout)]
        {
            println!("{}", serde_json::to_string(item)?);
        }
    }

    writeln!(printer, "Push plan covers {} LFS object(s)", plan.len())?;
    Ok(ExitStatus::Success)
}
