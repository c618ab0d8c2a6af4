use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;

use drs_client::{AuthError, ClientError};
use drs_git::GitError;
use drs_types::TypeError;
use drs_upload::UploadError;

use crate::commands::ExitStatus;
use crate::settings::SettingsError;

mod commands;
mod logging;
mod printer;
mod settings;

#[derive(Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Do not print any output.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    quiet: bool,

    /// Use verbose output.
    #[arg(global = true, long, short, conflicts_with = "quiet")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the git hooks and write the repository configuration.
    Init(InitArgs),
    /// Record staged LFS pointers in the local hook cache.
    PreCommit,
    /// Read the pre-push refs stream on stdin and emit the push plan.
    PrePush,
    /// Register an S3 URL for a tracked file and upload its contents.
    AddUrl(AddUrlArgs),
}

#[derive(Args)]
struct InitArgs {
    /// Base URL of the indexing service.
    #[clap(long, env = "GIT_DRS_SERVER")]
    server: url::Url,

    /// Project identifier of the form `<program>-<project>`.
    #[clap(long, env = "GIT_DRS_PROJECT")]
    project: String,

    /// Auth profile whose credential lives under ~/.gen3/.
    #[clap(long, env = "GIT_DRS_PROFILE")]
    profile: Option<String>,

    /// Overwrite existing hooks and configuration.
    #[clap(long)]
    force: bool,
}

#[derive(Args)]
struct AddUrlArgs {
    /// Destination of the object, e.g. `s3://bucket/data/foo.bin`.
    s3_url: String,

    /// The object's sha256 digest (the LFS OID without its prefix).
    sha256: String,

    /// AWS access key; overrides the environment and the bucket registry.
    #[clap(long, env = "AWS_ACCESS_KEY_ID")]
    aws_key: Option<String>,

    /// AWS secret key.
    #[clap(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    aws_secret: Option<String>,

    /// Bucket region.
    #[clap(long, env = "AWS_REGION")]
    region: Option<String>,

    /// S3-compatible endpoint URL.
    #[clap(long, env = "AWS_ENDPOINT")]
    endpoint: Option<String>,

    /// Delete and re-register the record when it already exists.
    #[clap(long)]
    replace: bool,
}

async fn inner() -> Result<ExitStatus> {
    let cli = Cli::parse();

    logging::setup_logging(if cli.verbose {
        logging::Level::Verbose
    } else {
        logging::Level::Default
    })?;

    let printer = if cli.quiet {
        printer::Printer::Quiet
    } else if cli.verbose {
        printer::Printer::Verbose
    } else {
        printer::Printer::Default
    };

    match cli.command {
        Commands::Init(args) => commands::init(args, printer).await,
        Commands::PreCommit => commands::pre_commit(printer).await,
        Commands::PrePush => commands::pre_push(printer).await,
        Commands::AddUrl(args) => commands::add_url(args, printer).await,
    }
}

/// Map an error onto the process exit code: configuration and validation
/// problems the user can fix exit 1, unexpected failures exit 2.
fn exit_status(err: &anyhow::Error) -> ExitStatus {
    if let Some(err) = err.downcast_ref::<UploadError>() {
        return upload_status(err);
    }
    if let Some(err) = err.downcast_ref::<GitError>() {
        return git_status(err);
    }
    if err.downcast_ref::<SettingsError>().is_some() || err.downcast_ref::<TypeError>().is_some() {
        return ExitStatus::Failure;
    }
    if let Some(err) = err.downcast_ref::<AuthError>() {
        return match err {
            AuthError::ProfileNotFound { .. }
            | AuthError::CredentialRead { .. }
            | AuthError::CredentialDecode { .. } => ExitStatus::Failure,
            _ => ExitStatus::Error,
        };
    }
    ExitStatus::Error
}

fn upload_status(err: &UploadError) -> ExitStatus {
    match err {
        UploadError::Types(_)
        | UploadError::NotLfsTracked { .. }
        | UploadError::MissingAwsConfig(_)
        | UploadError::BucketProgramMismatch { .. }
        | UploadError::LocalFileMissing { .. } => ExitStatus::Failure,
        UploadError::Client(ClientError::Types(_)) => ExitStatus::Failure,
        UploadError::Git(err) => git_status(err),
        _ => ExitStatus::Error,
    }
}

fn git_status(err: &GitError) -> ExitStatus {
    match err {
        GitError::NotAPointer { .. } | GitError::MalformedRefLine(_) => ExitStatus::Failure,
        _ => ExitStatus::Error,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match inner().await {
        Ok(status) => status.into(),
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                let mut causes = err.chain();
                eprintln!(
                    "{}: {}",
                    "error".red().bold(),
                    causes.next().map(ToString::to_string).unwrap_or_default()
                );
                for cause in causes {
                    eprintln!("  {}: {cause}", "Caused by".red().bold());
                }
            }
            exit_status(&err).into()
        }
    }
}
