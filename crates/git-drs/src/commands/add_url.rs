use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use drs_client::{AuthHandler, IndexdClientBuilder, ProfileAuth, StaticTokenAuth};
use drs_git::GitRepo;
use drs_upload::{AddUrlOptions, MultipartConfig, Reporter, S3Options};

use crate::commands::ExitStatus;
use crate::printer::Printer;
use crate::settings::Settings;
use crate::AddUrlArgs;

pub(crate) async fn add_url(args: AddUrlArgs, mut printer: Printer) -> Result<ExitStatus> {
    let repo = GitRepo::open(std::env::current_dir()?);
    let git_dir = repo.git_dir().await?;
    let settings = Settings::load(&git_dir, repo.workdir())?;

    let server = settings.server()?;
    let auth = build_auth(&settings, &server)?;
    let client = IndexdClientBuilder::new(server, settings.project()?, auth).build();

    let options = AddUrlOptions {
        s3_url: args.s3_url.clone(),
        sha256: args.sha256,
        s3: S3Options {
            access_key: args.aws_key,
            secret_key: args.aws_secret,
            region: args.region,
            endpoint: args.endpoint,
        },
        multipart_threshold: settings.multipart_threshold(),
        multipart: MultipartConfig {
            max_concurrent: settings
                .max_concurrent_uploads
                .unwrap_or(drs_upload::DEFAULT_MAX_CONCURRENT_UPLOADS),
            chunk_override: None,
        },
        replace_on_conflict: args.replace || settings.replace_on_conflict.unwrap_or(false),
    };

    let reporter = UploadReporter::from(printer);
    let report = drs_upload::add_url(&client, &repo, &options, Arc::new(reporter)).await?;

    if report.uploaded_bytes > 0 {
        writeln!(
            printer,
            "Uploaded {} ({} bytes) as {}",
            args.s3_url, report.uploaded_bytes, report.did
        )?;
    } else {
        writeln!(printer, "{} is already present as {}", args.s3_url, report.did)?;
    }
    Ok(ExitStatus::Success)
}

fn build_auth(settings: &Settings, server: &url::Url) -> Result<Arc<dyn AuthHandler>> {
    if let Ok(token) = std::env::var("GIT_DRS_TOKEN") {
        return Ok(Arc::new(StaticTokenAuth::new(token)));
    }

    let profile = settings.profile.as_deref().unwrap_or("default");
    let auth = match &settings.credentials {
        Some(path) => ProfileAuth::from_credential_file(server.clone(), profile, path)?,
        None => ProfileAuth::from_profile(server.clone(), profile)?,
    };
    Ok(Arc::new(auth))
}

#[derive(Debug)]
struct UploadReporter {
    progress: ProgressBar,
}

impl From<Printer> for UploadReporter {
    fn from(printer: Printer) -> Self {
        let progress = ProgressBar::with_draw_target(None, printer.target());
        progress.set_message("Uploading...");
        progress.set_style(
            ProgressStyle::with_template("{bar:20} {bytes}/{total_bytes} {wide_msg:.dim}")
                .expect("static template parses"),
        );
        Self { progress }
    }
}

impl Reporter for UploadReporter {
    fn on_upload_progress(&self, bytes: u64) {
        self.progress.inc(bytes);
    }

    fn on_upload_complete(&self) {
        self.progress.finish_and_clear();
    }
}
