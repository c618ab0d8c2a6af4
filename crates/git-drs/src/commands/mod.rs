use std::process::ExitCode;

pub(crate) use add_url::add_url;
pub(crate) use init::init;
pub(crate) use pre_commit::pre_commit;
pub(crate) use pre_push::pre_push;

mod add_url;
mod init;
mod pre_commit;
mod pre_push;

#[derive(Copy, Clone)]
pub(crate) enum ExitStatus {
    /// The command succeeded.
    Success,

    /// The command failed due to an error in the user input.
    Failure,

    /// The command failed with an unexpected error.
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::from(0),
            ExitStatus::Failure => ExitCode::from(1),
            ExitStatus::Error => ExitCode::from(2),
        }
    }
}
