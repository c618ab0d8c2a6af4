pub use error::GitError;
pub use pointer::LfsPointer;
pub use pre_push::{plan_push, PushItem, RefSpec};
pub use repo::{GitRepo, StagedChange};

mod error;
mod pointer;
mod pre_push;
mod repo;
