pub use checksum::{Checksum, ChecksumKind};
pub use convert::{to_drs, to_record};
pub use drs::{AccessMethod, AccessUrl, Authorizations, DrsObject};
pub use error::TypeError;
pub use guid::{object_guid, validate_inputs};
pub use project::ProjectId;
pub use record::{CreateForm, IndexdRecord, RecordList};

mod checksum;
mod convert;
mod drs;
mod error;
mod guid;
mod project;
mod record;
