use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A compound project identifier of the form `<program>-<project>`.
///
/// The split happens at the first `-`: project names may themselves contain
/// dashes, program names may not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        match id.split_once('-') {
            Some((program, project)) if !program.is_empty() && !project.is_empty() => {
                Ok(Self(id))
            }
            _ => Err(TypeError::InvalidProjectId(id)),
        }
    }

    pub fn program(&self) -> &str {
        self.0.split_once('-').map(|(p, _)| p).unwrap_or(&self.0)
    }

    pub fn project(&self) -> &str {
        self.0.split_once('-').map(|(_, p)| p).unwrap_or(&self.0)
    }

    /// The authorization string indexd evaluates ACLs against.
    pub fn resource_path(&self) -> String {
        format!("/programs/{}/projects/{}", self.program(), self.project())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_path_splits_on_first_dash() {
        let id = ProjectId::new("test-proj").unwrap();
        assert_eq!(id.program(), "test");
        assert_eq!(id.project(), "proj");
        assert_eq!(id.resource_path(), "/programs/test/projects/proj");

        let dashed = ProjectId::new("cbds-my-cohort").unwrap();
        assert_eq!(dashed.program(), "cbds");
        assert_eq!(dashed.project(), "my-cohort");
        assert_eq!(dashed.resource_path(), "/programs/cbds/projects/my-cohort");
    }

    #[test]
    fn rejects_ids_without_separator() {
        assert!(ProjectId::new("noprogram").is_err());
        assert!(ProjectId::new("-proj").is_err());
        assert!(ProjectId::new("prog-").is_err());
    }
}
