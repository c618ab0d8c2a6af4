use crate::error::GitError;

/// LFS pointer blobs are tiny; anything bigger is file content.
const POINTER_SIZE_CUTOFF: usize = 1024;

/// A parsed Git-LFS pointer blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsPointer {
    /// The full OID, e.g. `sha256:b5bb9d…`.
    pub oid: String,
    pub size: u64,
}

impl LfsPointer {
    /// Parse a pointer blob. Strict on `oid` and `size`; tolerant of extra
    /// key-value lines a future LFS version might add.
    pub fn parse(path: &str, content: &str) -> Result<Self, GitError> {
        let fail = |reason: &str| GitError::NotAPointer {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if content.len() > POINTER_SIZE_CUTOFF {
            return Err(fail("blob exceeds the pointer size cutoff"));
        }
        if !content.starts_with("version ") {
            return Err(fail("missing version line"));
        }

        let mut oid = None;
        let mut size = None;
        for line in content.lines() {
            match line.split_once(' ') {
                Some(("oid", value)) => {
                    let digest = value
                        .strip_prefix("sha256:")
                        .ok_or_else(|| fail("oid is not sha256"))?;
                    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                        return Err(fail("oid digest is not 64 hex characters"));
                    }
                    oid = Some(value.to_string());
                }
                Some(("size", value)) => {
                    size = Some(value.parse().map_err(|_| fail("size is not a number"))?);
                }
                _ => {}
            }
        }

        Ok(Self {
            oid: oid.ok_or_else(|| fail("missing oid line"))?,
            size: size.ok_or_else(|| fail("missing size line"))?,
        })
    }

    /// The bare sha256 digest, without the `sha256:` prefix.
    pub fn sha256(&self) -> &str {
        self.oid.strip_prefix("sha256:").unwrap_or(&self.oid)
    }
}
