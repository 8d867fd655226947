//! Git branch naming convention: `<type>/<ticket-or-version>/<suffix>`

use crate::error::PreconditionError;

const RELEASE_PREFIX: &str = "release/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitBranch {
    name: String,
}

impl GitBranch {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_release(&self) -> bool {
        self.name.starts_with(RELEASE_PREFIX)
    }

    /// Ticket number from the second path segment
    pub fn ticket(&self) -> Result<&str, PreconditionError> {
        let segments: Vec<&str> = self.name.split('/').collect();
        if segments.len() < 3 {
            return Err(PreconditionError::WrongBranchNamingConvention(
                self.name.clone(),
            ));
        }
        Ok(segments[1])
    }
}

impl std::fmt::Display for GitBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
