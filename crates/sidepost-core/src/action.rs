//! The persistence action requested for a write node.

use std::fmt;

/// What a write node asks the pipeline to do with its record.
///
/// Resolved per node from the payload: an explicit `method` wins, otherwise the
/// presence of an `id` means [`Action::Update`] and a temp-id means
/// [`Action::Create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Insert a new record.
    Create,
    /// Modify an existing record.
    Update,
    /// Delete an existing record.
    Destroy,
}

impl Action {
    /// True for the two actions that run the attribute/save pipeline.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Action::Create | Action::Update)
    }

    /// Lowercase name, as it appears in payloads and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
