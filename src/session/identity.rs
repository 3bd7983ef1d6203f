use crate::api::{ApiError, Member, MemberId};
use crate::store::StoreError;

/// Authenticated identity as seen by the rest of the client
///
/// Starts as [`Identity::Unknown`] until the startup restore has run.
/// A member record is only ever replaced as a whole.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Identity {
    #[default]
    Unknown,
    LoggedOut,
    LoggedIn(Member),
}

impl Identity {
    pub fn member(&self) -> Option<&Member> {
        match self {
            Identity::LoggedIn(member) => Some(member),
            _ => None,
        }
    }

    pub fn member_id(&self) -> Option<MemberId> {
        self.member().map(|member| member.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.member().is_some()
    }

    /// True until the startup restore has settled the state
    pub fn is_loading(&self) -> bool {
        matches!(self, Identity::Unknown)
    }
}

/// Identity together with the login session it belongs to
///
/// `generation` grows by one each time a member logs in, so two snapshots
/// for the same member with different generations belong to different
/// sessions even if the logout between them was never observed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub identity: Identity,
    pub generation: u64,
}

/// Errors surfaced by explicit session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Login failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Session storage failed: {0}")]
    Storage(#[from] StoreError),
}
