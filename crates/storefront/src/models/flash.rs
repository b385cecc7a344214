//! One-shot notices carried across a redirect.

use tower_sessions::Session;

use stride_core::notice::Notice;

use super::CurrentUser;
use super::session_keys;

/// Queue a notice for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn push_notice(
    session: &Session,
    notice: Notice,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::NOTICE, notice).await
}

/// Take the queued notice, if any.
pub async fn take_notice(session: &Session) -> Option<Notice> {
    session
        .remove::<Notice>(session_keys::NOTICE)
        .await
        .ok()
        .flatten()
}

/// Data every page layout needs.
pub struct PageContext {
    pub user_name: Option<String>,
    pub notice: Option<Notice>,
}

impl PageContext {
    /// Build the layout context, consuming the queued notice.
    pub async fn load(session: &Session, user: Option<&CurrentUser>) -> Self {
        Self {
            user_name: user.map(|u| u.first_name().to_string()),
            notice: take_notice(session).await,
        }
    }

    /// Show `notice` on this page instead of the queued one.
    #[must_use]
    pub fn with_notice(mut self, notice: Option<Notice>) -> Self {
        if notice.is_some() {
            self.notice = notice;
        }
        self
    }

    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user_name.is_some()
    }

    #[must_use]
    pub fn user_label(&self) -> &str {
        self.user_name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn notice_kind(&self) -> &'static str {
        self.notice.as_ref().map_or("", |n| n.kind.as_str())
    }

    #[must_use]
    pub fn notice_message(&self) -> &str {
        self.notice.as_ref().map_or("", |n| n.message.as_str())
    }
}
