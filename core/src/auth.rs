use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A signed-in identity. Saved projects are scoped by `uid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    /// The uid is derived from the email (or the name when there is no
    /// email), so signing in again with the same identity reopens the same
    /// projects.
    pub fn new(display_name: impl Into<String>, email: Option<String>) -> Self {
        let display_name = display_name.into();
        let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        let key = match &email {
            Some(email) => format!("mailto:{}", email.to_lowercase()),
            None => format!("name:{}", display_name.trim().to_lowercase()),
        };
        Self {
            uid: uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, key.as_bytes()).to_string(),
            display_name,
            email,
        }
    }
}

/// Current-user holder with change notifications.
#[derive(Debug, Clone)]
pub struct AuthState {
    tx: watch::Sender<Option<User>>,
}

impl AuthState {
    pub fn new(initial: Option<User>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn signed_out() -> Self {
        Self::new(None)
    }

    pub fn sign_in(&self, user: User) {
        tracing::info!(uid = %user.uid, "signed in");
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
    }

    pub fn current(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every sign-in and sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::signed_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_sign_in_and_out() {
        let auth = AuthState::signed_out();
        let mut rx = auth.subscribe();
        assert!(rx.borrow().is_none());

        let user = User::new("Ada", Some("ada@example.com".into()));
        auth.sign_in(user.clone());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&user));
        assert_eq!(auth.current(), Some(user));

        auth.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(auth.current().is_none());
    }

    #[test]
    fn uid_is_stable_for_the_same_identity() {
        let first = User::new("Ada", Some("ada@example.com".into()));
        let again = User::new("Ada Lovelace", Some(" ADA@example.com ".into()));
        assert_eq!(first.uid, again.uid);
        assert_eq!(again.email.as_deref(), Some("ADA@example.com"));

        let other = User::new("Ada", Some("ada@elsewhere.org".into()));
        assert_ne!(first.uid, other.uid);

        assert_eq!(User::new("Grace", None).uid, User::new(" grace ", None).uid);
        assert_ne!(User::new("Grace", None).uid, User::new("Alan", None).uid);
        assert_eq!(User::new("Grace", Some("  ".into())).email, None);
    }
}
