//! Session helpers: login state, one-shot flash messages and the CSRF token.
//!
//! All state lives server-side in the `tower-sessions` store; the browser only
//! holds the opaque session cookie.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppResult;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "armory_session";

const USER_KEY: &str = "user_id";
const FLASH_KEY: &str = "flash";
const CSRF_KEY: &str = "csrf_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: FlashKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: FlashKind::Error, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: FlashKind::Info, text: text.into() }
    }
}

/// login_session
///
/// Issues a fresh session id before storing the user, so an id planted
/// before login is useless afterwards.
pub async fn login_session(session: &Session, user_id: Uuid) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_KEY, user_id).await?;
    Ok(())
}

/// Drops every key and deletes the session record.
pub async fn logout_session(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}

/// The logged-in user id, if any. Store errors read as "not logged in".
pub async fn session_user_id(session: &Session) -> Option<Uuid> {
    session.get::<Uuid>(USER_KEY).await.ok().flatten()
}

pub async fn push_flash(session: &Session, message: FlashMessage) -> AppResult<()> {
    let mut pending: Vec<FlashMessage> = session.get(FLASH_KEY).await?.unwrap_or_default();
    pending.push(message);
    session.insert(FLASH_KEY, pending).await?;
    Ok(())
}

/// take_flashes
///
/// Returns all pending messages and clears them.
pub async fn take_flashes(session: &Session) -> AppResult<Vec<FlashMessage>> {
    Ok(session
        .remove::<Vec<FlashMessage>>(FLASH_KEY)
        .await?
        .unwrap_or_default())
}

/// The token already stored in the session, without creating one.
pub async fn existing_csrf_token(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get::<String>(CSRF_KEY).await?)
}

/// csrf_token
///
/// The per-session token, generated on first use. Generating one writes the
/// session, so only call this when a page that needs the token is rendered.
pub async fn csrf_token(session: &Session) -> AppResult<String> {
    if let Some(token) = existing_csrf_token(session).await? {
        return Ok(token);
    }
    let token = generate_token();
    session.insert(CSRF_KEY, &token).await?;
    Ok(token)
}

/// Compares a submitted token with the session's without short-circuiting.
pub fn tokens_match(expected: &str, submitted: &str) -> bool {
    expected.len() == submitted.len()
        && expected
            .bytes()
            .zip(submitted.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn flashes_are_one_shot() {
        let session = session();
        push_flash(&session, FlashMessage::success("Saved.")).await.unwrap();
        push_flash(&session, FlashMessage::error("But also this.")).await.unwrap();

        let first = take_flashes(&session).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].kind, FlashKind::Success);
        assert!(take_flashes(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn csrf_token_is_stable_within_a_session() {
        let session = session();
        let first = csrf_token(&session).await.unwrap();
        let second = csrf_token(&session).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let other = csrf_token(&self::session()).await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn reading_the_token_does_not_create_one() {
        let session = session();
        assert_eq!(existing_csrf_token(&session).await.unwrap(), None);
        assert!(session.is_empty().await);

        let minted = csrf_token(&session).await.unwrap();
        assert_eq!(existing_csrf_token(&session).await.unwrap(), Some(minted));
    }

    #[tokio::test]
    async fn login_and_logout_round_trip() {
        let session = session();
        let id = Uuid::new_v4();
        assert_eq!(session_user_id(&session).await, None);
        login_session(&session, id).await.unwrap();
        assert_eq!(session_user_id(&session).await, Some(id));
        logout_session(&session).await.unwrap();
        assert_eq!(session_user_id(&session).await, None);
    }

    #[test]
    fn token_comparison() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "ab"));
    }
}
