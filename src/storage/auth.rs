use anyhow::{Context, Result};
use log::warn;

use super::LocalStorage;
use crate::models::{AuthSession, User};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

impl LocalStorage {
    pub async fn token(&self) -> Result<Option<String>> {
        Ok(self
            .get_item(TOKEN_KEY)
            .await?
            .filter(|token| !token.is_empty()))
    }

    pub async fn store_session(&self, session: &AuthSession) -> Result<()> {
        self.set_item(TOKEN_KEY, &session.access_token).await?;
        self.cache_user(&session.user).await
    }

    pub async fn cache_user(&self, user: &User) -> Result<()> {
        let user = serde_json::to_string(user).context("failed to serialize user")?;
        self.set_item(USER_KEY, &user).await
    }

    pub async fn clear_token(&self) -> Result<()> {
        self.remove_item(TOKEN_KEY).await
    }

    pub async fn clear_session(&self) -> Result<()> {
        self.remove_item(TOKEN_KEY).await?;
        self.remove_item(USER_KEY).await
    }

    /// Last user seen at login, for rendering navigation before `/users/me`
    /// answers. A corrupt entry is treated as absent.
    pub async fn cached_user(&self) -> Result<Option<User>> {
        let Some(raw) = self.get_item(USER_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(err) => {
                warn!("Ignoring unreadable cached user: {err}");
                Ok(None)
            }
        }
    }
}
