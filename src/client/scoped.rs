//! Endpoints specific to the authenticated user. Each of them requires the user to have granted one or more
//! [scopes](crate::scope::Scope).

use reqwest::Method;
use serde_json::Value;

use super::{
    SpotifyClient, API_CURRENTLY_PLAYING_ENDPOINT, API_CURRENT_USER_ENDPOINT, API_PLAYER_DEVICES_ENDPOINT,
    API_PLAYER_ENDPOINT, API_PLAYER_NEXT_ENDPOINT, API_PLAYER_PAUSE_ENDPOINT, API_PLAYER_PREVIOUS_ENDPOINT,
    API_PLAYER_QUEUE_ENDPOINT, API_RECENTLY_PLAYED_ENDPOINT,
};
use crate::{error::Result, scope::Scope};

impl SpotifyClient {
    /// Get information about the user's current playback state, including track or episode, progress, and active
    /// device. Returns `None` if nothing is playing.
    ///
    /// Required scope: [UserReadPlaybackState](Scope::UserReadPlaybackState).
    pub async fn playback_state(&self, market: Option<&str>) -> Result<Option<Value>> {
        self.require_scopes(&[Scope::UserReadPlaybackState])?;
        self.call(Method::GET, API_PLAYER_ENDPOINT, &market_query(market), None)
            .await
    }

    /// Get the object currently being played on the user's Spotify account. Returns `None` if nothing is playing.
    ///
    /// Required scope: [UserReadCurrentlyPlaying](Scope::UserReadCurrentlyPlaying).
    pub async fn currently_playing(&self, market: Option<&str>) -> Result<Option<Value>> {
        self.require_scopes(&[Scope::UserReadCurrentlyPlaying])?;
        self.call(Method::GET, API_CURRENTLY_PLAYING_ENDPOINT, &market_query(market), None)
            .await
    }

    /// Get information about the user's available devices.
    ///
    /// Required scope: [UserReadPlaybackState](Scope::UserReadPlaybackState).
    pub async fn available_devices(&self) -> Result<Option<Value>> {
        self.require_scopes(&[Scope::UserReadPlaybackState])?;
        self.call(Method::GET, API_PLAYER_DEVICES_ENDPOINT, &[], None).await
    }

    /// Get the currently playing item and the items in the user's queue.
    ///
    /// Required scope: [UserReadPlaybackState](Scope::UserReadPlaybackState).
    pub async fn queue(&self) -> Result<Option<Value>> {
        self.require_scopes(&[Scope::UserReadPlaybackState])?;
        self.call(Method::GET, API_PLAYER_QUEUE_ENDPOINT, &[], None).await
    }

    /// Pause playback on the given device, or the active device if none is given.
    ///
    /// Required scope: [UserModifyPlaybackState](Scope::UserModifyPlaybackState).
    pub async fn pause(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(Method::PUT, API_PLAYER_PAUSE_ENDPOINT, &device_query(device_id))
            .await
    }

    /// Skip to the next item in the user's queue.
    ///
    /// Required scope: [UserModifyPlaybackState](Scope::UserModifyPlaybackState).
    pub async fn next(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(Method::POST, API_PLAYER_NEXT_ENDPOINT, &device_query(device_id))
            .await
    }

    /// Skip to the previous item in the user's queue.
    ///
    /// Required scope: [UserModifyPlaybackState](Scope::UserModifyPlaybackState).
    pub async fn previous(&self, device_id: Option<&str>) -> Result<()> {
        self.player_command(Method::POST, API_PLAYER_PREVIOUS_ENDPOINT, &device_query(device_id))
            .await
    }

    /// Add a track or an episode, given by its Spotify URI, to the end of the user's queue.
    ///
    /// Required scope: [UserModifyPlaybackState](Scope::UserModifyPlaybackState).
    pub async fn add_to_queue(&self, uri: &str, device_id: Option<&str>) -> Result<()> {
        let mut query = vec![("uri", uri)];
        query.extend(device_query(device_id));

        self.player_command(Method::POST, API_PLAYER_QUEUE_ENDPOINT, &query).await
    }

    /// Get the tracks the user has recently played, at most `limit` of them (1 to 50) if given.
    ///
    /// Required scope: [UserReadRecentlyPlayed](Scope::UserReadRecentlyPlayed).
    pub async fn recently_played(&self, limit: Option<u32>) -> Result<Option<Value>> {
        self.require_scopes(&[Scope::UserReadRecentlyPlayed])?;

        let limit = limit.map(|limit| limit.clamp(1, 50).to_string());
        let query: Vec<(&str, &str)> = limit.as_deref().map(|limit| ("limit", limit)).into_iter().collect();

        self.call(Method::GET, API_RECENTLY_PLAYED_ENDPOINT, &query, None)
            .await
    }

    /// Get the profile of the current user.
    ///
    /// Required scopes: [UserReadPrivate](Scope::UserReadPrivate) and [UserReadEmail](Scope::UserReadEmail).
    pub async fn current_user(&self) -> Result<Option<Value>> {
        self.require_scopes(&[Scope::UserReadPrivate, Scope::UserReadEmail])?;
        self.call(Method::GET, API_CURRENT_USER_ENDPOINT, &[], None).await
    }

    async fn player_command(&self, method: Method, path: &str, query: &[(&str, &str)]) -> Result<()> {
        self.require_scopes(&[Scope::UserModifyPlaybackState])?;
        self.call(method, path, query, None).await?;

        Ok(())
    }
}

pub(super) fn market_query(market: Option<&str>) -> Vec<(&'static str, &str)> {
    market.map(|market| ("market", market)).into_iter().collect()
}

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, &str)> {
    device_id.map(|device_id| ("device_id", device_id)).into_iter().collect()
}
