//! Endpoints that don't require any scope. They still require an access token.

use reqwest::Method;
use serde_json::Value;

use super::{scoped::market_query, SpotifyClient, API_SEARCH_ENDPOINT, API_TRACKS_ENDPOINT, API_USERS_ENDPOINT};
use crate::error::{Error, Result};

const MAX_TRACKS_PER_REQUEST: usize = 50;

impl SpotifyClient {
    /// Get the public profile of a user.
    pub async fn user_profile(&self, user_id: &str) -> Result<Option<Value>> {
        let path = super::resource_path(API_USERS_ENDPOINT, user_id)?;
        self.call(Method::GET, &path, &[], None).await
    }

    /// Get catalog information for a single track.
    pub async fn track(&self, track_id: &str, market: Option<&str>) -> Result<Option<Value>> {
        let path = super::resource_path(API_TRACKS_ENDPOINT, track_id)?;
        self.call(Method::GET, &path, &market_query(market), None).await
    }

    /// Get catalog information for several tracks, at most 50 at once.
    pub async fn tracks<I, S>(&self, track_ids: I, market: Option<&str>) -> Result<Option<Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = track_ids.into_iter().map(|id| id.as_ref().to_owned()).collect();

        if ids.is_empty() || ids.len() > MAX_TRACKS_PER_REQUEST {
            return Err(Error::Configuration(format!(
                "between 1 and {} track IDs may be requested at once, got {}",
                MAX_TRACKS_PER_REQUEST,
                ids.len()
            )));
        }

        let ids = ids.join(",");
        let mut query = vec![("ids", ids.as_str())];
        query.extend(market_query(market));

        self.call(Method::GET, API_TRACKS_ENDPOINT, &query, None).await
    }

    /// Search the catalog for items of the given types (e.g. `track`, `album`, `artist`) matching a query.
    pub async fn search<I, S>(&self, query: &str, types: I, limit: Option<u32>) -> Result<Option<Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types = types
            .into_iter()
            .map(|item_type| item_type.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(",");

        if types.is_empty() {
            return Err(Error::Configuration("a search requires at least one item type".to_owned()));
        }

        let limit = limit.map(|limit| limit.clamp(1, 50).to_string());
        let mut search_query = vec![("q", query), ("type", types.as_str())];
        if let Some(limit) = limit.as_deref() {
            search_query.push(("limit", limit));
        }

        self.call(Method::GET, API_SEARCH_ENDPOINT, &search_query, None)
            .await
    }
}
