//! Supabase REST API client using service_role key

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;

/// Supabase client for server-side record operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_role_key: config.supabase_service_role_key.clone(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Make an authenticated GET request expecting at most one row.
    /// `filters` are PostgREST query pairs such as `("name", "eq.alice")`.
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>, SupabaseError> {
        let response = self
            .client
            .get(self.rest_url(table))
            .query(filters)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api { status: status.as_u16(), body });
        }

        response.json().await.map(Some).map_err(SupabaseError::Parse)
    }

    /// Make an authenticated POST request (insert)
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, SupabaseError> {
        let response = self
            .client
            .post(self.rest_url(table))
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(SupabaseError::Conflict);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api { status: status.as_u16(), body });
        }

        // PostgREST returns an array, get first element
        let results: Vec<R> = response.json().await.map_err(SupabaseError::Parse)?;
        results
            .into_iter()
            .next()
            .ok_or(SupabaseError::NoRowReturned)
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Row violates a unique constraint")]
    Conflict,

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> Config {
        Config::from_lookup(|key| match key {
            "SUPABASE_URL" => Some(url.to_string()),
            "SUPABASE_SERVICE_ROLE_KEY" => Some("key".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn rest_url_joins_table() {
        let client = SupabaseClient::new(&config("https://db.example.test/"));
        assert_eq!(client.rest_url("players"), "https://db.example.test/rest/v1/players");
    }
}
