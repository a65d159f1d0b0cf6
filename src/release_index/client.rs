use super::{json, ReleaseIndex};
use crate::cache::{LoadFailure, SingletonCache};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    #[error("fetching list json returned error: {0}")]
    ListJsonFetch(String),
    #[error("cannot parse list json file: {0}")]
    ParseListJson(String),
    #[error("error parsing 'path' field: {0}")]
    Path(url::ParseError),
}

/// Serves the release index from `list_url`, refreshing it once the
/// freshness window has passed.
pub struct ReleaseIndexClient {
    list_url: Url,
    cache: SingletonCache<Arc<ReleaseIndex>, ListError>,
}

impl ReleaseIndexClient {
    pub fn new(list_url: Url, freshness_window: Duration) -> Self {
        let cache = {
            let list_url = list_url.clone();
            SingletonCache::new("release_index", freshness_window, move || {
                let list_url = list_url.clone();
                async move { fetch_index(&list_url).await.map(Arc::new) }
            })
        };
        Self { list_url, cache }
    }

    pub fn list_url(&self) -> &Url {
        &self.list_url
    }

    pub async fn index(&self) -> Result<Arc<ReleaseIndex>, LoadFailure<ListError>> {
        self.cache.get().await
    }

    /// Makes the next [`ReleaseIndexClient::index`] call fetch the list again.
    pub fn refresh(&self) {
        self.cache.invalidate()
    }
}

#[tracing::instrument(level = "info", err)]
async fn fetch_index(list_url: &Url) -> Result<ReleaseIndex, ListError> {
    let list: json::List = reqwest::get(list_url.as_str())
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| ListError::ListJsonFetch(err.to_string()))?
        .json()
        .await
        .map_err(|err| ListError::ParseListJson(err.to_string()))?;
    let index = ReleaseIndex::from_list(list, list_url).map_err(ListError::Path)?;
    tracing::info!(versions = index.len(), "fetched release index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn list_json() -> serde_json::Value {
        json!({
            "builds": [
                {
                    "path": "solc-v0.8.17",
                    "longVersion": "0.8.17+commit.8df45f5f",
                    "sha256": "0x0000000000000000000000000000000000000000000000000000000000000001",
                },
                {
                    "path": "solc-v0.8.18",
                    "longVersion": "0.8.18+commit.87f61d96",
                    "sha256": "0x0000000000000000000000000000000000000000000000000000000000000002",
                }
            ]
        })
    }

    #[tokio::test]
    async fn index_is_fetched_once_inside_window() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_json()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let list_url = Url::parse(&format!("{}/list.json", mock_server.uri())).unwrap();
        let client = ReleaseIndexClient::new(list_url, Duration::from_secs(600));

        let index = client.index().await.expect("index should be fetched");
        assert_eq!(index.len(), 2);
        let build = index.build(&semver::Version::new(0, 8, 18)).unwrap();
        assert_eq!(build.url.as_str(), format!("{}/solc-v0.8.18", mock_server.uri()));

        let again = client.index().await.unwrap();
        assert!(Arc::ptr_eq(&index, &again));
    }

    #[tokio::test]
    async fn refresh_fetches_again() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list_json()))
            .expect(2)
            .mount(&mock_server)
            .await;

        let list_url = Url::parse(&format!("{}/list.json", mock_server.uri())).unwrap();
        let client = ReleaseIndexClient::new(list_url, Duration::from_secs(600));
        client.index().await.unwrap();
        client.refresh();
        client.index().await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let list_url = Url::parse(&format!("{}/list.json", mock_server.uri())).unwrap();
        let client = ReleaseIndexClient::new(list_url, Duration::from_secs(600));
        let err = client.index().await.unwrap_err();
        assert!(
            matches!(err, LoadFailure::Loader(ListError::ListJsonFetch(_))),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn malformed_list_is_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a json"))
            .mount(&mock_server)
            .await;

        let list_url = Url::parse(&format!("{}/list.json", mock_server.uri())).unwrap();
        let client = ReleaseIndexClient::new(list_url, Duration::from_secs(600));
        let err = client.index().await.unwrap_err();
        assert!(
            matches!(err, LoadFailure::Loader(ListError::ParseListJson(_))),
            "unexpected error: {err:?}"
        );
    }
}
