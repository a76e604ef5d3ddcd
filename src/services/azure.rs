//! Azure Blob Storage over plain REST, authorized by a SAS URL.

use crate::error::StoreError;
use crate::services::store::BlobStore;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_VERSION: &str = "2021-08-06";
const UPLOAD_TIMEOUT_SEC: u64 = 60;

/// Writes block blobs with `PUT {account}/{container}/{blob}?{sas}`.
///
/// The SAS URL is either account-scoped (`https://acct.blob.core.windows.net/?sv=..`)
/// or container-scoped (`https://acct.blob.core.windows.net/rawscrape?sv=..`); a
/// container-scoped URL only accepts writes to its own container.
pub struct AzureBlobStore {
    client: Client,
    endpoint: Url,
    scoped_container: Option<String>,
}

impl std::fmt::Debug for AzureBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The query string carries the signature.
        f.debug_struct("AzureBlobStore")
            .field("endpoint", &self.endpoint_without_sas())
            .field("scoped_container", &self.scoped_container)
            .finish()
    }
}

impl AzureBlobStore {
    pub fn from_sas_url(sas_url: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SEC))
            .build()?;
        Self::with_client(client, sas_url)
    }

    pub fn with_client(client: Client, sas_url: &str) -> Result<Self, StoreError> {
        let endpoint =
            Url::parse(sas_url).map_err(|_| StoreError::InvalidUrl("unparsable SAS url".into()))?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StoreError::InvalidUrl("SAS url must be http(s)".into()));
        }
        if endpoint.query().map_or(true, str::is_empty) {
            return Err(StoreError::InvalidUrl("SAS url carries no token".into()));
        }

        let segments: Vec<String> = endpoint
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        let scoped_container = match segments.as_slice() {
            [] => None,
            [container] => Some(container.clone()),
            _ => {
                return Err(StoreError::InvalidUrl(
                    "SAS url path must be empty or a single container".into(),
                ))
            }
        };

        Ok(Self {
            client,
            endpoint,
            scoped_container,
        })
    }

    fn endpoint_without_sas(&self) -> String {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.to_string()
    }

    /// Full request URL for a blob, SAS token included.
    pub(crate) fn blob_url(&self, container: &str, blob_name: &str) -> Result<Url, StoreError> {
        if let Some(scoped) = &self.scoped_container {
            if scoped != container {
                return Err(StoreError::InvalidUrl(format!(
                    "SAS url is scoped to container {scoped}, not {container}"
                )));
            }
        }

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl("SAS url cannot be a base".into()))?
            .clear()
            .push(container)
            .push(blob_name);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn write(
        &self,
        container: &str,
        blob_name: &str,
        payload: Vec<u8>,
    ) -> Result<(), StoreError> {
        let url = self.blob_url(container, blob_name)?;
        debug!(container, blob_name, bytes = payload.len(), "uploading blob");

        let response = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn sas_query() -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("sv".into(), "2022-11-02".into()),
            Matcher::UrlEncoded("sig".into(), "abc".into()),
        ])
    }

    #[test]
    fn blob_url_keeps_sas_and_encodes_segments() {
        let store =
            AzureBlobStore::from_sas_url("https://acct.blob.core.windows.net/?sv=2022-11-02&sig=abc")
                .unwrap();
        let url = store.blob_url("rawscrape", "science.programs.x y").unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/rawscrape/science.programs.x%20y?sv=2022-11-02&sig=abc"
        );
    }

    #[test]
    fn container_scoped_sas_only_writes_its_container() {
        let store = AzureBlobStore::from_sas_url(
            "https://acct.blob.core.windows.net/rawscrape?sv=2022-11-02&sig=abc",
        )
        .unwrap();
        assert!(store.blob_url("rawscrape", "a").is_ok());
        assert!(matches!(
            store.blob_url("other", "a"),
            Err(StoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn rejects_urls_without_token_or_with_deep_paths() {
        assert!(AzureBlobStore::from_sas_url("https://acct.blob.core.windows.net/").is_err());
        assert!(AzureBlobStore::from_sas_url("https://acct.blob.core.windows.net/a/b?sig=x").is_err());
        assert!(AzureBlobStore::from_sas_url("not a url").is_err());
    }

    #[test]
    fn debug_hides_signature() {
        let store =
            AzureBlobStore::from_sas_url("https://acct.blob.core.windows.net/?sv=1&sig=secret")
                .unwrap();
        assert!(!format!("{store:?}").contains("secret"));
    }

    #[tokio::test]
    async fn write_puts_block_blob() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/rawscrape/science.programs.x")
            .match_query(sas_query())
            .match_header("x-ms-blob-type", "BlockBlob")
            .match_header("content-type", "application/json")
            .match_body(r#"{"link":"u","html":"t"}"#)
            .with_status(201)
            .create_async()
            .await;

        let store =
            AzureBlobStore::from_sas_url(&format!("{}/?sv=2022-11-02&sig=abc", server.url()))
                .unwrap();
        store
            .write(
                "rawscrape",
                "science.programs.x",
                br#"{"link":"u","html":"t"}"#.to_vec(),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn write_surfaces_rejections() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/rawscrape/x")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("AuthenticationFailed")
            .create_async()
            .await;

        let store =
            AzureBlobStore::from_sas_url(&format!("{}/?sv=2022-11-02&sig=abc", server.url()))
                .unwrap();
        let err = store.write("rawscrape", "x", vec![]).await.unwrap_err();
        match err {
            StoreError::Status { code, body } => {
                assert_eq!(code, 403);
                assert!(body.contains("AuthenticationFailed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
