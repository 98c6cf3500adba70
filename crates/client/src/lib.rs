//! HTTP clients for the CRM behind oppnote.
//!
//! [`CrmClient`] talks to the REST API (opportunities and file uploads) and
//! [`AuthClient`] to the GraphQL authentication endpoint. Both implement the
//! ports the sync workflow and session store consume.
//!
//! # Quick Start
//!
//! ```no_run
//! use oppnote_client::{AuthClient, CrmClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), oppnote_client::Error> {
//!     let auth = AuthClient::new("https://api.example.com/graphql")?;
//!     let session = auth.login("ada@example.com", "hunter2").await?;
//!
//!     let crm = CrmClient::new("https://crm.example.com")?;
//!     let page = crm.list_opportunities(&session).await?;
//!     for row in page.rows {
//!         println!("{} ({})", row.name, row.account_name());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! ```no_run
//! use oppnote_client::CrmClientBuilder;
//! use std::time::Duration;
//!
//! let client = CrmClientBuilder::new("https://crm.example.com")
//!     .timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//! ```

pub mod auth;
mod error;
mod ports;

pub use auth::{AuthClient, UserData};
pub use error::Error;

use std::time::Duration;

use bytes::Bytes;
use oppnote_core::{Opportunity, OpportunityPage, Session, StoredFile};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `description` field sent with every upload.
pub const UPLOAD_DESCRIPTION: &str = "Uploaded from email";

/// `parentEntity` marker identifying opportunities as the owner kind.
pub const OPPORTUNITY_ENTITY: &str = "CRM_OPPORTUNITIES";

/// Maximum number of response body bytes quoted in error messages.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the CRM REST API.
#[derive(Debug, Clone)]
pub struct CrmClient {
    client: Client,
    base_url: String,
}

/// Builder for configuring a [`CrmClient`].
#[derive(Debug)]
pub struct CrmClientBuilder {
    base_url: String,
    timeout: Duration,
    client: Option<Client>,
}

impl CrmClientBuilder {
    /// Create a new builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: None,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a custom reqwest Client.
    ///
    /// Useful for configuring TLS, proxies, or sharing a connection pool with
    /// the [`AuthClient`].
    #[must_use]
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<CrmClient, Error> {
        if self.base_url.is_empty() {
            return Err(Error::Configuration("base URL must not be empty".into()));
        }
        let client = match self.client {
            Some(c) => c,
            None => Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| Error::Configuration(e.to_string()))?,
        };

        Ok(CrmClient {
            client,
            base_url: self.base_url,
        })
    }
}

/// A file to store against an opportunity.
#[derive(Debug, Clone)]
pub struct FileUpload<'a> {
    /// Decoded file content. Must not be empty.
    pub data: Bytes,
    /// File name. Must not be empty.
    pub file_name: &'a str,
    /// MIME type, when known.
    pub content_type: Option<&'a str>,
    /// Opportunity that will own the file.
    pub opportunity_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentBlocksUpdate<'a> {
    content_blocks: &'a [Value],
}

impl CrmClient {
    /// Create a new client with default configuration.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        CrmClientBuilder::new(base_url).build()
    }

    /// Create a builder for advanced configuration.
    pub fn builder(base_url: impl Into<String>) -> CrmClientBuilder {
        CrmClientBuilder::new(base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn opportunity_url(&self, id: &str) -> String {
        format!(
            "{}/api/v1/crm/opportunities/{}",
            self.base_url,
            utf8_percent_encode(id, NON_ALPHANUMERIC)
        )
    }

    // =========================================================================
    // Opportunities
    // =========================================================================

    /// List opportunities visible to the session.
    #[instrument(skip_all)]
    pub async fn list_opportunities(&self, session: &Session) -> Result<OpportunityPage, Error> {
        let url = format!("{}/api/v1/crm/opportunities", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let page: OpportunityPage = parse_json(response).await?;
        debug!(count = page.count, rows = page.rows.len(), "listed opportunities");
        Ok(page)
    }

    /// Fetch one opportunity with its content-block history.
    #[instrument(skip(self, session))]
    pub async fn get_opportunity(&self, session: &Session, id: &str) -> Result<Opportunity, Error> {
        let response = self
            .client
            .get(self.opportunity_url(id))
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let opportunity: Opportunity = parse_json(response).await?;
        debug!(blocks = opportunity.history_len(), "fetched opportunity");
        Ok(opportunity)
    }

    /// Overwrite an opportunity's content-block history.
    ///
    /// The server's response is returned when it is an opportunity record;
    /// otherwise the record is reconstructed from `id` and `blocks`, since the
    /// update itself succeeded.
    #[instrument(skip(self, session, blocks), fields(blocks = blocks.len()))]
    pub async fn replace_content_blocks(
        &self,
        session: &Session,
        id: &str,
        blocks: &[Value],
    ) -> Result<Opportunity, Error> {
        let response = self
            .client
            .put(self.opportunity_url(id))
            .bearer_auth(&session.access_token)
            .json(&ContentBlocksUpdate {
                content_blocks: blocks,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        match serde_json::from_str::<Opportunity>(&body) {
            Ok(opportunity) => Ok(opportunity),
            Err(e) => {
                debug!(error = %e, "update response is not an opportunity record");
                Ok(Opportunity {
                    id: id.to_owned(),
                    name: String::new(),
                    account: None,
                    content_blocks: Some(blocks.to_vec()),
                    extra: serde_json::Map::new(),
                })
            }
        }
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Store a file as a private attachment of an opportunity.
    #[instrument(
        skip(self, session, upload),
        fields(
            file_name = upload.file_name,
            bytes = upload.data.len(),
            opportunity_id = upload.opportunity_id
        )
    )]
    pub async fn upload_file(
        &self,
        session: &Session,
        upload: FileUpload<'_>,
    ) -> Result<StoredFile, Error> {
        if upload.data.is_empty() {
            return Err(Error::InvalidInput("file content must not be empty".into()));
        }
        if upload.file_name.trim().is_empty() {
            return Err(Error::InvalidInput("file name must not be empty".into()));
        }

        let file_name = upload.file_name.to_owned();
        let part = Part::bytes(upload.data.to_vec()).file_name(file_name.clone());
        let part = match upload.content_type {
            Some(mime) => part.mime_str(mime).unwrap_or_else(|_| {
                debug!(mime, "ignoring unparsable content type");
                Part::bytes(upload.data.to_vec()).file_name(file_name)
            }),
            None => part,
        };

        let form = Form::new()
            .part("file", part)
            .text("description", UPLOAD_DESCRIPTION)
            .text("parentEntity", OPPORTUNITY_ENTITY)
            .text("parentEntityId", upload.opportunity_id.to_owned())
            .text("isPublic", "false");

        let url = format!("{}/api/v1/helper/files", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .multipart(form)
            .send()
            .await?;

        let file: StoredFile = parse_json(response).await?;
        debug!(file_id = %file.file_id, "file stored");
        Ok(file)
    }
}

/// Turn a non-success response into [`Error::Http`], quoting the reason
/// phrase and a bounded prefix of the body.
pub(crate) async fn error_from_response(response: reqwest::Response) -> Error {
    let status = response.status();
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();

    let message = if body.is_empty() {
        reason.to_owned()
    } else {
        let quoted: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{reason}: {quoted}")
    };

    Error::Http {
        status: status.as_u16(),
        message,
    }
}

/// Parse a success response as JSON, or convert a failure into an error.
pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, Error> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Deserialization(e.to_string()))
}
