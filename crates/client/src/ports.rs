//! Port implementations backed by the HTTP clients.
//!
//! Transport-level [`Error`](crate::Error)s are mapped into the [`SyncError`] variant that
//! fits each operation.

use async_trait::async_trait;
use oppnote_core::{
    AttachmentContent, AttachmentRef, Opportunity, OpportunitySummary, Session, StoredFile,
    SyncError,
};
use oppnote_session::UserDirectory;
use oppnote_sync::{FileUploader, OpportunityDirectory};
use serde_json::Value;

use crate::{AuthClient, CrmClient, FileUpload};

#[async_trait]
impl FileUploader for CrmClient {
    async fn upload(
        &self,
        session: &Session,
        attachment: &AttachmentRef,
        content: &AttachmentContent,
        opportunity_id: &str,
    ) -> Result<StoredFile, SyncError> {
        let data = content.decode(&attachment.display_name)?;
        let upload = FileUpload {
            data,
            file_name: &attachment.display_name,
            content_type: Some(attachment.mime_type.as_str()).filter(|m| !m.is_empty()),
            opportunity_id,
        };
        self.upload_file(session, upload).await.map_err(|e| {
            e.into_sync_error(|status, message| SyncError::UploadRejected { status, message })
        })
    }
}

#[async_trait]
impl OpportunityDirectory for CrmClient {
    async fn list(&self, session: &Session) -> Result<Vec<OpportunitySummary>, SyncError> {
        self.list_opportunities(session)
            .await
            .map(|page| page.rows)
            .map_err(|e| {
                e.into_sync_error(|status, message| SyncError::DirectoryUnavailable {
                    status,
                    message,
                })
            })
    }

    async fn get_detail(&self, session: &Session, id: &str) -> Result<Opportunity, SyncError> {
        self.get_opportunity(session, id).await.map_err(|e| {
            e.into_sync_error(|status, message| {
                if status == 404 {
                    SyncError::NotFound(id.to_owned())
                } else {
                    SyncError::DirectoryUnavailable { status, message }
                }
            })
        })
    }

    async fn replace_content_blocks(
        &self,
        session: &Session,
        id: &str,
        blocks: Vec<Value>,
    ) -> Result<Opportunity, SyncError> {
        CrmClient::replace_content_blocks(self, session, id, &blocks)
            .await
            .map_err(|e| {
                e.into_sync_error(|status, message| SyncError::UpdateRejected { status, message })
            })
    }
}

#[async_trait]
impl UserDirectory for AuthClient {
    async fn display_name(&self, session: &Session) -> Result<Option<String>, SyncError> {
        let user = self.get_user_data(session).await.map_err(|e| {
            e.into_sync_error(|status, message| SyncError::DirectoryUnavailable { status, message })
        })?;
        Ok(user.display_name().map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    use super::*;
    use crate::testing::MockServer;

    fn session() -> Session {
        Session {
            access_token: "tok".into(),
            refresh_token: String::new(),
            user_id: "u-1".into(),
            user_display_name: None,
            access_token_expiry: String::new(),
            refresh_token_expiry: String::new(),
        }
    }

    fn attachment(name: &str) -> AttachmentRef {
        AttachmentRef {
            id: "att-1".into(),
            display_name: name.into(),
            size_bytes: 5,
            mime_type: "text/plain".into(),
            is_inline: false,
        }
    }

    #[tokio::test]
    async fn missing_opportunity_is_not_found() {
        let server = MockServer::start().await;
        let client = CrmClient::new(&server.base_url).unwrap();
        let handle = tokio::spawn(async move { server.respond_once(404, "").await });

        let err = client.get_detail(&session(), "opp-404").await.unwrap_err();
        handle.await.unwrap();
        assert_eq!(err, SyncError::NotFound("opp-404".into()));
    }

    #[tokio::test]
    async fn rejected_token_is_authorization_expired() {
        let server = MockServer::start().await;
        let client = CrmClient::new(&server.base_url).unwrap();
        let handle = tokio::spawn(async move { server.respond_once(401, "").await });

        let err = client.list(&session()).await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(err, SyncError::AuthorizationExpired(_)), "got {err:?}");
        assert!(err.is_transport_or_auth());
    }

    #[tokio::test]
    async fn list_returns_rows() {
        let server = MockServer::start().await;
        let client = CrmClient::new(&server.base_url).unwrap();
        let body = r#"{"count":1,"rows":[
            {"id":"o-1","name":"Fleet","account":{"legalEntityName":"ACME"}}
        ]}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let rows = client.list(&session()).await.unwrap();
        handle.await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account_name(), "ACME");
    }

    #[tokio::test]
    async fn server_error_on_update_is_update_rejected() {
        let server = MockServer::start().await;
        let client = CrmClient::new(&server.base_url).unwrap();
        let handle =
            tokio::spawn(async move { server.respond_once(500, r#"{"error":"db"}"#).await });

        let err = OpportunityDirectory::replace_content_blocks(&client, &session(), "o-1", vec![])
            .await
            .unwrap_err();
        handle.await.unwrap();
        match err {
            SyncError::UpdateRejected { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("Internal Server Error"));
            }
            other => panic!("expected UpdateRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_payload_never_reaches_the_network() {
        let server = MockServer::start().await;
        let client = CrmClient::new(&server.base_url).unwrap();
        let content = AttachmentContent::new("att-1", "***not base64***");

        let err = client
            .upload(&session(), &attachment("a.txt"), &content, "o-1")
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                SyncError::InvalidAttachmentEncoding { ref file_name, .. } if file_name == "a.txt"
            ),
            "got {err:?}"
        );
        assert!(server.stays_idle(100).await);
    }

    #[tokio::test]
    async fn upload_failure_is_upload_rejected() {
        let server = MockServer::start().await;
        let client = CrmClient::new(&server.base_url).unwrap();
        let content = AttachmentContent::new("att-1", STANDARD.encode(b"hello"));
        let handle = tokio::spawn(async move { server.respond_once(500, "").await });

        let err = client
            .upload(&session(), &attachment("a.txt"), &content, "o-1")
            .await
            .unwrap_err();
        let req = handle.await.unwrap();

        assert!(req.body_text().contains("hello"));
        assert_eq!(
            err,
            SyncError::UploadRejected {
                status: 500,
                message: "Internal Server Error".into(),
            }
        );
        assert_eq!(
            err.to_string(),
            "failed to upload file: HTTP 500: Internal Server Error"
        );
    }

    #[tokio::test]
    async fn display_name_comes_from_user_data() {
        let server = MockServer::start().await;
        let client = AuthClient::new(&server.base_url).unwrap();
        let body = r#"{"data":{"getUserData":{
            "userId":"u-1","id":"u-1","name":"Ada","email":"ada@example.com"
        }}}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, body).await });

        let name = client.display_name(&session()).await.unwrap();
        handle.await.unwrap();
        assert_eq!(name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_connection_error() {
        let base_url = MockServer::start().await.base_url;
        let client = CrmClient::new(base_url).unwrap();
        let err = client.get_detail(&session(), "o-1").await.unwrap_err();
        assert!(matches!(err, SyncError::Connection(_)), "got {err:?}");
    }
}
