//! GraphQL client for the authentication service.

use std::time::Duration;

use oppnote_core::Session;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::{DEFAULT_TIMEOUT, Error, parse_json};

/// Page type the auth service expects for this client.
pub const LOGIN_PAGE_TYPE: &str = "network";

const LOGIN_MUTATION: &str = "mutation login(
  $email: String!
  $pass: String!
  $pageType: pageTypeEnumGQL
) {
  login(email: $email, pass: $pass, pageType: $pageType) {
    token
    exp
    userId
    refreshToken
    expRefresh
  }
}";

const USER_DATA_QUERY: &str = "query getUserData($userId: String!) {
  getUserData(userId: $userId) {
    userId
    id
    name
    email
  }
}";

/// Profile returned by the `getUserData` query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserData {
    /// The display name, if the profile carries a non-blank one.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a, V> {
    operation_name: &'a str,
    variables: V,
    query: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginVariables<'a> {
    email: &'a str,
    pass: &'a str,
    page_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDataVariables<'a> {
    user_id: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

/// Client for the GraphQL authentication endpoint.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: Client,
    endpoint: String,
}

impl AuthClient {
    /// Create a client for `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a client for `endpoint` with a custom request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Self::with_client(endpoint, client)
    }

    /// Create a client that shares an existing reqwest Client.
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Result<Self, Error> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(Error::Configuration("auth URL must not be empty".into()));
        }
        Ok(Self { client, endpoint })
    }

    /// The GraphQL endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange credentials for a session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, Error> {
        let request = GraphQlRequest {
            operation_name: "login",
            variables: LoginVariables {
                email,
                pass: password,
                page_type: LOGIN_PAGE_TYPE,
            },
            query: LOGIN_MUTATION,
        };

        let session: Session = self.execute(None, &request, "login").await?;
        if session.access_token.is_empty() {
            return Err(Error::GraphQl("login returned no token".into()));
        }
        info!(user_id = %session.user_id, "logged in");
        Ok(session)
    }

    /// Fetch the profile of the session's user.
    #[instrument(skip_all, fields(user_id = %session.user_id))]
    pub async fn get_user_data(&self, session: &Session) -> Result<UserData, Error> {
        let request = GraphQlRequest {
            operation_name: "getUserData",
            variables: UserDataVariables {
                user_id: &session.user_id,
            },
            query: USER_DATA_QUERY,
        };

        let user: UserData = self
            .execute(Some(&session.access_token), &request, "getUserData")
            .await?;
        debug!(has_name = user.display_name().is_some(), "fetched user data");
        Ok(user)
    }

    async fn execute<V: Serialize, T: DeserializeOwned>(
        &self,
        token: Option<&str>,
        request: &GraphQlRequest<'_, V>,
        field: &str,
    ) -> Result<T, Error> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?;
        let body: GraphQlResponse = parse_json(response).await?;

        if !body.errors.is_empty() {
            let messages: Vec<&str> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::GraphQl(messages.join("; ")));
        }

        let payload = body
            .data
            .and_then(|mut data| data.get_mut(field).map(Value::take))
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::GraphQl(format!("response has no {field} data")))?;

        serde_json::from_value(payload).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockServer;

    fn session() -> Session {
        Session {
            access_token: "tok-9".into(),
            refresh_token: "r".into(),
            user_id: "u-9".into(),
            user_display_name: None,
            access_token_expiry: String::new(),
            refresh_token_expiry: String::new(),
        }
    }

    #[tokio::test]
    async fn login_posts_mutation_and_returns_session() {
        let server = MockServer::start().await;
        let client = AuthClient::new(format!("{}/graphql", server.base_url)).unwrap();
        let response = r#"{"data":{"login":{
            "token":"tok-1","exp":"1700000000","userId":"u-1",
            "refreshToken":"ref-1","expRefresh":"1800000000"
        }}}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, response).await });

        let session = client.login("ada@example.com", "hunter2").await.unwrap();
        let req = handle.await.unwrap();

        assert_eq!(req.request_line(), "POST /graphql HTTP/1.1");
        assert_eq!(req.header("authorization"), None);
        let body = req.json();
        assert_eq!(body["operationName"], "login");
        assert_eq!(
            body["variables"],
            serde_json::json!({
                "email": "ada@example.com",
                "pass": "hunter2",
                "pageType": "network"
            })
        );
        assert!(body["query"].as_str().unwrap().contains("login(email: $email"));

        assert_eq!(session.access_token, "tok-1");
        assert_eq!(session.user_id, "u-1");
        assert_eq!(session.refresh_token_expiry, "1800000000");
    }

    #[tokio::test]
    async fn login_surfaces_graphql_errors() {
        let server = MockServer::start().await;
        let client = AuthClient::new(&server.base_url).unwrap();
        let response = r#"{"data":{"login":null},"errors":[{"message":"Invalid credentials"}]}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, response).await });

        let err = client.login("ada@example.com", "wrong").await.unwrap_err();
        handle.await.unwrap();
        match err {
            Error::GraphQl(msg) => assert_eq!(msg, "Invalid credentials"),
            other => panic!("expected GraphQl error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_without_data_fails() {
        let server = MockServer::start().await;
        let client = AuthClient::new(&server.base_url).unwrap();
        let handle =
            tokio::spawn(async move { server.respond_once(200, r#"{"data":null}"#).await });

        let err = client.login("ada@example.com", "pw").await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(err, Error::GraphQl(_)));
    }

    #[tokio::test]
    async fn user_data_is_bearer_authorized() {
        let server = MockServer::start().await;
        let client = AuthClient::new(&server.base_url).unwrap();
        let response = r#"{"data":{"getUserData":{
            "userId":"u-9","id":9,"name":"Ada Lovelace","email":"ada@example.com"
        }}}"#;
        let handle = tokio::spawn(async move { server.respond_once(200, response).await });

        let user = client.get_user_data(&session()).await.unwrap();
        let req = handle.await.unwrap();

        assert_eq!(req.header("authorization"), Some("Bearer tok-9"));
        assert_eq!(req.json()["variables"], serde_json::json!({"userId": "u-9"}));
        assert_eq!(user.display_name(), Some("Ada Lovelace"));
        assert_eq!(user.id, Some(serde_json::json!(9)));
    }

    #[test]
    fn blank_name_is_not_a_display_name() {
        let user = UserData {
            name: Some("  ".into()),
            ..UserData::default()
        };
        assert_eq!(user.display_name(), None);
        assert!(AuthClient::new(" ").is_err());
    }
}
