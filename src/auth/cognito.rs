//! Cognito user pool client over its JSON API.
//!
//! Every call is a POST to the regional endpoint with the operation named in
//! the `X-Amz-Target` header. Sign-in uses `USER_PASSWORD_AUTH`, which must
//! be enabled on the app client.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::{IdentityProvider, Tokens};
use crate::error::AuthError;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Clone)]
pub struct CognitoProvider {
    http: Client,
    endpoint: String,
    client_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuth<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: Value,
}

/// Regional endpoint URL.
pub fn regional_endpoint(region: &str) -> String {
    format!("https://cognito-idp.{}.amazonaws.com/", region)
}

/// Region a user pool lives in, taken from its id (`us-east-1_AbC123`).
pub fn region_from_pool_id(user_pool_id: &str) -> Option<&str> {
    user_pool_id
        .split_once('_')
        .map(|(region, _)| region)
        .filter(|region| !region.is_empty())
}

/// Map a provider error body onto an [`AuthError`]. The `__type` may carry a
/// namespace prefix separated by `#`.
pub fn provider_error(body: &str) -> AuthError {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let kind = value
        .get("__type")
        .and_then(Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t))
        .unwrap_or("UnknownError")
        .to_string();
    let message = value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();

    match kind.as_str() {
        "NotAuthorizedException" | "UserNotFoundException" => AuthError::InvalidCredentials,
        "CodeMismatchException" => AuthError::CodeMismatch,
        "ExpiredCodeException" => AuthError::ExpiredCode,
        "UsernameExistsException" => AuthError::UserExists,
        "UserNotConfirmedException" => AuthError::NotConfirmed,
        _ => AuthError::Provider { kind, message },
    }
}

impl CognitoProvider {
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        debug!(operation, endpoint = %self.endpoint, "calling identity provider");
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            debug!(operation, status = status.as_u16(), "identity provider rejected request");
            return Err(provider_error(&text));
        }
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    async fn initiate_auth(&self, flow: &str, parameters: Value) -> Result<Tokens, AuthError> {
        let request = InitiateAuth {
            auth_flow: flow,
            client_id: &self.client_id,
            auth_parameters: parameters,
        };
        let response: InitiateAuthResponse = self.call("InitiateAuth", &request).await?;
        if let Some(challenge) = response.challenge_name {
            return Err(AuthError::Provider {
                kind: challenge,
                message: "additional sign-in challenge is not supported".to_string(),
            });
        }
        let result = response.authentication_result.ok_or_else(|| AuthError::Provider {
            kind: "InitiateAuth".to_string(),
            message: "response carried no tokens".to_string(),
        })?;
        Ok(Tokens {
            id_token: result.id_token,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
        })
    }
}

impl IdentityProvider for CognitoProvider {
    async fn sign_in(&self, username: &str, password: &str) -> Result<Tokens, AuthError> {
        self.initiate_auth(
            "USER_PASSWORD_AUTH",
            json!({ "USERNAME": username, "PASSWORD": password }),
        )
        .await
    }

    async fn refresh(&self, username: &str, refresh_token: &str) -> Result<Tokens, AuthError> {
        let result = self
            .initiate_auth(
                "REFRESH_TOKEN_AUTH",
                json!({ "USERNAME": username, "REFRESH_TOKEN": refresh_token }),
            )
            .await;
        match result {
            Err(AuthError::InvalidCredentials) => Err(AuthError::SessionInvalid),
            other => other,
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _: Value = self
            .call(
                "SignUp",
                &json!({
                    "ClientId": self.client_id,
                    "Username": email,
                    "Password": password,
                    "UserAttributes": [{ "Name": "email", "Value": email }],
                }),
            )
            .await?;
        Ok(())
    }

    async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let _: Value = self
            .call(
                "ConfirmSignUp",
                &json!({
                    "ClientId": self.client_id,
                    "Username": email,
                    "ConfirmationCode": code,
                    "ForceAliasCreation": true,
                }),
            )
            .await?;
        Ok(())
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let _: Value = self
            .call(
                "ForgotPassword",
                &json!({ "ClientId": self.client_id, "Username": email }),
            )
            .await?;
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let _: Value = self
            .call(
                "ConfirmForgotPassword",
                &json!({
                    "ClientId": self.client_id,
                    "Username": email,
                    "ConfirmationCode": code,
                    "Password": new_password,
                }),
            )
            .await?;
        Ok(())
    }
}
