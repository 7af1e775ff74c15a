//! Thin client for the auth endpoints. The session core never calls these;
//! the runtime logs in first and installs the returned token into the
//! client config.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server rejected the request; `message` comes from its error body.
    #[error("{message}")]
    Rejected { message: String },
}

/// Registration profile for `POST /register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationProfile {
    pub name: String,
    pub email: String,
    pub password: String,
    pub student_reg_number: String,
    pub dob: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exchanges credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<SecretString, AuthError> {
        let response = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        if response.status().is_success() {
            let body: TokenResponse = response.json().await?;
            Ok(SecretString::from(body.token))
        } else {
            Err(Self::rejected(response).await)
        }
    }

    pub async fn register(&self, profile: &RegistrationProfile) -> Result<(), AuthError> {
        let response = self
            .client
            .post(format!("{}/register", self.base_url))
            .json(profile)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejected(response).await)
        }
    }

    async fn rejected(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| format!("request rejected with status {status}"));
        AuthError::Rejected { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_profile_uses_the_wire_field_names() {
        let profile = RegistrationProfile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
            student_reg_number: "REG-7".to_string(),
            dob: "1990-01-01".to_string(),
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["studentRegNumber"], "REG-7");
        assert_eq!(json["dob"], "1990-01-01");
    }
}
