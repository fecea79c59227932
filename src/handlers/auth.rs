use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::config::AuthConfig;

/// State for the login stub
#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthConfig,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Hardcoded-credential login stub. Successful logins are pointed at the
/// admin panel; this is a boundary placeholder, not an authentication system.
#[instrument(name = "login", skip(state, request), fields(username = %request.username))]
pub async fn login(
    State(state): State<AuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if request.username == state.auth.admin_username
        && request.password == state.auth.admin_password
    {
        crate::info_with_trace!("Admin login accepted");
        Ok(Json(json!({
            "message": "Login successful",
            "redirect": "/api/admin/reservations",
        })))
    } else {
        crate::warn_with_trace!("Login rejected");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid credentials",
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AuthState {
        AuthState {
            auth: AuthConfig {
                admin_username: "admin".to_string(),
                admin_password: "adminpass".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_login_accepts_configured_credentials() {
        let result = login(
            State(test_state()),
            Json(LoginRequest {
                username: "admin".to_string(),
                password: "adminpass".to_string(),
            }),
        )
        .await;

        assert!(result.is_ok());
        let body = result.unwrap();
        assert_eq!(body["redirect"], "/api/admin/reservations");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let result = login(
            State(test_state()),
            Json(LoginRequest {
                username: "admin".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await;

        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
