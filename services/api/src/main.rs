//! Mock tutoring backend: speaks the session wire protocol over `/ws` and
//! serves the auth endpoints, so the client can be exercised end to end
//! without the real service.

use axum::{
    Json, Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mentor_realtime_types::{OutgoingQuery, ResponseFrame};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Handles WebSocket upgrade requests for the tutoring endpoint.
async fn ws_handler(ws: WebSocketUpgrade) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(handle_socket)
}

/// Serves one tutoring conversation: decode each query, reply with a canned
/// response in the matching delivery mode.
async fn handle_socket(mut socket: WebSocket) {
    info!("WebSocket connection established");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                info!("WebSocket error: {}", e);
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                let query: OutgoingQuery = match serde_json::from_str(&text) {
                    Ok(query) => query,
                    Err(e) => {
                        warn!("ignoring undecodable query: {}", e);
                        continue;
                    }
                };
                let reply = respond_to(&query);
                let body = match serde_json::to_string(&reply) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("failed to serialize reply: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(body.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("WebSocket connection closed");
}

/// Canned tutoring replies. Voice queries get a voice-mode response; the
/// audio payload is left out because this mock has no synthesizer.
fn respond_to(query: &OutgoingQuery) -> ResponseFrame {
    let seen = if query.frame().is_some() {
        " I can see your shared screen."
    } else {
        ""
    };
    let text = format!(
        "Let's work through \"{}\" step by step.{}",
        query.question(),
        seen
    );
    let mode = if query.is_voice() { "voice" } else { "text" };
    ResponseFrame::new(&text, mode)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    #[serde(rename = "studentRegNumber")]
    student_reg_number: String,
    dob: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

fn rejected(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            message: message.to_string(),
        }),
    )
        .into_response()
}

async fn login(Json(request): Json<LoginRequest>) -> Response {
    if request.email.is_empty() || request.password.len() < 8 {
        return rejected(StatusCode::UNAUTHORIZED, "invalid email or password");
    }
    info!("issuing demo token for {}", request.email);
    Json(TokenResponse {
        token: format!("demo-{}", request.email.replace('@', "-at-")),
    })
    .into_response()
}

async fn register(Json(request): Json<RegisterRequest>) -> Response {
    if request.name.is_empty()
        || request.email.is_empty()
        || request.student_reg_number.is_empty()
        || request.dob.is_empty()
    {
        return rejected(StatusCode::BAD_REQUEST, "all fields are required");
    }
    if request.password.len() < 8 {
        return rejected(
            StatusCode::BAD_REQUEST,
            "password must be at least 8 characters",
        );
    }
    info!("registered demo student {}", request.email);
    StatusCode::CREATED.into_response()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // permissive CORS so a separate frontend can reach the endpoints
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/login", post(login))
        .route("/register", post(register))
        .layer(cors);

    let addr = "0.0.0.0:3000";
    info!("Starting tutoring mock backend, listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_queries_get_voice_mode_replies() {
        let reply = respond_to(&OutgoingQuery::voice("what is dns", None));
        assert_eq!(reply.mode(), "voice");
        assert!(reply.audio().is_none());
    }

    #[test]
    fn replies_acknowledge_an_attached_frame() {
        let reply = respond_to(&OutgoingQuery::text("explain this", Some("Zg==".to_string())));
        assert!(reply.text().contains("shared screen"));
    }
}
