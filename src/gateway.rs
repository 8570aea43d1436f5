use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::GameConfig;
use crate::game::{GameCommand, GameEvent, SessionHandle};
use crate::types::{ClientMsg, ServerMsg};

#[derive(Clone)]
pub struct AppState {
    session: SessionHandle,
    teacher_password: Arc<str>,
    max_timer_seconds: u32,
}

impl AppState {
    pub fn new(session: SessionHandle, config: &GameConfig) -> Self {
        Self {
            session,
            teacher_password: Arc::from(config.teacher_password.as_str()),
            max_timer_seconds: config.max_timer_seconds,
        }
    }
}

type Sender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Builds the HTTP app: the `/ws` endpoint plus, when the directory exists,
/// the built client served with an SPA fallback.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    let mut app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state);

    if static_dir.is_dir() {
        let index = static_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index)));
    } else {
        tracing::info!("No client build at {}, serving /ws only", static_dir.display());
    }

    app.layer(CorsLayer::permissive())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let sender: Sender = Arc::new(Mutex::new(sender));

    let socket_id = uuid::Uuid::new_v4().to_string();
    let is_teacher = Arc::new(AtomicBool::new(false));
    tracing::info!(socket_id = %socket_id, "WebSocket connected");

    // Subscribe before asking for state so the reply cannot be missed.
    let event_rx = state.session.subscribe();
    let event_task = tokio::spawn(forward_events(
        event_rx,
        sender.clone(),
        socket_id.clone(),
        is_teacher.clone(),
    ));

    state
        .session
        .send(GameCommand::RequestState {
            socket_id: socket_id.clone(),
        })
        .await;

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let client_msg: ClientMsg = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(socket_id = %socket_id, "Invalid message: {}", e);
                continue;
            }
        };

        if let ClientMsg::TeacherAuth { password } = &client_msg {
            if password.as_str() == &*state.teacher_password {
                is_teacher.store(true, Ordering::SeqCst);
                tracing::info!(socket_id = %socket_id, "Teacher authenticated");
                send_msg(&sender, &ServerMsg::Authenticated).await;
            } else {
                send_error(&sender, "Invalid password").await;
            }
            continue;
        }

        if client_msg.requires_teacher() && !is_teacher.load(Ordering::SeqCst) {
            tracing::debug!(socket_id = %socket_id, "teacher command from student socket");
            send_error(&sender, "Teacher authentication required").await;
            continue;
        }

        match to_command(client_msg, &socket_id, state.max_timer_seconds) {
            Ok(cmd) => state.session.send(cmd).await,
            Err(message) => send_error(&sender, message).await,
        }
    }

    tracing::info!(socket_id = %socket_id, "WebSocket disconnected");
    event_task.abort();

    state
        .session
        .send(GameCommand::Disconnect { socket_id })
        .await;
}

/// Validates a client message and turns it into a session command.
fn to_command(
    msg: ClientMsg,
    socket_id: &str,
    max_timer_seconds: u32,
) -> Result<GameCommand, &'static str> {
    let socket_id = socket_id.to_string();
    let cmd = match msg {
        ClientMsg::Join(profile) => {
            if profile.name.trim().is_empty() {
                return Err("Name cannot be empty");
            }
            GameCommand::Join { socket_id, profile }
        }
        ClientMsg::SubmitAnswer { answer } => GameCommand::SubmitAnswer { socket_id, answer },
        ClientMsg::StartQuestion {
            question_type,
            timer,
        } => GameCommand::StartQuestion {
            question_type,
            timer_seconds: timer.min(max_timer_seconds),
        },
        ClientMsg::StopTimer => GameCommand::StopTimer,
        ClientMsg::RevealStats => GameCommand::RevealStats,
        ClientMsg::RevealAnswer { answer } => {
            if answer.is_empty() {
                return Err("Answer cannot be empty");
            }
            GameCommand::RevealAnswer { answer }
        }
        ClientMsg::UpdateFeedback { correct, wrong } => GameCommand::UpdateFeedback { correct, wrong },
        ClientMsg::ResetGame => GameCommand::ResetGame,
        ClientMsg::EndGame => GameCommand::EndGame,
        ClientMsg::RequestState => GameCommand::RequestState { socket_id },
        ClientMsg::TeacherAuth { .. } => return Err("Already handled"),
    };
    Ok(cmd)
}

async fn forward_events(
    mut event_rx: broadcast::Receiver<GameEvent>,
    sender: Sender,
    socket_id: String,
    is_teacher: Arc<AtomicBool>,
) {
    loop {
        let event = match event_rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(socket_id = %socket_id, skipped, "event receiver lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        let msg = match event {
            GameEvent::SendTo { socket_id: target, msg } if target == socket_id => msg,
            GameEvent::Broadcast { msg } => msg,
            GameEvent::ToTeachers { msg } if is_teacher.load(Ordering::SeqCst) => msg,
            _ => continue,
        };

        if !send_msg(&sender, &msg).await {
            return;
        }
    }
}

/// Returns `false` once the socket can no longer be written to.
async fn send_msg(sender: &Sender, msg: &ServerMsg) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return true;
    };
    let mut s = sender.lock().await;
    s.send(Message::Text(json.into())).await.is_ok()
}

async fn send_error(sender: &Sender, message: &str) {
    send_msg(sender, &ServerMsg::ErrorMessage {
        message: message.to_string(),
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Profile;
    use crate::session::QuestionType;

    #[test]
    fn timer_is_clamped() {
        let msg = ClientMsg::StartQuestion {
            question_type: QuestionType::Choice,
            timer: 10_000,
        };
        assert_eq!(
            to_command(msg, "t", 600),
            Ok(GameCommand::StartQuestion {
                question_type: QuestionType::Choice,
                timer_seconds: 600
            })
        );
    }

    #[test]
    fn empty_reveal_and_blank_name_are_rejected() {
        assert!(to_command(ClientMsg::RevealAnswer { answer: String::new() }, "t", 600).is_err());

        let blank = ClientMsg::Join(Profile {
            school: "North".to_string(),
            grade: "5".to_string(),
            name: "  ".to_string(),
        });
        assert!(to_command(blank, "s", 600).is_err());
    }

    #[test]
    fn student_commands_carry_socket_id() {
        assert_eq!(
            to_command(ClientMsg::SubmitAnswer { answer: "2".to_string() }, "sock", 600),
            Ok(GameCommand::SubmitAnswer {
                socket_id: "sock".to_string(),
                answer: "2".to_string()
            })
        );
        assert_eq!(
            to_command(ClientMsg::RequestState, "sock", 600),
            Ok(GameCommand::RequestState {
                socket_id: "sock".to_string()
            })
        );
    }
}
