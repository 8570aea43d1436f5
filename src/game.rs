use tokio::sync::{broadcast, mpsc};

use crate::roster::{Profile, Roster};
use crate::session::{FeedbackMessages, QuestionType, Session, Transition};
use crate::timer::{Timer, TimerEvent, TimerTick};
use crate::types::{ServerMsg, Tally, NO_ANSWER};

/// Commands the WebSocket handler (and the countdown) send to the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Join {
        socket_id: String,
        profile: Profile,
    },
    Disconnect {
        socket_id: String,
    },
    SubmitAnswer {
        socket_id: String,
        answer: String,
    },
    StartQuestion {
        question_type: QuestionType,
        timer_seconds: u32,
    },
    StopTimer,
    RevealStats,
    RevealAnswer {
        answer: String,
    },
    UpdateFeedback {
        correct: String,
        wrong: String,
    },
    ResetGame,
    EndGame,
    RequestState {
        socket_id: String,
    },
    Timer(TimerEvent),
}

impl From<TimerEvent> for GameCommand {
    fn from(event: TimerEvent) -> Self {
        GameCommand::Timer(event)
    }
}

/// Events broadcast from the session to WebSocket connections.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Send a message to a specific socket.
    SendTo { socket_id: String, msg: ServerMsg },
    /// Broadcast a message to every connected socket.
    Broadcast { msg: ServerMsg },
    /// Send a message to authenticated teacher sockets only.
    ToTeachers { msg: ServerMsg },
}

/// Cloneable entry point to the running session task.
#[derive(Clone)]
pub struct SessionHandle {
    pub cmd_tx: mpsc::Sender<GameCommand>,
    pub event_tx: broadcast::Sender<GameEvent>,
}

impl SessionHandle {
    pub async fn send(&self, cmd: GameCommand) {
        if self.cmd_tx.send(cmd).await.is_err() {
            tracing::warn!("session task is gone, command dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.event_tx.subscribe()
    }
}

/// Create the classroom session and spawn its task.
pub fn spawn_session(feedback: FeedbackMessages) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    let (event_tx, _) = broadcast::channel(256);

    let manager = GameManager::new(feedback, event_tx.clone(), cmd_tx.downgrade());
    tokio::spawn(manager.run(cmd_rx));

    tracing::info!("Session created");

    SessionHandle { cmd_tx, event_tx }
}

/// Owns the session state and the roster, and is the only thing that
/// mutates them. All commands, including countdown ticks, arrive through one
/// channel and are handled one at a time.
pub struct GameManager {
    session: Session,
    roster: Roster,
    timer: Timer,
    last_stats: Option<Tally>,
    event_tx: broadcast::Sender<GameEvent>,
    timer_tx: mpsc::WeakSender<GameCommand>,
}

impl GameManager {
    pub fn new(
        feedback: FeedbackMessages,
        event_tx: broadcast::Sender<GameEvent>,
        timer_tx: mpsc::WeakSender<GameCommand>,
    ) -> Self {
        Self {
            session: Session::new(feedback),
            roster: Roster::new(),
            timer: Timer::new(),
            last_stats: None,
            event_tx,
            timer_tx,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<GameCommand>) {
        while let Some(cmd) = cmd_rx.recv().await {
            self.handle(cmd);
        }
        self.timer.cancel();
        tracing::info!("Session task ended");
    }

    pub fn handle(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::Join { socket_id, profile } => self.join(&socket_id, profile),
            GameCommand::Disconnect { socket_id } => self.remove_student(&socket_id),
            GameCommand::SubmitAnswer { socket_id, answer } => {
                self.submit_answer(&socket_id, answer)
            }
            GameCommand::StartQuestion {
                question_type,
                timer_seconds,
            } => self.start_question(question_type, timer_seconds),
            GameCommand::StopTimer => self.stop_timer_early(),
            GameCommand::RevealStats => self.reveal_stats(),
            GameCommand::RevealAnswer { answer } => self.reveal_answer(answer),
            GameCommand::UpdateFeedback { correct, wrong } => self.set_feedback(correct, wrong),
            GameCommand::ResetGame => self.reset_game(),
            GameCommand::EndGame => self.end_game(),
            GameCommand::RequestState { socket_id } => self.request_state(&socket_id),
            GameCommand::Timer(event) => self.on_timer(event),
        }
    }

    // ─── Broadcast helpers ───────────────────────────────────────────

    fn broadcast(&self, msg: ServerMsg) {
        let _ = self.event_tx.send(GameEvent::Broadcast { msg });
    }

    fn send_to(&self, socket_id: &str, msg: ServerMsg) {
        let _ = self.event_tx.send(GameEvent::SendTo {
            socket_id: socket_id.to_string(),
            msg,
        });
    }

    fn notify_teachers(&self, msg: ServerMsg) {
        let _ = self.event_tx.send(GameEvent::ToTeachers { msg });
    }

    fn broadcast_session(&self) {
        self.broadcast(ServerMsg::GameState(self.session.clone()));
    }

    fn broadcast_student_list(&self) {
        self.broadcast(ServerMsg::StudentList(self.roster.snapshot()));
    }

    // ─── Roster commands ─────────────────────────────────────────────

    fn join(&mut self, socket_id: &str, profile: Profile) {
        if self.session.phase.accepts_answers() {
            tracing::debug!(socket_id, "join ignored while answering");
            return;
        }

        let name = profile.name.clone();
        if !self.roster.upsert(socket_id, profile) {
            tracing::debug!(socket_id, "join ignored, already a participant");
            return;
        }

        tracing::info!(socket_id, %name, "Student joined");
        self.send_to(socket_id, ServerMsg::Joined {
            connection_id: socket_id.to_string(),
        });
        self.broadcast_student_list();
    }

    fn remove_student(&mut self, socket_id: &str) {
        if let Some(student) = self.roster.remove(socket_id) {
            tracing::info!(socket_id, name = %student.name, "Student left");
            self.broadcast_student_list();
        }
    }

    fn submit_answer(&mut self, socket_id: &str, answer: String) {
        if !self.session.phase.accepts_answers() {
            tracing::debug!(socket_id, phase = %self.session.phase, "answer outside answering phase");
            return;
        }

        let Some(student) = self.roster.get_mut(socket_id) else {
            tracing::debug!(socket_id, "answer from unknown connection");
            return;
        };
        student.current_answer = Some(answer);

        self.notify_teachers(ServerMsg::AnswerSubmitted {
            connection_id: socket_id.to_string(),
        });
    }

    // ─── Round lifecycle ─────────────────────────────────────────────

    fn start_question(&mut self, question_type: QuestionType, timer_seconds: u32) {
        if self.session.advance(Transition::StartQuestion).is_none() {
            tracing::debug!(phase = %self.session.phase, "startQuestion ignored");
            return;
        }

        self.session.question_type = question_type;
        self.session.timer_seconds = timer_seconds;
        self.session.time_remaining = timer_seconds;
        self.session.revealed_answer = None;
        self.session.question_count += 1;
        self.last_stats = None;

        for student in self.roster.iter_mut() {
            student.current_answer = None;
        }

        self.broadcast_session();

        match self.timer_tx.upgrade() {
            Some(tx) => {
                self.timer.start(timer_seconds, tx);
            }
            None => tracing::warn!("session is shutting down, countdown not started"),
        }
    }

    fn on_timer(&mut self, event: TimerEvent) {
        if !self.timer.accepts(event.round) {
            tracing::trace!(round = event.round, "stale timer event dropped");
            return;
        }

        match event.tick {
            TimerTick::Remaining(remaining) => {
                self.session.time_remaining = remaining;
                self.broadcast(ServerMsg::TimerUpdate(remaining));
            }
            TimerTick::Expired => {
                self.timer.finish(event.round);
                self.session.time_remaining = 0;
                self.lock_answers();
            }
        }
    }

    fn stop_timer_early(&mut self) {
        if !self.session.phase.accepts_answers() {
            tracing::debug!(phase = %self.session.phase, "stopTimer ignored");
            return;
        }
        self.lock_answers();
    }

    fn lock_answers(&mut self) {
        self.timer.cancel();
        if self.session.advance(Transition::Lock).is_some() {
            self.broadcast_session();
        }
    }

    fn reveal_stats(&mut self) {
        if self.session.advance(Transition::RevealStats).is_none() {
            tracing::debug!(phase = %self.session.phase, "revealStats ignored");
            return;
        }
        self.timer.cancel();

        let stats = self.tally();
        self.last_stats = Some(stats.clone());

        self.broadcast_session();
        self.broadcast(ServerMsg::StatsReveal(stats));
    }

    fn tally(&self) -> Tally {
        let mut stats = Tally::new();
        for student in self.roster.iter() {
            let key = match student.current_answer.as_deref() {
                Some(answer) if !answer.is_empty() => answer,
                _ => NO_ANSWER,
            };
            *stats.entry(key.to_string()).or_insert(0) += 1;
        }
        stats
    }

    fn reveal_answer(&mut self, answer: String) {
        if answer.is_empty() {
            tracing::debug!("revealAnswer with empty answer ignored");
            return;
        }
        if self.session.advance(Transition::RevealAnswer).is_none() {
            tracing::debug!(phase = %self.session.phase, "revealAnswer ignored");
            return;
        }

        // Exact match only: no trimming, case folding or numeric parsing.
        for student in self.roster.iter_mut() {
            if student.current_answer.as_deref() == Some(answer.as_str()) {
                student.score += 1;
            }
        }
        self.session.revealed_answer = Some(answer);

        self.broadcast_session();
        self.broadcast_student_list();
    }

    fn set_feedback(&mut self, correct: String, wrong: String) {
        self.session.feedback_messages = FeedbackMessages {
            on_correct: correct,
            on_wrong: wrong,
        };
    }

    fn reset_game(&mut self) {
        self.timer.cancel();
        self.session.advance(Transition::Reset);
        self.session.revealed_answer = None;
        self.session.question_count = 0;
        self.session.time_remaining = 0;
        self.last_stats = None;

        self.broadcast_session();
        self.broadcast_student_list();
    }

    fn end_game(&mut self) {
        self.timer.cancel();
        self.session.advance(Transition::End);
        self.broadcast_session();
    }

    fn request_state(&self, socket_id: &str) {
        self.send_to(socket_id, ServerMsg::GameState(self.session.clone()));
        self.send_to(socket_id, ServerMsg::StudentList(self.roster.snapshot()));

        if self.session.phase.stats_visible() {
            if let Some(stats) = &self.last_stats {
                self.send_to(socket_id, ServerMsg::StatsReveal(stats.clone()));
            }
        }
    }
}
