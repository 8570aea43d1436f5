use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::roster::{Participant, Profile};
use crate::session::{QuestionType, Session};

/// Bucket used in the stats tally for students who did not answer.
pub const NO_ANSWER: &str = "No Answer";

/// Answer value -> number of students who gave it.
pub type Tally = BTreeMap<String, usize>;

/// Messages sent from server to clients via WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    GameState(Session),
    StudentList(Vec<Participant>),
    StatsReveal(Tally),
    TimerUpdate(u32),
    AnswerSubmitted {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    Joined {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    Authenticated,
    ErrorMessage {
        message: String,
    },
}

/// Messages sent from clients to server via WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    TeacherAuth {
        password: String,
    },

    // Student actions
    Join(Profile),
    SubmitAnswer {
        answer: String,
    },

    // Teacher actions
    StartQuestion {
        #[serde(rename = "type")]
        question_type: QuestionType,
        #[serde(deserialize_with = "lenient_seconds")]
        timer: u32,
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

    RequestState,
}

impl ClientMsg {
    /// Commands only an authenticated teacher connection may send.
    pub fn requires_teacher(&self) -> bool {
        matches!(
            self,
            Self::StartQuestion { .. }
                | Self::StopTimer
                | Self::RevealStats
                | Self::RevealAnswer { .. }
                | Self::UpdateFeedback { .. }
                | Self::ResetGame
                | Self::EndGame
        )
    }
}

/// Dashboards send the timer as typed into a form field, so accept both
/// `30` and `"30"`.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u32),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
