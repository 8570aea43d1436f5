use serde::{Deserialize, Serialize};

/// Stage of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    Answering,
    Locked,
    StatsRevealed,
    AnswerRevealed,
    Ended,
}

/// Events that move the session from one phase to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StartQuestion,
    Lock,
    RevealStats,
    RevealAnswer,
    Reset,
    End,
}

impl Phase {
    /// Looks up `transition` in the phase table. `None` means the
    /// transition is not allowed from this phase.
    pub fn next(self, transition: Transition) -> Option<Phase> {
        use Phase::*;
        use Transition::*;

        match (self, transition) {
            (Waiting | AnswerRevealed, StartQuestion) => Some(Answering),
            (Answering, Lock) => Some(Locked),
            (Answering | Locked, RevealStats) => Some(StatsRevealed),
            (Locked | StatsRevealed, RevealAnswer) => Some(AnswerRevealed),
            (_, Reset) => Some(Waiting),
            (_, End) => Some(Ended),
            _ => None,
        }
    }

    pub fn accepts_answers(self) -> bool {
        self == Phase::Answering
    }

    /// Whether a stats tally from this round has been shown.
    pub fn stats_visible(self) -> bool {
        matches!(self, Phase::StatsRevealed | Phase::AnswerRevealed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Answering => write!(f, "answering"),
            Self::Locked => write!(f, "locked"),
            Self::StatsRevealed => write!(f, "stats_revealed"),
            Self::AnswerRevealed => write!(f, "answer_revealed"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Choice,
    Text,
}

/// Messages shown to students after the answer is revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackMessages {
    pub on_correct: String,
    pub on_wrong: String,
}

impl Default for FeedbackMessages {
    fn default() -> Self {
        Self {
            on_correct: "Congratulations!".to_string(),
            on_wrong: "Not this time, try the next question".to_string(),
        }
    }
}

/// The quiz session as every client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub phase: Phase,
    pub question_type: QuestionType,
    pub timer_seconds: u32,
    pub time_remaining: u32,
    pub question_count: u32,
    pub feedback_messages: FeedbackMessages,
    pub revealed_answer: Option<String>,
}

impl Session {
    pub fn new(feedback_messages: FeedbackMessages) -> Self {
        Self {
            phase: Phase::Waiting,
            question_type: QuestionType::default(),
            timer_seconds: 0,
            time_remaining: 0,
            question_count: 0,
            feedback_messages,
            revealed_answer: None,
        }
    }

    /// Applies `transition` if the table allows it and returns the new phase.
    pub fn advance(&mut self, transition: Transition) -> Option<Phase> {
        let next = self.phase.next(transition)?;
        tracing::info!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        Some(next)
    }
}
