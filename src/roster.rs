use serde::{Deserialize, Serialize};

/// Profile fields a student fills in when joining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub grade: String,
    pub name: String,
}

/// A connected student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: String,
    pub name: String,
    pub school: String,
    pub grade: String,
    pub score: u32,
    pub current_answer: Option<String>,
}

impl Participant {
    fn new(connection_id: String, profile: Profile) -> Self {
        Self {
            connection_id,
            name: profile.name,
            school: profile.school,
            grade: profile.grade,
            score: 0,
            current_answer: None,
        }
    }
}

/// All connected students, in join order.
#[derive(Debug, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant for `connection_id`. Returns `false` and leaves the
    /// existing entry untouched if the connection already joined.
    pub fn upsert(&mut self, connection_id: &str, profile: Profile) -> bool {
        if self.get(connection_id).is_some() {
            return false;
        }
        self.participants.push(Participant::new(connection_id.to_string(), profile));
        true
    }

    pub fn remove(&mut self, connection_id: &str) -> Option<Participant> {
        let idx = self
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        Some(self.participants.remove(idx))
    }

    pub fn get(&self, connection_id: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn get_mut(&mut self, connection_id: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.connection_id == connection_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Leaderboard order: highest score first, join order among equal scores.
    pub fn snapshot(&self) -> Vec<Participant> {
        let mut list = self.participants.clone();
        // sort_by is stable
        list.sort_by(|a, b| b.score.cmp(&a.score));
        list
    }
}
