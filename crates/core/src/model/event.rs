use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::cohort::Cohort;
use crate::model::ids::{EventId, Username};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    #[default]
    Availability,
    Dojo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AvailabilityStatus {
    #[default]
    Scheduled,
    Booked,
    Canceled,
}

/// Kind of meeting a user is available for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityType {
    ClassicalGame,
    OpeningSparring,
    MiddlegameSparring,
    EndgameSparring,
    RookEndgameProgression,
    ClassicAnalysis,
    AnalyzeOwnGame,
    BookStudy,
}

impl AvailabilityType {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            AvailabilityType::ClassicalGame => "Classical Game",
            AvailabilityType::OpeningSparring => "Opening Sparring",
            AvailabilityType::MiddlegameSparring => "Middlegame Sparring",
            AvailabilityType::EndgameSparring => "Endgame Sparring",
            AvailabilityType::RookEndgameProgression => "Rook Endgame Progression",
            AvailabilityType::ClassicAnalysis => "Analyze Classic Game",
            AvailabilityType::AnalyzeOwnGame => "Analyze Own Game",
            AvailabilityType::BookStudy => "Book Study",
        }
    }

    /// Participant cap suggested when the owner does not pick one.
    #[must_use]
    pub fn default_max_participants(self) -> u32 {
        match self {
            AvailabilityType::ClassicAnalysis
            | AvailabilityType::AnalyzeOwnGame
            | AvailabilityType::BookStudy => 4,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub username: Username,
    #[serde(default)]
    pub display_name: String,
    pub cohort: Cohort,
}

/// A calendar event: an availability slot or a program-wide meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    #[serde(rename = "type", default)]
    pub kind: EventType,
    pub owner: Username,
    #[serde(default)]
    pub owner_display_name: String,
    #[serde(default)]
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub types: Vec<AvailabilityType>,
    #[serde(default)]
    pub booked_type: Option<AvailabilityType>,
    #[serde(default)]
    pub cohorts: Vec<Cohort>,
    #[serde(default)]
    pub status: AvailabilityStatus,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub max_participants: u32,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl Event {
    /// True when the user owns the event or is booked into it.
    #[must_use]
    pub fn involves(&self, username: &Username) -> bool {
        &self.owner == username || self.participants.iter().any(|p| &p.username == username)
    }

    /// A booked, non-canceled meeting that ends at or after `not_before`.
    #[must_use]
    pub fn is_active_meeting(&self, not_before: DateTime<Utc>) -> bool {
        !self.participants.is_empty()
            && self.status != AvailabilityStatus::Canceled
            && self.end_time >= not_before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_participants_by_type() {
        assert_eq!(AvailabilityType::ClassicalGame.default_max_participants(), 1);
        assert_eq!(AvailabilityType::BookStudy.default_max_participants(), 4);
        assert_eq!(AvailabilityType::ClassicAnalysis.display_name(), "Analyze Classic Game");
    }

    #[test]
    fn deserializes_type_field() {
        let json = r#"{
            "id": "e1",
            "type": "DOJO",
            "owner": "admin",
            "startTime": "2023-11-15T18:00:00Z",
            "endTime": "2023-11-15T19:00:00Z",
            "status": "BOOKED",
            "types": ["BOOK_STUDY"]
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventType::Dojo);
        assert_eq!(event.types, vec![AvailabilityType::BookStudy]);
        assert!(event.participants.is_empty());
    }
}
