use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Trip lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    #[default]
    Planning,
    Booked,
    Active,
    Completed,
    Cancelled,
}

/// Who may see a trip without being invited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Private,
    Friends,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorRole {
    #[default]
    Viewer,
    Editor,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

/// A non-owner user granted access to a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: CollaboratorRole,
    pub status: CollaboratorStatus,
    pub invited_at: DateTime<Utc>,
}

impl Collaborator {
    pub fn invite(user_id: Uuid, role: CollaboratorRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            role,
            status: CollaboratorStatus::Pending,
            invited_at: Utc::now(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == CollaboratorStatus::Accepted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Budget {
    pub estimated: Option<f64>,
    #[serde(default)]
    pub spent: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Location {
    pub name: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub time: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// One planned day, ordered activities within it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub day: u32,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccommodationType {
    #[default]
    Hotel,
    Hostel,
    Apartment,
    House,
    Resort,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accommodation {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: AccommodationType,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub cost: Option<f64>,
    pub confirmation_number: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Flight,
    Train,
    Bus,
    Car,
    Ferry,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportLeg {
    pub mode: TransportMode,
    pub from: String,
    pub to: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub confirmation_number: Option<String>,
    pub cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    pub caption: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// A planned trip and everything hanging off it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub destination: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub status: TripStatus,
    #[serde(default)]
    pub privacy: Privacy,
    pub creator: Uuid,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    #[serde(default)]
    pub accommodations: Vec<Accommodation>,
    #[serde(default)]
    pub transportation: Vec<TransportLeg>,
    #[serde(default)]
    pub photos: Vec<Photo>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(
        title: String,
        destination: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        creator: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description: None,
            destination,
            start_date,
            end_date,
            budget: Budget::default(),
            status: TripStatus::Planning,
            privacy: Privacy::Private,
            creator,
            collaborators: Vec::new(),
            itinerary: Vec::new(),
            accommodations: Vec::new(),
            transportation: Vec::new(),
            photos: Vec::new(),
            tags: Vec::new(),
            is_public: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Field and date invariants. `end_date > start_date` always holds;
    /// callers creating a trip additionally check `start_date` via
    /// [`Trip::validate_for_create`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("Trip title is required"));
        }
        if self.title.len() > MAX_TITLE_LEN {
            return Err(ValidationError::new("Trip title cannot exceed 100 characters"));
        }
        if let Some(description) = &self.description {
            if description.len() > MAX_DESCRIPTION_LEN {
                return Err(ValidationError::new("Description cannot exceed 1000 characters"));
            }
        }
        if self.destination.trim().is_empty() {
            return Err(ValidationError::new("Destination is required"));
        }
        if self.end_date <= self.start_date {
            return Err(ValidationError::new("End date must be after start date"));
        }
        if let Some(estimated) = self.budget.estimated {
            if estimated < 0.0 {
                return Err(ValidationError::new("Budget cannot be negative"));
            }
        }
        if self.budget.spent < 0.0 {
            return Err(ValidationError::new("Spent amount cannot be negative"));
        }
        Ok(())
    }

    /// Creation-time validation: everything in [`Trip::validate`] plus the
    /// start date must not lie in the past.
    pub fn validate_for_create(&self) -> Result<(), ValidationError> {
        if self.start_date < Utc::now() {
            return Err(ValidationError::new("Start date must be in the future"));
        }
        self.validate()
    }

    pub fn collaborator(&self, user_id: Uuid) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.user_id == user_id)
    }

    pub fn collaborator_mut(&mut self, collaborator_id: Uuid) -> Option<&mut Collaborator> {
        self.collaborators.iter_mut().find(|c| c.id == collaborator_id)
    }

    fn accepted_role(&self, user_id: Uuid) -> Option<CollaboratorRole> {
        self.collaborator(user_id)
            .filter(|c| c.is_accepted())
            .map(|c| c.role)
    }

    /// Read access: creator, accepted collaborator, or public trip.
    pub fn can_view(&self, user_id: Option<Uuid>) -> bool {
        if self.privacy == Privacy::Public && self.is_public {
            return true;
        }
        match user_id {
            Some(uid) => self.creator == uid || self.accepted_role(uid).is_some(),
            None => false,
        }
    }

    /// Write access: creator, or accepted collaborator with editor/admin role.
    pub fn can_edit(&self, user_id: Uuid) -> bool {
        self.creator == user_id
            || matches!(
                self.accepted_role(user_id),
                Some(CollaboratorRole::Editor) | Some(CollaboratorRole::Admin)
            )
    }

    /// Collaborator management: creator or accepted admin.
    pub fn can_manage_collaborators(&self, user_id: Uuid) -> bool {
        self.creator == user_id || self.accepted_role(user_id) == Some(CollaboratorRole::Admin)
    }

    /// Only the creator may delete a trip.
    pub fn can_delete(&self, user_id: Uuid) -> bool {
        self.creator == user_id
    }

    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn budget_remaining(&self) -> Option<f64> {
        self.budget.estimated.map(|estimated| estimated - self.budget.spent)
    }

    /// Share of itinerary activities marked completed, as a whole percentage.
    pub fn completion_percentage(&self) -> u32 {
        let mut total = 0usize;
        let mut completed = 0usize;
        for day in &self.itinerary {
            total += day.activities.len();
            completed += day.activities.iter().filter(|a| a.completed).count();
        }
        if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn future_trip(creator: Uuid) -> Trip {
        Trip::new(
            "Summer in Lisbon".to_string(),
            "Lisbon".to_string(),
            Utc::now() + Duration::days(30),
            Utc::now() + Duration::days(37),
            creator,
        )
    }

    #[test]
    fn end_date_must_be_after_start_date() {
        let mut trip = future_trip(Uuid::new_v4());
        trip.end_date = trip.start_date;
        assert!(trip.validate().is_err());

        trip.end_date = trip.start_date - Duration::days(1);
        assert!(trip.validate().is_err());

        trip.end_date = trip.start_date + Duration::hours(1);
        assert!(trip.validate().is_ok());
    }

    #[test]
    fn create_rejects_past_start_date() {
        let mut trip = future_trip(Uuid::new_v4());
        trip.start_date = Utc::now() - Duration::days(2);
        trip.end_date = Utc::now() + Duration::days(2);
        assert!(trip.validate_for_create().is_err());
        // plain validate only cares about ordering
        assert!(trip.validate().is_ok());
    }

    #[test]
    fn title_and_destination_are_required() {
        let mut trip = future_trip(Uuid::new_v4());
        trip.title = "  ".to_string();
        assert!(trip.validate().is_err());

        let mut trip = future_trip(Uuid::new_v4());
        trip.destination = String::new();
        assert!(trip.validate().is_err());
    }

    #[test]
    fn only_creator_can_delete() {
        let creator = Uuid::new_v4();
        let trip = future_trip(creator);
        assert!(trip.can_delete(creator));
        assert!(!trip.can_delete(Uuid::new_v4()));
    }

    #[test]
    fn public_trips_are_visible_to_anyone() {
        let mut trip = future_trip(Uuid::new_v4());
        assert!(!trip.can_view(None));
        assert!(!trip.can_view(Some(Uuid::new_v4())));

        trip.privacy = Privacy::Public;
        trip.is_public = true;
        assert!(trip.can_view(None));
        assert!(trip.can_view(Some(Uuid::new_v4())));
    }

    #[test]
    fn pending_collaborators_have_no_access() {
        let creator = Uuid::new_v4();
        let invitee = Uuid::new_v4();
        let mut trip = future_trip(creator);
        trip.collaborators
            .push(Collaborator::invite(invitee, CollaboratorRole::Editor));

        assert!(!trip.can_view(Some(invitee)));
        assert!(!trip.can_edit(invitee));

        trip.collaborators[0].status = CollaboratorStatus::Accepted;
        assert!(trip.can_view(Some(invitee)));
        assert!(trip.can_edit(invitee));
    }

    #[test]
    fn viewer_collaborators_cannot_edit() {
        let creator = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let mut trip = future_trip(creator);
        let mut collab = Collaborator::invite(viewer, CollaboratorRole::Viewer);
        collab.status = CollaboratorStatus::Accepted;
        trip.collaborators.push(collab);

        assert!(trip.can_view(Some(viewer)));
        assert!(!trip.can_edit(viewer));
        assert!(!trip.can_manage_collaborators(viewer));
    }

    #[test]
    fn completion_percentage_counts_activities() {
        let mut trip = future_trip(Uuid::new_v4());
        assert_eq!(trip.completion_percentage(), 0);

        trip.itinerary.push(ItineraryDay {
            day: 1,
            date: None,
            activities: vec![
                Activity {
                    time: None,
                    title: "Castle".to_string(),
                    description: None,
                    location: None,
                    estimated_cost: None,
                    actual_cost: None,
                    notes: None,
                    completed: true,
                },
                Activity {
                    time: None,
                    title: "Tram 28".to_string(),
                    description: None,
                    location: None,
                    estimated_cost: None,
                    actual_cost: None,
                    notes: None,
                    completed: false,
                },
            ],
        });
        assert_eq!(trip.completion_percentage(), 50);
    }
}
