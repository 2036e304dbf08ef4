pub mod error;
pub mod repository;
pub mod trip;
pub mod user;

pub use error::{StoreError, ValidationError};
pub use trip::{Budget, Collaborator, CollaboratorRole, CollaboratorStatus, Privacy, Trip, TripStatus};
pub use user::{Gamification, Preferences, Profile, User};
