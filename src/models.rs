use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Account))]
pub struct Ngo {
    pub id: i32,
    pub account_id: i32,
    pub name: String,
    pub registration_no: String,
    pub darpan_id: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub mission: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub verified: bool,
    pub blacklisted: bool,
    pub transparency_score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct RegistrationRequest {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub registration_no: String,
    pub darpan_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub mission: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Ngo))]
pub struct VolunteerPost {
    pub id: i32,
    pub ngo_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub location: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(VolunteerPost))]
#[diesel(belongs_to(Account))]
pub struct Application {
    pub id: i32,
    pub volunteer_post_id: i32,
    pub account_id: i32,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Account))]
#[diesel(belongs_to(VolunteerPost))]
pub struct Bookmark {
    pub id: i32,
    pub account_id: i32,
    pub volunteer_post_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Account))]
#[diesel(belongs_to(Ngo))]
pub struct Like {
    pub id: i32,
    pub account_id: i32,
    pub ngo_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Ngo))]
pub struct Event {
    pub id: i32,
    pub ngo_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub registration_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a registration request. Pending is the only state with
/// outgoing transitions; approved and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<RequestStatus> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Lifecycle of a volunteer application, same shape as `RequestStatus`:
/// pending may move to accepted or rejected exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// Parses an NGO's decision on a pending application. Only the two
    /// terminal states are valid decisions.
    pub fn parse_decision(s: &str) -> Option<ApplicationStatus> {
        match s {
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }
}

/// Profile fields that feed the transparency score, borrowed from whichever
/// row (registration request or NGO) is being scored.
pub struct TransparencyProfile<'a> {
    pub name: &'a str,
    pub registration_no: &'a str,
    pub email: &'a str,
    pub mission: Option<&'a str>,
    pub description: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub website: Option<&'a str>,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub verified: bool,
}

impl TransparencyProfile<'_> {
    /// Field-completeness heuristic, 0..=100. Weights: basic info 30,
    /// contact 20, location 20, verification 30.
    pub fn score(&self) -> i32 {
        fn filled(field: Option<&str>) -> bool {
            field.map_or(false, |s| !s.trim().is_empty())
        }

        let mut score = 0;
        if !self.name.trim().is_empty() {
            score += 5;
        }
        if filled(self.mission) {
            score += 10;
        }
        if filled(self.description) {
            score += 15;
        }
        if !self.email.trim().is_empty() {
            score += 10;
        }
        if filled(self.phone) {
            score += 5;
        }
        if filled(self.website) {
            score += 5;
        }
        if filled(self.address) {
            score += 10;
        }
        if filled(self.city) && filled(self.state) {
            score += 10;
        }
        if !self.registration_no.trim().is_empty() {
            score += 20;
        }
        if self.verified {
            score += 10;
        }
        score.min(100)
    }
}

impl RegistrationRequest {
    pub fn transparency_profile(&self, verified: bool) -> TransparencyProfile<'_> {
        TransparencyProfile {
            name: &self.name,
            registration_no: &self.registration_no,
            email: &self.email,
            mission: self.mission.as_deref(),
            description: self.description.as_deref(),
            phone: self.phone.as_deref(),
            website: self.website.as_deref(),
            address: self.address.as_deref(),
            city: self.city.as_deref(),
            state: self.state.as_deref(),
            verified,
        }
    }
}

impl Ngo {
    pub fn transparency_profile(&self) -> TransparencyProfile<'_> {
        TransparencyProfile {
            name: &self.name,
            registration_no: &self.registration_no,
            email: &self.email,
            mission: self.mission.as_deref(),
            description: self.description.as_deref(),
            phone: self.phone.as_deref(),
            website: self.website.as_deref(),
            address: self.address.as_deref(),
            city: self.city.as_deref(),
            state: self.state.as_deref(),
            verified: self.verified,
        }
    }
}
