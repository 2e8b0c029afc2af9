use super::actor::{ActorId, ActorSnapshot, Gender};
use serde::{Deserialize, Serialize};

/// A searchable user profile as published in the candidate directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: ActorId,
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub location: String,
    pub occupation: String,
    pub education: String,
}

impl CandidateProfile {
    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            age: self.age,
            location: self.location.clone(),
        }
    }
}

/// Filter applied by `TaarufEngine::search`. Empty text fields match everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    pub min_age: u8,
    pub max_age: u8,
    pub location: String,
    pub occupation: String,
    pub education: String,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            min_age: 20,
            max_age: 40,
            location: String::new(),
            occupation: String::new(),
            education: String::new(),
        }
    }
}

impl SearchCriteria {
    pub fn matches(&self, profile: &CandidateProfile) -> bool {
        (self.min_age..=self.max_age).contains(&profile.age)
            && contains_ignore_case(&profile.location, &self.location)
            && contains_ignore_case(&profile.occupation, &self.occupation)
            && profile.education.contains(self.education.as_str())
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}
