use serde::{Deserialize, Serialize};

use crate::error::CivicTrackError;

/// An issue is hidden from public queries once its flag count reaches this.
pub const FLAG_HIDE_THRESHOLD: i32 = 5;

/// Photo attachments per issue.
pub const MAX_PHOTOS: usize = 3;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "issue_category", rename_all = "snake_case")]
pub enum Category {
    Roads,
    Lighting,
    Water,
    Cleanliness,
    Safety,
    Obstructions,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Roads => write!(f, "roads"),
            Category::Lighting => write!(f, "lighting"),
            Category::Water => write!(f, "water"),
            Category::Cleanliness => write!(f, "cleanliness"),
            Category::Safety => write!(f, "safety"),
            Category::Obstructions => write!(f, "obstructions"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = CivicTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "roads" => Ok(Category::Roads),
            "lighting" => Ok(Category::Lighting),
            "water" => Ok(Category::Water),
            "cleanliness" => Ok(Category::Cleanliness),
            "safety" => Ok(Category::Safety),
            "obstructions" => Ok(Category::Obstructions),
            other => Err(CivicTrackError::Validation(format!(
                "Unknown category: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "issue_status", rename_all = "snake_case")]
pub enum Status {
    Reported,
    InProgress,
    Resolved,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Reported => write!(f, "reported"),
            Status::InProgress => write!(f, "in_progress"),
            Status::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = CivicTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reported" => Ok(Status::Reported),
            "in_progress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            other => Err(CivicTrackError::Validation(format!(
                "Unknown status: {other}"
            ))),
        }
    }
}
