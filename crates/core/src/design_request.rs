//! Custom design enquiries from the "commission a piece" form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::product::{Category, Material};
use crate::types::{DesignRequestId, DesignRequestStatus, Email};
use crate::validation::{FieldError, ValidationErrors, non_blank};

/// Shortest description that gives the studio enough to quote from.
pub const MIN_DESCRIPTION_LENGTH: usize = 20;

/// Longest accepted description.
pub const MAX_DESCRIPTION_LENGTH: usize = 5_000;

/// Form payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DesignRequestInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub jewelry_type: Category,
    #[serde(default)]
    pub preferred_material: Option<Material>,
    #[serde(default)]
    pub gem_preferences: Option<String>,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timeline: Option<String>,
}

/// A validated enquiry ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDesignRequest {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub jewelry_type: Category,
    pub preferred_material: Option<Material>,
    pub gem_preferences: Option<String>,
    pub budget_range: Option<String>,
    pub description: String,
    pub timeline: Option<String>,
}

/// A stored enquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignRequest {
    pub id: DesignRequestId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub jewelry_type: Category,
    pub preferred_material: Option<Material>,
    pub gem_preferences: Option<String>,
    pub budget_range: Option<String>,
    pub description: String,
    pub timeline: Option<String>,
    pub status: DesignRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl DesignRequestInput {
    /// Validate and normalize.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn validate(self) -> Result<NewDesignRequest, Vec<FieldError>> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim().to_owned();
        errors.require("name", &name);
        errors.max_chars("name", &name, 120);

        let email = if self.email.trim().is_empty() {
            errors.push("email", "is required");
            None
        } else {
            Email::parse(&self.email)
                .map_err(|e| errors.push("email", e.to_string()))
                .ok()
        };

        let description = self.description.trim().to_owned();
        let length = description.chars().count();
        if length < MIN_DESCRIPTION_LENGTH {
            errors.push(
                "description",
                format!("please describe your idea in at least {MIN_DESCRIPTION_LENGTH} characters"),
            );
        } else if length > MAX_DESCRIPTION_LENGTH {
            errors.push(
                "description",
                format!("must be at most {MAX_DESCRIPTION_LENGTH} characters"),
            );
        }

        errors.into_result()?;
        let Some(email) = email else {
            return Err(vec![FieldError::new("email", "is required")]);
        };

        Ok(NewDesignRequest {
            name,
            email,
            phone: non_blank(self.phone),
            jewelry_type: self.jewelry_type,
            preferred_material: self.preferred_material,
            gem_preferences: non_blank(self.gem_preferences),
            budget_range: non_blank(self.budget_range),
            description,
            timeline: non_blank(self.timeline),
        })
    }
}
