//! Design request repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use atelier_core::design_request::{DesignRequest, NewDesignRequest};
use atelier_core::{DesignRequestId, DesignRequestStatus, Email};

use crate::{RepositoryError, parse_column};

/// Storage for custom design enquiries.
#[async_trait]
pub trait DesignRequestRepository: Send + Sync {
    /// Store a new enquiry with status `new`.
    async fn create(&self, request: &NewDesignRequest) -> Result<DesignRequest, RepositoryError>;

    /// Enquiries, newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<DesignRequest>, RepositoryError>;

    /// Move an enquiry through the studio workflow.
    async fn update_status(
        &self,
        id: DesignRequestId,
        status: DesignRequestStatus,
    ) -> Result<DesignRequest, RepositoryError>;
}

const DESIGN_REQUEST_COLUMNS: &str = "id, name, email, phone, jewelry_type, preferred_material, \
     gem_preferences, budget_range, description, timeline, status, created_at";

#[derive(Debug, sqlx::FromRow)]
struct DesignRequestRow {
    id: i64,
    name: String,
    email: String,
    phone: Option<String>,
    jewelry_type: String,
    preferred_material: Option<String>,
    gem_preferences: Option<String>,
    budget_range: Option<String>,
    description: String,
    timeline: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DesignRequestRow> for DesignRequest {
    type Error = RepositoryError;

    fn try_from(row: DesignRequestRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let preferred_material = row
            .preferred_material
            .as_deref()
            .map(|m| parse_column("preferred_material", m))
            .transpose()?;

        Ok(Self {
            id: DesignRequestId::new(row.id),
            name: row.name,
            email,
            phone: row.phone,
            jewelry_type: parse_column("jewelry_type", &row.jewelry_type)?,
            preferred_material,
            gem_preferences: row.gem_preferences,
            budget_range: row.budget_range,
            description: row.description,
            timeline: row.timeline,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL` design request repository.
#[derive(Debug, Clone)]
pub struct PgDesignRequestRepository {
    pool: PgPool,
}

impl PgDesignRequestRepository {
    /// Create a new design request repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DesignRequestRepository for PgDesignRequestRepository {
    #[instrument(skip(self, request), fields(jewelry_type = %request.jewelry_type))]
    async fn create(&self, request: &NewDesignRequest) -> Result<DesignRequest, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO atelier.design_request
                (name, email, phone, jewelry_type, preferred_material, gem_preferences,
                 budget_range, description, timeline)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DESIGN_REQUEST_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, DesignRequestRow>(&sql)
            .bind(&request.name)
            .bind(request.email.as_str())
            .bind(&request.phone)
            .bind(request.jewelry_type.as_str())
            .bind(request.preferred_material.map(|m| m.as_str()))
            .bind(&request.gem_preferences)
            .bind(&request.budget_range)
            .bind(&request.description)
            .bind(&request.timeline)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<DesignRequest>, RepositoryError> {
        let sql = format!(
            "SELECT {DESIGN_REQUEST_COLUMNS} FROM atelier.design_request \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, DesignRequestRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: DesignRequestId,
        status: DesignRequestStatus,
    ) -> Result<DesignRequest, RepositoryError> {
        let sql = format!(
            "UPDATE atelier.design_request SET status = $2 WHERE id = $1 \
             RETURNING {DESIGN_REQUEST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DesignRequestRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        row.try_into()
    }
}
