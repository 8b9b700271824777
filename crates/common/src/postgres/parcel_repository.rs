use crate::domain::{
    CreateParcelRepoInput, DeliveryOtp, DomainError, DomainResult, ListParcelsFilter,
    NewHistoryEntry, Parcel, ParcelCommit, ParcelHistoryEntry, ParcelRepository, ParcelStatus,
    TamperAlert, TamperAlertChange,
};
use crate::postgres::{PostgresClient, map_db_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_postgres::Row;
use tracing::{debug, info, instrument};

const PARCEL_COLUMNS: &str = "id, tracking_code, sender_id, sender_email, recipient_email, description,
    weight_kg, pickup_location, delivery_location, expected_pickup_at, expected_delivery_at,
    actual_pickup_at, actual_delivery_at, status, otp_code, otp_generated_at, otp_verified,
    pricing_tier_id, shipping_cost, version, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "id, tracking_code, status, location, notes, handled_by, recorded_at";

const TAMPER_COLUMNS: &str = "id, tracking_code, reason, location, reported_by, detected_at,
    resolved, resolution, resolved_by, resolved_at";

/// Parcel row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct ParcelRow {
    pub id: String,
    pub tracking_code: String,
    pub sender_id: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub description: Option<String>,
    pub weight_kg: Decimal,
    pub pickup_location: String,
    pub delivery_location: String,
    pub expected_pickup_at: DateTime<Utc>,
    pub expected_delivery_at: DateTime<Utc>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub status: String,
    pub otp_code: Option<String>,
    pub otp_generated_at: Option<DateTime<Utc>>,
    pub otp_verified: bool,
    pub pricing_tier_id: Option<i32>,
    pub shipping_cost: Option<Decimal>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Row> for ParcelRow {
    fn from(row: &Row) -> Self {
        ParcelRow {
            id: row.get("id"),
            tracking_code: row.get("tracking_code"),
            sender_id: row.get("sender_id"),
            sender_email: row.get("sender_email"),
            recipient_email: row.get("recipient_email"),
            description: row.get("description"),
            weight_kg: row.get("weight_kg"),
            pickup_location: row.get("pickup_location"),
            delivery_location: row.get("delivery_location"),
            expected_pickup_at: row.get("expected_pickup_at"),
            expected_delivery_at: row.get("expected_delivery_at"),
            actual_pickup_at: row.get("actual_pickup_at"),
            actual_delivery_at: row.get("actual_delivery_at"),
            status: row.get("status"),
            otp_code: row.get("otp_code"),
            otp_generated_at: row.get("otp_generated_at"),
            otp_verified: row.get("otp_verified"),
            pricing_tier_id: row.get("pricing_tier_id"),
            shipping_cost: row.get("shipping_cost"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

impl TryFrom<ParcelRow> for Parcel {
    type Error = DomainError;

    fn try_from(row: ParcelRow) -> Result<Self, Self::Error> {
        let status = parse_stored_status(&row.status)?;

        // Both OTP columns are written together; a half-populated pair means no code.
        let otp = match (row.otp_code, row.otp_generated_at) {
            (Some(code), Some(generated_at)) => Some(DeliveryOtp {
                code,
                generated_at,
                verified: row.otp_verified,
            }),
            _ => None,
        };

        Ok(Parcel {
            id: row.id,
            tracking_code: row.tracking_code,
            sender_id: row.sender_id,
            sender_email: row.sender_email,
            recipient_email: row.recipient_email,
            description: row.description,
            weight_kg: row.weight_kg,
            pickup_location: row.pickup_location,
            delivery_location: row.delivery_location,
            expected_pickup_at: row.expected_pickup_at,
            expected_delivery_at: row.expected_delivery_at,
            actual_pickup_at: row.actual_pickup_at,
            actual_delivery_at: row.actual_delivery_at,
            status,
            otp,
            pricing_tier_id: row.pricing_tier_id,
            shipping_cost: row.shipping_cost,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_stored_status(value: &str) -> DomainResult<ParcelStatus> {
    ParcelStatus::from_str(value).map_err(|_| {
        DomainError::RepositoryError(anyhow::anyhow!("unknown parcel status in store: {}", value))
    })
}

fn parcel_from_row(row: &Row) -> DomainResult<Parcel> {
    ParcelRow::from(row).try_into()
}

fn history_from_row(row: &Row) -> DomainResult<ParcelHistoryEntry> {
    let status: String = row.get("status");
    Ok(ParcelHistoryEntry {
        id: row.get("id"),
        tracking_code: row.get("tracking_code"),
        status: parse_stored_status(&status)?,
        location: row.get("location"),
        notes: row.get("notes"),
        handled_by: row.get("handled_by"),
        recorded_at: row.get("recorded_at"),
    })
}

fn tamper_alert_from_row(row: &Row) -> TamperAlert {
    TamperAlert {
        id: row.get("id"),
        tracking_code: row.get("tracking_code"),
        reason: row.get("reason"),
        location: row.get("location"),
        reported_by: row.get("reported_by"),
        detected_at: row.get("detected_at"),
        resolved: row.get("resolved"),
        resolution: row.get("resolution"),
        resolved_by: row.get("resolved_by"),
        resolved_at: row.get("resolved_at"),
    }
}

fn is_unique_violation(e: &tokio_postgres::Error) -> bool {
    e.as_db_error()
        .is_some_and(|db_err| db_err.code().code() == "23505")
}

async fn insert_history(
    transaction: &deadpool_postgres::Transaction<'_>,
    entry: &NewHistoryEntry,
) -> DomainResult<i64> {
    let row = transaction
        .query_one(
            "INSERT INTO parcel_history (tracking_code, status, location, notes, handled_by, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
            &[
                &entry.tracking_code,
                &entry.status.as_str(),
                &entry.location,
                &entry.notes,
                &entry.handled_by,
                &entry.recorded_at,
            ],
        )
        .await
        .map_err(map_db_error)?;
    Ok(row.get(0))
}

/// PostgreSQL implementation of ParcelRepository trait
#[derive(Clone)]
pub struct PostgresParcelRepository {
    client: PostgresClient,
}

impl PostgresParcelRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParcelRepository for PostgresParcelRepository {
    #[instrument(skip(self, input), fields(tracking_code = %input.parcel.tracking_code))]
    async fn create_parcel(&self, input: CreateParcelRepoInput) -> DomainResult<Parcel> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let transaction = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let parcel = input.parcel;
        let (otp_code, otp_generated_at, otp_verified) = otp_columns(&parcel);

        let result = transaction
            .execute(
                "INSERT INTO parcels (id, tracking_code, sender_id, sender_email, recipient_email,
                    description, weight_kg, pickup_location, delivery_location, expected_pickup_at,
                    expected_delivery_at, actual_pickup_at, actual_delivery_at, status, otp_code,
                    otp_generated_at, otp_verified, pricing_tier_id, shipping_cost, version,
                    created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)",
                &[
                    &parcel.id,
                    &parcel.tracking_code,
                    &parcel.sender_id,
                    &parcel.sender_email,
                    &parcel.recipient_email,
                    &parcel.description,
                    &parcel.weight_kg,
                    &parcel.pickup_location,
                    &parcel.delivery_location,
                    &parcel.expected_pickup_at,
                    &parcel.expected_delivery_at,
                    &parcel.actual_pickup_at,
                    &parcel.actual_delivery_at,
                    &parcel.status.as_str(),
                    &otp_code,
                    &otp_generated_at,
                    &otp_verified,
                    &parcel.pricing_tier_id,
                    &parcel.shipping_cost,
                    &parcel.version,
                    &parcel.created_at,
                    &parcel.updated_at,
                ],
            )
            .await;

        if let Err(e) = result {
            if is_unique_violation(&e) {
                return Err(DomainError::TrackingCodeConflict(parcel.tracking_code));
            }
            return Err(map_db_error(e));
        }

        insert_history(&transaction, &input.initial_history).await?;

        transaction
            .commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!(tracking_code = %parcel.tracking_code, "parcel created in database");

        Ok(parcel)
    }

    #[instrument(skip(self))]
    async fn get_parcel(&self, tracking_code: &str) -> DomainResult<Option<Parcel>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE tracking_code = $1"),
                &[&tracking_code],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        row.as_ref().map(parcel_from_row).transpose()
    }

    #[instrument(
        skip(self, commit),
        fields(
            tracking_code = %commit.parcel.tracking_code,
            status = %commit.parcel.status,
            expected_version = commit.expected_version
        )
    )]
    async fn commit(&self, commit: ParcelCommit) -> DomainResult<Parcel> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let transaction = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let parcel = &commit.parcel;
        let (otp_code, otp_generated_at, otp_verified) = otp_columns(parcel);

        let row = transaction
            .query_opt(
                &format!(
                    "UPDATE parcels
                     SET status = $1, actual_pickup_at = $2, actual_delivery_at = $3,
                         otp_code = $4, otp_generated_at = $5, otp_verified = $6,
                         updated_at = $7, version = version + 1
                     WHERE tracking_code = $8 AND version = $9
                     RETURNING {PARCEL_COLUMNS}"
                ),
                &[
                    &parcel.status.as_str(),
                    &parcel.actual_pickup_at,
                    &parcel.actual_delivery_at,
                    &otp_code,
                    &otp_generated_at,
                    &otp_verified,
                    &parcel.updated_at,
                    &parcel.tracking_code,
                    &commit.expected_version,
                ],
            )
            .await
            .map_err(map_db_error)?;

        let Some(row) = row else {
            let exists = transaction
                .query_opt(
                    "SELECT 1 FROM parcels WHERE tracking_code = $1",
                    &[&parcel.tracking_code],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?
                .is_some();

            return Err(if exists {
                DomainError::ConcurrentModification(parcel.tracking_code.clone())
            } else {
                DomainError::ParcelNotFound(parcel.tracking_code.clone())
            });
        };

        let updated = parcel_from_row(&row)?;
        insert_history(&transaction, &commit.history).await?;

        match &commit.tamper {
            Some(TamperAlertChange::Open(alert)) => {
                let result = transaction
                    .execute(
                        "INSERT INTO tamper_alerts (id, tracking_code, reason, location, reported_by, detected_at, resolved)
                         VALUES ($1, $2, $3, $4, $5, $6, FALSE)",
                        &[
                            &alert.id,
                            &alert.tracking_code,
                            &alert.reason,
                            &alert.location,
                            &alert.reported_by,
                            &alert.detected_at,
                        ],
                    )
                    .await;

                if let Err(e) = result {
                    if is_unique_violation(&e) {
                        return Err(DomainError::TamperAlertAlreadyOpen(
                            alert.tracking_code.clone(),
                        ));
                    }
                    return Err(map_db_error(e));
                }
            }
            Some(TamperAlertChange::Resolve(resolve)) => {
                let rows_affected = transaction
                    .execute(
                        "UPDATE tamper_alerts
                         SET resolved = TRUE, resolution = $1, resolved_by = $2, resolved_at = $3
                         WHERE id = $4 AND NOT resolved",
                        &[
                            &resolve.resolution,
                            &resolve.resolved_by,
                            &resolve.resolved_at,
                            &resolve.alert_id,
                        ],
                    )
                    .await
                    .map_err(map_db_error)?;

                if rows_affected == 0 {
                    return Err(DomainError::ConcurrentModification(
                        parcel.tracking_code.clone(),
                    ));
                }
            }
            None => {}
        }

        transaction
            .commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(
            tracking_code = %updated.tracking_code,
            version = updated.version,
            "parcel commit applied"
        );

        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn list_parcels(&self, filter: ListParcelsFilter) -> DomainResult<Vec<Parcel>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = match &filter {
            ListParcelsFilter::All => {
                conn.query(
                    &format!("SELECT {PARCEL_COLUMNS} FROM parcels ORDER BY created_at DESC"),
                    &[],
                )
                .await
            }
            ListParcelsFilter::ByStatus(status) => {
                conn.query(
                    &format!(
                        "SELECT {PARCEL_COLUMNS} FROM parcels WHERE status = $1 ORDER BY created_at DESC"
                    ),
                    &[&status.as_str()],
                )
                .await
            }
            ListParcelsFilter::BySender(sender_id) => {
                conn.query(
                    &format!(
                        "SELECT {PARCEL_COLUMNS} FROM parcels WHERE sender_id = $1 ORDER BY created_at DESC"
                    ),
                    &[&sender_id],
                )
                .await
            }
        }
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows.iter().map(parcel_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list_history(&self, tracking_code: &str) -> DomainResult<Vec<ParcelHistoryEntry>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {HISTORY_COLUMNS} FROM parcel_history WHERE tracking_code = $1 ORDER BY id ASC"
                ),
                &[&tracking_code],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows.iter().map(history_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_unresolved_tamper_alert(
        &self,
        tracking_code: &str,
    ) -> DomainResult<Option<TamperAlert>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!(
                    "SELECT {TAMPER_COLUMNS} FROM tamper_alerts WHERE tracking_code = $1 AND NOT resolved"
                ),
                &[&tracking_code],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(tamper_alert_from_row))
    }

    #[instrument(skip(self))]
    async fn list_tamper_alerts(&self, tracking_code: &str) -> DomainResult<Vec<TamperAlert>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {TAMPER_COLUMNS} FROM tamper_alerts WHERE tracking_code = $1
                     ORDER BY detected_at DESC, id DESC"
                ),
                &[&tracking_code],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(tamper_alert_from_row).collect())
    }
}

fn otp_columns(parcel: &Parcel) -> (Option<String>, Option<DateTime<Utc>>, bool) {
    match &parcel.otp {
        Some(otp) => (Some(otp.code.clone()), Some(otp.generated_at), otp.verified),
        None => (None, None, false),
    }
}
