//! Customer repository (scoped)
//!
//! Every function takes the organization scope explicitly; the organization
//! id always comes from the scope, never from the caller's input.

use crate::error::{AppError, Result};
use crate::scope::ScopedTx;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
}

pub async fn insert(tx: &mut ScopedTx, input: &CreateCustomerInput) -> Result<Customer> {
    let id = Uuid::new_v4();
    let organization_id = tx.org_id();

    sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (id, organization_id, email, first_name, last_name, phone, created_at)
        VALUES ($1, $2, lower($3), $4, $5, $6, NOW())
        RETURNING id, organization_id, email, first_name, last_name, phone, created_at
        "#,
    )
    .bind(id)
    .bind(organization_id)
    .bind(&input.email)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.phone)
    .fetch_one(tx.conn())
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
            "A customer with email '{}' already exists",
            input.email
        )),
        other => other.into(),
    })
}

pub async fn list(tx: &mut ScopedTx, offset: i64, limit: i64) -> Result<Vec<Customer>> {
    let organization_id = tx.org_id();

    let customers = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, organization_id, email, first_name, last_name, phone, created_at
        FROM customers
        WHERE organization_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(organization_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(tx.conn())
    .await?;

    Ok(customers)
}
