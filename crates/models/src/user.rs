use chrono::Utc;
use sea_orm::{entity::prelude::*, DatabaseConnection, Set, SqlErr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::service_request;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    ServiceRequests,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::ServiceRequests => Entity::has_many(service_request::Entity).into(),
        }
    }
}

impl Related<service_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(ModelError::validation("email", "Enter a valid email address."));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), ModelError> {
    if username.trim().is_empty() {
        return Err(ModelError::validation("username", "This field may not be blank."));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ModelError> {
    if phone.is_empty() || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(ModelError::validation("phone", "Phone number must contain only digits."));
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    email: &str,
    username: &str,
    phone: Option<&str>,
) -> Result<Model, ModelError> {
    validate_email(email)?;
    validate_username(username)?;
    if let Some(p) = phone {
        validate_phone(p)?;
    }
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        username: Set(username.to_string()),
        phone: Set(phone.map(str::to_string)),
        is_verified: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    };
    am.insert(db).await.map_err(map_unique_violation)
}

/// Unique violations surface as field-level validation errors rather than
/// opaque database errors.
fn map_unique_violation(e: DbErr) -> ModelError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => {
            if msg.contains("username") {
                ModelError::validation("username", "A user with that username already exists.")
            } else {
                ModelError::validation("email", "A user with that email already exists.")
            }
        }
        _ => ModelError::Db(e.to_string()),
    }
}

pub async fn hard_delete(db: &DatabaseConnection, id: Uuid) -> Result<(), ModelError> {
    Entity::delete_by_id(id).exec(db).await.map_err(|e| ModelError::Db(e.to_string()))?;
    Ok(())
}
