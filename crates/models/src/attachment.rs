use chrono::Utc;
use sea_orm::{entity::prelude::*, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::service_request;

/// Upload ceiling, matched by the presentation-layer validator.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub service_request_id: Uuid,
    /// Relative path under the media root, always '/'-separated.
    pub file: String,
    pub uploaded_at: DateTimeWithTimeZone,
}

impl Model {
    /// Basename of the stored path.
    pub fn filename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    ServiceRequest,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::ServiceRequest => Entity::belongs_to(service_request::Entity)
                .from(Column::ServiceRequestId)
                .to(service_request::Column::Id)
                .into(),
        }
    }
}

impl Related<service_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_file_size(size: u64) -> Result<(), ModelError> {
    if size > MAX_FILE_SIZE {
        return Err(ModelError::validation("file", "File size must not exceed 5MB."));
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    service_request_id: Uuid,
    file: &str,
) -> Result<Model, ModelError> {
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        service_request_id: Set(service_request_id),
        file: Set(file.to_string()),
        uploaded_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(|e| ModelError::Db(e.to_string()))
}
