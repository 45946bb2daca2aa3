use crate::entities::label_entity;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const LABEL_MAX_LEN: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabelRequest {
    #[schema(example = "ui")]
    pub name: String,
}

impl LabelRequest {
    pub fn validate(&self) -> AppResult<()> {
        let len = self.name.trim().chars().count();
        if len == 0 || len > LABEL_MAX_LEN {
            return Err(AppError::ValidationError(format!(
                "Label name must be between 1 and {LABEL_MAX_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LabelResponse {
    pub id: i32,
    pub name: String,
}

impl From<label_entity::Model> for LabelResponse {
    fn from(m: label_entity::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
        }
    }
}
