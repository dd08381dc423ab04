use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// A sellable product. The slug is what license keys embed and what the
/// storefront uses to re-resolve placeholder product IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub active: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub slug: String,
    pub name: String,
}

impl CreateProduct {
    pub fn validate(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(AppError::BadRequest(msg::SLUG_EMPTY.into()));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        Ok(())
    }
}
