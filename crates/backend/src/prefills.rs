use serde_json::Value;
use tracing::{info, instrument};

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::{NewPrefill, Prefill, PrefillPatch, PREFILLS};
use crate::rest::{Order, Query};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefillFilter {
    pub owner_id: Option<String>,
    pub template_id: Option<String>,
}

pub struct Prefills<'a> {
    client: &'a BackendClient,
}

impl BackendClient {
    pub fn prefills(&self) -> Prefills<'_> {
        Prefills { client: self }
    }
}

fn check_fields(fields: &Value) -> Result<(), BackendError> {
    if !fields.is_object() {
        return Err(BackendError::validation(
            "fields must be an object of placeholder to value",
        ));
    }
    Ok(())
}

impl Prefills<'_> {
    pub async fn list(&self, filter: &PrefillFilter) -> Result<Vec<Prefill>, BackendError> {
        let mut query = Query::new();
        if let Some(owner) = &filter.owner_id {
            query = query.eq("owner_id", owner);
        }
        if let Some(template) = &filter.template_id {
            query = query.eq("template_id", template);
        }
        self.client
            .select(PREFILLS, &query.order("created_at", Order::Desc))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Prefill, BackendError> {
        self.client
            .select_one(PREFILLS, &Query::new().eq("id", id))
            .await?
            .ok_or_else(|| BackendError::not_found(format!("prefill {}", id)))
    }

    #[instrument(skip(self, prefill), fields(template_id = %prefill.template_id))]
    pub async fn create(&self, prefill: &NewPrefill) -> Result<Prefill, BackendError> {
        if prefill.name.trim().is_empty() {
            return Err(BackendError::validation("name is required"));
        }
        if prefill.owner_id.trim().is_empty() || prefill.template_id.trim().is_empty() {
            return Err(BackendError::validation("ownerId and templateId are required"));
        }
        check_fields(&prefill.fields)?;
        let created: Prefill = self.client.insert(PREFILLS, prefill).await?;
        info!(prefill_id = %created.id, "Created prefill");
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: &PrefillPatch) -> Result<Prefill, BackendError> {
        if patch == &PrefillPatch::default() {
            return Err(BackendError::validation("update has no fields"));
        }
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(BackendError::validation("name is required"));
            }
        }
        if let Some(fields) = &patch.fields {
            check_fields(fields)?;
        }
        let rows: Vec<Prefill> = self
            .client
            .update(PREFILLS, &Query::new().eq("id", id), patch)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("prefill {}", id)))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.client
            .delete(PREFILLS, &Query::new().eq("id", id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_objects_are_accepted_as_fields() {
        assert!(check_fields(&json!({ "product": "Widget" })).is_ok());
        assert!(check_fields(&json!({})).is_ok());
        assert!(check_fields(&json!(["a"])).is_err());
        assert!(check_fields(&json!("a")).is_err());
        assert!(check_fields(&Value::Null).is_err());
    }
}
