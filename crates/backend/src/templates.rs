use tracing::{info, instrument};

use crate::client::BackendClient;
use crate::error::BackendError;
use crate::models::{NewTemplate, Template, TemplatePatch, TEMPLATES};
use crate::rest::{Order, Query};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFilter {
    pub owner_id: Option<String>,
    pub search: Option<String>,
}

pub struct Templates<'a> {
    client: &'a BackendClient,
}

impl BackendClient {
    pub fn templates(&self) -> Templates<'_> {
        Templates { client: self }
    }
}

fn require(field: &str, value: &str) -> Result<(), BackendError> {
    if value.trim().is_empty() {
        return Err(BackendError::validation(format!("{} is required", field)));
    }
    Ok(())
}

impl Templates<'_> {
    pub async fn list(&self, filter: &TemplateFilter) -> Result<Vec<Template>, BackendError> {
        let mut query = Query::new();
        if let Some(owner) = &filter.owner_id {
            query = query.eq("owner_id", owner);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.search_any(&["name", "description", "category"], search);
        }
        self.client
            .select(TEMPLATES, &query.order("name", Order::Asc))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Template, BackendError> {
        self.client
            .select_one(TEMPLATES, &Query::new().eq("id", id))
            .await?
            .ok_or_else(|| BackendError::not_found(format!("template {}", id)))
    }

    /// Whether `owner_id` already has a template called `name`, ignoring
    /// `except_id`.
    async fn name_taken(
        &self,
        owner_id: &str,
        name: &str,
        except_id: Option<&str>,
    ) -> Result<bool, BackendError> {
        let mut query = Query::new()
            .select("id")
            .eq("owner_id", owner_id)
            .eq("name", name);
        if let Some(id) = except_id {
            query = query.neq("id", id);
        }
        let existing: Option<serde_json::Value> = self.client.select_one(TEMPLATES, &query).await?;
        Ok(existing.is_some())
    }

    #[instrument(skip(self, template), fields(owner_id = %template.owner_id, name = %template.name))]
    pub async fn create(&self, template: &NewTemplate) -> Result<Template, BackendError> {
        require("ownerId", &template.owner_id)?;
        require("name", &template.name)?;
        require("content", &template.content)?;
        if self
            .name_taken(&template.owner_id, template.name.trim(), None)
            .await?
        {
            return Err(BackendError::Conflict {
                message: format!("template named '{}' already exists", template.name.trim()),
            });
        }

        let mut row = template.clone();
        row.name = row.name.trim().to_string();
        let created: Template = self.client.insert(TEMPLATES, &row).await?;
        info!(template_id = %created.id, "Created template");
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &str, patch: &TemplatePatch) -> Result<Template, BackendError> {
        if patch == &TemplatePatch::default() {
            return Err(BackendError::validation("update has no fields"));
        }
        let mut patch = patch.clone();
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
            require("name", name)?;
            let current = self.get(id).await?;
            if *name != current.name && self.name_taken(&current.owner_id, name, Some(id)).await? {
                return Err(BackendError::Conflict {
                    message: format!("template named '{}' already exists", name),
                });
            }
        }
        if let Some(content) = &patch.content {
            require("content", content)?;
        }

        let rows: Vec<Template> = self
            .client
            .update(TEMPLATES, &Query::new().eq("id", id), &patch)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("template {}", id)))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.client
            .delete(TEMPLATES, &Query::new().eq("id", id))
            .await
    }
}
