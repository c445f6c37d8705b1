use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::client::BackendClient;
use crate::error::BackendError;

pub const ADMIN_CREATE_USER: &str = "admin-create-user";
pub const ADMIN_DELETE_USER: &str = "admin-delete-user";

impl BackendClient {
    /// Calls a serverless function with the service key. Never retried.
    #[instrument(skip(self, body))]
    pub async fn invoke<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let request = self.request(Method::POST, &format!("/functions/v1/{}", name), None)?;
        self.send_json(request, body).await
    }

    /// Like [`BackendClient::invoke`] for functions whose response body is ignored.
    #[instrument(skip(self, body))]
    pub async fn invoke_unit<B: Serialize + ?Sized>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, &format!("/functions/v1/{}", name), None)?
            .json(body);
        self.send_empty(request).await
    }
}
