use super::state::Editor;
use crate::client::SchemaClient;
use crate::error::Result;
use crate::payload::{SchemaSubmission, StoredSchema, prepare_submission};
use crate::registry::Registry;
use crate::settings::Settings;

impl Editor {
    /// Run the submission gates and build the payload without sending it.
    pub fn prepare_submission(&self, title: &str) -> Result<SchemaSubmission> {
        prepare_submission(&self.registry, title)
    }

    /// Validate and send the schema. Editor state is never modified, so a
    /// failed call can simply be retried.
    pub fn submit<C: SchemaClient + ?Sized>(
        &self,
        title: &str,
        client: &C,
    ) -> Result<StoredSchema> {
        let submission = self.prepare_submission(title)?;
        tracing::info!(title = %submission.title, "submitting schema");
        match client.create_schema(&submission) {
            Ok(stored) => {
                tracing::info!(id = stored.id, "schema stored");
                Ok(stored)
            }
            Err(err) => {
                tracing::warn!(%err, retryable = err.retryable, "schema submission failed");
                Err(err.into())
            }
        }
    }

    /// Open a stored schema for editing.
    pub fn from_stored(stored: &StoredSchema, settings: Settings) -> Self {
        let registry = Registry::from_stored(stored, &settings);
        Editor::with_registry(registry, settings)
    }
}
