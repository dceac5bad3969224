//! The generative-model collaborator used for receipt scanning and insights.

use crate::Error;

/// An external text/vision completion service.
///
/// Calls are synchronous from the caller's perspective: the receipt-scan
/// endpoint waits for the reply and fails the request on error, while the
/// background jobs log failures and fall back to canned output.
pub trait GenerativeModel: Send + Sync {
    /// Request a text completion for `prompt`.
    ///
    /// # Errors
    /// Returns [Error::ExternalService] if the model cannot be reached or
    /// rejects the request.
    fn generate(&self, prompt: &str) -> Result<String, Error>;

    /// Request a text completion for `prompt` grounded in an image.
    ///
    /// # Errors
    /// Returns [Error::ExternalService] if the model cannot be reached or
    /// rejects the request.
    fn generate_from_image(
        &self,
        mime_type: &str,
        image: &[u8],
        prompt: &str,
    ) -> Result<String, Error>;
}

/// A [GenerativeModel] for deployments without a configured model.
///
/// Every call fails with an external-service error, so receipt scans return
/// an opaque 500 and report generation falls back to the generic insights.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledModel;

impl GenerativeModel for DisabledModel {
    fn generate(&self, _prompt: &str) -> Result<String, Error> {
        Err(Error::ExternalService(
            "no generative model is configured".to_owned(),
        ))
    }

    fn generate_from_image(
        &self,
        _mime_type: &str,
        _image: &[u8],
        _prompt: &str,
    ) -> Result<String, Error> {
        Err(Error::ExternalService(
            "no generative model is configured".to_owned(),
        ))
    }
}

/// Strip the markdown code fences models like to wrap JSON replies in.
pub(crate) fn strip_markdown_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_owned()
}
