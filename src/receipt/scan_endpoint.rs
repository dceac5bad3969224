//! Defines the endpoint for scanning a receipt image.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, Multipart, State},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    ai::{GenerativeModel, strip_markdown_fences},
    receipt::ReceiptCache,
};

/// The largest accepted upload, in bytes.
pub const MAX_RECEIPT_SIZE: usize = 5 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

const RECEIPT_PROMPT: &str = r#"Analyze this receipt image and extract the following information in JSON format:
- Total amount (just the number)
- Date (in ISO format)
- Description or items purchased (brief summary)
- Merchant/store name
- Suggested category (one of: housing,transportation,groceries,utilities,entertainment,food,shopping,healthcare,education,personal,travel,insurance,gifts,bills,other-expense)

Only respond with valid JSON in this exact format:
{
    "amount": number,
    "date": "ISO date string",
    "description": "string",
    "merchantName": "string",
    "category": "string"
}

If it's not a receipt, return an empty object."#;

/// The state needed to scan a receipt.
#[derive(Clone)]
pub struct ScanReceiptState {
    /// The external generative model that extracts the fields.
    pub model: Arc<dyn GenerativeModel>,
    /// The scan-result cache.
    pub receipt_cache: Arc<ReceiptCache>,
}

impl FromRef<AppState> for ScanReceiptState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            model: state.model.clone(),
            receipt_cache: state.receipt_cache.clone(),
        }
    }
}

/// The structured fields extracted from a receipt image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedReceipt {
    /// The receipt total in dollars.
    pub amount: f64,
    /// The purchase date as reported by the model.
    pub date: Option<String>,
    /// A brief summary of the purchased items.
    pub description: Option<String>,
    /// The merchant or store name.
    #[serde(rename = "merchantName")]
    pub merchant_name: Option<String>,
    /// The suggested expense category.
    pub category: Option<String>,
}

/// A route handler that scans an uploaded receipt image.
///
/// Expects a multipart form with a single `file` field holding a JPEG or PNG
/// of at most [MAX_RECEIPT_SIZE] bytes. The upload's content hash is used to
/// serve repeated scans from the cache.
pub async fn scan_receipt_endpoint(
    State(state): State<ScanReceiptState>,
    multipart: Multipart,
) -> Response {
    let (content_type, bytes) = match read_receipt_upload(multipart).await {
        Ok(upload) => upload,
        Err(error) => return error.into_response(),
    };

    let file_hash = format!("{:x}", md5::compute(&bytes));

    if let Some(cached) = state.receipt_cache.get(&file_hash) {
        return Json(cached).into_response();
    }

    match scan_receipt(state.model.as_ref(), &content_type, &bytes) {
        Ok(receipt) => {
            state.receipt_cache.insert(&file_hash, receipt.clone());
            Json(receipt).into_response()
        }
        Err(error) => error.into_response(),
    }
}

async fn read_receipt_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), Error> {
    while let Some(field) = multipart.next_field().await.map_err(|error| {
        tracing::debug!("could not parse multipart form: {error}");
        Error::Validation("The file provided is invalid.".to_owned())
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(ToOwned::to_owned)
            .unwrap_or_default();

        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(Error::Validation(
                "The file must be an image from type (JPEG, PNG, JPG).".to_owned(),
            ));
        }

        let bytes = field.bytes().await.map_err(|error| {
            tracing::debug!("could not read upload: {error}");
            Error::Validation("The file provided is invalid.".to_owned())
        })?;

        if bytes.len() > MAX_RECEIPT_SIZE {
            return Err(Error::Validation(
                "The file must not exceed 5Mo.".to_owned(),
            ));
        }

        return Ok((content_type, bytes.to_vec()));
    }

    Err(Error::Validation("No files were provided!".to_owned()))
}

/// Send the receipt image to the model and parse the structured reply.
///
/// # Errors
/// Returns:
/// - [Error::Validation] if the model reports the image is not a receipt,
/// - [Error::ExternalService] if the model fails or replies with something
///   other than JSON.
pub fn scan_receipt(
    model: &dyn GenerativeModel,
    content_type: &str,
    image: &[u8],
) -> Result<ScannedReceipt, Error> {
    let reply = model.generate_from_image(content_type, image, RECEIPT_PROMPT)?;

    parse_receipt_reply(&reply)
}

fn parse_receipt_reply(reply: &str) -> Result<ScannedReceipt, Error> {
    let text = strip_markdown_fences(reply);

    let value: serde_json::Value = serde_json::from_str(&text).map_err(|error| {
        Error::ExternalService(format!("model reply is not valid JSON: {error}"))
    })?;

    if value.as_object().is_none_or(|object| object.is_empty()) {
        return Err(Error::Validation(
            "The file provided is not a valid invoice.".to_owned(),
        ));
    }

    let string_field = |name: &str| {
        value
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
    };

    Ok(ScannedReceipt {
        amount: value
            .get("amount")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0),
        date: string_field("date"),
        description: string_field("description"),
        merchant_name: string_field("merchantName"),
        category: string_field("category"),
    })
}
