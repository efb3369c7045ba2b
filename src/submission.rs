use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Raw request body received from the frontend
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    /// Profile photo as a data URL: `data:<mimetype>;base64,<payload>`
    pub file: String,
    /// Invitee name
    pub name: String,
    /// Visit/event date
    pub date: String,
    /// Mobile number
    pub mobile: String,
    /// Academic year
    pub year: String,
    /// Section
    pub section: String,
}

/// A decoded registration submission, consumed once by the pipeline
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: String,
    pub date: String,
    pub mobile: String,
    pub year: String,
    pub section: String,
    /// Decoded photo bytes
    pub photo: Vec<u8>,
    /// Declared photo media type, e.g. `image/png`
    pub photo_content_type: String,
}

/// One append-only row in the record store, created exactly once per
/// successful submission and never mutated
#[derive(Debug, Clone)]
pub struct InviteRecord {
    pub submitted_at: DateTime<Utc>,
    pub name: String,
    pub date: String,
    pub mobile: String,
    pub invite_id: String,
    pub year: String,
    pub section: String,
    pub photo_url: String,
}

/// Errors from parsing the submitted photo data URL
#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("Data URL has no comma separator")]
    MissingSeparator,
    #[error("Data URL header is malformed: {0}")]
    MalformedHeader(String),
    #[error("Data URL payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Parse a `data:<mimetype>;base64,<payload>` URL into raw bytes and the
/// declared media type.
pub fn parse_data_url(data_url: &str) -> Result<(Vec<u8>, String), DataUrlError> {
    let (header, encoded) = data_url
        .split_once(',')
        .ok_or(DataUrlError::MissingSeparator)?;

    let content_type = header
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .filter(|mime| !mime.is_empty())
        .ok_or_else(|| DataUrlError::MalformedHeader(header.to_string()))?
        .to_string();

    let bytes = BASE64.decode(encoded.trim())?;

    Ok((bytes, content_type))
}

/// File extension for a photo media type, used when naming the uploaded asset
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

impl Submission {
    /// Decode a raw request into a submission, parsing the photo data URL
    pub fn from_request(request: SubmissionRequest) -> Result<Self, DataUrlError> {
        let (photo, photo_content_type) = parse_data_url(&request.file)?;

        Ok(Self {
            name: request.name,
            date: request.date,
            mobile: request.mobile,
            year: request.year,
            section: request.section,
            photo,
            photo_content_type,
        })
    }
}
