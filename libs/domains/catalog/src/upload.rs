//! Uploaded image files and their validation.

use axum::body::Bytes;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

/// Form field carrying product image files
pub const UPLOADED_IMAGES_FIELD: &str = "uploaded_images";

/// Longest accepted client file name, in characters
pub const MAX_FILE_NAME_LENGTH: usize = 1_000_000;

/// An image file received in a multipart request, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            data: data.into(),
        }
    }
}

/// Image formats recognised by their leading bytes
fn sniff_image(data: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
    ];

    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    SIGNATURES
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, mime)| *mime)
}

fn file_error(index: usize, code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    let mut error = ValidationError::new(code).with_message(message.into());
    error.add_param(Cow::Borrowed("index"), &index);
    error
}

fn check_file(index: usize, file: &UploadedImage) -> Option<ValidationError> {
    if file.file_name.is_empty() {
        return Some(file_error(index, "no_name", "No filename could be determined."));
    }

    let name_length = file.file_name.chars().count();
    if name_length > MAX_FILE_NAME_LENGTH {
        let mut error = file_error(
            index,
            "max_length",
            format!(
                "Ensure this filename has at most {} characters (it has {}).",
                MAX_FILE_NAME_LENGTH, name_length
            ),
        );
        error.add_param(Cow::Borrowed("max"), &MAX_FILE_NAME_LENGTH);
        return Some(error);
    }

    if file.data.is_empty() {
        return Some(file_error(index, "empty_file", "The submitted file is empty."));
    }

    let declared_non_image = file
        .content_type
        .as_deref()
        .is_some_and(|ct| !ct.starts_with("image/"));
    if declared_non_image || sniff_image(&file.data).is_none() {
        return Some(file_error(
            index,
            "invalid_image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        ));
    }

    None
}

/// Validates every uploaded file, reporting each failure under `uploaded_images`
/// with the file's position in the `index` param.
pub fn validate_uploads(files: &[UploadedImage]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    for (index, file) in files.iter().enumerate() {
        if let Some(error) = check_file(index, file) {
            errors.add(UPLOADED_IMAGES_FIELD, error);
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
