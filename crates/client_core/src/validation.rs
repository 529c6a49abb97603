use std::path::Path;

use crate::{error::ValidationError, form::SelectedFile};

pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Checks that a receipt is a JPEG or PNG image.
///
/// The declared MIME type decides. The extension is only consulted when the
/// picker reported no type at all.
pub fn validate_receipt(file: &SelectedFile) -> Result<(), ValidationError> {
    let mime_type = file.mime_type.trim().to_ascii_lowercase();
    let accepted = if mime_type.is_empty() {
        has_allowed_extension(file.base_name())
    } else {
        ALLOWED_MIME_TYPES.contains(&mime_type.as_str())
    };

    if accepted {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType {
            file_name: file.base_name().to_string(),
            mime_type: file.mime_type.clone(),
        })
    }
}

fn has_allowed_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}
