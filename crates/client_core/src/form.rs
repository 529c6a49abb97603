//! In-memory model of the new-bill form as mounted by the view.
//!
//! Field values are kept as the raw strings a user typed; parsing happens when
//! the controller assembles the bill on submit.

use std::collections::BTreeSet;

pub const FORM_TEST_ID: &str = "form-new-bill";
pub const FILE_INPUT_TEST_ID: &str = "file";
pub const EXPENSE_TYPE_TEST_ID: &str = "expense-type";
pub const EXPENSE_NAME_TEST_ID: &str = "expense-name";
pub const AMOUNT_TEST_ID: &str = "amount";
pub const DATE_TEST_ID: &str = "datepicker";
pub const VAT_TEST_ID: &str = "vat";
pub const PCT_TEST_ID: &str = "pct";
pub const COMMENTARY_TEST_ID: &str = "commentary";

/// Class toggled on the file input when the selected file is rejected.
pub const INVALID_CLASS: &str = "is-invalid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Name as reported by the picker, possibly a full or fake path.
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Last non-empty path segment of the reported name, splitting on both
    /// separators. A name made only of separators is returned whole.
    pub fn base_name(&self) -> &str {
        self.name
            .rsplit(['/', '\\'])
            .find(|segment| !segment.is_empty())
            .unwrap_or(self.name.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileInput {
    files: Vec<SelectedFile>,
    class_list: BTreeSet<String>,
}

impl FileInput {
    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn set_files(&mut self, files: Vec<SelectedFile>) {
        self.files = files;
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list.contains(class)
    }

    pub fn is_invalid(&self) -> bool {
        self.has_class(INVALID_CLASS)
    }

    pub fn mark_invalid(&mut self) {
        self.class_list.insert(INVALID_CLASS.to_string());
    }

    pub fn clear_invalid(&mut self) {
        self.class_list.remove(INVALID_CLASS);
    }
}

#[derive(Debug, Clone, Default)]
pub struct BillForm {
    pub expense_type: String,
    pub expense_name: String,
    pub amount: String,
    pub date: String,
    pub vat: String,
    pub pct: String,
    pub commentary: String,
    pub file: FileInput,
}

impl BillForm {
    /// Looks a text field up by its `data-testid`.
    pub fn field(&self, test_id: &str) -> Option<&str> {
        let value = match test_id {
            EXPENSE_TYPE_TEST_ID => &self.expense_type,
            EXPENSE_NAME_TEST_ID => &self.expense_name,
            AMOUNT_TEST_ID => &self.amount,
            DATE_TEST_ID => &self.date,
            VAT_TEST_ID => &self.vat,
            PCT_TEST_ID => &self.pct,
            COMMENTARY_TEST_ID => &self.commentary,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn set_field(&mut self, test_id: &str, value: impl Into<String>) -> bool {
        let slot = match test_id {
            EXPENSE_TYPE_TEST_ID => &mut self.expense_type,
            EXPENSE_NAME_TEST_ID => &mut self.expense_name,
            AMOUNT_TEST_ID => &mut self.amount,
            DATE_TEST_ID => &mut self.date,
            VAT_TEST_ID => &mut self.vat,
            PCT_TEST_ID => &mut self.pct,
            COMMENTARY_TEST_ID => &mut self.commentary,
            _ => return false,
        };
        *slot = value.into();
        true
    }
}

/// Change event fired by the file input.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub files: Vec<SelectedFile>,
}

impl ChangeEvent {
    pub fn single(file: SelectedFile) -> Self {
        Self { files: vec![file] }
    }
}

/// Submit event fired by the form.
#[derive(Debug, Default)]
pub struct SubmitEvent {
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses the native reload so the controller can navigate itself.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Integer prefix parse matching the view's number inputs: leading
/// whitespace and sign are accepted, parsing stops at the first non-digit.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}
