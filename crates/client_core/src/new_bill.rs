//! Controller behind the new-bill form.
//!
//! A receipt is uploaded as soon as it is picked, which opens a provisional
//! bill in the store. Submitting the form then writes the typed fields over
//! that provisional record and sends the user back to the bills listing.

use std::sync::Arc;

use shared::{
    domain::{Bill, BillId, BillStatus, DEFAULT_PCT},
    routes::Route,
};
use tracing::{debug, error, info, warn};

use crate::{
    form::{parse_int_prefix, BillForm, ChangeEvent, SubmitEvent},
    identity::IdentityProvider,
    validation::validate_receipt,
    CreateBillPayload, Navigator, Store, ValidationError,
};

/// Receipt accepted by the store, waiting for the form to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub bill_id: BillId,
    pub file_url: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SubmissionState {
    #[default]
    Unstaged,
    Staged(StagedUpload),
    /// Terminal. The receipt stays readable after the bill is written.
    Submitted { staged: StagedUpload, bill: Bill },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileChangeOutcome {
    Staged,
    Rejected(ValidationError),
    UploadFailed,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    InvalidFile,
    NoStagedUpload,
    MissingIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Submitted(Bill),
    Blocked(BlockReason),
    Failed,
    Ignored,
}

pub struct NewBill {
    form: BillForm,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityProvider>,
    file_is_valid: bool,
    state: SubmissionState,
}

impl NewBill {
    pub fn new(
        form: BillForm,
        navigator: Arc<dyn Navigator>,
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            form,
            navigator,
            store,
            identity,
            file_is_valid: false,
            state: SubmissionState::Unstaged,
        }
    }

    pub fn form(&self) -> &BillForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut BillForm {
        &mut self.form
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn file_is_valid(&self) -> bool {
        self.file_is_valid
    }

    pub fn bill_id(&self) -> Option<&str> {
        self.staged().map(|staged| staged.bill_id.as_str())
    }

    pub fn file_url(&self) -> Option<&str> {
        self.staged().map(|staged| staged.file_url.as_str())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.staged().map(|staged| staged.file_name.as_str())
    }

    fn staged(&self) -> Option<&StagedUpload> {
        match &self.state {
            SubmissionState::Staged(staged) | SubmissionState::Submitted { staged, .. } => {
                Some(staged)
            }
            SubmissionState::Unstaged => None,
        }
    }

    /// Validates the picked receipt and uploads it.
    ///
    /// Upload failures are logged and leave any previously staged receipt as is.
    pub async fn handle_change_file(&mut self, event: ChangeEvent) -> FileChangeOutcome {
        if matches!(self.state, SubmissionState::Submitted { .. }) {
            debug!("bill already submitted; ignoring file change");
            return FileChangeOutcome::Ignored;
        }

        self.form.file.set_files(event.files);
        let files = self.form.file.files();
        if files.len() > 1 {
            warn!(count = files.len(), "several receipts selected; keeping the first");
        }
        let checked = match files.first() {
            Some(file) => validate_receipt(file).map(|()| file.clone()),
            None => Err(ValidationError::MissingFile),
        };
        let file = match checked {
            Ok(file) => file,
            Err(err) => {
                warn!(error = %err, "receipt rejected");
                self.form.file.mark_invalid();
                self.file_is_valid = false;
                return FileChangeOutcome::Rejected(err);
            }
        };

        self.form.file.clear_invalid();
        self.file_is_valid = true;

        let email = match self.identity.current_email() {
            Ok(email) => email,
            Err(err) => {
                error!(error = %err, "cannot upload receipt without a current user");
                return FileChangeOutcome::UploadFailed;
            }
        };

        let file_name = file.base_name().to_string();
        let result = self
            .store
            .bills()
            .create(CreateBillPayload { file, email })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, file_name = %file_name, "receipt upload failed");
                return FileChangeOutcome::UploadFailed;
            }
        };
        let Some(bill_id) = response.bill_id() else {
            error!(file_name = %file_name, "store accepted receipt without returning a bill id");
            return FileChangeOutcome::UploadFailed;
        };

        info!(bill_id = %bill_id, file_name = %file_name, "receipt staged");
        self.state = SubmissionState::Staged(StagedUpload {
            bill_id,
            file_url: response.file_url,
            file_name,
        });
        FileChangeOutcome::Staged
    }

    /// Writes the form over the staged bill and navigates to the listing.
    pub async fn handle_submit(&mut self, event: &mut SubmitEvent) -> SubmitOutcome {
        event.prevent_default();

        if matches!(self.state, SubmissionState::Submitted { .. }) {
            debug!("bill already submitted; ignoring submit");
            return SubmitOutcome::Ignored;
        }
        if !self.file_is_valid {
            warn!("submit blocked: receipt is missing or has an unsupported type");
            return SubmitOutcome::Blocked(BlockReason::InvalidFile);
        }
        let Some(staged) = self.staged().cloned() else {
            warn!("submit blocked: receipt was never stored");
            return SubmitOutcome::Blocked(BlockReason::NoStagedUpload);
        };
        let email = match self.identity.current_email() {
            Ok(email) => email,
            Err(err) => {
                error!(error = %err, "cannot submit bill without a current user");
                return SubmitOutcome::Blocked(BlockReason::MissingIdentity);
            }
        };

        let bill = self.build_bill(&staged, email);
        match self.store.bills().update(&bill).await {
            Ok(saved) => {
                info!(bill_id = %saved.id, "bill submitted");
                self.state = SubmissionState::Submitted {
                    staged,
                    bill: saved.clone(),
                };
                self.navigator.navigate(Route::Bills);
                SubmitOutcome::Submitted(saved)
            }
            Err(err) => {
                error!(error = %err, bill_id = %bill.id, "bill update failed");
                SubmitOutcome::Failed
            }
        }
    }

    fn build_bill(&self, staged: &StagedUpload, email: String) -> Bill {
        let form = &self.form;
        let commentary = Some(form.commentary.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        Bill {
            id: staged.bill_id.clone(),
            email,
            expense_type: form.expense_type.clone(),
            name: form.expense_name.clone(),
            amount: parse_int_prefix(&form.amount),
            date: form.date.clone(),
            vat: form.vat.clone(),
            // zero falls back as well, like an empty field
            pct: parse_int_prefix(&form.pct)
                .filter(|pct| *pct != 0)
                .unwrap_or(DEFAULT_PCT),
            commentary,
            file_url: Some(staged.file_url.clone()),
            file_name: Some(staged.file_name.clone()),
            status: BillStatus::Pending,
            comment_admin: None,
        }
    }
}

#[cfg(test)]
#[path = "tests/new_bill_tests.rs"]
mod tests;
