use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex as StdMutex,
};

use async_trait::async_trait;
use shared::{domain::CurrentUser, protocol::CreateBillResponse};
use tokio::sync::Mutex;

use super::*;
use crate::{
    form::{SelectedFile, AMOUNT_TEST_ID, INVALID_CLASS},
    identity::{LocalStorage, USER_KEY},
    BillsApi, InMemoryStore, StaticIdentity, StoreError,
};

struct TestStore {
    create_response: CreateBillResponse,
    create_fails_with: Option<(u16, String)>,
    creates_before_failing: Option<usize>,
    update_fails_with: Option<(u16, String)>,
    bills_calls: AtomicUsize,
    created: Mutex<Vec<CreateBillPayload>>,
    updated: Mutex<Vec<Bill>>,
}

impl TestStore {
    fn ok() -> Self {
        Self {
            create_response: CreateBillResponse {
                id: None,
                key: Some("1234".into()),
                file_url: "https://localhost:3456/images/test.jpg".into(),
            },
            create_fails_with: None,
            creates_before_failing: None,
            update_fails_with: None,
            bills_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
        }
    }

    fn failing_create(status: u16, message: &str) -> Self {
        Self {
            create_fails_with: Some((status, message.to_string())),
            ..Self::ok()
        }
    }

    /// Accepts `count` uploads, then fails every later one.
    fn failing_create_after(count: usize, status: u16, message: &str) -> Self {
        Self {
            creates_before_failing: Some(count),
            ..Self::failing_create(status, message)
        }
    }

    fn failing_update(status: u16, message: &str) -> Self {
        Self {
            update_fails_with: Some((status, message.to_string())),
            ..Self::ok()
        }
    }

    fn with_create_response(response: CreateBillResponse) -> Self {
        Self {
            create_response: response,
            ..Self::ok()
        }
    }

    fn bills_calls(&self) -> usize {
        self.bills_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillsApi for TestStore {
    async fn create(&self, payload: CreateBillPayload) -> Result<CreateBillResponse, StoreError> {
        let mut created = self.created.lock().await;
        created.push(payload);
        let within_budget = self
            .creates_before_failing
            .is_some_and(|count| created.len() <= count);
        if let Some((status, message)) = self.create_fails_with.as_ref().filter(|_| !within_budget) {
            return Err(StoreError::api(*status, message.clone()));
        }
        Ok(self.create_response.clone())
    }

    async fn update(&self, bill: &Bill) -> Result<Bill, StoreError> {
        self.updated.lock().await.push(bill.clone());
        if let Some((status, message)) = &self.update_fails_with {
            return Err(StoreError::api(*status, message.clone()));
        }
        Ok(bill.clone())
    }

    async fn list(&self) -> Result<Vec<Bill>, StoreError> {
        Ok(self.updated.lock().await.clone())
    }
}

impl Store for TestStore {
    fn bills(&self) -> &dyn BillsApi {
        self.bills_calls.fetch_add(1, Ordering::SeqCst);
        self
    }
}

#[derive(Default)]
struct RecordingNavigator {
    routes: StdMutex<Vec<Route>>,
}

impl RecordingNavigator {
    fn routes(&self) -> Vec<Route> {
        self.routes.lock().expect("routes").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().expect("routes").push(route);
    }
}

fn employee() -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity(CurrentUser {
        user_type: Some(shared::domain::UserType::Employee),
        email: Some("employee@test.tld".into()),
    }))
}

fn filled_form() -> BillForm {
    BillForm {
        expense_type: "Hôtel et logement".into(),
        expense_name: "encore".into(),
        amount: "400".into(),
        date: "2004-04-04".into(),
        vat: "80".into(),
        pct: "20".into(),
        commentary: "séminaire billed".into(),
        ..BillForm::default()
    }
}

fn mount(store: Arc<TestStore>) -> (NewBill, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::default());
    let new_bill = NewBill::new(filled_form(), navigator.clone(), store, employee());
    (new_bill, navigator)
}

fn jpg(name: &str) -> ChangeEvent {
    ChangeEvent::single(SelectedFile::new(name, "image/jpg", b"jpeg".to_vec()))
}

#[tokio::test]
async fn rejects_unsupported_file_types_without_calling_the_store() {
    for mime in ["application/pdf", "image/gif", "text/plain", ""] {
        let store = Arc::new(TestStore::ok());
        let (mut new_bill, _) = mount(store.clone());

        let outcome = new_bill
            .handle_change_file(ChangeEvent::single(SelectedFile::new(
                "test.pdf",
                mime,
                b"%PDF".to_vec(),
            )))
            .await;

        assert!(
            matches!(outcome, FileChangeOutcome::Rejected(_)),
            "{mime}: {outcome:?}"
        );
        assert!(new_bill.form().file.has_class(INVALID_CLASS));
        assert!(!new_bill.file_is_valid());
        assert_eq!(new_bill.bill_id(), None);
        assert_eq!(new_bill.file_url(), None);
        assert_eq!(new_bill.file_name(), None);
        assert!(store.created.lock().await.is_empty());
    }
}

#[tokio::test]
async fn empty_file_list_is_rejected() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store.clone());

    let outcome = new_bill
        .handle_change_file(ChangeEvent { files: Vec::new() })
        .await;

    assert_eq!(
        outcome,
        FileChangeOutcome::Rejected(ValidationError::MissingFile)
    );
    assert!(new_bill.form().file.is_invalid());
    assert_eq!(store.bills_calls(), 0);
}

#[tokio::test]
async fn valid_receipt_is_uploaded_and_staged() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store.clone());

    let outcome = new_bill
        .handle_change_file(jpg("C:\\fakepath\\document.jpg"))
        .await;

    assert_eq!(outcome, FileChangeOutcome::Staged);
    assert!(new_bill.file_is_valid());
    assert!(!new_bill.form().file.is_invalid());
    assert_eq!(new_bill.bill_id(), Some("1234"));
    assert_eq!(
        new_bill.file_url(),
        Some("https://localhost:3456/images/test.jpg")
    );
    assert_eq!(new_bill.file_name(), Some("document.jpg"));

    let created = store.created.lock().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].email, "employee@test.tld");
    assert_eq!(created[0].file.bytes, b"jpeg".to_vec());
}

#[tokio::test]
async fn valid_receipt_clears_a_previous_rejection() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store);

    new_bill
        .handle_change_file(ChangeEvent::single(SelectedFile::new(
            "test.pdf",
            "application/pdf",
            Vec::new(),
        )))
        .await;
    assert!(new_bill.form().file.is_invalid());

    new_bill.handle_change_file(jpg("document.jpg")).await;
    assert!(!new_bill.form().file.is_invalid());
    assert!(new_bill.file_is_valid());
}

#[tokio::test]
async fn failed_upload_leaves_staged_fields_unset() {
    for (status, message) in [(404, "Erreur 404"), (500, "Erreur 500")] {
        let store = Arc::new(TestStore::failing_create(status, message));
        let (mut new_bill, _) = mount(store.clone());

        let outcome = new_bill.handle_change_file(jpg("document.jpg")).await;

        assert_eq!(outcome, FileChangeOutcome::UploadFailed);
        assert_eq!(store.bills_calls(), 1);
        assert_eq!(new_bill.bill_id(), None);
        assert_eq!(new_bill.file_url(), None);
        assert_eq!(new_bill.file_name(), None);
        assert_eq!(new_bill.state(), &SubmissionState::Unstaged);
    }
}

#[tokio::test]
async fn failed_reupload_keeps_the_previous_receipt() {
    let store = Arc::new(TestStore::failing_create_after(1, 500, "Erreur 500"));
    let (mut new_bill, navigator) = mount(store.clone());
    assert_eq!(
        new_bill.handle_change_file(jpg("document.jpg")).await,
        FileChangeOutcome::Staged
    );

    let outcome = new_bill.handle_change_file(jpg("other.jpg")).await;

    assert_eq!(outcome, FileChangeOutcome::UploadFailed);
    assert_eq!(store.created.lock().await.len(), 2);
    assert_eq!(new_bill.bill_id(), Some("1234"));
    assert_eq!(
        new_bill.file_url(),
        Some("https://localhost:3456/images/test.jpg")
    );
    assert_eq!(new_bill.file_name(), Some("document.jpg"));

    let outcome = new_bill.handle_submit(&mut SubmitEvent::new()).await;

    assert!(matches!(outcome, SubmitOutcome::Submitted(_)), "{outcome:?}");
    let updated = store.updated.lock().await;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].id, BillId::from("1234"));
    assert_eq!(updated[0].file_name.as_deref(), Some("document.jpg"));
    assert_eq!(navigator.routes(), vec![Route::Bills]);
}

#[tokio::test]
async fn first_of_several_receipts_is_uploaded() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store.clone());

    let outcome = new_bill
        .handle_change_file(ChangeEvent {
            files: vec![
                SelectedFile::new("first.jpg", "image/jpeg", b"first".to_vec()),
                SelectedFile::new("second.png", "image/png", b"second".to_vec()),
            ],
        })
        .await;

    assert_eq!(outcome, FileChangeOutcome::Staged);
    let created = store.created.lock().await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].file.name, "first.jpg");
    assert_eq!(created[0].file.bytes, b"first".to_vec());
    assert_eq!(new_bill.file_name(), Some("first.jpg"));
}

#[tokio::test]
async fn receipt_named_like_a_folder_keeps_a_file_name() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store.clone());

    let outcome = new_bill.handle_change_file(jpg("scans/")).await;

    assert_eq!(outcome, FileChangeOutcome::Staged);
    assert_eq!(new_bill.file_name(), Some("scans"));
}

#[tokio::test]
async fn response_without_an_id_is_not_staged() {
    let store = Arc::new(TestStore::with_create_response(CreateBillResponse {
        id: None,
        key: None,
        file_url: "https://localhost:3456/images/test.jpg".into(),
    }));
    let (mut new_bill, _) = mount(store);

    let outcome = new_bill.handle_change_file(jpg("document.jpg")).await;

    assert_eq!(outcome, FileChangeOutcome::UploadFailed);
    assert_eq!(new_bill.file_url(), None);
}

#[tokio::test]
async fn upload_needs_a_current_user() {
    let store = Arc::new(TestStore::ok());
    let storage = Arc::new(LocalStorage::in_memory());
    storage
        .set_item(USER_KEY, r#"{"type":"Employee"}"#)
        .expect("set user");
    let mut new_bill = NewBill::new(
        filled_form(),
        Arc::new(RecordingNavigator::default()),
        store.clone(),
        storage,
    );

    let outcome = new_bill.handle_change_file(jpg("document.jpg")).await;

    assert_eq!(outcome, FileChangeOutcome::UploadFailed);
    assert_eq!(store.bills_calls(), 0);
}

#[tokio::test]
async fn submit_updates_the_staged_bill_and_navigates_to_the_listing() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, navigator) = mount(store.clone());
    new_bill
        .handle_change_file(jpg("C:\\fakepath\\document.jpg"))
        .await;

    let mut event = SubmitEvent::new();
    let outcome = new_bill.handle_submit(&mut event).await;

    assert!(event.default_prevented());
    let updated = store.updated.lock().await.clone();
    assert_eq!(updated.len(), 1);
    let bill = &updated[0];
    assert_eq!(bill.id, BillId::from("1234"));
    assert_eq!(bill.email, "employee@test.tld");
    assert_eq!(bill.expense_type, "Hôtel et logement");
    assert_eq!(bill.name, "encore");
    assert_eq!(bill.amount, Some(400));
    assert_eq!(bill.date, "2004-04-04");
    assert_eq!(bill.vat, "80");
    assert_eq!(bill.pct, 20);
    assert_eq!(bill.commentary.as_deref(), Some("séminaire billed"));
    assert_eq!(
        bill.file_url.as_deref(),
        Some("https://localhost:3456/images/test.jpg")
    );
    assert_eq!(bill.file_name.as_deref(), Some("document.jpg"));
    assert_eq!(bill.status, BillStatus::Pending);

    assert_eq!(outcome, SubmitOutcome::Submitted(bill.clone()));
    assert_eq!(navigator.routes(), vec![Route::Bills]);
    assert!(matches!(new_bill.state(), SubmissionState::Submitted { .. }));
    assert_eq!(new_bill.bill_id(), Some("1234"));
    assert_eq!(
        new_bill.file_url(),
        Some("https://localhost:3456/images/test.jpg")
    );
    assert_eq!(new_bill.file_name(), Some("document.jpg"));
}

#[tokio::test]
async fn submit_reads_fields_at_submit_time() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store.clone());
    new_bill.handle_change_file(jpg("document.jpg")).await;

    new_bill.form_mut().set_field(AMOUNT_TEST_ID, "348.90");
    new_bill.form_mut().pct = String::new();
    new_bill.form_mut().commentary = "   ".into();

    new_bill.handle_submit(&mut SubmitEvent::new()).await;

    let updated = store.updated.lock().await;
    assert_eq!(updated[0].amount, Some(348));
    assert_eq!(updated[0].pct, DEFAULT_PCT);
    assert_eq!(updated[0].commentary, None);
}

#[tokio::test]
async fn submit_without_a_valid_file_never_updates() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, navigator) = mount(store.clone());

    let mut event = SubmitEvent::new();
    let outcome = new_bill.handle_submit(&mut event).await;

    assert!(event.default_prevented());
    assert_eq!(outcome, SubmitOutcome::Blocked(BlockReason::InvalidFile));
    assert!(store.updated.lock().await.is_empty());
    assert_eq!(store.bills_calls(), 0);
    assert!(navigator.routes().is_empty());
}

#[tokio::test]
async fn submit_after_rejected_file_never_updates() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, _) = mount(store.clone());
    new_bill.handle_change_file(jpg("document.jpg")).await;
    new_bill
        .handle_change_file(ChangeEvent::single(SelectedFile::new(
            "test.pdf",
            "application/pdf",
            Vec::new(),
        )))
        .await;

    let outcome = new_bill.handle_submit(&mut SubmitEvent::new()).await;

    assert_eq!(outcome, SubmitOutcome::Blocked(BlockReason::InvalidFile));
    assert!(store.updated.lock().await.is_empty());
}

#[tokio::test]
async fn submit_after_failed_upload_never_updates() {
    let store = Arc::new(TestStore::failing_create(500, "Erreur 500"));
    let (mut new_bill, _) = mount(store.clone());
    new_bill.handle_change_file(jpg("document.jpg")).await;
    assert!(new_bill.file_is_valid());

    let outcome = new_bill.handle_submit(&mut SubmitEvent::new()).await;

    assert_eq!(outcome, SubmitOutcome::Blocked(BlockReason::NoStagedUpload));
    assert!(store.updated.lock().await.is_empty());
}

#[tokio::test]
async fn failed_update_keeps_the_staged_receipt_and_stays_put() {
    let store = Arc::new(TestStore::failing_update(500, "Erreur 500"));
    let (mut new_bill, navigator) = mount(store.clone());
    new_bill.handle_change_file(jpg("document.jpg")).await;

    let outcome = new_bill.handle_submit(&mut SubmitEvent::new()).await;

    assert_eq!(outcome, SubmitOutcome::Failed);
    assert!(navigator.routes().is_empty());
    assert_eq!(new_bill.bill_id(), Some("1234"));
    assert_eq!(new_bill.file_name(), Some("document.jpg"));
    assert_eq!(store.updated.lock().await.len(), 1);
}

#[tokio::test]
async fn submitted_controller_ignores_further_events() {
    let store = Arc::new(TestStore::ok());
    let (mut new_bill, navigator) = mount(store.clone());
    new_bill.handle_change_file(jpg("document.jpg")).await;
    new_bill.handle_submit(&mut SubmitEvent::new()).await;

    let mut event = SubmitEvent::new();
    assert_eq!(
        new_bill.handle_submit(&mut event).await,
        SubmitOutcome::Ignored
    );
    assert!(event.default_prevented());
    assert_eq!(
        new_bill.handle_change_file(jpg("other.jpg")).await,
        FileChangeOutcome::Ignored
    );
    assert_eq!(store.updated.lock().await.len(), 1);
    assert_eq!(navigator.routes(), vec![Route::Bills]);
}

#[tokio::test]
async fn full_flow_against_the_in_memory_store() {
    let store = Arc::new(InMemoryStore::new());
    let navigator = Arc::new(RecordingNavigator::default());
    let mut new_bill = NewBill::new(filled_form(), navigator.clone(), store.clone(), employee());

    new_bill
        .handle_change_file(ChangeEvent::single(SelectedFile::new(
            "receipt.png",
            "image/png",
            b"png".to_vec(),
        )))
        .await;
    let bill_id = BillId::from(new_bill.bill_id().expect("staged"));

    let outcome = new_bill.handle_submit(&mut SubmitEvent::new()).await;

    let stored = store.get(&bill_id).await.expect("stored bill");
    assert_eq!(outcome, SubmitOutcome::Submitted(stored.clone()));
    assert_eq!(stored.name, "encore");
    assert_eq!(stored.file_name.as_deref(), Some("receipt.png"));
    assert_eq!(store.bills().list().await.expect("list").len(), 1);
    assert_eq!(navigator.routes(), vec![Route::Bills]);
}

#[tokio::test]
async fn store_update_resolves_to_the_submitted_record() {
    let store = TestStore::ok();
    let bill = Bill {
        id: BillId::from("47qAXb6fIm2zOKkLzMro"),
        email: "a@a".into(),
        expense_type: "Hôtel et logement".into(),
        name: "encore".into(),
        amount: Some(400),
        date: "2004-04-04".into(),
        vat: "80".into(),
        pct: 20,
        commentary: Some("séminaire billed".into()),
        file_url: Some("https://localhost:3456/images/preview-facture-free-201801-pdf-1.jpg".into()),
        file_name: Some("preview-facture-free-201801-pdf-1.jpg".into()),
        status: BillStatus::Pending,
        comment_admin: Some("ok".into()),
    };

    let saved = store.bills().update(&bill).await.expect("update");

    assert_eq!(store.bills_calls(), 1);
    assert_eq!(saved, bill);
}
