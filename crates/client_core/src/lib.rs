//! Client side of bill submission: store access, identity lookup and the
//! new-bill form controller.

use async_trait::async_trait;
use shared::{domain::Bill, protocol::CreateBillResponse, routes::Route};

pub mod error;
pub mod form;
mod http_store;
pub mod identity;
mod memory_store;
mod new_bill;
pub mod validation;

pub use error::{IdentityError, StoreError, ValidationError};
pub use http_store::HttpStore;
pub use identity::{IdentityProvider, LocalStorage, StaticIdentity};
pub use memory_store::InMemoryStore;
pub use new_bill::{
    BlockReason, FileChangeOutcome, NewBill, StagedUpload, SubmissionState, SubmitOutcome,
};

/// Multipart body of a receipt upload.
#[derive(Debug, Clone)]
pub struct CreateBillPayload {
    pub file: form::SelectedFile,
    pub email: String,
}

#[async_trait]
pub trait BillsApi: Send + Sync {
    /// Stores the receipt and opens a provisional bill record for it.
    async fn create(&self, payload: CreateBillPayload) -> Result<CreateBillResponse, StoreError>;
    /// Writes the full bill over the record identified by `bill.id`.
    async fn update(&self, bill: &Bill) -> Result<Bill, StoreError>;
    async fn list(&self) -> Result<Vec<Bill>, StoreError>;
}

pub trait Store: Send + Sync {
    fn bills(&self) -> &dyn BillsApi;
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

impl<F> Navigator for F
where
    F: Fn(Route) + Send + Sync,
{
    fn navigate(&self, route: Route) {
        self(route)
    }
}
