use std::collections::HashMap;

use async_trait::async_trait;
use shared::{
    domain::{Bill, BillId, BillStatus, DEFAULT_PCT},
    protocol::CreateBillResponse,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{BillsApi, CreateBillPayload, Store, StoreError};

/// Process-local bill store. Receipts are kept in memory next to their bill.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    bills: Mutex<HashMap<BillId, Bill>>,
    receipts: Mutex<HashMap<BillId, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bills(bills: impl IntoIterator<Item = Bill>) -> Self {
        let bills = bills
            .into_iter()
            .map(|bill| (bill.id.clone(), bill))
            .collect();
        Self {
            bills: Mutex::new(bills),
            receipts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, id: &BillId) -> Option<Bill> {
        self.bills.lock().await.get(id).cloned()
    }

    pub async fn receipt(&self, id: &BillId) -> Option<Vec<u8>> {
        self.receipts.lock().await.get(id).cloned()
    }
}

#[async_trait]
impl BillsApi for InMemoryStore {
    async fn create(&self, payload: CreateBillPayload) -> Result<CreateBillResponse, StoreError> {
        let key = Uuid::new_v4().simple().to_string();
        let bill_id = BillId(key.clone());
        let file_name = payload.file.base_name().to_string();
        let file_url = format!("memory://bills/{key}/{file_name}");

        let provisional = Bill {
            id: bill_id.clone(),
            email: payload.email,
            expense_type: String::new(),
            name: String::new(),
            amount: None,
            date: String::new(),
            vat: String::new(),
            pct: DEFAULT_PCT,
            commentary: None,
            file_url: Some(file_url.clone()),
            file_name: Some(file_name),
            status: BillStatus::Pending,
            comment_admin: None,
        };

        self.receipts
            .lock()
            .await
            .insert(bill_id.clone(), payload.file.bytes);
        self.bills.lock().await.insert(bill_id, provisional);
        debug!(key = %key, "stored provisional bill");

        Ok(CreateBillResponse {
            id: Some(key.clone()),
            key: Some(key),
            file_url,
        })
    }

    async fn update(&self, bill: &Bill) -> Result<Bill, StoreError> {
        self.bills
            .lock()
            .await
            .insert(bill.id.clone(), bill.clone());
        Ok(bill.clone())
    }

    async fn list(&self) -> Result<Vec<Bill>, StoreError> {
        let mut bills: Vec<Bill> = self.bills.lock().await.values().cloned().collect();
        bills.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(bills)
    }
}

impl Store for InMemoryStore {
    fn bills(&self) -> &dyn BillsApi {
        self
    }
}
