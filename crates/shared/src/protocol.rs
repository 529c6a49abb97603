use serde::{Deserialize, Serialize};

use crate::domain::BillId;

/// Body returned by the store after the receipt upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub file_url: String,
}

impl CreateBillResponse {
    /// Id of the provisional record. The store key wins over `id` when both are present.
    pub fn bill_id(&self) -> Option<BillId> {
        self.key
            .as_deref()
            .or(self.id.as_deref())
            .filter(|id| !id.is_empty())
            .map(BillId::from)
    }
}
