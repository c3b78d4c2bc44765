use serde::{Deserialize, Serialize};

/// Inserted into request extensions once the gate has verified token and user id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Authenticated {
    pub token: String,
    pub user_id: String,
}
