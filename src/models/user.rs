// src/models/user.rs

use serde::{Deserialize, Serialize};

/// Represents a document in the 'users' collection, reduced to the fields
/// the pipeline reads. User management itself lives outside this service,
/// so unknown fields are simply ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
}
