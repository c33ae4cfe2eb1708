//! Registry entry shape exposed to discovery callers.

use crate::model::canonical::Category;
use serde::Serialize;

/// One registered canonical property.
///
/// `disease_id == None` marks a common (disease-independent) property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyEntry {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub disease_id: Option<String>,
}
