use serde::{Deserialize, Serialize};

/// One entry of the disease catalog (`DiseaseInfo` on the backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseReference {
    pub name: String,
    pub description: String,
    pub precaution: String,
}

impl DiseaseReference {
    pub fn new(name: &str, description: &str, precaution: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            precaution: precaution.to_string(),
        }
    }

    /// Exact, case-insensitive name match.
    pub fn matches_label(&self, label: &str) -> bool {
        self.name.to_lowercase() == label.to_lowercase()
    }
}

/// Find the catalog entry for a model label. No fuzzy matching.
pub fn find_disease<'a>(
    catalog: &'a [DiseaseReference],
    label: &str,
) -> Option<&'a DiseaseReference> {
    catalog.iter().find(|d| d.matches_label(label))
}
