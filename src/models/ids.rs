use serde::{Deserialize, Serialize};

/// Macro for string identifiers assigned by the hosted backend.
macro_rules! backend_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

backend_id!(
    /// Reference to an uploaded blob (usually a URL).
    RemoteRef
);
backend_id!(
    /// Id of a persisted patient record.
    PatientRef
);
backend_id!(
    /// Id of a persisted diagnosis report.
    ReportId
);
backend_id!(UserId);
