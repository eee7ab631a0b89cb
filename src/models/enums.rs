use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AnalysisType {
    FundusImage => "fundus_image",
    ErgReport => "erg_report",
});

// Declaration order is the ordinal order.
str_enum!(Severity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
    Critical => "critical",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
    PreferNotToSay => "prefer_not_to_say",
});

str_enum!(UserRole {
    Admin => "admin",
    User => "user",
});

impl AnalysisType {
    /// Human label used in prompts and summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FundusImage => "Fundus Image",
            Self::ErgReport => "ERG Report",
        }
    }
}

impl Severity {
    /// Lenient parse for model output ("Severe", " moderate ").
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        raw.trim().to_lowercase().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn analysis_type_round_trip() {
        for (variant, s) in [
            (AnalysisType::FundusImage, "fundus_image"),
            (AnalysisType::ErgReport, "erg_report"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AnalysisType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn severity_is_ordinal() {
        assert!(Severity::Mild < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
        assert!(Severity::Severe < Severity::Critical);
    }

    #[test]
    fn severity_lenient_parse() {
        assert_eq!(Severity::parse_lenient(" Severe "), Some(Severity::Severe));
        assert_eq!(Severity::parse_lenient("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::parse_lenient("very bad"), None);
    }

    #[test]
    fn serde_uses_wire_values() {
        let json = serde_json::to_string(&Gender::PreferNotToSay).unwrap();
        assert_eq!(json, "\"prefer_not_to_say\"");
        let parsed: AnalysisType = serde_json::from_str("\"erg_report\"").unwrap();
        assert_eq!(parsed, AnalysisType::ErgReport);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(AnalysisType::from_str("fundus").is_err());
        assert!(Severity::from_str("").is_err());
        assert!(UserRole::from_str("root").is_err());
    }
}
