use serde::{Deserialize, Serialize};

/// Error for a string that names no variant of a backend enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {field} value: {value:?}")]
pub struct ModelError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Wire names double as serde names so JSON matches the backend exactly.
/// Ordering follows declaration order (pipeline order for statuses).
///
/// The `else Fallback => "name"` form declares an open enum: any wire value
/// outside the list deserializes to the fallback variant instead of failing.
/// `FromStr` stays strict in both forms.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        str_enum!(@impl $name { $($variant => $s),+ });
    };

    ($name:ident { $($variant:ident => $s:literal),+ $(,)? } else $fallback:ident => $fs:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant,)+
            #[serde(rename = $fs)]
            $fallback,
        }

        impl $name {
            /// Lenient parse used for backend payloads.
            pub fn from_wire(s: &str) -> Self {
                s.parse().unwrap_or(Self::$fallback)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::from_wire(&raw))
            }
        }

        str_enum!(@impl $name { $($variant => $s),+ } $fallback => $fs);
    };

    (@impl $name:ident { $($variant:ident => $s:literal),+ } $($fallback:ident => $fs:literal)?) => {
        impl $name {
            /// Every recognized variant, without the fallback.
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                    $(Self::$fallback => $fs,)?
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
                    _ => Err(ModelError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(PipelineStatus {
    Draft => "draft",
    Extracting => "extracting",
    Classifying => "classifying",
    Validating => "validating",
    Reviewing => "reviewing",
    Generating => "generating",
    Completed => "completed",
    Error => "error",
} else Unknown => "unknown");

str_enum!(StepStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

str_enum!(EntityType {
    Partnership => "partnership",
    Proprietorship => "proprietorship",
    Company => "company",
    Llp => "llp",
    Trading => "trading",
});

str_enum!(ReviewStatus {
    Pending => "pending",
    Resolved => "resolved",
    AutoApproved => "auto_approved",
});

str_enum!(ClassificationSource {
    Precedent => "precedent",
    Rule => "rule",
    Ai => "ai",
});

str_enum!(UserRole {
    Admin => "admin",
    Ca => "ca",
    Staff => "staff",
});

str_enum!(LoanType {
    TermLoan => "term_loan",
    WorkingCapital => "working_capital",
    CcOd => "cc_od",
    Other => "other",
});

impl PipelineStatus {
    /// Statuses at which progress polling stops.
    /// `Reviewing` counts: the pipeline is paused on human input.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Reviewing)
    }

    /// Statuses during which the backend is actively working.
    pub fn is_processing(self) -> bool {
        matches!(
            self,
            Self::Extracting | Self::Classifying | Self::Validating | Self::Generating
        )
    }

    /// Human label used by status badges and the status bar.
    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Extracting => "Extracting",
            Self::Classifying => "Classifying",
            Self::Validating => "Validating",
            Self::Reviewing => "Reviewing",
            Self::Generating => "Generating",
            Self::Completed => "Completed",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

impl EntityType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Partnership => "Partnership",
            Self::Proprietorship => "Proprietorship",
            Self::Company => "Company",
            Self::Llp => "LLP",
            Self::Trading => "Trading",
        }
    }
}

impl LoanType {
    pub fn label(self) -> &'static str {
        match self {
            Self::TermLoan => "Term Loan",
            Self::WorkingCapital => "Working Capital",
            Self::CcOd => "CC/OD",
            Self::Other => "Other",
        }
    }
}
