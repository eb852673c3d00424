//! The outcome of reconciling a single resource (§3 "ApplyResult").

use serde::{Deserialize, Serialize};

use crate::error::AutopilotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    VerifySuccess,
    VerifyError,
    CreateSuccess,
    CreateError,
    UpdateSuccess,
    UpdateError,
}

impl ApplyStatus {
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::VerifyError | Self::CreateError | Self::UpdateError
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub status: ApplyStatus,
    #[serde(default)]
    pub errors: Vec<AutopilotError>,
}

impl ApplyResult {
    pub fn verify_success() -> Self {
        Self {
            status: ApplyStatus::VerifySuccess,
            errors: Vec::new(),
        }
    }

    pub fn create_success() -> Self {
        Self {
            status: ApplyStatus::CreateSuccess,
            errors: Vec::new(),
        }
    }

    pub fn update_success() -> Self {
        Self {
            status: ApplyStatus::UpdateSuccess,
            errors: Vec::new(),
        }
    }

    pub fn verify_error(err: AutopilotError) -> Self {
        Self {
            status: ApplyStatus::VerifyError,
            errors: vec![err],
        }
    }

    pub fn create_error(err: AutopilotError) -> Self {
        Self {
            status: ApplyStatus::CreateError,
            errors: vec![err],
        }
    }

    pub fn update_error(err: AutopilotError) -> Self {
        Self {
            status: ApplyStatus::UpdateError,
            errors: vec![err],
        }
    }
}
