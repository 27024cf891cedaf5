use std::str::FromStr;

use custodia_core::AppError;
use serde::{Deserialize, Serialize};

/// Effective role of a report viewer, ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViewerRole {
    /// Regular employee.
    #[serde(rename = "employee")]
    Employee,
    /// Line manager.
    #[serde(rename = "manager")]
    Manager,
    /// HR manager.
    #[serde(rename = "HR_Manager")]
    HrManager,
    /// HR administrator.
    #[serde(rename = "HR_Admin")]
    HrAdmin,
}

impl ViewerRole {
    /// Returns the highest known role in `role_names`, if any.
    ///
    /// `admin` counts as an HR administrator.
    #[must_use]
    pub fn from_role_names<I, S>(role_names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        role_names
            .into_iter()
            .filter_map(|role_name| Self::from_str(role_name.as_ref()).ok())
            .max()
    }

    /// Returns the stable role name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Manager => "manager",
            Self::HrManager => "HR_Manager",
            Self::HrAdmin => "HR_Admin",
        }
    }

    /// Returns true for roles with HR reporting rights.
    #[must_use]
    pub fn is_hr(&self) -> bool {
        matches!(self, Self::HrAdmin | Self::HrManager)
    }
}

impl FromStr for ViewerRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "HR_Admin" | "admin" => Ok(Self::HrAdmin),
            "HR_Manager" => Ok(Self::HrManager),
            "manager" => Ok(Self::Manager),
            "employee" => Ok(Self::Employee),
            _ => Err(AppError::Validation(format!("unknown viewer role '{value}'"))),
        }
    }
}
