//! Canonical mapping from producer event types to data classifications.
//!
//! The tables here are configuration data. Supporting a new event producer
//! means adding a row, never a branch.

use serde::Serialize;

use crate::SensitivityLevel;

/// Classification of the data an event type reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassificationDescriptor {
    /// Display name of the canonical inventory entry.
    pub data_name: &'static str,
    /// Raw classification tag used to pick a category.
    pub data_type: &'static str,
    /// Storage location label of the producing service.
    pub storage_location: &'static str,
    /// Processing purpose.
    pub purpose: &'static str,
    /// Lawful basis for processing.
    pub legal_basis: &'static str,
}

/// Category name and sensitivity assigned to a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryAssignment {
    /// Unique category name.
    pub name: &'static str,
    /// Sensitivity of the category.
    pub sensitivity: SensitivityLevel,
}

const CONTRACT_BASIS: &str = "Contract - Employment agreement";

const USER_ACCOUNT_DATA: ClassificationDescriptor = ClassificationDescriptor {
    data_name: "User Account Data",
    data_type: "personal",
    storage_location: "user_management_service.users",
    purpose: "User authentication and identification",
    legal_basis: CONTRACT_BASIS,
};

const EMPLOYEE_PERSONAL_DATA: ClassificationDescriptor = ClassificationDescriptor {
    data_name: "Employee Personal Data",
    data_type: "personal",
    storage_location: "employee_management_service.employees",
    purpose: "Human resource management and employment record keeping",
    legal_basis: CONTRACT_BASIS,
};

const EMPLOYEE_SALARY_DATA: ClassificationDescriptor = ClassificationDescriptor {
    data_name: "Employee Salary Data",
    data_type: "sensitive",
    storage_location: "employee_management_service.salaries",
    purpose: "Payroll processing and compensation management",
    legal_basis: CONTRACT_BASIS,
};

const ATTENDANCE_RECORDS: ClassificationDescriptor = ClassificationDescriptor {
    data_name: "Attendance Records",
    data_type: "employment",
    storage_location: "attendance_management_service.attendance",
    purpose: "Time tracking and work hour monitoring",
    legal_basis: CONTRACT_BASIS,
};

const LEAVE_RECORDS: ClassificationDescriptor = ClassificationDescriptor {
    data_name: "Leave Records",
    data_type: "employment",
    storage_location: "leave_management_service.leaves",
    purpose: "Leave management and absence tracking",
    legal_basis: CONTRACT_BASIS,
};

const COMMUNICATION_RECORDS: ClassificationDescriptor = ClassificationDescriptor {
    data_name: "Communication Records",
    data_type: "operational",
    storage_location: "notification_service.notifications",
    purpose: "Communication tracking and audit",
    legal_basis: "Legitimate Interest - Business operations",
};

const CLASSIFICATIONS: &[(&str, ClassificationDescriptor)] = &[
    ("user-created", USER_ACCOUNT_DATA),
    ("user-updated", USER_ACCOUNT_DATA),
    ("employee-created", EMPLOYEE_PERSONAL_DATA),
    ("employee-updated", EMPLOYEE_PERSONAL_DATA),
    ("employee-salary-updated", EMPLOYEE_SALARY_DATA),
    ("employee-salary-increment", EMPLOYEE_SALARY_DATA),
    ("attendance-checkin", ATTENDANCE_RECORDS),
    ("attendance-checkout", ATTENDANCE_RECORDS),
    ("leave-requested", LEAVE_RECORDS),
    ("leave-approved", LEAVE_RECORDS),
    ("notification-sent", COMMUNICATION_RECORDS),
];

const CATEGORY_ASSIGNMENTS: &[(&str, CategoryAssignment)] = &[
    (
        "personal",
        CategoryAssignment {
            name: "Personal Data",
            sensitivity: SensitivityLevel::High,
        },
    ),
    (
        "sensitive",
        CategoryAssignment {
            name: "Sensitive Data",
            sensitivity: SensitivityLevel::Critical,
        },
    ),
    (
        "employment",
        CategoryAssignment {
            name: "Employment Data",
            sensitivity: SensitivityLevel::Medium,
        },
    ),
    (
        "operational",
        CategoryAssignment {
            name: "Operational Data",
            sensitivity: SensitivityLevel::Low,
        },
    ),
];

const FALLBACK_CATEGORY: CategoryAssignment = CategoryAssignment {
    name: "Other Data",
    sensitivity: SensitivityLevel::Medium,
};

/// Returns the classification for an event type, or `None` when unmapped.
#[must_use]
pub fn classify(event_type: &str) -> Option<&'static ClassificationDescriptor> {
    CLASSIFICATIONS
        .iter()
        .find(|(mapped_type, _)| *mapped_type == event_type)
        .map(|(_, descriptor)| descriptor)
}

/// Returns every event type that has a classification.
pub fn classified_event_types() -> impl Iterator<Item = &'static str> {
    CLASSIFICATIONS.iter().map(|(event_type, _)| *event_type)
}

/// Returns the category a data type belongs to, falling back to "Other Data".
#[must_use]
pub fn category_for_data_type(data_type: &str) -> CategoryAssignment {
    CATEGORY_ASSIGNMENTS
        .iter()
        .find(|(mapped_type, _)| *mapped_type == data_type)
        .map(|(_, assignment)| *assignment)
        .unwrap_or(FALLBACK_CATEGORY)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{SensitivityLevel, category_for_data_type, classified_event_types, classify};

    #[test]
    fn known_event_types_resolve_to_descriptors() {
        let descriptor = classify("employee-salary-increment");
        assert!(descriptor.is_some_and(|descriptor| {
            descriptor.data_name == "Employee Salary Data" && descriptor.data_type == "sensitive"
        }));
    }

    #[test]
    fn unknown_event_types_are_absent() {
        assert!(classify("payroll-export-generated").is_none());
        assert!(classify("").is_none());
    }

    #[test]
    fn sibling_event_types_share_one_inventory_key() {
        let created = classify("user-created");
        let updated = classify("user-updated");
        assert!(created.is_some());
        assert_eq!(created, updated);
    }

    #[test]
    fn event_types_are_unique() {
        let event_types: Vec<&str> = classified_event_types().collect();
        let distinct: HashSet<&str> = event_types.iter().copied().collect();
        assert_eq!(event_types.len(), distinct.len());
    }

    #[test]
    fn data_types_map_to_categories_with_fallback() {
        assert_eq!(category_for_data_type("sensitive").name, "Sensitive Data");
        assert_eq!(
            category_for_data_type("sensitive").sensitivity,
            SensitivityLevel::Critical
        );

        let fallback = category_for_data_type("biometric");
        assert_eq!(fallback.name, "Other Data");
        assert_eq!(fallback.sensitivity, SensitivityLevel::Medium);
    }
}
