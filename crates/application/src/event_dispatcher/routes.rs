//! Static topic routing table.
//!
//! Supporting a new producer topic means adding a row here; topics without a
//! row fall through to the generic classification handler.

use custodia_domain::EventEnvelope;

/// Topic on which data-deleted audit envelopes are published.
pub const DATA_DELETED_TOPIC: &str = "compliance-data-deleted";

/// Subscribed topics that intentionally have no dedicated route.
const GENERIC_TOPICS: &[&str] = &["user-onboarding-failed"];

/// Payload fields naming the record when an unrouted event is classified.
pub(crate) const GENERIC_RECORD_FIELDS: &[&str] =
    &["id", "user_id", "employee_id", "attendance_id", "leave_id"];

/// Which payload fields identify the record and its subject for a tracking route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackIdentity {
    /// The record id is required and the subject falls back to it.
    RecordFirst {
        record_fields: &'static [&'static str],
        subject_fields: &'static [&'static str],
    },
    /// The subject id is required and the record id is optional.
    SubjectFirst {
        subject_fields: &'static [&'static str],
        record_fields: &'static [&'static str],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrackRoute {
    /// Event type whose classification the route applies.
    pub(crate) classification: &'static str,
    pub(crate) identity: TrackIdentity,
    /// Daily counter bumped after a successful track.
    pub(crate) counter: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteAction {
    Track(TrackRoute),
    RefreshAccess {
        record_fields: &'static [&'static str],
    },
    MarkDeleted {
        record_fields: &'static [&'static str],
    },
    TerminationHold {
        record_fields: &'static [&'static str],
    },
}

const USER_RECORD: &[&str] = &["user_id", "id"];
const EMPLOYEE_RECORD: &[&str] = &["employee_id", "id"];
const DELETED_RECORD: &[&str] = &["user_id", "employee_id", "id"];

const TRACK_USER: RouteAction = RouteAction::Track(TrackRoute {
    classification: "user-created",
    identity: TrackIdentity::RecordFirst {
        record_fields: USER_RECORD,
        subject_fields: &[],
    },
    counter: "data_collected",
});

const TRACK_EMPLOYEE: RouteAction = RouteAction::Track(TrackRoute {
    classification: "employee-created",
    identity: TrackIdentity::RecordFirst {
        record_fields: EMPLOYEE_RECORD,
        subject_fields: &["user_id"],
    },
    counter: "data_collected",
});

const TRACK_ATTENDANCE: RouteAction = RouteAction::Track(TrackRoute {
    classification: "attendance-checkin",
    identity: TrackIdentity::SubjectFirst {
        subject_fields: &["employee_id"],
        record_fields: &["attendance_id", "id"],
    },
    counter: "attendance_records",
});

const TRACK_LEAVE: RouteAction = RouteAction::Track(TrackRoute {
    classification: "leave-requested",
    identity: TrackIdentity::SubjectFirst {
        subject_fields: &["employee_id"],
        record_fields: &["leave_id", "id"],
    },
    counter: "leave_records",
});

const TRACK_NOTIFICATION: RouteAction = RouteAction::Track(TrackRoute {
    classification: "notification-sent",
    identity: TrackIdentity::SubjectFirst {
        subject_fields: &["recipient_id", "employee_id"],
        record_fields: &["notification_id", "id"],
    },
    counter: "notifications_tracked",
});

const REFRESH_USER: RouteAction = RouteAction::RefreshAccess {
    record_fields: USER_RECORD,
};

const REFRESH_EMPLOYEE: RouteAction = RouteAction::RefreshAccess {
    record_fields: EMPLOYEE_RECORD,
};

const MARK_DELETED: RouteAction = RouteAction::MarkDeleted {
    record_fields: DELETED_RECORD,
};

const TERMINATION_HOLD: RouteAction = RouteAction::TerminationHold {
    record_fields: EMPLOYEE_RECORD,
};

const TOPIC_ROUTES: &[(&str, RouteAction)] = &[
    ("user-created", TRACK_USER),
    ("user-onboarding-initiated", TRACK_USER),
    ("user-updated", REFRESH_USER),
    ("user-suspended", REFRESH_USER),
    ("user-activated", REFRESH_USER),
    ("user-role-changed", REFRESH_USER),
    ("user-onboarding-completed", REFRESH_USER),
    ("user-deleted", MARK_DELETED),
    ("employee-created", TRACK_EMPLOYEE),
    ("employee-updated", REFRESH_EMPLOYEE),
    ("employee-promoted", REFRESH_EMPLOYEE),
    ("employee-transferred", REFRESH_EMPLOYEE),
    ("employee-salary-updated", REFRESH_EMPLOYEE),
    ("employee-salary-increment", REFRESH_EMPLOYEE),
    ("employee-contract-started", REFRESH_EMPLOYEE),
    ("employee-contract-renewed", REFRESH_EMPLOYEE),
    ("employee-probation-started", REFRESH_EMPLOYEE),
    ("employee-probation-completed", REFRESH_EMPLOYEE),
    ("employee-deleted", MARK_DELETED),
    ("employee-terminated", TERMINATION_HOLD),
    ("employee-contract-ended", TERMINATION_HOLD),
    ("attendance-checkin", TRACK_ATTENDANCE),
    ("attendance-checkout", TRACK_ATTENDANCE),
    ("attendance-updated", TRACK_ATTENDANCE),
    ("leave-requested", TRACK_LEAVE),
    ("leave-approved", TRACK_LEAVE),
    ("leave-rejected", TRACK_LEAVE),
    ("leave-cancelled", TRACK_LEAVE),
    ("notification-sent", TRACK_NOTIFICATION),
    ("notification-failed", TRACK_NOTIFICATION),
];

/// Payload identity used to dedup events that carry no event id.
///
/// Keys on the record the route writes, so distinct records of one subject
/// never collide. Access refreshes have no natural identity: each one is a
/// separate access and replaying it only moves a timestamp.
pub(crate) fn natural_identity(topic: &str, envelope: &EventEnvelope) -> Option<String> {
    match route_for(topic) {
        Some(RouteAction::Track(route)) => match route.identity {
            TrackIdentity::RecordFirst { record_fields, .. } => envelope.payload_str(record_fields),
            TrackIdentity::SubjectFirst {
                subject_fields,
                record_fields,
            } => envelope
                .payload_str(record_fields)
                .or_else(|| envelope.payload_str(subject_fields)),
        },
        Some(RouteAction::RefreshAccess { .. }) => None,
        Some(
            RouteAction::MarkDeleted { record_fields }
            | RouteAction::TerminationHold { record_fields },
        ) => envelope.payload_str(record_fields),
        None => envelope.payload_str(GENERIC_RECORD_FIELDS),
    }
}

pub(crate) fn route_for(topic: &str) -> Option<RouteAction> {
    TOPIC_ROUTES
        .iter()
        .find(|(routed_topic, _)| *routed_topic == topic)
        .map(|(_, action)| *action)
}

/// Returns every topic the ingestion pipeline consumes.
pub fn subscribed_topics() -> impl Iterator<Item = &'static str> {
    TOPIC_ROUTES
        .iter()
        .map(|(topic, _)| *topic)
        .chain(GENERIC_TOPICS.iter().copied())
}
