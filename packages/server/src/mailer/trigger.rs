/// Lifecycle events that can fire an email template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerKind {
    ParticipantRegistered,
    ParticipantDeleted,
    FormFilled,
    AttributeChanged,
    Manual,
}

impl TriggerKind {
    pub const ALL: &[TriggerKind] = &[
        Self::ParticipantRegistered,
        Self::ParticipantDeleted,
        Self::FormFilled,
        Self::AttributeChanged,
        Self::Manual,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParticipantRegistered => "participant_registered",
            Self::ParticipantDeleted => "participant_deleted",
            Self::FormFilled => "form_filled",
            Self::AttributeChanged => "attribute_changed",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// A lifecycle event collected during a mutation.
///
/// Mutations only *collect* these; dispatch happens after the transaction
/// commits, so a notification failure can never roll back an assignment.
#[derive(Clone, Debug)]
pub struct PendingTrigger {
    pub kind: TriggerKind,
    pub value: Option<String>,
    pub value2: Option<String>,
}

impl PendingTrigger {
    pub fn registered() -> Self {
        Self {
            kind: TriggerKind::ParticipantRegistered,
            value: None,
            value2: None,
        }
    }

    pub fn deleted() -> Self {
        Self {
            kind: TriggerKind::ParticipantDeleted,
            value: None,
            value2: None,
        }
    }

    pub fn form_filled(form_id: i32) -> Self {
        Self {
            kind: TriggerKind::FormFilled,
            value: Some(form_id.to_string()),
            value2: None,
        }
    }

    pub fn attribute_changed(attribute_id: i32, new_value: Option<&str>) -> Self {
        Self {
            kind: TriggerKind::AttributeChanged,
            value: Some(attribute_id.to_string()),
            value2: new_value.map(str::to_owned),
        }
    }
}
