use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The kind of value an attribute collects.
///
/// Stored in the database as the lowercase string form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Text,
    Number,
    File,
    Drawing,
    Select,
    Multiselect,
    Block,
    Date,
    Time,
    Datetime,
    Email,
    Tel,
    Color,
    Checkbox,
    Textarea,
}

impl AttributeType {
    pub const ALL: &[AttributeType] = &[
        Self::Text,
        Self::Number,
        Self::File,
        Self::Drawing,
        Self::Select,
        Self::Multiselect,
        Self::Block,
        Self::Date,
        Self::Time,
        Self::Datetime,
        Self::Email,
        Self::Tel,
        Self::Color,
        Self::Checkbox,
        Self::Textarea,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::File => "file",
            Self::Drawing => "drawing",
            Self::Select => "select",
            Self::Multiselect => "multiselect",
            Self::Block => "block",
            Self::Date => "date",
            Self::Time => "time",
            Self::Datetime => "datetime",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Color => "color",
            Self::Checkbox => "checkbox",
            Self::Textarea => "textarea",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// File-like attributes hold a stored filename rather than user text.
    pub fn is_file_like(self) -> bool {
        matches!(self, Self::File | Self::Drawing)
    }
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attribute")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: BelongsTo<super::event::Entity>,

    pub name: String,
    /// Merge-field token, unique per event (`/participant_<slug>`).
    #[sea_orm(indexed)]
    pub slug: String,
    /// One of the [`AttributeType`] string forms.
    pub attribute_type: String,
    /// Choice payload for select-like types, as a JSON array of strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub options: Option<serde_json::Value>,
    /// Whether the attribute appears in the public participant listing.
    pub show_in_list: bool,

    #[sea_orm(has_many)]
    pub blocks: HasMany<super::block::Entity>,

    #[sea_orm(has_many, via = "participant_attribute")]
    pub participants: HasMany<super::participant::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn kind(&self) -> Option<AttributeType> {
        AttributeType::parse(&self.attribute_type)
    }

    pub fn is_block(&self) -> bool {
        self.attribute_type == AttributeType::Block.as_str()
    }
}

impl ActiveModelBehavior for ActiveModel {}
