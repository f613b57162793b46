//! Contact form fields and the webhook payload
//!
//! Field names on the wire are stable camelCase strings; the payload is a
//! flat JSON object with exactly the eight fields.

use serde::Serialize;

/// One input of the contact form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    FirstName,
    LastName,
    Email,
    Phone,
    Company,
    Position,
    Country,
    Message,
}

impl FormField {
    /// Every field in display order
    pub const ALL: [FormField; 8] = [
        FormField::FirstName,
        FormField::LastName,
        FormField::Email,
        FormField::Phone,
        FormField::Company,
        FormField::Position,
        FormField::Country,
        FormField::Message,
    ];

    /// Stable key used in the JSON payload
    pub fn wire_name(self) -> &'static str {
        match self {
            FormField::FirstName => "firstName",
            FormField::LastName => "lastName",
            FormField::Email => "email",
            FormField::Phone => "phone",
            FormField::Company => "company",
            FormField::Position => "position",
            FormField::Country => "country",
            FormField::Message => "message",
        }
    }

    /// Whether the presentation layer must insist on a value
    ///
    /// Only `position` is optional.
    pub fn is_required(self) -> bool {
        !matches!(self, FormField::Position)
    }
}

/// Raw values of every form field
///
/// Serializes to the webhook payload as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub position: String,
    pub country: String,
    pub message: String,
}

impl FormState {
    /// Stores the raw value without trimming or validating it
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        *self.slot_mut(field) = value.into();
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::FirstName => &self.first_name,
            FormField::LastName => &self.last_name,
            FormField::Email => &self.email,
            FormField::Phone => &self.phone,
            FormField::Company => &self.company,
            FormField::Position => &self.position,
            FormField::Country => &self.country,
            FormField::Message => &self.message,
        }
    }

    /// Required fields that are still blank
    pub fn missing_required(&self) -> Vec<FormField> {
        FormField::ALL
            .into_iter()
            .filter(|field| field.is_required() && self.get(*field).trim().is_empty())
            .collect()
    }

    /// Serializes the fields into the flat JSON body sent to the webhook
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    fn slot_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::FirstName => &mut self.first_name,
            FormField::LastName => &mut self.last_name,
            FormField::Email => &mut self.email,
            FormField::Phone => &mut self.phone,
            FormField::Company => &mut self.company,
            FormField::Position => &mut self.position,
            FormField::Country => &mut self.country,
            FormField::Message => &mut self.message,
        }
    }
}
