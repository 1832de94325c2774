//! Partner domain model.
//!
//! # Responsibility
//! - Define the partner record (person, company or contact address).
//! - Provide a field-addressable view so synchronization can copy named
//!   attribute sets between relatives without knowing their types.
//!
//! # Invariants
//! - `id` is stable and never reused.
//! - `commercial_partner_id` and `commercial_company_name` are derived and
//!   only rewritten by the recompute hook or commercial push.
//! - Contacts carry a non-blank name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable partner identifier.
pub type PartnerId = Uuid;

/// Ordered address attribute set shared between a contact and its parent.
pub const ADDRESS_FIELDS: [PartnerField; 6] = [
    PartnerField::Street,
    PartnerField::Street2,
    PartnerField::Zip,
    PartnerField::City,
    PartnerField::State,
    PartnerField::Country,
];

/// Role of a partner record, used by address resolution.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    /// Main contact; also the fallback role.
    #[default]
    Contact,
    Invoice,
    Delivery,
    Other,
}

impl PartnerType {
    /// Storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Invoice => "invoice",
            Self::Delivery => "delivery",
            Self::Other => "other",
        }
    }

    /// Parses a storage/wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contact" => Some(Self::Contact),
            "invoice" => Some(Self::Invoice),
            "delivery" => Some(Self::Delivery),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Human-facing label, used when an address record has no name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::Invoice => "Invoice Address",
            Self::Delivery => "Shipping Address",
            Self::Other => "Other Address",
        }
    }
}

impl Display for PartnerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named partner attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerField {
    Name,
    Ref,
    Parent,
    IsCompany,
    #[serde(rename = "type")]
    PartnerType,
    CompanyName,
    CommercialPartner,
    Street,
    Street2,
    Zip,
    City,
    State,
    Country,
    Email,
    Phone,
    Mobile,
    Website,
    Function,
    Comment,
    Lang,
    Vat,
    CreditLimit,
    Customer,
    Supplier,
    Employee,
    Active,
}

impl PartnerField {
    /// Whether this field belongs to the postal address set.
    pub fn is_address(self) -> bool {
        ADDRESS_FIELDS.contains(&self)
    }

    /// Whether this field shapes the hierarchy itself and therefore cannot be
    /// synchronized between relatives.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::Parent | Self::IsCompany | Self::PartnerType | Self::CommercialPartner
        )
    }
}

impl Display for PartnerField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Id(Uuid),
    Type(PartnerType),
}

impl FieldValue {
    /// Zero-value test: null, blank text, `0`, `false`.
    ///
    /// A `Type` value is never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.is_empty(),
            Self::Number(value) => *value == 0.0,
            Self::Bool(value) => !value,
            Self::Id(_) | Self::Type(_) => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        Self::Id(value)
    }
}

impl From<Option<Uuid>> for FieldValue {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(Self::Null, Self::Id)
    }
}

impl From<PartnerType> for FieldValue {
    fn from(value: PartnerType) -> Self {
        Self::Type(value)
    }
}

/// Attribute map carried by creates and writes.
///
/// Keys are ordered, so iteration and logging are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartnerValues {
    values: BTreeMap<PartnerField, FieldValue>,
}

impl PartnerValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: PartnerField, value: impl Into<FieldValue>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    pub fn insert(&mut self, field: PartnerField, value: impl Into<FieldValue>) {
        self.values.insert(field, value.into());
    }

    pub fn remove(&mut self, field: PartnerField) -> Option<FieldValue> {
        self.values.remove(&field)
    }

    pub fn get(&self, field: PartnerField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn has(&self, field: PartnerField) -> bool {
        self.values.contains_key(&field)
    }

    /// Returns true when any of `fields` is present.
    pub fn has_any(&self, fields: &[PartnerField]) -> bool {
        fields.iter().any(|field| self.has(*field))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartnerField, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    /// Copy restricted to the given fields; absent fields stay absent.
    pub fn subset(&self, fields: &[PartnerField]) -> Self {
        Self {
            values: self
                .values
                .iter()
                .filter(|(field, _)| fields.contains(field))
                .map(|(field, value)| (*field, value.clone()))
                .collect(),
        }
    }

    /// New parent carried by this write, if it sets a non-empty one.
    pub fn parent_id(&self) -> Option<PartnerId> {
        match self.get(PartnerField::Parent) {
            Some(FieldValue::Id(id)) => Some(*id),
            _ => None,
        }
    }

    /// Text value of a field, if present and textual.
    pub fn text(&self, field: PartnerField) -> Option<&str> {
        match self.get(field) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Validation errors raised while building or persisting partners.
#[derive(Debug, Clone, PartialEq)]
pub enum PartnerValidationError {
    /// Contacts require a non-blank name.
    NameRequired,
    /// Value variant does not fit the field type.
    InvalidValue {
        field: PartnerField,
        value: FieldValue,
    },
}

impl Display for PartnerValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameRequired => write!(f, "contacts require a name"),
            Self::InvalidValue { field, value } => {
                write!(f, "invalid value {value:?} for partner field {field}")
            }
        }
    }
}

impl Error for PartnerValidationError {}

/// Canonical partner record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub name: String,
    /// Internal reference code.
    pub reference: String,
    /// `None` means root-level partner.
    pub parent_id: Option<PartnerId>,
    /// Hierarchy boundary flag.
    pub is_company: bool,
    #[serde(rename = "type")]
    pub partner_type: PartnerType,
    /// Label for a company not yet materialized as its own partner.
    pub company_name: String,
    /// Derived: nearest company ancestor-or-self, or the root.
    pub commercial_partner_id: PartnerId,
    /// Derived: commercial company name used in display names and addresses.
    pub commercial_company_name: String,
    pub street: String,
    pub street2: String,
    pub zip: String,
    pub city: String,
    pub state_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub email: String,
    pub phone: String,
    pub mobile: String,
    pub website: String,
    /// Job position.
    pub function: String,
    pub comment: String,
    pub lang: String,
    /// Tax identification number.
    pub vat: String,
    pub credit_limit: f64,
    pub customer: bool,
    pub supplier: bool,
    pub employee: bool,
    pub active: bool,
    /// Epoch ms, assigned by the store.
    pub created_at: i64,
    /// Epoch ms, assigned by the store.
    pub updated_at: i64,
}

impl Partner {
    /// Creates an active root contact with a generated id.
    ///
    /// The partner starts as its own commercial partner.
    pub fn new(name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            name: name.into(),
            reference: String::new(),
            parent_id: None,
            is_company: false,
            partner_type: PartnerType::Contact,
            company_name: String::new(),
            commercial_partner_id: id,
            commercial_company_name: String::new(),
            street: String::new(),
            street2: String::new(),
            zip: String::new(),
            city: String::new(),
            state_id: None,
            country_id: None,
            email: String::new(),
            phone: String::new(),
            mobile: String::new(),
            website: String::new(),
            function: String::new(),
            comment: String::new(),
            lang: String::new(),
            vat: String::new(),
            credit_limit: 0.0,
            customer: true,
            supplier: false,
            employee: false,
            active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), PartnerValidationError> {
        if self.partner_type == PartnerType::Contact && self.name.trim().is_empty() {
            return Err(PartnerValidationError::NameRequired);
        }
        Ok(())
    }

    /// Reads one field as a dynamic value.
    pub fn get(&self, field: PartnerField) -> FieldValue {
        match field {
            PartnerField::Name => self.name.as_str().into(),
            PartnerField::Ref => self.reference.as_str().into(),
            PartnerField::Parent => self.parent_id.into(),
            PartnerField::IsCompany => self.is_company.into(),
            PartnerField::PartnerType => self.partner_type.into(),
            PartnerField::CompanyName => self.company_name.as_str().into(),
            PartnerField::CommercialPartner => self.commercial_partner_id.into(),
            PartnerField::Street => self.street.as_str().into(),
            PartnerField::Street2 => self.street2.as_str().into(),
            PartnerField::Zip => self.zip.as_str().into(),
            PartnerField::City => self.city.as_str().into(),
            PartnerField::State => self.state_id.into(),
            PartnerField::Country => self.country_id.into(),
            PartnerField::Email => self.email.as_str().into(),
            PartnerField::Phone => self.phone.as_str().into(),
            PartnerField::Mobile => self.mobile.as_str().into(),
            PartnerField::Website => self.website.as_str().into(),
            PartnerField::Function => self.function.as_str().into(),
            PartnerField::Comment => self.comment.as_str().into(),
            PartnerField::Lang => self.lang.as_str().into(),
            PartnerField::Vat => self.vat.as_str().into(),
            PartnerField::CreditLimit => self.credit_limit.into(),
            PartnerField::Customer => self.customer.into(),
            PartnerField::Supplier => self.supplier.into(),
            PartnerField::Employee => self.employee.into(),
            PartnerField::Active => self.active.into(),
        }
    }

    /// Snapshot of the given fields, ready to be written onto a relative.
    pub fn field_values(&self, fields: &[PartnerField]) -> PartnerValues {
        let mut values = PartnerValues::new();
        for field in fields {
            values.insert(*field, self.get(*field));
        }
        values
    }

    /// Whether any address attribute is set.
    pub fn has_address(&self) -> bool {
        ADDRESS_FIELDS
            .iter()
            .any(|field| !self.get(*field).is_empty())
    }

    /// Applies an attribute map in memory.
    ///
    /// `Null` resets a field to its zero value, except for the commercial
    /// partner reference which must always point somewhere.
    pub fn apply(&mut self, values: &PartnerValues) -> Result<(), PartnerValidationError> {
        for (field, value) in values.iter() {
            self.set(field, value)?;
        }
        Ok(())
    }

    fn set(&mut self, field: PartnerField, value: &FieldValue) -> Result<(), PartnerValidationError> {
        let invalid = || PartnerValidationError::InvalidValue {
            field,
            value: value.clone(),
        };
        match field {
            PartnerField::Name => self.name = text_value(value).ok_or_else(invalid)?,
            PartnerField::Ref => self.reference = text_value(value).ok_or_else(invalid)?,
            PartnerField::CompanyName => {
                self.company_name = text_value(value).ok_or_else(invalid)?
            }
            PartnerField::Street => self.street = text_value(value).ok_or_else(invalid)?,
            PartnerField::Street2 => self.street2 = text_value(value).ok_or_else(invalid)?,
            PartnerField::Zip => self.zip = text_value(value).ok_or_else(invalid)?,
            PartnerField::City => self.city = text_value(value).ok_or_else(invalid)?,
            PartnerField::Email => self.email = text_value(value).ok_or_else(invalid)?,
            PartnerField::Phone => self.phone = text_value(value).ok_or_else(invalid)?,
            PartnerField::Mobile => self.mobile = text_value(value).ok_or_else(invalid)?,
            PartnerField::Website => self.website = text_value(value).ok_or_else(invalid)?,
            PartnerField::Function => self.function = text_value(value).ok_or_else(invalid)?,
            PartnerField::Comment => self.comment = text_value(value).ok_or_else(invalid)?,
            PartnerField::Lang => self.lang = text_value(value).ok_or_else(invalid)?,
            PartnerField::Vat => self.vat = text_value(value).ok_or_else(invalid)?,
            PartnerField::Parent => self.parent_id = id_value(value).ok_or_else(invalid)?,
            PartnerField::State => self.state_id = id_value(value).ok_or_else(invalid)?,
            PartnerField::Country => self.country_id = id_value(value).ok_or_else(invalid)?,
            PartnerField::CommercialPartner => match value {
                FieldValue::Id(id) => self.commercial_partner_id = *id,
                _ => return Err(invalid()),
            },
            PartnerField::CreditLimit => match value {
                FieldValue::Null => self.credit_limit = 0.0,
                FieldValue::Number(number) => self.credit_limit = *number,
                _ => return Err(invalid()),
            },
            PartnerField::IsCompany => self.is_company = bool_value(value).ok_or_else(invalid)?,
            PartnerField::Customer => self.customer = bool_value(value).ok_or_else(invalid)?,
            PartnerField::Supplier => self.supplier = bool_value(value).ok_or_else(invalid)?,
            PartnerField::Employee => self.employee = bool_value(value).ok_or_else(invalid)?,
            PartnerField::Active => self.active = bool_value(value).ok_or_else(invalid)?,
            PartnerField::PartnerType => match value {
                FieldValue::Type(kind) => self.partner_type = *kind,
                FieldValue::Text(text) => {
                    self.partner_type = PartnerType::parse(text).ok_or_else(invalid)?
                }
                _ => return Err(invalid()),
            },
        }
        Ok(())
    }

    /// `Name <email>` rendering; quotes names containing separators.
    pub fn email_formatted(&self) -> String {
        if self.name.is_empty() {
            return format!("<{}>", self.email);
        }
        if self.name.contains([',', ';', '<', '>', '"', '(', ')', '@']) {
            let escaped = self.name.replace('\\', "\\\\").replace('"', "\\\"");
            return format!("\"{escaped}\" <{}>", self.email);
        }
        format!("{} <{}>", self.name, self.email)
    }
}

fn text_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => Some(String::new()),
        FieldValue::Text(text) => Some(text.clone()),
        _ => None,
    }
}

fn id_value(value: &FieldValue) -> Option<Option<Uuid>> {
    match value {
        FieldValue::Null => Some(None),
        FieldValue::Id(id) => Some(Some(*id)),
        _ => None,
    }
}

fn bool_value(value: &FieldValue) -> Option<bool> {
    match value {
        FieldValue::Null => Some(false),
        FieldValue::Bool(flag) => Some(*flag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        FieldValue, Partner, PartnerField, PartnerType, PartnerValidationError, PartnerValues,
        ADDRESS_FIELDS,
    };
    use uuid::Uuid;

    #[test]
    fn apply_copies_values_and_resets_nulls() {
        let mut partner = Partner::new("Ada");
        partner.street = "old street".to_string();
        let country = Uuid::new_v4();

        let values = PartnerValues::new()
            .with(PartnerField::Street, FieldValue::Null)
            .with(PartnerField::City, "Paris")
            .with(PartnerField::Country, country)
            .with(PartnerField::CreditLimit, 250.0)
            .with(PartnerField::PartnerType, "invoice");
        partner.apply(&values).unwrap();

        assert_eq!(partner.street, "");
        assert_eq!(partner.city, "Paris");
        assert_eq!(partner.country_id, Some(country));
        assert_eq!(partner.credit_limit, 250.0);
        assert_eq!(partner.partner_type, PartnerType::Invoice);
    }

    #[test]
    fn apply_rejects_mismatched_value_types() {
        let mut partner = Partner::new("Ada");
        let err = partner
            .apply(&PartnerValues::new().with(PartnerField::IsCompany, "yes"))
            .unwrap_err();
        assert!(matches!(
            err,
            PartnerValidationError::InvalidValue {
                field: PartnerField::IsCompany,
                ..
            }
        ));
    }

    #[test]
    fn field_values_snapshot_reads_back_through_get() {
        let mut partner = Partner::new("Ada");
        partner.zip = "75001".to_string();

        let snapshot = partner.field_values(&ADDRESS_FIELDS);
        assert_eq!(snapshot.len(), ADDRESS_FIELDS.len());
        assert_eq!(snapshot.text(PartnerField::Zip), Some("75001"));
        assert_eq!(snapshot.get(PartnerField::State), Some(&FieldValue::Null));
        assert!(partner.has_address());
    }

    #[test]
    fn unnamed_contacts_fail_validation_but_addresses_pass() {
        let mut partner = Partner::new("  ");
        assert_eq!(partner.validate(), Err(PartnerValidationError::NameRequired));

        partner.partner_type = PartnerType::Delivery;
        assert!(partner.validate().is_ok());
    }

    #[test]
    fn email_formatted_quotes_special_names() {
        let mut partner = Partner::new("Grosbedon, Raoul");
        partner.email = "raoul@grosbedon.fr".to_string();
        assert_eq!(
            partner.email_formatted(),
            "\"Grosbedon, Raoul\" <raoul@grosbedon.fr>"
        );

        partner.name = "Raoul".to_string();
        assert_eq!(partner.email_formatted(), "Raoul <raoul@grosbedon.fr>");
    }
}
