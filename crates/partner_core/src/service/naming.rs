//! Display names, email parsing and value normalization helpers.

use crate::context::Context;
use crate::model::partner::{Partner, PartnerField, PartnerType, PartnerValues};
use once_cell::sync::Lazy;
use regex::Regex;

static NAMED_EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*"?(.*?)"?\s*<([^\s<>@]+@[^\s<>@]+)>\s*$"#).expect("valid named email regex")
});
static BARE_EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*<?([^\s<>@]+@[^\s<>@]+)>?\s*$").expect("valid email regex"));

/// Context keys read by [`display_name`].
pub const CTX_SHOW_ADDRESS: &str = "show_address";
pub const CTX_SHOW_ADDRESS_ONLY: &str = "show_address_only";
pub const CTX_SHOW_EMAIL: &str = "show_email";
pub const CTX_HTML_FORMAT: &str = "html_format";

/// Splits `"Name <email>"` text.
///
/// A bare address yields an empty name. Text without any address is
/// returned whole as the name with an empty email.
pub fn parse_partner_name(text: &str) -> (String, String) {
    if let Some(caps) = NAMED_EMAIL_RE.captures(text) {
        let name = caps.get(1).map_or("", |m| m.as_str()).trim();
        let email = caps.get(2).map_or("", |m| m.as_str());
        return (name.to_string(), email.to_string());
    }
    if let Some(caps) = BARE_EMAIL_RE.captures(text) {
        let email = caps.get(1).map_or("", |m| m.as_str());
        return (String::new(), email.to_string());
    }
    (text.to_string(), String::new())
}

/// Adds an `http://` scheme to a website lacking one.
pub fn clean_website(website: &str) -> String {
    let website = website.trim();
    if website.is_empty() || website.contains("://") {
        return website.to_string();
    }
    format!("http://{website}")
}

/// Canonicalizes caller-supplied create/write values.
///
/// - Website gets a scheme.
/// - Setting a parent clears the free-text company name.
/// - The commercial partner reference is derived and never caller-owned.
pub fn normalize_values(values: &PartnerValues) -> PartnerValues {
    let mut normalized = values.clone();
    if let Some(website) = values.text(PartnerField::Website) {
        if !website.is_empty() {
            normalized.insert(PartnerField::Website, clean_website(website));
        }
    }
    if values.parent_id().is_some() {
        normalized.insert(PartnerField::CompanyName, "");
    }
    normalized.remove(PartnerField::CommercialPartner);
    normalized
}

/// Whether [`display_name`] needs the rendered address for this context.
pub fn needs_address(ctx: &Context) -> bool {
    ctx.get_bool(CTX_SHOW_ADDRESS) || ctx.get_bool(CTX_SHOW_ADDRESS_ONLY)
}

/// Human-facing partner label.
///
/// `address` is only read when [`needs_address`] is true.
pub fn display_name(partner: &Partner, ctx: &Context, address: Option<&str>) -> String {
    let mut name = partner.name.clone();
    if !partner.company_name.is_empty() || partner.parent_id.is_some() {
        if name.is_empty() && partner.partner_type != PartnerType::Contact {
            name = partner.partner_type.label().to_string();
        }
        if !partner.is_company {
            name = format!("{}, {name}", partner.commercial_company_name);
        }
    }

    let address = address.unwrap_or_default();
    if ctx.get_bool(CTX_SHOW_ADDRESS_ONLY) {
        name = address.to_string();
    }
    if ctx.get_bool(CTX_SHOW_ADDRESS) {
        name = format!("{name}\n{address}");
    }
    while name.contains("\n\n") {
        name = name.replace("\n\n", "\n");
    }
    if ctx.get_bool(CTX_SHOW_EMAIL) && !partner.email.is_empty() {
        name = partner.email_formatted();
    }
    if ctx.get_bool(CTX_HTML_FORMAT) {
        name = name.replace('\n', "<br/>");
    }
    name
}
