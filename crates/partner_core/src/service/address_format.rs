//! Postal address rendering.
//!
//! Templates use `%(key)s` placeholders. Country records may carry their
//! own layout; otherwise [`DEFAULT_ADDRESS_FORMAT`] applies.

use crate::model::country::{Country, CountryState};
use crate::model::partner::Partner;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Layout used when the partner's country has none.
pub const DEFAULT_ADDRESS_FORMAT: &str =
    "%(street)s\n%(street2)s\n%(city)s %(state_code)s %(zip)s\n%(country_name)s";

const COMPANY_LINE: &str = "%(company_name)s\n";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\(([A-Za-z0-9_]*)\)s").expect("valid placeholder regex"));

/// Address template could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRenderError {
    pub template: String,
    pub message: String,
}

impl Display for TemplateRenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot render address template {:?}: {}",
            self.template, self.message
        )
    }
}

impl Error for TemplateRenderError {}

/// Values substituted into an address template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressData {
    pub street: String,
    pub street2: String,
    pub zip: String,
    pub city: String,
    pub state_code: String,
    pub state_name: String,
    pub country_code: String,
    pub country_name: String,
    pub company_name: String,
}

impl AddressData {
    /// Collects template values from a partner and its reference records.
    pub fn from_partner(
        partner: &Partner,
        country: Option<&Country>,
        state: Option<&CountryState>,
    ) -> Self {
        Self {
            street: partner.street.clone(),
            street2: partner.street2.clone(),
            zip: partner.zip.clone(),
            city: partner.city.clone(),
            state_code: state.map(|s| s.code.clone()).unwrap_or_default(),
            state_name: state.map(|s| s.name.clone()).unwrap_or_default(),
            country_code: country.map(|c| c.code.clone()).unwrap_or_default(),
            country_name: country.map(|c| c.name.clone()).unwrap_or_default(),
            company_name: partner.commercial_company_name.clone(),
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        let value = match key {
            "street" => &self.street,
            "street2" => &self.street2,
            "zip" => &self.zip,
            "city" => &self.city,
            "state_code" => &self.state_code,
            "state_name" => &self.state_name,
            "country_code" => &self.country_code,
            "country_name" => &self.country_name,
            "company_name" => &self.company_name,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Substitutes every placeholder of `template` with values from `data`.
///
/// # Errors
/// - Unknown placeholder key.
/// - `%(` that does not open a well-formed placeholder.
pub fn render_address(template: &str, data: &AddressData) -> Result<String, TemplateRenderError> {
    let fail = |message: String| TemplateRenderError {
        template: template.to_string(),
        message,
    };

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let literal = &template[last..whole.start()];
        if literal.contains("%(") {
            return Err(fail("unterminated placeholder".to_string()));
        }
        out.push_str(literal);

        let key = caps.get(1).map_or("", |m| m.as_str());
        let value = data
            .lookup(key)
            .ok_or_else(|| fail(format!("unknown placeholder `{key}`")))?;
        out.push_str(value);
        last = whole.end();
    }

    let tail = &template[last..];
    if tail.contains("%(") {
        return Err(fail("unterminated placeholder".to_string()));
    }
    out.push_str(tail);
    Ok(out)
}

/// Renders a partner address.
///
/// The country layout wins over `default_format`. With
/// `include_company_name`, a company line is prepended when the partner has
/// a commercial company name.
pub fn format_partner_address(
    partner: &Partner,
    country: Option<&Country>,
    state: Option<&CountryState>,
    default_format: &str,
    include_company_name: bool,
) -> Result<String, TemplateRenderError> {
    let data = AddressData::from_partner(partner, country, state);
    let mut template = country
        .and_then(|c| c.address_format.as_deref())
        .filter(|format| !format.trim().is_empty())
        .unwrap_or(default_format)
        .to_string();
    if include_company_name && !data.company_name.is_empty() {
        template.insert_str(0, COMPANY_LINE);
    }
    render_address(&template, &data)
}

/// Reverses [`DEFAULT_ADDRESS_FORMAT`].
///
/// Accepts the four default lines, optionally preceded by a company line.
/// Only the keys present in the default layout (plus the company name) are
/// filled.
///
/// Cities and zips may contain spaces, so the `city state zip` line is
/// split on a state code from `state_codes`, or on the double space left
/// by an empty state. Returns `None` for any other shape and whenever the
/// line splits in more than one way.
pub fn parse_default_address(text: &str, state_codes: &[&str]) -> Option<AddressData> {
    let lines: Vec<&str> = text.split('\n').collect();
    let (company_name, rest) = match lines.len() {
        4 => ("", &lines[..]),
        5 => (lines[0], &lines[1..]),
        _ => return None,
    };
    let (city, state_code, zip) = split_city_line(rest[2], state_codes)?;

    Some(AddressData {
        street: rest[0].to_string(),
        street2: rest[1].to_string(),
        city: city.to_string(),
        state_code: state_code.to_string(),
        zip: zip.to_string(),
        country_name: rest[3].to_string(),
        company_name: company_name.to_string(),
        ..AddressData::default()
    })
}

fn split_city_line<'a>(
    line: &'a str,
    state_codes: &[&'a str],
) -> Option<(&'a str, &'a str, &'a str)> {
    let mut splits = Vec::new();
    let separators = state_codes
        .iter()
        .filter(|code| !code.trim().is_empty())
        .map(|code| (*code, format!(" {code} ")))
        .chain(std::iter::once(("", "  ".to_string())));
    for (code, separator) in separators {
        let starts = line
            .char_indices()
            .map(|(index, _)| index)
            .filter(|index| line[*index..].starts_with(separator.as_str()));
        for index in starts {
            let split = (&line[..index], code, &line[index + separator.len()..]);
            if !splits.contains(&split) {
                splits.push(split);
            }
        }
    }
    match splits.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}
