//! Business address helpers.
//!
//! Addresses come in two forms: structured columns and a single free-text
//! line from the places provider. Both are Dutch-formatted in practice
//! ("Street 1, 1234 AB City").

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Structured address columns of a business row. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub address_street: Option<String>,
    pub address_postal_code: Option<String>,
    pub address_city: Option<String>,
    pub address_country: Option<String>,
    /// Free-text address, used when street and city are both empty.
    pub address: Option<String>,
}

fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or_default()
}

/// Compose "street, postal city[, country]".
///
/// The country is appended unless the result already contains it
/// (case-insensitive). Dutch spellings of the Netherlands are normalized.
/// With neither street nor city, the free-text address is returned as is.
pub fn format_business_address(parts: &AddressParts) -> String {
    let street = trimmed(&parts.address_street);
    let postal = trimmed(&parts.address_postal_code);
    let city = trimmed(&parts.address_city);
    let country = trimmed(&parts.address_country);

    if street.is_empty() && city.is_empty() {
        return trimmed(&parts.address).to_string();
    }

    let locality = [postal, city]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut result = [street, locality.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if !country.is_empty() {
        let country = normalize_country(country);
        if !result.to_lowercase().contains(&country.to_lowercase()) {
            if !result.is_empty() {
                result.push_str(", ");
            }
            result.push_str(country);
        }
    }

    result
}

fn normalize_country(country: &str) -> &str {
    match country.to_lowercase().as_str() {
        "nederland" | "the netherlands" => "Netherlands",
        _ => country,
    }
}

/// Best-effort city from a free-text address.
///
/// Looks for a Dutch postcode ("1234 AB") at the start of the last
/// comma-separated segment and returns what follows it. Otherwise the last
/// segment is returned, but only if there is more than one.
pub fn parse_city_from_address(address: &str) -> String {
    let segments: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let Some(last) = segments.last() else {
        return String::new();
    };

    if let Some(city) = city_after_postcode(last) {
        return city.to_string();
    }
    if segments.len() > 1 {
        return last.to_string();
    }
    String::new()
}

/// Dutch postcode ("1234 AB" or "1234AB"), whitespace, then the city.
static POSTCODE_CITY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}\s*[A-Za-z]{2}\s+(.+)$").ok());

/// The city following a leading postcode, if the segment has one.
fn city_after_postcode(segment: &str) -> Option<&str> {
    let captures = POSTCODE_CITY.as_ref()?.captures(segment)?;
    Some(captures.get(1)?.as_str().trim()).filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(street: &str, postal: &str, city: &str, country: &str) -> AddressParts {
        let opt = |s: &str| Some(s.to_string());
        AddressParts {
            address_street: opt(street),
            address_postal_code: opt(postal),
            address_city: opt(city),
            address_country: opt(country),
            address: None,
        }
    }

    #[test]
    fn composes_street_postal_city_country() {
        let p = parts("Oudegracht 1", "3511 AA", "Utrecht", "Nederland");
        assert_eq!(
            format_business_address(&p),
            "Oudegracht 1, 3511 AA Utrecht, Netherlands"
        );
    }

    #[test]
    fn country_not_repeated() {
        let p = parts("Main St 1", "", "Netherlands Town", "netherlands");
        assert_eq!(format_business_address(&p), "Main St 1, Netherlands Town");
    }

    #[test]
    fn falls_back_to_free_text() {
        let p = AddressParts {
            address: Some(" Kerkstraat 5, 1017 GB Amsterdam ".to_string()),
            address_country: Some("Netherlands".to_string()),
            ..Default::default()
        };
        assert_eq!(format_business_address(&p), "Kerkstraat 5, 1017 GB Amsterdam");
        assert_eq!(format_business_address(&AddressParts::default()), "");
    }

    #[test]
    fn city_only() {
        let p = parts("", "", "Delft", "");
        assert_eq!(format_business_address(&p), "Delft");
    }

    #[test]
    fn parses_city_after_postcode() {
        assert_eq!(
            parse_city_from_address("Kerkstraat 5, 1017 GB Amsterdam"),
            "Amsterdam"
        );
        assert_eq!(parse_city_from_address("Kerkstraat 5, 1017GB Den Haag"), "Den Haag");
        assert_eq!(parse_city_from_address("1017 GB Amsterdam"), "Amsterdam");
    }

    #[test]
    fn falls_back_to_last_segment() {
        assert_eq!(parse_city_from_address("Kerkstraat 5, Amsterdam"), "Amsterdam");
        assert_eq!(parse_city_from_address("Amsterdam"), "");
        assert_eq!(parse_city_from_address("  ,  "), "");
    }

    #[test]
    fn postcode_match_stops_at_line_breaks() {
        assert_eq!(
            parse_city_from_address("Kerkstraat 5, 1017 GB Am\nsterdam"),
            "1017 GB Am\nsterdam"
        );
    }

    #[test]
    fn postcode_needs_whitespace_before_city() {
        assert_eq!(parse_city_from_address("Kerkstraat 5, 1017GBAmsterdam"), "1017GBAmsterdam");
        assert_eq!(parse_city_from_address("1017GBAmsterdam"), "");
    }
}
