//! Contact details: emails, phone numbers, postal addresses, forms and hours

use crate::extract::document::{collapse_whitespace, PageDocument};
use crate::extract::patterns::{
    load, Candidate, ExtractionPattern, PatternPriority, PatternSet, StaticPatterns,
};
use crate::extract::{selector, ExtractionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// File extensions that look like TLDs in asset names (`logo@2x.png`)
const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js"];

const PLAIN_EMAIL: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}";

const OBFUSCATED_EMAIL: &str = r"(?i)\b[a-z0-9._%+-]+\s*[\[\(\{]\s*at\s*[\]\)\}]\s*[a-z0-9-]+(?:\s*(?:[\[\(\{]\s*dot\s*[\]\)\}]|\.)\s*[a-z0-9-]+)+";

const NANP_PHONE: &str = r"(?:\+?1[\s.-]?)?\(?\b[2-9]\d{2}\)?[\s.-]?[2-9]\d{2}[\s.-]?\d{4}\b";

const INTERNATIONAL_PHONE: &str = r"\+\d{1,3}(?:[\s.-]?\(?\d{1,4}\)?){2,5}";

const STREET_ADDRESS: &str = r"\b\d{1,5}\s+(?:[A-Z][A-Za-z0-9.'-]*\s+){1,4}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct|Way|Place|Pl|Parkway|Pkwy|Highway|Hwy)\b\.?(?:,?\s+(?:Suite|Ste|Unit|#)\s*[\w-]+)?(?:,\s*[A-Z][A-Za-z.'-]*(?:\s[A-Z][A-Za-z.'-]*)*)?(?:,\s*[A-Z]{2}\s+\d{5}(?:-\d{4})?)?";

const DAY: &str = r"(?:mon(?:day)?|tue(?:s(?:day)?)?|wed(?:nesday)?|thu(?:r(?:s(?:day)?)?)?|fri(?:day)?|sat(?:urday)?|sun(?:day)?)\b";

const TIME: &str = r"\d{1,2}(?::\d{2})?\s*(?:[ap]\.?m\.?)?";

/// Field kinds that mark a form as a contact form, with the names that signal them
const FORM_FIELDS: &[(&str, &[&str])] = &[
    ("email", &["email", "e-mail"]),
    ("name", &["name"]),
    ("message", &["message", "comment", "enquiry", "inquiry"]),
    ("phone", &["phone", "tel"]),
    ("subject", &["subject"]),
];

const CONTACT_KEYWORDS: &[&str] = &["contact", "enquiry", "inquiry", "get in touch", "message us"];

/// A phone number with its canonical display form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    /// Text as found on the page
    pub raw: String,
    /// `(AAA) BBB-CCCC` for North American numbers, `+<digits>` otherwise
    pub formatted: String,
    /// `+` followed by all digits, used for de-duplication
    pub e164: String,
}

/// A postal address; structured parts are only known for JSON-LD sources
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostalAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub action: Option<String>,
    pub method: String,
    /// Contact field kinds recognized in the form
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub days: String,
    /// A time range, or `Closed`
    pub hours: String,
}

/// Contact details found on a page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactRecord {
    pub emails: Vec<String>,
    pub phones: Vec<PhoneNumber>,
    pub addresses: Vec<PostalAddress>,
    pub forms: Vec<ContactForm>,
    pub hours: Vec<BusinessHours>,
}

impl ContactRecord {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.phones.is_empty()
            && self.addresses.is_empty()
            && self.forms.is_empty()
            && self.hours.is_empty()
    }
}

static EMAIL_PATTERNS: StaticPatterns<String> = LazyLock::new(|| {
    Ok(PatternSet::new(vec![
        ExtractionPattern::selector("mailto_link", "email", "a[href]", Some("href"), email_from_mailto)?,
        ExtractionPattern::regex("obfuscated_text", "email", OBFUSCATED_EMAIL, 0, email_from_obfuscated)?,
        ExtractionPattern::regex("plain_text", "email", PLAIN_EMAIL, 0, email_from_text)?,
        // structured data is the last email source, after visible text
        ExtractionPattern::json_ld("structured_email", "email", "email", email_from_text)
            .with_priority(PatternPriority::Heuristic),
    ]))
});

static PHONE_PATTERNS: StaticPatterns<PhoneNumber> = LazyLock::new(|| {
    Ok(PatternSet::new(vec![
        ExtractionPattern::selector("tel_link", "phone", "a[href]", Some("href"), phone_from_tel)?,
        ExtractionPattern::regex("nanp_text", "phone", NANP_PHONE, 0, phone_from_text)?,
        ExtractionPattern::regex("international_text", "phone", INTERNATIONAL_PHONE, 0, phone_from_text)?,
        ExtractionPattern::json_ld("structured_telephone", "phone", "telephone", phone_from_text),
    ]))
});

static ADDRESS_PATTERNS: StaticPatterns<PostalAddress> = LazyLock::new(|| {
    Ok(PatternSet::new(vec![
        ExtractionPattern::json_ld("structured_address", "address", "address", address_from_json),
        ExtractionPattern::selector("address_element", "address", "address", None, address_from_text)?
            .with_priority(PatternPriority::Heuristic),
        ExtractionPattern::regex("street_text", "address", STREET_ADDRESS, 0, address_from_text)?,
    ]))
});

static HOURS_PATTERNS: StaticPatterns<BusinessHours> = LazyLock::new(|| {
    let day_span = format!(r"{DAY}(?:\s*(?:-|–|to|through|&|and)\s*{DAY})?");
    let range = format!(r"(?i)\b{day_span}\s*:?\s*{TIME}\s*(?:-|–|to)\s*{TIME}");
    let closed = format!(r"(?i)\b{day_span}\s*:?\s*closed\b");
    Ok(PatternSet::new(vec![
        ExtractionPattern::regex("hours_range", "hours", &range, 0, hours_from_text)?,
        ExtractionPattern::regex("hours_closed", "hours", &closed, 0, hours_from_text)?,
    ]))
});

/// Extracts every contact detail from the document
pub fn extract_contact(document: &PageDocument) -> Result<ContactRecord, ExtractionError> {
    let emails = load(&EMAIL_PATTERNS)?
        .run(document, |email| email.to_ascii_lowercase())
        .into_iter()
        .map(|m| m.value)
        .collect();

    let phones = load(&PHONE_PATTERNS)?
        .run(document, |phone| phone.e164.clone())
        .into_iter()
        .map(|m| m.value)
        .collect();

    let addresses = load(&ADDRESS_PATTERNS)?
        .run(document, |address| address.formatted.to_lowercase())
        .into_iter()
        .map(|m| m.value)
        .collect();

    let hours = load(&HOURS_PATTERNS)?
        .run(document, |hours| {
            format!("{}|{}", hours.days.to_lowercase(), hours.hours.to_lowercase())
        })
        .into_iter()
        .map(|m| m.value)
        .collect();

    Ok(ContactRecord {
        emails,
        phones,
        addresses,
        forms: contact_forms(document)?,
        hours,
    })
}

/// Validates and lowercases an email address
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return None;
    }

    let valid_local = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let labels: Vec<&str> = domain.split('.').collect();
    let valid_domain = labels.iter().all(|label| {
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels.last().copied().unwrap_or_default();
    let valid_tld = tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && !ASSET_EXTENSIONS.contains(&tld);

    (valid_local && valid_domain && valid_tld).then_some(email)
}

fn email_from_mailto(candidate: &Candidate, _: &PageDocument) -> Option<String> {
    let href = candidate.as_text()?;
    let address = strip_prefix_ignore_case(href, "mailto:")?;
    let address = address.split('?').next().unwrap_or_default();
    normalize_email(&address.replace("%40", "@"))
}

fn email_from_text(candidate: &Candidate, _: &PageDocument) -> Option<String> {
    let text = candidate.as_text()?;
    let text = strip_prefix_ignore_case(text, "mailto:").unwrap_or(text);
    normalize_email(text)
}

fn email_from_obfuscated(candidate: &Candidate, _: &PageDocument) -> Option<String> {
    let compact: String = candidate
        .as_text()?
        .to_ascii_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let mut email = compact;
    for (token, replacement) in [
        ("[at]", "@"),
        ("(at)", "@"),
        ("{at}", "@"),
        ("[dot]", "."),
        ("(dot)", "."),
        ("{dot}", "."),
    ] {
        email = email.replace(token, replacement);
    }
    normalize_email(&email)
}

/// Normalizes a phone number into its canonical display form
///
/// Numbers with fewer than 7 or more than 15 digits are rejected.
pub fn normalize_phone(raw: &str) -> Option<PhoneNumber> {
    let raw = raw.trim();
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if !(7..=15).contains(&digits.len()) {
        return None;
    }

    let has_plus = raw.starts_with('+');
    let national = match digits.len() {
        10 if !has_plus => Some(digits.as_str()),
        11 if digits.starts_with('1') => Some(&digits[1..]),
        _ => None,
    };

    let (formatted, e164) = match national.filter(|n| is_nanp(n)) {
        Some(n) => (
            format!("({}) {}-{}", &n[..3], &n[3..6], &n[6..]),
            format!("+1{}", n),
        ),
        None => (format!("+{}", digits), format!("+{}", digits)),
    };

    Some(PhoneNumber {
        raw: raw.to_string(),
        formatted,
        e164,
    })
}

fn is_nanp(national: &str) -> bool {
    let bytes = national.as_bytes();
    bytes.len() == 10 && (b'2'..=b'9').contains(&bytes[0]) && (b'2'..=b'9').contains(&bytes[3])
}

fn phone_from_tel(candidate: &Candidate, _: &PageDocument) -> Option<PhoneNumber> {
    let number = strip_prefix_ignore_case(candidate.as_text()?, "tel:")?;
    normalize_phone(&number.replace("%20", " "))
}

fn phone_from_text(candidate: &Candidate, _: &PageDocument) -> Option<PhoneNumber> {
    normalize_phone(candidate.as_text()?)
}

fn address_from_text(candidate: &Candidate, _: &PageDocument) -> Option<PostalAddress> {
    let formatted = collapse_whitespace(candidate.as_text()?)
        .trim_end_matches([',', '.'])
        .to_string();
    (formatted.len() >= 8).then(|| PostalAddress {
        formatted,
        ..PostalAddress::default()
    })
}

fn address_from_json(candidate: &Candidate, document: &PageDocument) -> Option<PostalAddress> {
    let object = match candidate {
        Candidate::Json(Value::Object(object)) => object,
        other => return address_from_text(other, document),
    };

    let field = |key: &str| -> Option<String> {
        let value = match object.get(key)? {
            Value::Object(nested) => nested.get("name")?,
            value => value,
        };
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(collapse_whitespace(s)),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    let address = PostalAddress {
        street: field("streetAddress"),
        locality: field("addressLocality"),
        region: field("addressRegion"),
        postal_code: field("postalCode"),
        country: field("addressCountry"),
        formatted: String::new(),
    };

    let region_line = match (&address.region, &address.postal_code) {
        (Some(region), Some(code)) => Some(format!("{} {}", region, code)),
        (region, code) => region.clone().or_else(|| code.clone()),
    };
    let formatted = [
        address.street.clone(),
        address.locality.clone(),
        region_line,
        address.country.clone(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(", ");

    (!formatted.is_empty()).then_some(PostalAddress {
        formatted,
        ..address
    })
}

fn hours_from_text(candidate: &Candidate, _: &PageDocument) -> Option<BusinessHours> {
    let text = collapse_whitespace(candidate.as_text()?);
    let lowered = text.to_ascii_lowercase();

    let split = match (text.find(|c: char| c.is_ascii_digit()), lowered.find("closed")) {
        (Some(digit), Some(closed)) => digit.min(closed),
        (Some(digit), None) => digit,
        (None, Some(closed)) => closed,
        (None, None) => return None,
    };

    let days = text[..split].trim().trim_end_matches(':').trim().to_string();
    let hours = text[split..].trim().trim_end_matches('.');
    let hours = if hours.eq_ignore_ascii_case("closed") {
        "Closed".to_string()
    } else {
        hours.to_string()
    };

    (!days.is_empty()).then_some(BusinessHours { days, hours })
}

/// Finds forms whose fields look like a contact form
fn contact_forms(document: &PageDocument) -> Result<Vec<ContactForm>, ExtractionError> {
    let form_selector = selector("form")?;
    let field_selector = selector("input, textarea, select")?;

    let mut forms = Vec::new();
    for form in document.select(&form_selector) {
        let mut identifiers = Vec::new();
        for field in form.select(&field_selector) {
            let element = field.value();
            if element.name() == "textarea" {
                identifiers.push("message".to_string());
            }
            for attr in ["name", "id", "type", "placeholder", "autocomplete"] {
                if let Some(value) = element.attr(attr) {
                    identifiers.push(value.to_ascii_lowercase());
                }
            }
        }

        let fields: Vec<String> = FORM_FIELDS
            .iter()
            .filter(|(_, signals)| {
                identifiers
                    .iter()
                    .any(|id| signals.iter().any(|signal| id.contains(signal)))
            })
            .map(|(kind, _)| kind.to_string())
            .collect();

        let markup = form.html().to_lowercase();
        let has_keyword = CONTACT_KEYWORDS.iter().any(|k| markup.contains(k));

        if fields.len() >= 2 || (fields.len() == 1 && has_keyword) {
            forms.push(ContactForm {
                action: form
                    .value()
                    .attr("action")
                    .and_then(|action| document.resolve(action))
                    .map(|url| url.to_string()),
                method: form
                    .value()
                    .attr("method")
                    .map(str::to_ascii_uppercase)
                    .unwrap_or_else(|| "GET".to_string()),
                fields,
            });
        }
    }
    Ok(forms)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let text = text.trim();
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| text[prefix.len()..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn contact(html: &str) -> ContactRecord {
        let doc = PageDocument::parse(html, &Url::parse("https://example.com/").unwrap());
        extract_contact(&doc).unwrap()
    }

    #[test]
    fn test_mailto_and_tel_links() {
        let record = contact(
            r#"<a href="mailto:info@example.com">Email</a><a href="tel:+14155551234">Call</a>"#,
        );
        assert_eq!(record.emails, vec!["info@example.com"]);
        assert_eq!(record.phones.len(), 1);
        assert_eq!(record.phones[0].formatted, "(415) 555-1234");
        assert_eq!(record.phones[0].e164, "+14155551234");
    }

    #[test]
    fn test_emails_deduplicated_across_sources() {
        let record = contact(
            r#"<a href="MAILTO:Info@Example.com?subject=Hi">info@example.com</a>
            <p>Or write to sales [at] example [dot] com</p>
            <script type="application/ld+json">{"@type":"Organization","email":"mailto:press@example.com"}</script>"#,
        );
        assert_eq!(
            record.emails,
            vec!["info@example.com", "sales@example.com", "press@example.com"]
        );
    }

    #[test]
    fn test_text_emails_come_before_structured_data() {
        let record = contact(
            r#"<p>Reach sales@example.com</p>
            <script type="application/ld+json">{"@type":"Organization","email":"press@example.com"}</script>"#,
        );
        assert_eq!(record.emails, vec!["sales@example.com", "press@example.com"]);
    }

    #[test]
    fn test_asset_names_are_not_emails() {
        let record = contact("<p>logo@2x.png and icon@3x.webp</p>");
        assert!(record.emails.is_empty());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A.B@Example.CO.uk. "), Some("a.b@example.co.uk".to_string()));
        assert_eq!(normalize_email("no-at-sign.com"), None);
        assert_eq!(normalize_email("a@localhost"), None);
        assert_eq!(normalize_email("a@b.c1"), None);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("415.555.1234").unwrap().formatted, "(415) 555-1234");
        assert_eq!(normalize_phone("1 (415) 555-1234").unwrap().formatted, "(415) 555-1234");
        assert_eq!(normalize_phone("+44 20 7946 0958").unwrap().formatted, "+442079460958");
        assert!(normalize_phone("12345").is_none());
        assert!(normalize_phone("1234567890123456").is_none());
    }

    #[test]
    fn test_text_phones_deduplicated_with_links() {
        let record = contact(
            r#"<a href="tel:4155551234">Call</a><p>Phone: (415) 555-1234 or +44 20 7946 0958</p>"#,
        );
        let formatted: Vec<_> = record.phones.iter().map(|p| p.formatted.as_str()).collect();
        assert_eq!(formatted, vec!["(415) 555-1234", "+442079460958"]);
    }

    #[test]
    fn test_structured_address_wins() {
        let record = contact(
            r#"<script type="application/ld+json">{"@type":"LocalBusiness","address":{"@type":"PostalAddress",
            "streetAddress":"100 Main Street","addressLocality":"Springfield","addressRegion":"IL",
            "postalCode":"62701","addressCountry":{"@type":"Country","name":"US"}}}</script>"#,
        );
        assert_eq!(record.addresses.len(), 1);
        let address = &record.addresses[0];
        assert_eq!(address.locality.as_deref(), Some("Springfield"));
        assert_eq!(address.country.as_deref(), Some("US"));
        assert_eq!(address.formatted, "100 Main Street, Springfield, IL 62701, US");
    }

    #[test]
    fn test_street_pattern_fallback() {
        let record = contact("<p>Visit us at 742 Evergreen Terrace Drive, Springfield, IL 62704 today</p>");
        assert_eq!(record.addresses.len(), 1);
        assert!(record.addresses[0].formatted.starts_with("742 Evergreen Terrace Drive"));
    }

    #[test]
    fn test_contact_form_detection() {
        let record = contact(
            r#"<form action="/contact" method="post"><input name="your-name"><input type="email" name="email">
            <textarea name="msg"></textarea></form>
            <form action="/search"><input name="q"></form>
            <form><input type="email" name="newsletter"></form>"#,
        );
        assert_eq!(record.forms.len(), 1);
        let form = &record.forms[0];
        assert_eq!(form.action.as_deref(), Some("https://example.com/contact"));
        assert_eq!(form.method, "POST");
        assert_eq!(form.fields, vec!["email", "name", "message"]);
    }

    #[test]
    fn test_single_field_form_with_keyword() {
        let record = contact(r#"<form class="contact-us"><input type="email" name="email"></form>"#);
        assert_eq!(record.forms.len(), 1);
    }

    #[test]
    fn test_business_hours() {
        let record = contact(
            "<p>Hours: Monday - Friday: 9:00am - 5:00pm. Saturday 10am to 2pm. Sunday: Closed</p>",
        );
        assert_eq!(
            record.hours,
            vec![
                BusinessHours { days: "Monday - Friday".into(), hours: "9:00am - 5:00pm".into() },
                BusinessHours { days: "Saturday".into(), hours: "10am to 2pm".into() },
                BusinessHours { days: "Sunday".into(), hours: "Closed".into() },
            ]
        );
    }

    #[test]
    fn test_empty_page_is_not_an_error() {
        let record = contact("<html><body></body></html>");
        assert!(record.is_empty());
    }
}
