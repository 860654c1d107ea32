//! Validated value types shared by the medrec crates.
//!
//! Each type guarantees its invariant at construction time, so code that holds one
//! never needs to re-check it.

/// Rejected text for a [`NonEmptyText`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    #[error("value must contain at least one non-whitespace character")]
    Empty,
}

/// Errors that can occur when parsing an email address.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("email address cannot be empty")]
    Empty,
    #[error("email address must contain exactly one '@'")]
    MissingAt,
    #[error("email address has an empty local part")]
    EmptyLocalPart,
    #[error("email domain '{0}' is not valid")]
    InvalidDomain(String),
    #[error("email address must not contain whitespace")]
    Whitespace,
}

/// Errors that can occur when creating a [`PatientAge`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AgeError {
    #[error("age {value} is outside the permitted range {min}-{max}")]
    OutOfRange { value: u32, min: u8, max: u8 },
}

/// Identifier text that is never blank: form codes such as `A3` and provenance tags such
/// as `form-A3`.
///
/// Surrounding whitespace is dropped on construction, so `" A3 "` and `"A3"` name the same
/// form. Free-text form fields stay plain `String`s, since a blank field is a legitimate
/// "not yet entered" state there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyText(String);

impl NonEmptyText {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        match input.as_ref().trim() {
            "" => Err(TextError::Empty),
            trimmed => Ok(Self(trimmed.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NonEmptyText {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyText> for String {
    fn from(text: NonEmptyText) -> Self {
        text.0
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A structurally valid email address.
///
/// Only the shape is checked: a single `@`, a non-empty local part, and a dotted
/// domain without empty labels. Deliverability is not our concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses an email address, trimming surrounding whitespace first.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, EmailError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let mut parts = trimmed.split('@');
        let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => (local, domain),
            _ => return Err(EmailError::MissingAt),
        };

        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return Err(EmailError::InvalidDomain(domain.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A patient age in whole years, always within [`PatientAge::MIN`]..=[`PatientAge::MAX`].
///
/// The default value is [`PatientAge::MIN`]. Forms treat the default as "not yet entered",
/// mirroring how an age stepper starts at its lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientAge(u8);

impl PatientAge {
    pub const MIN: u8 = 18;
    pub const MAX: u8 = 120;

    /// Creates a new age, rejecting values outside the permitted range.
    pub fn new(years: u32) -> Result<Self, AgeError> {
        if years < u32::from(Self::MIN) || years > u32::from(Self::MAX) {
            return Err(AgeError::OutOfRange {
                value: years,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        // Range check above guarantees the value fits in a u8.
        Ok(Self(years as u8))
    }

    pub fn years(self) -> u8 {
        self.0
    }

    /// Returns true when the age still holds its default value.
    pub fn is_default(self) -> bool {
        self.0 == Self::MIN
    }
}

impl Default for PatientAge {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl std::fmt::Display for PatientAge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for PatientAge {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PatientAge {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let years = u32::deserialize(deserializer)?;
        PatientAge::new(years).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        let text = NonEmptyText::new("  A3  ").expect("should accept padded text");
        assert_eq!(text.as_str(), "A3");

        let err = NonEmptyText::new(" \t ").expect_err("should reject whitespace");
        assert_eq!(err, TextError::Empty);
    }

    #[test]
    fn non_empty_text_serde_trims_and_validates() {
        let tag: NonEmptyText = serde_json::from_str("\" form-A3 \"").expect("should deserialize");
        assert_eq!(tag.as_str(), "form-A3");
        assert_eq!(serde_json::to_string(&tag).expect("should serialize"), "\"form-A3\"");

        assert!(serde_json::from_str::<NonEmptyText>("\"  \"").is_err());
        assert_eq!("  ".parse::<NonEmptyText>(), Err(TextError::Empty));
    }

    #[test]
    fn email_address_accepts_common_shapes() {
        let email = EmailAddress::parse(" dr.smith@nhs.net ").expect("valid email");
        assert_eq!(email.as_str(), "dr.smith@nhs.net");
        assert!(EmailAddress::parse("a@b.co.uk").is_ok());
    }

    #[test]
    fn email_address_rejects_malformed_input() {
        assert_eq!(EmailAddress::parse(""), Err(EmailError::Empty));
        assert_eq!(EmailAddress::parse("smith.nhs.net"), Err(EmailError::MissingAt));
        assert_eq!(EmailAddress::parse("a@b@c.com"), Err(EmailError::MissingAt));
        assert_eq!(EmailAddress::parse("@nhs.net"), Err(EmailError::EmptyLocalPart));
        assert_eq!(EmailAddress::parse("dr smith@nhs.net"), Err(EmailError::Whitespace));
        assert!(matches!(
            EmailAddress::parse("smith@localhost"),
            Err(EmailError::InvalidDomain(_))
        ));
        assert!(matches!(
            EmailAddress::parse("smith@nhs..net"),
            Err(EmailError::InvalidDomain(_))
        ));
    }

    #[test]
    fn patient_age_enforces_bounds() {
        assert!(PatientAge::new(17).is_err());
        assert!(PatientAge::new(121).is_err());
        assert_eq!(PatientAge::new(18).expect("lower bound").years(), 18);
        assert_eq!(PatientAge::new(120).expect("upper bound").years(), 120);
    }

    #[test]
    fn patient_age_default_is_lower_bound() {
        let age = PatientAge::default();
        assert_eq!(age.years(), PatientAge::MIN);
        assert!(age.is_default());
        assert!(!PatientAge::new(42).expect("valid").is_default());
    }

    #[test]
    fn patient_age_deserialize_rejects_out_of_range() {
        let ok: PatientAge = serde_json::from_str("64").expect("should deserialize");
        assert_eq!(ok.years(), 64);

        let err = serde_json::from_str::<PatientAge>("7");
        assert!(err.is_err(), "age below the minimum should not deserialize");
    }
}
