//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into each
//! [`FormSession`](crate::session::FormSession). Nothing in the core reads environment
//! variables while a session is running.

use crate::constants::{DEFAULT_FORM_CODE, MAX_FORM_CODE_LEN};
use crate::shared_context::SourceTag;
use crate::{CoreError, CoreResult, NonEmptyText};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    form_code: NonEmptyText,
    source_tag: SourceTag,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The form code becomes the `<Code>` part of exported filenames, so it must be a short
    /// ASCII alphanumeric token.
    pub fn new(form_code: NonEmptyText, source_tag: SourceTag) -> CoreResult<Self> {
        validate_form_code(form_code.as_str())?;

        Ok(Self {
            form_code,
            source_tag,
        })
    }

    /// Create a config whose provenance tag is derived from the form code (`form-<code>`).
    pub fn for_form(form_code: NonEmptyText) -> CoreResult<Self> {
        let source_tag = SourceTag::new(format!("form-{}", form_code.as_str()))?;
        Self::new(form_code, source_tag)
    }

    pub fn form_code(&self) -> &NonEmptyText {
        &self.form_code
    }

    pub fn source_tag(&self) -> &SourceTag {
        &self.source_tag
    }
}

fn validate_form_code(code: &str) -> CoreResult<()> {
    if code.len() > MAX_FORM_CODE_LEN {
        return Err(CoreError::InvalidInput(format!(
            "form code exceeds maximum length of {} characters",
            MAX_FORM_CODE_LEN
        )));
    }

    if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(CoreError::InvalidInput(
            "form code must contain only ASCII letters and digits".into(),
        ));
    }

    Ok(())
}

/// Parse the form code from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_FORM_CODE`].
pub fn form_code_from_env_value(value: Option<String>) -> CoreResult<NonEmptyText> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_FORM_CODE.to_string());

    validate_form_code(&value)?;
    Ok(NonEmptyText::new(value)?)
}
