//! Form shape validation
//!
//! Runs before compilation so malformed requests never reach the compiler.

use crate::error::{ListenerError, ListenerResult};
use crate::script::SCRIPT_BODY_FIELD;
use crate::types::ListenerForm;

/// Longest accepted listener name
pub const MAX_NAME_LEN: usize = 255;

/// Longest accepted selector
pub const MAX_SELECTOR_LEN: usize = 128;

/// A form that passed validation, with whitespace trimmed and selectors
/// deduplicated in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidForm {
    pub name: String,
    pub description: Option<String>,
    pub selectors: Vec<String>,
    pub script_body: String,
    pub enabled: bool,
    pub comment: Option<String>,
}

/// Check `form` and normalize it
pub fn validate_form(form: &ListenerForm) -> ListenerResult<ValidForm> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ListenerError::validation("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ListenerError::validation(
            "name",
            format!("must be at most {} characters", MAX_NAME_LEN),
        ));
    }

    if form.selectors.is_empty() {
        return Err(ListenerError::validation(
            "selectors",
            "at least one event type is required",
        ));
    }

    let mut selectors: Vec<String> = Vec::with_capacity(form.selectors.len());
    for raw in &form.selectors {
        let selector = raw.trim();
        if selector.is_empty() {
            return Err(ListenerError::validation("selectors", "event type must not be empty"));
        }
        if selector.len() > MAX_SELECTOR_LEN {
            return Err(ListenerError::validation(
                "selectors",
                format!("event type must be at most {} bytes", MAX_SELECTOR_LEN),
            ));
        }
        if selector.chars().any(char::is_whitespace) {
            return Err(ListenerError::validation(
                "selectors",
                format!("event type '{}' must not contain whitespace", selector),
            ));
        }
        if !selectors.iter().any(|s| s == selector) {
            selectors.push(selector.to_string());
        }
    }

    if form.script_body.trim().is_empty() {
        return Err(ListenerError::validation(SCRIPT_BODY_FIELD, "must not be empty"));
    }

    let description = form
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let comment = form
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(ValidForm {
        name: name.to_string(),
        description,
        selectors,
        script_body: form.script_body.clone(),
        enabled: form.enabled,
        comment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn form() -> ListenerForm {
        ListenerForm::new("notify", "IssueCreated", "return 1")
    }

    #[test]
    fn test_valid_form_is_normalized() {
        let mut f = form().with_selectors(["IssueCreated", " IssueUpdated ", "IssueCreated"]);
        f.name = "  notify  ".into();
        f.description = Some("   ".into());

        let valid = validate_form(&f).unwrap();
        assert_eq!(valid.name, "notify");
        assert_eq!(valid.selectors, vec!["IssueCreated", "IssueUpdated"]);
        assert_eq!(valid.description, None);
    }

    #[test]
    fn test_missing_name_rejected() {
        let mut f = form();
        f.name = " ".into();
        let err = validate_form(&f).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_missing_selector_rejected() {
        let f = form().with_selectors(Vec::<String>::new());
        let err = validate_form(&f).unwrap_err();
        assert_eq!(err.field(), Some("selectors"));
    }

    #[test]
    fn test_selector_with_space_rejected() {
        let f = form().with_selectors(["Issue Created"]);
        assert!(validate_form(&f).is_err());
    }

    #[test]
    fn test_blank_script_body_rejected_as_field_error() {
        let mut f = form();
        f.script_body = "\n\t".into();
        let err = validate_form(&f).unwrap_err();
        assert_eq!(err.field(), Some("scriptBody"));
    }

    proptest! {
        #[test]
        fn prop_valid_selectors_survive_normalization(
            selectors in proptest::collection::vec("[A-Za-z][A-Za-z0-9_.:]{0,20}", 1..6)
        ) {
            let f = form().with_selectors(selectors.clone());
            let valid = validate_form(&f).unwrap();

            for s in &selectors {
                prop_assert!(valid.selectors.contains(s));
            }
            let unique: std::collections::HashSet<&String> = valid.selectors.iter().collect();
            prop_assert_eq!(unique.len(), valid.selectors.len());
        }

        #[test]
        fn prop_whitespace_names_always_rejected(name in "[ \t\n]{0,8}") {
            let mut f = form();
            f.name = name;
            prop_assert!(validate_form(&f).is_err());
        }
    }
}
