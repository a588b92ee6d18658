//! Turning Lua error text into field-tagged diagnostics

use hearken_core::ScriptDiagnostic;
use once_cell::sync::Lazy;
use regex::Regex;

/// `listener:12: unexpected symbol near 'x'`
static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:listener|\[string [^\]]*\]):(\d+):\s*(.*)$").expect("valid location regex")
});

/// Diagnostic for a failed `load` of a listener body.
///
/// Lua reports the line but not the column of syntax errors.
pub fn syntax_diagnostic(err: &mlua::Error) -> ScriptDiagnostic {
    let raw = match err {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let first = raw.lines().next().unwrap_or_default().trim();

    match LOCATION.captures(first) {
        Some(caps) => {
            let message = caps.get(2).map_or("", |m| m.as_str()).to_string();
            match caps[1].parse::<u32>() {
                Ok(line) => ScriptDiagnostic::new(message).at_line(line),
                Err(_) => ScriptDiagnostic::new(message),
            }
        }
        None => ScriptDiagnostic::new(first.to_string()),
    }
}

/// First line of a runtime error, with callback wrappers peeled off
pub(crate) fn runtime_message(err: &mlua::Error) -> String {
    let mut err = err;
    while let mlua::Error::CallbackError { cause, .. } = err {
        err = cause.as_ref();
    }
    let text = match err {
        mlua::Error::RuntimeError(msg) => msg.clone(),
        other => other.to_string(),
    };
    text.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_location_is_parsed_from_syntax_error() {
        let err = mlua::Error::SyntaxError {
            message: "listener:3: unexpected symbol near ';'".into(),
            incomplete_input: false,
        };
        let diag = syntax_diagnostic(&err);
        assert_eq!(diag.field, "scriptBody");
        assert_eq!(diag.line, Some(3));
        assert_eq!(diag.column, None);
        assert_eq!(diag.message, "unexpected symbol near ';'");
    }

    #[test]
    fn test_unlocated_message_is_kept_whole() {
        let err = mlua::Error::SyntaxError {
            message: "not enough memory".into(),
            incomplete_input: false,
        };
        let diag = syntax_diagnostic(&err);
        assert_eq!(diag.line, None);
        assert_eq!(diag.message, "not enough memory");
    }

    #[test]
    fn test_runtime_message_takes_first_line() {
        let err = mlua::Error::RuntimeError("listener:1: boom\nstack traceback:\n\t[C]: in ?".into());
        assert_eq!(runtime_message(&err), "listener:1: boom");
    }

    proptest! {
        #[test]
        fn test_any_located_error_keeps_line_and_message(
            line in 1u32..100_000,
            message in "[a-z][a-z '<>=]{0,40}"
        ) {
            let err = mlua::Error::SyntaxError {
                message: format!("listener:{}: {}\nstack traceback:", line, message),
                incomplete_input: false,
            };
            let diag = syntax_diagnostic(&err);
            prop_assert_eq!(diag.line, Some(line));
            prop_assert_eq!(diag.message, message.trim_end());
        }
    }
}
