//! Directive text composition.

/// Option label clients send when the player typed a free-form directive.
pub const CUSTOM_DIRECTIVE_LABEL: &str = "Custom Directive";

/// Directive used when an actor submitted nothing.
pub const NO_OP_DIRECTIVE: &str = "no-op";

/// Join a chosen option label and free text with `" + "`.
///
/// The custom-directive label is not a real option and is dropped. An empty
/// result becomes [`NO_OP_DIRECTIVE`] so generation always gets input.
pub fn compose(label: &str, custom_text: Option<&str>) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(2);
    let label = label.trim();
    if !label.is_empty() && label != CUSTOM_DIRECTIVE_LABEL {
        parts.push(label);
    }
    if let Some(text) = custom_text.map(str::trim).filter(|t| !t.is_empty()) {
        parts.push(text);
    }
    if parts.is_empty() {
        NO_OP_DIRECTIVE.to_string()
    } else {
        parts.join(" + ")
    }
}

/// Trim generated directive text, falling back to [`NO_OP_DIRECTIVE`].
pub fn normalize(text: &str) -> String {
    compose("", Some(text))
}
