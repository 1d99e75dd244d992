//! Test fixtures - template snippets for testing

/// Uses helper `bold` and partial `footer`
pub fn bold_footer_template() -> &'static str {
    "<h1>{{bold title}}</h1>\n{{> footer}}\n"
}

/// Uses only helper `A`
pub fn helper_a_template() -> &'static str {
    "<p>{{A value}}</p>"
}

/// Uses only helper `B`
pub fn helper_b_template() -> &'static str {
    "<p>{{B value}}</p>"
}

/// Uses built-in block helpers and a context lookup, no extensions
pub fn builtin_only_template() -> &'static str {
    r#"{{#if items}}
<ul>
{{#each items}}  <li>{{name}}</li>
{{/each}}</ul>
{{else}}
<p>No items</p>
{{/if}}"#
}

/// Calls helper `shout`, which no fixture configures
pub fn unknown_helper_template() -> &'static str {
    "<p>{{shout name}}</p>"
}

/// Templates with syntax errors
pub fn unclosed_block_template() -> &'static str {
    "{{#if ready}}<p>never closed</p>"
}

pub fn mismatched_block_template() -> &'static str {
    "{{#if ready}}x{{/each}}"
}
