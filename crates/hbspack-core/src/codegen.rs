//! Builds the JavaScript module a bundler receives for a template.
//!
//! Output layout:
//!
//! ```text
//! import * as Handlebars from "handlebars/runtime";
//! import bold from "./bold";
//! import footer from "./footer";
//! Handlebars.registerHelper({"bold": bold});
//! Handlebars.registerPartial({"footer": footer});
//! export default Handlebars.template({...});
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{CompileError, CompiledArtifact};
use crate::config::{ExtensionTable, PluginConfig};
use crate::diagnostics::LoadOutput;

/// Name the runtime namespace is imported under.
pub const RUNTIME_BINDING: &str = "Handlebars";

const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while",
    "with", "yield",
];

#[derive(Debug, Clone)]
pub struct ModuleGenerator {
    runtime_module: String,
    inline_source_map: bool,
}

/// A name matched against the extension table, with its local binding.
struct Import<'a> {
    name: &'a str,
    binding: String,
    specifier: &'a str,
}

impl ModuleGenerator {
    pub fn new(runtime_module: impl Into<String>, inline_source_map: bool) -> Self {
        Self {
            runtime_module: runtime_module.into(),
            inline_source_map,
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(config.runtime_module.clone(), config.inline_source_map)
    }

    /// Emits the module for a compiled template.
    ///
    /// Only referenced names present in `table` are imported and
    /// registered; the rest are dropped.
    pub fn generate(
        &self,
        artifact: &CompiledArtifact,
        helpers: &IndexSet<String>,
        partials: &IndexSet<String>,
        table: &ExtensionTable,
    ) -> String {
        let mut bindings = Bindings::new();
        let helper_imports = match_names(helpers, |n| table.helper(n), "helper", &mut bindings);
        let partial_imports = match_names(partials, |n| table.partial(n), "partial", &mut bindings);

        let mut lines = Vec::with_capacity(helper_imports.len() + partial_imports.len() + 4);
        lines.push(format!(
            "import * as {} from {};",
            RUNTIME_BINDING,
            js_string(&self.runtime_module)
        ));
        for import in helper_imports.iter().chain(&partial_imports) {
            lines.push(format!(
                "import {} from {};",
                import.binding,
                js_string(import.specifier)
            ));
        }
        lines.push(format!(
            "{}.registerHelper({});",
            RUNTIME_BINDING,
            registration(&helper_imports)
        ));
        lines.push(format!(
            "{}.registerPartial({});",
            RUNTIME_BINDING,
            registration(&partial_imports)
        ));
        let template_line = lines.len();
        lines.push(format!(
            "export default {}.template({});",
            RUNTIME_BINDING, artifact.code
        ));

        if self.inline_source_map {
            if let Some(map) = artifact.map.as_deref().and_then(|m| shift_lines(m, template_line)) {
                lines.push(format!(
                    "//# sourceMappingURL=data:application/json;base64,{}",
                    STANDARD.encode(map)
                ));
            }
        }

        lines.join("\n")
    }

    /// Maps a compile failure to the diagnostic returned to the host.
    pub fn failure(error: &CompileError) -> LoadOutput {
        LoadOutput::error(error.to_string())
    }
}

fn match_names<'a>(
    referenced: &'a IndexSet<String>,
    lookup: impl Fn(&str) -> Option<&'a str>,
    kind: &str,
    bindings: &mut Bindings,
) -> Vec<Import<'a>> {
    let mut imports = Vec::new();
    for name in referenced {
        match lookup(name) {
            Some(specifier) => imports.push(Import {
                name,
                binding: bindings.bind(kind, name),
                specifier,
            }),
            None => debug!("Referenced {} '{}' is not configured, skipping", kind, name),
        }
    }
    imports
}

/// Re-bases a template source map onto the module, where the precompiled
/// template starts `lines` lines down. Its first line carries no mappings,
/// so only whole lines need to be prepended.
fn shift_lines(map: &str, lines: usize) -> Option<String> {
    let mut map: Value = match serde_json::from_str(map) {
        Ok(map) => map,
        Err(err) => {
            warn!("Dropping unreadable template source map: {}", err);
            return None;
        }
    };
    if let Some(mappings) = map.get_mut("mappings") {
        if let Some(text) = mappings.as_str() {
            *mappings = Value::String(format!("{}{}", ";".repeat(lines), text));
        }
    }
    Some(map.to_string())
}

fn registration(imports: &[Import<'_>]) -> String {
    let entries: Vec<String> = imports
        .iter()
        .map(|import| format!("{}: {}", js_string(import.name), import.binding))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Allocates unique, valid JavaScript identifiers for imports.
struct Bindings {
    used: FxHashSet<String>,
}

impl Bindings {
    fn new() -> Self {
        let mut used = FxHashSet::default();
        used.insert(RUNTIME_BINDING.to_string());
        Self { used }
    }

    fn bind(&mut self, kind: &str, name: &str) -> String {
        if is_identifier(name) && !RESERVED_WORDS.contains(&name) && self.used.insert(name.to_string()) {
            return name.to_string();
        }

        let base = format!("{}_{}", kind, sanitize(name));
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '$' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbspack_compiler::Precompiled;

    fn artifact() -> CompiledArtifact {
        Precompiled {
            code: r#"{"compiler":[8,">= 4.3.0"],"main":function(){}}"#.to_string(),
            map: Some(r#"{"version":3,"mappings":"AAAA"}"#.to_string()),
        }
    }

    fn names(list: &[&str]) -> IndexSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn table(helpers: &[(&str, &str)], partials: &[(&str, &str)]) -> ExtensionTable {
        ExtensionTable {
            helpers: helpers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            partials: partials.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_bold_and_footer_module() {
        let generator = ModuleGenerator::new("handlebars/runtime", false);
        let module = generator.generate(
            &artifact(),
            &names(&["bold"]),
            &names(&["footer"]),
            &table(&[("bold", "./bold")], &[("footer", "./footer")]),
        );
        insta::assert_snapshot!(module, @r#"
        import * as Handlebars from "handlebars/runtime";
        import bold from "./bold";
        import footer from "./footer";
        Handlebars.registerHelper({"bold": bold});
        Handlebars.registerPartial({"footer": footer});
        export default Handlebars.template({"compiler":[8,">= 4.3.0"],"main":function(){}});
        "#);
    }

    #[test]
    fn test_unconfigured_and_unreferenced_names_are_dropped() {
        let generator = ModuleGenerator::new("handlebars/runtime", false);
        let module = generator.generate(
            &artifact(),
            &names(&["if", "upper"]),
            &names(&[]),
            &table(&[("upper", "./upper"), ("unused", "./unused")], &[]),
        );
        assert!(module.contains("import upper from \"./upper\";"));
        assert!(!module.contains("unused"));
        assert!(!module.contains("\"if\""));
        assert!(module.contains("Handlebars.registerPartial({});"));
    }

    #[test]
    fn test_matched_names_keep_discovery_order() {
        let generator = ModuleGenerator::new("handlebars/runtime", false);
        let module = generator.generate(
            &artifact(),
            &names(&["upper", "bold"]),
            &names(&[]),
            &table(&[("bold", "./bold"), ("upper", "./upper")], &[]),
        );
        assert!(module.contains("Handlebars.registerHelper({\"upper\": upper, \"bold\": bold});"));
    }

    #[test]
    fn test_invalid_and_colliding_names_are_aliased() {
        let generator = ModuleGenerator::new("handlebars/runtime", false);
        let module = generator.generate(
            &artifact(),
            &names(&["format-date", "card", "Handlebars"]),
            &names(&["card"]),
            &table(
                &[("format-date", "./fd"), ("card", "./card-helper"), ("Handlebars", "./hb")],
                &[("card", "./card.hbs")],
            ),
        );
        assert!(module.contains("import helper_format_date from \"./fd\";"));
        assert!(module.contains("import card from \"./card-helper\";"));
        assert!(module.contains("import helper_Handlebars from \"./hb\";"));
        assert!(module.contains("import partial_card from \"./card.hbs\";"));
        assert!(module.contains("\"format-date\": helper_format_date"));
        assert!(module.contains("Handlebars.registerPartial({\"card\": partial_card});"));
    }

    #[test]
    fn test_specifiers_are_escaped() {
        let generator = ModuleGenerator::new("handlebars/runtime", false);
        let module = generator.generate(
            &artifact(),
            &names(&["q"]),
            &names(&[]),
            &table(&[("q", "./it's \"quoted\"")], &[]),
        );
        assert!(module.contains(r#"import q from "./it's \"quoted\"";"#));
    }

    #[test]
    fn test_inline_source_map_trailer() {
        let generator = ModuleGenerator::new("handlebars/runtime", true);
        let module = generator.generate(&artifact(), &names(&[]), &names(&[]), &table(&[], &[]));
        let trailer = module.lines().last().unwrap();
        let encoded = trailer
            .strip_prefix("//# sourceMappingURL=data:application/json;base64,")
            .unwrap();
        let map: Value = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        // runtime import + two registrations precede the template line
        assert_eq!(map["mappings"], ";;;AAAA");
    }

    #[test]
    fn test_custom_runtime_module() {
        let generator = ModuleGenerator::new("handlebars/dist/handlebars.runtime", false);
        let module = generator.generate(&artifact(), &names(&[]), &names(&[]), &table(&[], &[]));
        assert!(module.starts_with(
            "import * as Handlebars from \"handlebars/dist/handlebars.runtime\";"
        ));
    }
}
