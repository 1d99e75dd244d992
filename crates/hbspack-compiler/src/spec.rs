//! Emits a Handlebars runtime template spec from a parsed program.
//!
//! The output is the object literal `Handlebars.template()` accepts:
//! `{"compiler":[8,">= 4.3.0"],"main":function(...){...},"1":...,"useData":true}`.
//! Every program function appends to a local `buffer`, one statement per
//! line, so top-level statements of `main` can be source mapped by line.

use serde_json::Value;

use crate::ast::{Block, Call, Expr, Hash, Literal, Mustache, Partial, PathExpr, Program, Statement};
use crate::error::{Error, Result};
use crate::hook::{LookupKind, NameLookupHook};
use crate::options::PrecompileOptions;
use crate::sourcemap::SourceMapBuilder;
use crate::span::Span;
use crate::{Precompiled, BUILTIN_HELPERS, COMPILER_REVISION, REVISION_CHANGES};

const PROGRAM_SIGNATURE: &str =
    "function(container,depth0,helpers,partials,data,blockParams,depths) {";

const LOOKUP_PROPERTY: &str = "  var lookupProperty = container.lookupProperty || function(parent, propertyName) { if (Object.prototype.hasOwnProperty.call(parent, propertyName)) { return parent[propertyName]; } return undefined; };";

const LOOKUP_PATH: &str = "  var lookupPath = function(obj, parts) { for (var i = 0; i < parts.length && obj != null; i++) { obj = lookupProperty(obj, parts[i]); } return obj; };";

const LOOKUP_PATH_STRICT: &str = "  var lookupPath = function(obj, parts) { for (var i = 0; i < parts.length; i++) { obj = container.strict(obj, parts[i]); } return obj; };";

struct Line {
    code: String,
    span: Option<Span>,
}

pub(crate) fn emit(
    source: &str,
    program: &Program,
    options: &PrecompileOptions,
    hook: &mut dyn NameLookupHook,
) -> Result<Precompiled> {
    let mut emitter = SpecEmitter {
        options,
        hook,
        programs: Vec::new(),
        scopes: Vec::new(),
        use_depths: false,
        use_partial: false,
        use_block_params: false,
    };
    let main = emitter.compile_program(program)?;
    Ok(emitter.assemble(source, main))
}

struct SpecEmitter<'o, 'h> {
    options: &'o PrecompileOptions,
    hook: &'h mut dyn NameLookupHook,
    /// Child programs; entry `i` is emitted under key `i + 1`.
    programs: Vec<String>,
    /// Block parameter names, innermost program last.
    scopes: Vec<Vec<String>>,
    use_depths: bool,
    use_partial: bool,
    use_block_params: bool,
}

impl SpecEmitter<'_, '_> {
    fn is_known(&self, name: &str) -> bool {
        BUILTIN_HELPERS.contains(&name) || self.options.known_helpers.contains(name)
    }

    /// The call's head when it names a block param in scope. Block params
    /// shadow helpers of the same name.
    fn block_param_head<'c>(&self, call: &'c Call) -> Option<&'c PathExpr> {
        match &call.head {
            Expr::Path(path) => path
                .simple_name()
                .and_then(|name| self.block_param(name))
                .map(|_| path),
            _ => None,
        }
    }

    fn lookup_path_line(&self) -> &'static str {
        if self.options.strict() {
            LOOKUP_PATH_STRICT
        } else {
            LOOKUP_PATH
        }
    }

    fn compile_program(&mut self, program: &Program) -> Result<Vec<Line>> {
        self.scopes.push(program.block_params.clone());
        let mut lines = Vec::new();
        for statement in &program.body {
            if let Some(expr) = self.statement(statement)? {
                lines.push(Line {
                    code: format!("buffer += {};", expr),
                    span: statement.span(),
                });
            }
        }
        self.scopes.pop();
        Ok(lines)
    }

    fn render_function(&self, lines: &[Line]) -> String {
        let mut out = String::from(PROGRAM_SIGNATURE);
        out.push('\n');
        for line in self.preamble() {
            out.push_str(line);
            out.push('\n');
        }
        for line in lines {
            out.push_str("  ");
            out.push_str(&line.code);
            out.push('\n');
        }
        out.push_str("  return buffer;\n}");
        out
    }

    fn preamble(&self) -> [&'static str; 3] {
        [
            "  var stack1, alias1 = depth0 != null ? depth0 : (container.nullContext || {}), buffer = \"\";",
            LOOKUP_PROPERTY,
            self.lookup_path_line(),
        ]
    }

    fn assemble(self, source: &str, main: Vec<Line>) -> Precompiled {
        let mut map = self.options.source_map().then(|| {
            let name = self
                .options
                .src_name
                .clone()
                .unwrap_or_else(|| "template.hbs".to_string());
            let mut builder = SourceMapBuilder::new(name);
            builder.add_source_content(source.to_string());
            builder
        });
        let mut out = String::new();
        let write = |out: &mut String, map: &mut Option<SourceMapBuilder>, text: &str| {
            out.push_str(text);
            if let Some(map) = map.as_mut() {
                map.advance(text);
            }
        };

        write(
            &mut out,
            &mut map,
            &format!(
                "{{\"compiler\":[{},{}],\"main\":{}\n",
                COMPILER_REVISION,
                js_string(REVISION_CHANGES),
                PROGRAM_SIGNATURE
            ),
        );
        for line in self.preamble() {
            write(&mut out, &mut map, line);
            write(&mut out, &mut map, "\n");
        }
        for line in &main {
            write(&mut out, &mut map, "  ");
            if let (Some(builder), Some(span)) = (map.as_mut(), line.span) {
                builder.add_mapping(span, None);
            }
            write(&mut out, &mut map, &line.code);
            write(&mut out, &mut map, "\n");
        }
        write(&mut out, &mut map, "  return buffer;\n}");

        for (index, program) in self.programs.iter().enumerate() {
            out.push_str(&format!(",\"{}\":{}", index + 1, program));
        }
        out.push_str(",\"useData\":true");
        if self.use_depths {
            out.push_str(",\"useDepths\":true");
        }
        if self.use_block_params {
            out.push_str(",\"useBlockParams\":true");
        }
        if self.use_partial {
            out.push_str(",\"usePartial\":true");
        }
        out.push('}');

        Precompiled {
            code: out,
            map: map.and_then(|builder| builder.build().to_json().ok()),
        }
    }

    fn statement(&mut self, statement: &Statement) -> Result<Option<String>> {
        match statement {
            Statement::Content(text) if text.is_empty() => Ok(None),
            Statement::Content(text) => Ok(Some(js_string(text))),
            Statement::Comment(_) => Ok(None),
            Statement::Mustache(mustache) => self.mustache(mustache).map(Some),
            Statement::Block(block) => self.block(block).map(Some),
            Statement::Partial(partial) => self.partial(partial).map(Some),
        }
    }

    fn mustache(&mut self, mustache: &Mustache) -> Result<String> {
        let call = &mustache.call;
        let value = match &call.head {
            Expr::Path(path) if self.block_param_head(call).is_some() => {
                format!("container.lambda({}, depth0)", self.path(path, call.span)?)
            }
            Expr::Path(path) => {
                let name = call.simple_name();
                match name {
                    Some(name) if self.is_known(name) => self.helper_call(name, call)?,
                    _ if call.has_arguments() => self.unknown_helper_call(call)?,
                    Some(name) if !self.options.known_helpers_only => {
                        self.ambiguous_lookup(name, path, call.span)?
                    }
                    _ => format!("container.lambda({}, depth0)", self.path(path, call.span)?),
                }
            }
            head => {
                if call.has_arguments() {
                    return Err(Error::parse("Invalid helper name", call.span));
                }
                self.value(head, call.span)?
            }
        };

        if mustache.escaped && !self.options.no_escape() {
            Ok(format!("container.escapeExpression({})", value))
        } else {
            Ok(or_empty(&value))
        }
    }

    fn block(&mut self, block: &Block) -> Result<String> {
        let call = &block.call;
        let shadowed = self.block_param_head(call).is_some();
        let name = call.simple_name().filter(|_| !shadowed);
        let known = name.is_some_and(|n| self.is_known(n));

        if !known && call.has_arguments() && !shadowed {
            if self.options.known_helpers_only {
                return Err(unknown_helper(call));
            }
            let Some(name) = name else {
                return Err(Error::unsupported("calling a path as a block helper", call.span));
            };
            self.hook.name_lookup(name, LookupKind::Helper);
            let (params, hash) = self.call_parts(call)?;
            let programs = self.block_programs(block)?;
            let options = options_object(name, &hash, Some(programs), call.span);
            return Ok(or_empty(&format!(
                "(lookupProperty(helpers,{}) || container.hooks.helperMissing).call(alias1{}, {})",
                js_string(name),
                params,
                options
            )));
        }

        if let (true, Some(name)) = (known, name) {
            self.hook.name_lookup(name, LookupKind::Helper);
            let (params, hash) = self.call_parts(call)?;
            let programs = self.block_programs(block)?;
            let options = options_object(name, &hash, Some(programs), call.span);
            return Ok(or_empty(&format!(
                "lookupProperty(helpers,{}).call(alias1{}, {})",
                js_string(name),
                params,
                options
            )));
        }

        // An argument-less block on an unknown name: a section over the
        // looked-up value, resolved at runtime by `blockHelperMissing`.
        let Expr::Path(path) = &call.head else {
            return Err(Error::parse("Invalid block name", call.span));
        };
        if let (false, Some(name)) = (self.options.known_helpers_only, name) {
            self.hook.name_lookup(name, LookupKind::Helper);
            let value = self.path(path, call.span)?;
            let programs = self.block_programs(block)?;
            let options = options_object(&path.original, "{}", Some(programs), call.span);
            return Ok(or_empty(&format!(
                "(typeof (stack1 = lookupProperty(helpers,{})) === \"function\" ? stack1.call(alias1, {opts}) : container.hooks.blockHelperMissing.call(depth0, {}, {opts}))",
                js_string(name),
                value,
                opts = options
            )));
        }
        let value = self.path(path, call.span)?;
        let programs = self.block_programs(block)?;
        let options = options_object(&path.original, "{}", Some(programs), call.span);
        Ok(or_empty(&format!(
            "container.hooks.blockHelperMissing.call(depth0, {}, {})",
            value, options
        )))
    }

    fn partial(&mut self, partial: &Partial) -> Result<String> {
        self.hook.name_lookup(&partial.name, LookupKind::Partial);
        self.use_partial = true;

        let context = match &partial.context {
            Some(expr) => self.value(expr, partial.span)?,
            None => "depth0".to_string(),
        };
        let mut options = format!("{{\"name\":{}", js_string(&partial.name));
        if !partial.hash.is_empty() {
            options.push_str(",\"hash\":");
            options.push_str(&self.hash_object(&partial.hash, partial.span)?);
        }
        options.push_str(
            ",\"data\":data,\"helpers\":helpers,\"partials\":partials,\"decorators\":container.decorators}",
        );

        Ok(or_empty(&format!(
            "container.invokePartial(lookupProperty(partials,{}),{},{})",
            js_string(&partial.name),
            context,
            options
        )))
    }

    fn helper_call(&mut self, name: &str, call: &Call) -> Result<String> {
        self.hook.name_lookup(name, LookupKind::Helper);
        let (params, hash) = self.call_parts(call)?;
        let options = options_object(name, &hash, None, call.span);
        Ok(format!(
            "lookupProperty(helpers,{}).call(alias1{}, {})",
            js_string(name),
            params,
            options
        ))
    }

    fn unknown_helper_call(&mut self, call: &Call) -> Result<String> {
        if self.options.known_helpers_only {
            return Err(unknown_helper(call));
        }
        let Some(name) = call.simple_name() else {
            return Err(Error::unsupported("calling a path as a helper", call.span));
        };
        self.hook.name_lookup(name, LookupKind::Helper);
        let (params, hash) = self.call_parts(call)?;
        let options = options_object(name, &hash, None, call.span);
        Ok(format!(
            "(lookupProperty(helpers,{}) || container.hooks.helperMissing).call(alias1{}, {})",
            js_string(name),
            params,
            options
        ))
    }

    /// `{{name}}` where `name` may be a runtime helper or a context field.
    fn ambiguous_lookup(&mut self, name: &str, path: &PathExpr, span: Span) -> Result<String> {
        self.hook.name_lookup(name, LookupKind::Helper);
        let value = self.path(path, span)?;
        let options = options_object(name, "{}", None, span);
        Ok(format!(
            "(typeof (stack1 = (lookupProperty(helpers,{}) || {})) === \"function\" ? stack1.call(alias1, {}) : stack1)",
            js_string(name),
            value,
            options
        ))
    }

    /// Returns `(", p1, p2", hash_object)` for a call's arguments.
    fn call_parts(&mut self, call: &Call) -> Result<(String, String)> {
        let mut params = String::new();
        for param in &call.params {
            params.push(',');
            params.push_str(&self.value(param, call.span)?);
        }
        let hash = self.hash_object(&call.hash, call.span)?;
        Ok((params, hash))
    }

    fn hash_object(&mut self, hash: &Hash, span: Span) -> Result<String> {
        let mut entries = Vec::with_capacity(hash.len());
        for (key, value) in hash {
            entries.push(format!("{}:{}", js_string(key), self.value(value, span)?));
        }
        Ok(format!("{{{}}}", entries.join(",")))
    }

    fn block_programs(&mut self, block: &Block) -> Result<(String, String)> {
        let program = self.child_program(&block.program)?;
        let inverse = match &block.inverse {
            Some(inverse) => self.child_program(inverse)?,
            None => "container.noop".to_string(),
        };
        Ok((program, inverse))
    }

    fn child_program(&mut self, program: &Program) -> Result<String> {
        let index = self.programs.len();
        self.programs.push(String::new());
        if !program.block_params.is_empty() {
            self.use_block_params = true;
        }
        let lines = self.compile_program(program)?;
        self.programs[index] = self.render_function(&lines);
        Ok(format!(
            "container.program({}, data, {}, blockParams, depths)",
            index + 1,
            program.block_params.len()
        ))
    }

    fn value(&mut self, expr: &Expr, span: Span) -> Result<String> {
        match expr {
            Expr::Literal(literal) => Ok(literal_js(literal)),
            Expr::Path(path) => self.path(path, span),
            Expr::SubExpr(call) => {
                if let Some(path) = self.block_param_head(call) {
                    return self.path(path, call.span);
                }
                match call.simple_name() {
                    Some(name) if self.is_known(name) => self.helper_call(name, call),
                    Some(_) => self.unknown_helper_call(call),
                    None => Err(Error::parse("Invalid subexpression helper", call.span)),
                }
            }
        }
    }

    fn path(&mut self, path: &PathExpr, span: Span) -> Result<String> {
        if path.data {
            if path.depth > 0 {
                return Err(Error::unsupported("parent data paths", span));
            }
            if let Some(first) = path.parts.first() {
                self.hook.name_lookup(first, LookupKind::Data);
            }
            return Ok(lookup_path("data", &path.parts));
        }

        if !path.scoped && path.depth == 0 {
            if let Some((level, index)) = path.parts.first().and_then(|p| self.block_param(p)) {
                self.use_block_params = true;
                let base = format!("blockParams[{}][{}]", level, index);
                return Ok(lookup_path(&base, &path.parts[1..]));
            }
        }

        let base = if path.depth > 0 {
            self.use_depths = true;
            format!("depths[{}]", path.depth)
        } else {
            "depth0".to_string()
        };
        if let Some(first) = path.parts.first() {
            self.hook.name_lookup(first, LookupKind::Context);
        }
        Ok(lookup_path(&base, &path.parts))
    }

    fn block_param(&self, name: &str) -> Option<(usize, usize)> {
        self.scopes
            .iter()
            .rev()
            .enumerate()
            .find_map(|(level, params)| params.iter().position(|p| p == name).map(|i| (level, i)))
    }
}

fn unknown_helper(call: &Call) -> Error {
    let name = match &call.head {
        Expr::Path(path) => path.original.clone(),
        _ => "(literal)".to_string(),
    };
    Error::UnknownHelper {
        name,
        span: call.span,
    }
}

fn options_object(name: &str, hash: &str, programs: Option<(String, String)>, span: Span) -> String {
    let mut out = format!("{{\"name\":{},\"hash\":{}", js_string(name), hash);
    if let Some((program, inverse)) = programs {
        out.push_str(&format!(",\"fn\":{},\"inverse\":{}", program, inverse));
    }
    out.push_str(&format!(
        ",\"data\":data,\"loc\":{{\"start\":{{\"line\":{},\"column\":{}}},\"end\":{{\"line\":{},\"column\":{}}}}}}}",
        span.line, span.column, span.end_line, span.end_column
    ));
    out
}

fn or_empty(expr: &str) -> String {
    format!("((stack1 = {}) != null ? stack1 : \"\")", expr)
}

fn lookup_path(base: &str, parts: &[String]) -> String {
    if parts.is_empty() {
        return base.to_string();
    }
    let parts: Vec<Value> = parts.iter().map(|p| Value::String(p.clone())).collect();
    format!("lookupPath({}, {})", base, Value::Array(parts))
}

fn literal_js(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => js_string(s),
        Literal::Number(n) => n.clone(),
        Literal::Boolean(b) => b.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Undefined => "undefined".to_string(),
    }
}

/// A double-quoted JavaScript string literal.
pub(crate) fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
