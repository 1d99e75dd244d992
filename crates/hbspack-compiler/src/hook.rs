/// What kind of name the compiler resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// A helper invoked by a mustache, block or subexpression.
    Helper,
    /// A partial invoked with `{{> name}}`.
    Partial,
    /// The first segment of a path looked up on the current context.
    Context,
    /// The first segment of an `@data` path.
    Data,
}

/// Observer notified of every name the compiler resolves during one
/// precompile call.
///
/// The compiler only borrows the hook for the duration of a single call, so
/// whatever the hook records belongs to that call alone.
pub trait NameLookupHook {
    fn name_lookup(&mut self, name: &str, kind: LookupKind);
}

/// Hook that ignores every lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl NameLookupHook for NoopHook {
    fn name_lookup(&mut self, _name: &str, _kind: LookupKind) {}
}

impl<F> NameLookupHook for F
where
    F: FnMut(&str, LookupKind),
{
    fn name_lookup(&mut self, name: &str, kind: LookupKind) {
        self(name, kind)
    }
}
