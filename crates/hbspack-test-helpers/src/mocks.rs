//! Mock compilers for testing

use hbspack_compiler::{
    LookupKind, NameLookupHook, PrecompileOptions, Precompiled, Precompiler, Result,
    TemplateCompiler,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

/// Wraps the built-in compiler and counts precompile calls
#[derive(Debug, Default)]
pub struct CountingCompiler {
    calls: AtomicUsize,
}

impl CountingCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TemplateCompiler for CountingCompiler {
    fn precompile(
        &self,
        source: &str,
        options: &PrecompileOptions,
        hook: &mut dyn NameLookupHook,
    ) -> Result<Precompiled> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Precompiler.precompile(source, options, hook)
    }
}

/// Wraps the built-in compiler and holds every call at a barrier right
/// after its first name lookup, so `parties` compilations are guaranteed
/// to be in flight at the same time.
///
/// Each compiled template must resolve at least one name, and exactly
/// `parties` calls must run on separate threads, or the calls deadlock.
pub struct BarrierCompiler {
    barrier: Barrier,
}

impl BarrierCompiler {
    pub fn new(parties: usize) -> Arc<Self> {
        Arc::new(Self {
            barrier: Barrier::new(parties),
        })
    }
}

struct BarrierHook<'h, 'b> {
    inner: &'h mut dyn NameLookupHook,
    barrier: &'b Barrier,
    waited: bool,
}

impl NameLookupHook for BarrierHook<'_, '_> {
    fn name_lookup(&mut self, name: &str, kind: LookupKind) {
        self.inner.name_lookup(name, kind);
        if !self.waited {
            self.waited = true;
            self.barrier.wait();
        }
    }
}

impl TemplateCompiler for BarrierCompiler {
    fn precompile(
        &self,
        source: &str,
        options: &PrecompileOptions,
        hook: &mut dyn NameLookupHook,
    ) -> Result<Precompiled> {
        let mut hook = BarrierHook {
            inner: hook,
            barrier: &self.barrier,
            waited: false,
        };
        Precompiler.precompile(source, options, &mut hook)
    }
}
