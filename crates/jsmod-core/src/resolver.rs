//! Specifier resolution with memoization.
//!
//! [`ModuleResolver`] is the single place a specifier becomes a module
//! record. It is installed as the engine's module loader, so every transitive
//! import of the graph comes back through [`ModuleResolver::resolve`].
//!
//! # Resolution Order
//!
//! 1. Built-in registry (never falls through to a source provider)
//! 2. `http://` / `https://` specifiers: remote fetch
//! 3. Anything else: virtual source tree
//!
//! The outcome, success or failure, is cached once per specifier.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use boa_engine::module::{Module, ModuleLoader, Referrer};
use boa_engine::{Context, JsError, JsResult, JsString, JsValue, Source, js_string};
use tracing::{debug, instrument, warn};

use jsmod_common::ResolveError;

use crate::builtin::{BuiltinRegistry, synthesize};
use crate::cache::ResolutionCache;
use crate::source::{SourceFetcher, VirtualTree, is_remote, qualify};
use crate::Deadline;

/// Resolver and cache for one runtime instance.
pub struct ModuleResolver {
    tree: VirtualTree,
    builtins: BuiltinRegistry,
    fetcher: Arc<dyn SourceFetcher>,
    cache: ResolutionCache<Module>,
    /// Armed while the graph is being linked and evaluated.
    deadline: RefCell<Option<Deadline>>,
    first_failure: RefCell<Option<ResolveError>>,
}

impl ModuleResolver {
    /// Create a resolver over the given providers.
    pub fn new(
        tree: VirtualTree,
        builtins: BuiltinRegistry,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self {
            tree,
            builtins,
            fetcher,
            cache: ResolutionCache::new(),
            deadline: RefCell::new(None),
            first_failure: RefCell::new(None),
        }
    }

    /// Bound every following resolution by `deadline`.
    pub fn arm(&self, deadline: Deadline) {
        *self.deadline.borrow_mut() = Some(deadline);
    }

    /// Remove the deadline (dynamic imports during requests are unbounded).
    pub fn disarm(&self) {
        self.deadline.borrow_mut().take();
    }

    /// Take the first failure seen by this resolver.
    pub fn take_failure(&self) -> Option<ResolveError> {
        self.first_failure.borrow_mut().take()
    }

    /// Number of specifiers with a cached outcome.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Resolve `specifier` to a module record.
    #[instrument(skip(self, context))]
    pub fn resolve(&self, specifier: &str, context: &mut Context) -> Result<Module, ResolveError> {
        let result = self
            .cache
            .get_or_resolve(specifier, || self.resolve_uncached(specifier, context));

        if let Err(err) = &result {
            let mut first = self.first_failure.borrow_mut();
            if first.is_none() {
                *first = Some(err.clone());
            }
        }

        result
    }

    fn resolve_uncached(
        &self,
        specifier: &str,
        context: &mut Context,
    ) -> Result<Module, ResolveError> {
        if let Some(native) = self.builtins.get(specifier) {
            debug!("Resolving built-in module");
            return synthesize(specifier, native.as_ref(), context);
        }

        let deadline = self.deadline.borrow().clone();
        if deadline.as_ref().is_some_and(Deadline::is_expired) {
            return Err(ResolveError::DeadlineExceeded {
                specifier: specifier.to_string(),
            });
        }

        let start = Instant::now();
        let source = if is_remote(specifier) {
            self.fetcher.fetch(specifier, deadline.as_ref())?
        } else {
            self.tree.read(specifier)?.to_string()
        };

        let parsed = Module::parse(
            Source::from_bytes(source.as_bytes()).with_path(Path::new(specifier)),
            None,
            context,
        )
        .map_err(|err| ResolveError::syntax(specifier, err.to_string()));

        match &parsed {
            Ok(_) => debug!(
                remote = is_remote(specifier),
                bytes = source.len(),
                duration_us = start.elapsed().as_micros(),
                "Module parsed"
            ),
            Err(err) => warn!(error = %err, "Module failed to parse"),
        }

        parsed
    }
}

impl std::fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("files", &self.tree.len())
            .field("builtins", &self.builtins)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ModuleLoader for ModuleResolver {
    fn load_imported_module(
        self: Rc<Self>,
        referrer: Referrer,
        specifier: JsString,
        context: &RefCell<&mut Context>,
    ) -> impl std::future::Future<Output = JsResult<Module>> {
        let requested = specifier.to_std_string_escaped();
        let referrer_path = referrer
            .path()
            .and_then(Path::to_str)
            .map(str::to_owned);

        async move {
            let specifier = qualify(&requested, referrer_path.as_deref());
            let mut ctx = context.borrow_mut();
            self.resolve(&specifier, &mut **ctx).map_err(|err| {
                JsError::from_opaque(JsValue::from(js_string!(err.to_string())))
            })
        }
    }
}
