//! Link and evaluate a module graph, then extract its handler.
//!
//! Runs on the runtime instance thread. Every phase is followed by a
//! deadline check, and the resolver is armed with the same deadline so a
//! slow transitive fetch is cut short.

use std::time::Instant;

use boa_engine::builtins::promise::PromiseState;
use boa_engine::object::builtins::JsPromise;
use boa_engine::{Context, JsObject, js_string};
use tracing::{debug, info, instrument, warn};

use jsmod_common::RuntimeError;

use crate::resolver::ModuleResolver;
use crate::value::{ScriptValue, describe, describe_error};
use crate::Deadline;

/// Evaluate the graph rooted at `main` and return its callable default export.
///
/// # Errors
///
/// Returns an error if:
/// - `main` cannot be resolved ([`RuntimeError::Resolve`])
/// - a transitive import fails or a binding does not link ([`RuntimeError::Link`])
/// - top-level evaluation rejects ([`RuntimeError::Evaluation`])
/// - the deadline passes first ([`RuntimeError::DeadlineExceeded`])
/// - there is no callable `default` export ([`RuntimeError::NoDefaultExport`])
#[instrument(
    skip(resolver, deadline, context),
    fields(deadline_ms = deadline.budget_ms())
)]
pub fn evaluate(
    resolver: &ModuleResolver,
    main: &str,
    deadline: &Deadline,
    context: &mut Context,
) -> Result<JsObject, RuntimeError> {
    let start = Instant::now();
    resolver.arm(deadline.clone());
    let result = evaluate_armed(resolver, main, deadline, context);
    resolver.disarm();

    match &result {
        Ok(_) => info!(
            duration_ms = start.elapsed().as_millis(),
            modules = resolver.cached(),
            "Module graph evaluated"
        ),
        Err(err) => warn!(
            duration_ms = start.elapsed().as_millis(),
            error = %err,
            "Module graph failed"
        ),
    }

    result
}

fn evaluate_armed(
    resolver: &ModuleResolver,
    main: &str,
    deadline: &Deadline,
    context: &mut Context,
) -> Result<JsObject, RuntimeError> {
    let module = resolver.resolve(main, context)?;

    let loading = module.load(context);
    drain(context)?;
    check(deadline)?;
    match loading.state() {
        PromiseState::Fulfilled(_) => {}
        PromiseState::Rejected(reason) => {
            let err = RuntimeError::Link {
                reason: describe(&reason, context),
                source: resolver.take_failure(),
            };
            if err.is_deadline_exceeded() {
                return Err(exceeded(deadline));
            }
            return Err(err);
        }
        PromiseState::Pending => {
            return Err(RuntimeError::link("module graph did not finish loading"));
        }
    }
    debug!(modules = resolver.cached(), "Module graph loaded");

    module
        .link(context)
        .map_err(|err| RuntimeError::link(describe_error(&err, context)))?;
    check(deadline)?;

    let evaluation = module.evaluate(context);
    settle_top_level(&evaluation, deadline, context)?;

    let default = module
        .namespace(context)
        .get(js_string!("default"), context)
        .map_err(|err| RuntimeError::evaluation(describe_error(&err, context)))?;

    match ScriptValue::classify(default) {
        ScriptValue::Callable(handler) => Ok(handler),
        _ => Err(RuntimeError::NoDefaultExport),
    }
}

fn settle_top_level(
    evaluation: &JsPromise,
    deadline: &Deadline,
    context: &mut Context,
) -> Result<(), RuntimeError> {
    drain(context)?;
    check(deadline)?;

    match evaluation.state() {
        PromiseState::Fulfilled(_) => Ok(()),
        PromiseState::Rejected(reason) => Err(RuntimeError::evaluation(describe(&reason, context))),
        // Nothing outside the job queue can settle it.
        PromiseState::Pending => Err(RuntimeError::evaluation("top-level await never settled")),
    }
}

fn drain(context: &mut Context) -> Result<(), RuntimeError> {
    context
        .run_jobs()
        .map_err(|err| RuntimeError::engine(describe_error(&err, context)))
}

fn check(deadline: &Deadline) -> Result<(), RuntimeError> {
    if deadline.is_expired() {
        return Err(exceeded(deadline));
    }
    Ok(())
}

fn exceeded(deadline: &Deadline) -> RuntimeError {
    RuntimeError::DeadlineExceeded {
        duration_ms: deadline.budget_ms(),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    use boa_engine::context::ContextBuilder;
    use serde_json::json;

    use super::*;
    use crate::builtin::{BuiltinRegistry, ValueModule};
    use crate::source::{NoFetcher, VirtualTree};

    fn run(files: &[(&str, &str)], builtins: BuiltinRegistry) -> Result<JsObject, RuntimeError> {
        let mut tree = VirtualTree::new();
        for (name, source) in files {
            tree.insert(*name, *source);
        }
        let resolver = Rc::new(ModuleResolver::new(tree, builtins, Arc::new(NoFetcher)));
        let mut context = ContextBuilder::default()
            .module_loader(resolver.clone())
            .build()
            .unwrap();

        evaluate(
            &resolver,
            "main.js",
            &Deadline::after(Duration::from_secs(15)),
            &mut context,
        )
    }

    fn run_main(main: &str) -> Result<JsObject, RuntimeError> {
        run(&[("main.js", main)], BuiltinRegistry::empty())
    }

    #[test]
    fn test_default_function_extracted() {
        let handler = run_main("export default function () { return 1; }");
        assert!(handler.is_ok());
    }

    #[test]
    fn test_syntax_error_is_resolve_error() {
        let err = run_main("export default fction () {}").unwrap_err();
        assert!(matches!(err, RuntimeError::Resolve(_)));
    }

    #[test]
    fn test_missing_import_is_link_error() {
        let err = run_main("import x from 'gone.js'; export default () => x;").unwrap_err();

        assert!(matches!(err, RuntimeError::Link { .. }));
        assert!(err.resolve_error().is_some_and(|e| e.is_not_found()));
    }

    #[test]
    fn test_missing_named_export_is_link_error() {
        let main = "import { nope } from 'utils.js'; export default () => nope;";
        let utils = "export const yes = 1;";
        let err = run(
            &[("main.js", main), ("utils.js", utils)],
            BuiltinRegistry::empty(),
        )
        .unwrap_err();

        assert!(matches!(err, RuntimeError::Link { source: None, .. }));
    }

    #[test]
    fn test_non_callable_default() {
        let err = run_main("export default 42;").unwrap_err();
        assert!(matches!(err, RuntimeError::NoDefaultExport));

        let err = run_main("export function named() {}").unwrap_err();
        assert!(matches!(err, RuntimeError::NoDefaultExport));
    }

    #[test]
    fn test_rejected_top_level() {
        let err = run_main("await Promise.reject('boom'); export default () => 1;").unwrap_err();

        assert!(matches!(err, RuntimeError::Evaluation { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_cycle_and_builtin_import() {
        let builtins = BuiltinRegistry::builder()
            .register("config", ValueModule::new(json!({"greeting": "hi"})))
            .build();
        let main = "import { b } from 'b.js'; import config from 'config';
            export const a = 1;
            export default () => b() + config.greeting;";
        let b = "import { a } from 'main.js'; export function b() { return a; }";

        let handler = run(&[("main.js", main), ("b.js", b)], builtins);
        assert!(handler.is_ok());
    }

    #[test]
    fn test_expired_deadline() {
        let mut tree = VirtualTree::new();
        tree.insert("main.js", "export default () => 1;");
        let resolver = Rc::new(ModuleResolver::new(
            tree,
            BuiltinRegistry::empty(),
            Arc::new(NoFetcher),
        ));
        let mut context = ContextBuilder::default()
            .module_loader(resolver.clone())
            .build()
            .unwrap();

        let err = evaluate(
            &resolver,
            "main.js",
            &Deadline::after(Duration::ZERO),
            &mut context,
        )
        .unwrap_err();
        assert!(err.is_deadline_exceeded());
    }
}
