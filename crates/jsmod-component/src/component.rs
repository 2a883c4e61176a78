//! The eval component.
//!
//! [`EvalComponent`] is the boundary to the surrounding dataflow framework.
//! It owns at most one active configuration (settings + handler) and offers
//! two operations: [`EvalComponent::reconfigure`] and [`EvalComponent::handle`].

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use jsmod_common::{RuntimeConfig, RuntimeError, Settings};
use jsmod_core::{BuiltinRegistry, Handler, ScriptEngine};
use jsmod_host::{HttpFetcher, LOG_MODULE, LogModule};

use crate::message::{
    ERROR_PORT, Emission, ErrorMessage, REQUEST_PORT, RESPONSE_PORT, Request, Response,
    SETTINGS_PORT,
};

/// A live configuration.
struct Active {
    settings: Settings,
    handler: Handler,
}

/// Script evaluation component.
///
/// # Reconfiguration
///
/// A successful [`reconfigure`](Self::reconfigure) swaps the active
/// configuration atomically. Requests that already picked up the previous
/// handler finish on it; requests arriving afterwards use the new one. A
/// failed reconfiguration leaves the previous configuration serving.
pub struct EvalComponent {
    engine: ScriptEngine,
    active: RwLock<Option<Arc<Active>>>,
}

impl EvalComponent {
    /// Create a component over `engine`, with nothing configured.
    pub fn new(engine: ScriptEngine) -> Self {
        Self {
            engine,
            active: RwLock::new(None),
        }
    }

    /// Create a component with the host stack: HTTP fetcher and the `log` built-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP fetcher cannot be created (for example
    /// outside a tokio runtime).
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let builtins = BuiltinRegistry::builder()
            .register(LOG_MODULE, LogModule)
            .build();

        Ok(Self::new(
            ScriptEngine::new(config.clone())
                .with_builtins(builtins)
                .with_fetcher(Arc::new(fetcher)),
        ))
    }

    /// Build a handler for `settings` and make it the active configuration.
    ///
    /// # Errors
    ///
    /// Returns any configuration, resolution, link, evaluation or export
    /// error. The previous configuration, if any, keeps serving.
    #[instrument(skip(self, settings), fields(modules = settings.modules.len()))]
    pub async fn reconfigure(&self, settings: Settings) -> Result<(), RuntimeError> {
        let handler = match self.engine.instantiate(&settings).await {
            Ok(handler) => handler,
            Err(err) => {
                warn!(
                    error = %err,
                    keeps_previous = self.is_configured(),
                    "Reconfiguration failed"
                );
                return Err(err);
            }
        };

        info!(
            instance_id = %handler.instance_id(),
            error_port = settings.enable_error_port,
            "Reconfigured"
        );

        let previous = self
            .active
            .write()
            .replace(Arc::new(Active { settings, handler }));
        if let Some(previous) = previous {
            let monitor = previous.handler.monitor();
            drop(previous);
            tokio::spawn(async move {
                let instance_id = monitor.instance_id();
                monitor.stopped().await;
                debug!(%instance_id, "Previous instance stopped");
            });
        }

        Ok(())
    }

    /// Reconfigure from a message received on the settings channel.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidConfig`] if `message` is not valid
    /// settings, otherwise the same errors as [`reconfigure`](Self::reconfigure).
    pub async fn reconfigure_json(&self, message: Value) -> Result<(), RuntimeError> {
        let settings: Settings = serde_json::from_value(message)
            .map_err(|e| RuntimeError::invalid_config(format!("Invalid settings: {e}")))?;
        self.reconfigure(settings).await
    }

    /// Invoke the active handler for `request`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::NotInitialised`] if no configuration succeeded yet
    /// - the invocation error itself when the error channel is disabled
    /// - [`RuntimeError::Terminated`] if the runtime instance is gone
    pub async fn handle(&self, request: Request) -> Result<Emission, RuntimeError> {
        let active = self
            .active
            .read()
            .clone()
            .ok_or(RuntimeError::NotInitialised)?;
        let Request {
            context,
            input_data,
        } = request;

        match active.handler.invoke(input_data).await {
            Ok(output_data) => Ok(Emission::Response(Response {
                context,
                output_data,
            })),
            Err(err) if err.is_invocation() && active.settings.enable_error_port => {
                debug!(error = %err, "Routing invocation error");
                Ok(Emission::Error(ErrorMessage {
                    context,
                    error: err.to_string(),
                }))
            }
            Err(err) => Err(err),
        }
    }

    /// Names of the active channels.
    pub fn ports(&self) -> Vec<&'static str> {
        let mut ports = vec![REQUEST_PORT, RESPONSE_PORT, SETTINGS_PORT];
        if self.error_port_enabled() {
            ports.push(ERROR_PORT);
        }
        ports
    }

    /// Returns `true` once a configuration succeeded.
    pub fn is_configured(&self) -> bool {
        self.active.read().is_some()
    }

    /// The active settings.
    pub fn settings(&self) -> Option<Settings> {
        self.active
            .read()
            .as_ref()
            .map(|active| active.settings.clone())
    }

    /// The active handler.
    pub fn handler(&self) -> Option<Handler> {
        self.active
            .read()
            .as_ref()
            .map(|active| active.handler.clone())
    }

    fn error_port_enabled(&self) -> bool {
        self.active
            .read()
            .as_ref()
            .is_some_and(|active| active.settings.enable_error_port)
    }
}

impl std::fmt::Debug for EvalComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalComponent")
            .field("engine", &self.engine)
            .field("handler", &self.handler())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn component() -> EvalComponent {
        EvalComponent::new(ScriptEngine::new(RuntimeConfig::default()))
    }

    fn request(input: Value) -> Request {
        Request::new(json!({"id": "req-1"}), Some(input))
    }

    #[tokio::test]
    async fn test_not_initialised() {
        let err = component().handle(request(json!(1))).await.unwrap_err();
        assert!(matches!(err, RuntimeError::NotInitialised));
    }

    #[tokio::test]
    async fn test_response_keeps_context() {
        let component = component();
        component
            .reconfigure(Settings::with_script(r#"export default (i) => i + " world";"#))
            .await
            .unwrap();

        let emission = component.handle(request(json!("hello"))).await.unwrap();
        assert_eq!(
            emission,
            Emission::Response(Response {
                context: json!({"id": "req-1"}),
                output_data: json!("hello world"),
            })
        );
    }

    #[tokio::test]
    async fn test_null_and_absent_input_differ() {
        let component = component();
        component
            .reconfigure(Settings::with_script(
                "export default (i) => i === null ? 'null' : typeof i;",
            ))
            .await
            .unwrap();

        let request: Request = serde_json::from_value(json!({"inputData": null})).unwrap();
        let emission = component.handle(request).await.unwrap();
        assert_eq!(emission.to_json()["outputData"], json!("null"));

        let request: Request = serde_json::from_value(json!({})).unwrap();
        let emission = component.handle(request).await.unwrap();
        assert_eq!(emission.to_json()["outputData"], json!("undefined"));
    }

    #[tokio::test]
    async fn test_error_routed_when_enabled() {
        let component = component();
        component
            .reconfigure(
                Settings::with_script("export default async function () { throw 'error'; }")
                    .with_error_port(true),
            )
            .await
            .unwrap();

        let emission = component.handle(request(json!(1))).await.unwrap();
        assert_eq!(emission.port(), "error");
        assert_eq!(
            emission,
            Emission::Error(ErrorMessage {
                context: json!({"id": "req-1"}),
                error: "error".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_error_returned_when_disabled() {
        let component = component();
        component
            .reconfigure(Settings::with_script("export default () => { throw 'error'; };"))
            .await
            .unwrap();

        let err = tokio_test::assert_err!(component.handle(request(json!(1))).await);
        assert!(err.is_invocation());
    }

    #[tokio::test]
    async fn test_failed_reconfigure_keeps_previous() {
        let component = component();
        component
            .reconfigure(Settings::with_script("export default () => 'old';"))
            .await
            .unwrap();

        let err = component
            .reconfigure(Settings::with_script("export default fction () {}"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Resolve(_)));

        let emission = component.handle(request(json!(null))).await.unwrap();
        assert_eq!(emission.to_json()["outputData"], json!("old"));
        assert_eq!(
            component.settings().unwrap().script.content,
            "export default () => 'old';"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_in_flight_request_finishes_on_previous_handler() {
        let component = Arc::new(component());
        component
            .reconfigure(Settings::with_script(
                "export default () => {
                    let s = 0;
                    for (let i = 0; i < 300000; i++) { s += i; }
                    return 'old';
                };",
            ))
            .await
            .unwrap();
        let previous = component.handler().unwrap();

        let in_flight = {
            let component = Arc::clone(&component);
            tokio::spawn(async move { component.handle(request(json!(null))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        component
            .reconfigure(Settings::with_script("export default () => 'new';"))
            .await
            .unwrap();

        let old = in_flight.await.unwrap().unwrap();
        assert_eq!(old.to_json()["outputData"], json!("old"));

        let new = component.handle(request(json!(null))).await.unwrap();
        assert_eq!(new.to_json()["outputData"], json!("new"));
        assert_ne!(
            component.handler().unwrap().instance_id(),
            previous.instance_id()
        );
    }

    #[tokio::test]
    async fn test_superseded_instance_stops() {
        let component = component();
        component
            .reconfigure(Settings::with_script("export default () => 'old';"))
            .await
            .unwrap();
        let monitor = component.handler().unwrap().monitor();

        component
            .reconfigure(Settings::with_script("export default () => 'new';"))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), monitor.clone().stopped())
            .await
            .unwrap();
        assert!(monitor.is_stopped());
        assert!(!component.handler().unwrap().monitor().is_stopped());
    }

    #[tokio::test]
    async fn test_ports_follow_settings() {
        let component = component();
        assert_eq!(component.ports(), vec!["request", "response", "settings"]);

        component
            .reconfigure(Settings::with_script("export default () => 1;").with_error_port(true))
            .await
            .unwrap();
        assert_eq!(
            component.ports(),
            vec!["request", "response", "settings", "error"]
        );
    }

    #[tokio::test]
    async fn test_reconfigure_from_json() {
        let component = component();
        component
            .reconfigure_json(json!({
                "enableErrorPort": false,
                "script": {
                    "name": "main.js",
                    "content": "import { typeOf } from 'utils.js'; export default (i) => typeOf(i);"
                },
                "modules": [{
                    "name": "utils.js",
                    "content": "export function typeOf(input) { return typeof input }"
                }]
            }))
            .await
            .unwrap();

        let emission = component.handle(request(json!(5))).await.unwrap();
        assert_eq!(emission.to_json()["outputData"], json!("number"));

        let err = component
            .reconfigure_json(json!({"script": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_from_config_wires_log_module() {
        let component = EvalComponent::from_config(&RuntimeConfig::default()).unwrap();
        component
            .reconfigure(Settings::with_script(
                "import log from 'log'; export default (i) => { log.info(i); return 'logged'; };",
            ))
            .await
            .unwrap();

        let emission = component.handle(request(json!("x"))).await.unwrap();
        assert_eq!(emission.to_json()["outputData"], json!("logged"));
    }
}
