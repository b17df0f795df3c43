//! Live endpoint probes against the service under test
//!
//! Only read/idempotent-safe requests are issued. An unreachable route is
//! recorded but does not count as a failure, since the live service may
//! simply not be running in this environment.

use sandgate_core::{EndpointOutcome, ProbeConfig, ProbeMethod, RouteResult, RouteSpec, RouteStatus};
use std::time::Duration;
use tracing::{info, warn};

/// Probes the configured critical routes with short per-route timeouts
pub struct EndpointProbe {
    client: reqwest::Client,
    base_url: String,
    route_timeout: Duration,
}

impl EndpointProbe {
    pub fn new(base_url: impl Into<String>, route_timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            route_timeout: Duration::from_secs(route_timeout_secs),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.base_url.clone(), config.route_timeout_secs)
    }

    /// Probe every route; per-route failures are isolated and probing
    /// always continues to the remainder.
    pub async fn run(&self, routes: &[RouteSpec]) -> EndpointOutcome {
        let mut results = Vec::with_capacity(routes.len());

        for route in routes {
            let status = self.probe_route(route).await;
            match status {
                RouteStatus::Ok => info!("{} {} ok", route.method, route.path),
                RouteStatus::Failed { code } => {
                    warn!("{} {} returned {}", route.method, route.path, code)
                }
                RouteStatus::Unreachable => {
                    warn!("{} {} unreachable", route.method, route.path)
                }
            }
            results.push(RouteResult {
                path: route.path.clone(),
                method: route.method,
                status,
            });
        }

        EndpointOutcome::from_routes(results)
    }

    async fn probe_route(&self, route: &RouteSpec) -> RouteStatus {
        let url = format!("{}{}", self.base_url, route.path);

        let request = match route.method {
            ProbeMethod::Get => self.client.get(&url),
            ProbeMethod::Post => self.client.post(&url).json(&serde_json::json!({})),
        };

        match request.timeout(self.route_timeout).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                // Redirects are fine; only 4xx/5xx is an unexpected status
                if (200..400).contains(&code) {
                    RouteStatus::Ok
                } else {
                    RouteStatus::Failed { code }
                }
            }
            Err(_) => RouteStatus::Unreachable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> Vec<RouteSpec> {
        vec![
            RouteSpec {
                path: "/health".to_string(),
                method: ProbeMethod::Get,
            },
            RouteSpec {
                path: "/insights/pending".to_string(),
                method: ProbeMethod::Get,
            },
        ]
    }

    #[tokio::test]
    async fn test_offline_service_is_inconclusive_not_failing() {
        // Port 1 is never listening
        let probe = EndpointProbe::new("http://127.0.0.1:1", 1);

        let outcome = probe.run(&routes()).await;
        assert!(outcome.success);
        assert_eq!(outcome.routes.len(), 2);
        assert!(outcome
            .routes
            .iter()
            .all(|r| r.status == RouteStatus::Unreachable));
        assert_eq!(outcome.reachable_count(), 0);
    }

    #[tokio::test]
    async fn test_per_route_isolation() {
        // One bad route must not stop the probe from finishing the rest
        let probe = EndpointProbe::new("http://127.0.0.1:1", 1);

        let outcome = probe.run(&routes()).await;
        assert_eq!(outcome.routes.len(), routes().len());
    }
}
