//! The tonic server side of the scheduling service: thin glue between the
//! generated `Scheduling` trait and `common::SchedulingFacade`, the way
//! `control-plane/grpc`'s client wrappers are thin glue over the operations
//! traits, just on the server side of the wire instead of the client side.

use crate::{convert, status::scheduling_error_to_status};
use common::SchedulingFacade;
use rpc::scheduling::{
    scheduling_server::Scheduling, CancelOperationRequest, DeleteOperationRequest, Empty,
    GetOperationRequest, ListOperationsRequest, ListOperationsResponse, Operation,
    StartTestSessionRequest, WaitOperationRequest,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct SchedulingService {
    facade: Arc<dyn SchedulingFacade>,
}

impl SchedulingService {
    pub fn new(facade: Arc<dyn SchedulingFacade>) -> Self {
        Self { facade }
    }
}

#[tonic::async_trait]
impl Scheduling for SchedulingService {
    #[tracing::instrument(name = "Scheduling::start_test_session", skip(self, request))]
    async fn start_test_session(
        &self,
        request: Request<StartTestSessionRequest>,
    ) -> Result<Response<Operation>, Status> {
        let request = convert::start_session_request_from_wire(request.into_inner())
            .map_err(scheduling_error_to_status)?;
        let operation = self
            .facade
            .start_test_session(request)
            .await
            .map_err(scheduling_error_to_status)?;
        Ok(Response::new(convert::operation_to_wire(operation)))
    }

    #[tracing::instrument(name = "Scheduling::get_operation", skip(self, request))]
    async fn get_operation(
        &self,
        request: Request<GetOperationRequest>,
    ) -> Result<Response<Operation>, Status> {
        let name = request.into_inner().name;
        let operation = self
            .facade
            .get_operation(&name)
            .await
            .map_err(scheduling_error_to_status)?;
        Ok(Response::new(convert::operation_to_wire(operation)))
    }

    async fn list_operations(
        &self,
        _request: Request<ListOperationsRequest>,
    ) -> Result<Response<ListOperationsResponse>, Status> {
        Err(Status::unimplemented("list_operations is not implemented"))
    }

    async fn delete_operation(
        &self,
        _request: Request<DeleteOperationRequest>,
    ) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("delete_operation is not implemented"))
    }

    async fn cancel_operation(
        &self,
        _request: Request<CancelOperationRequest>,
    ) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("cancel_operation is not implemented"))
    }

    async fn wait_operation(
        &self,
        _request: Request<WaitOperationRequest>,
    ) -> Result<Response<Operation>, Status> {
        Err(Status::unimplemented("wait_operation is not implemented"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{
        error::UnknownSessionSnafu,
        types::{OperationMetadata, StartSessionRequest},
    };
    use rpc::scheduling::ComponentKind as WireKind;

    struct StubFacade;

    #[async_trait]
    impl SchedulingFacade for StubFacade {
        async fn start_test_session(
            &self,
            _request: StartSessionRequest,
        ) -> Result<common::Operation, common::SchedulingError> {
            Ok(common::Operation {
                name: "operations/sess".to_string(),
                done: false,
                metadata: OperationMetadata {
                    latest_event: None,
                    service_version: "1.0.0".to_string(),
                },
                success: None,
                failure: None,
            })
        }

        async fn get_operation(&self, _name: &str) -> Result<common::Operation, common::SchedulingError> {
            UnknownSessionSnafu {
                name: common::SessionName::from("bogus"),
            }
            .fail()
        }
    }

    fn service() -> SchedulingService {
        SchedulingService::new(Arc::new(StubFacade))
    }

    #[tokio::test]
    async fn missing_driver_is_rejected_before_reaching_the_facade() {
        let request = Request::new(StartTestSessionRequest {
            scenario: "{}".to_string(),
            driver: None,
            workers: vec![],
        });
        let status = service().start_test_session(request).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn well_formed_request_reaches_the_facade_and_is_projected() {
        let request = Request::new(StartTestSessionRequest {
            scenario: "{}".to_string(),
            driver: Some(rpc::scheduling::ComponentSpec {
                image: "img/driver".to_string(),
                kind: WireKind::Driver as i32,
                pool: "pool-a".to_string(),
            }),
            workers: vec![rpc::scheduling::ComponentSpec {
                image: "img/server".to_string(),
                kind: WireKind::Server as i32,
                pool: "pool-a".to_string(),
            }],
        });
        let response = service().start_test_session(request).await.unwrap();
        assert_eq!(response.into_inner().name, "operations/sess");
    }

    #[tokio::test]
    async fn unknown_session_maps_to_not_found() {
        let request = Request::new(GetOperationRequest {
            name: "operations/bogus".to_string(),
        });
        let status = service().get_operation(request).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
