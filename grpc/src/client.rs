//! A thin client wrapper over the generated tonic client, following
//! `control-plane/grpc`'s `VolumeClient`/`ReplicaClient` pattern of owning
//! the generated client and exposing domain-shaped methods instead of
//! making every caller build wire messages by hand.

use common::SchedulingError;
use rpc::scheduling::{
    scheduling_client::SchedulingClient as WireClient, ComponentSpec, GetOperationRequest,
    StartTestSessionRequest,
};
use snafu::ResultExt;
use tonic::transport::Channel;

/// One driver/worker component as the caller supplies it to `test-ctl`.
#[derive(Clone, Debug)]
pub struct ComponentArg {
    pub image: String,
    pub kind: common::ComponentKind,
    pub pool: String,
}

impl From<ComponentArg> for ComponentSpec {
    fn from(arg: ComponentArg) -> Self {
        ComponentSpec {
            image: arg.image,
            kind: rpc::scheduling::ComponentKind::from(arg.kind) as i32,
            pool: arg.pool,
        }
    }
}

#[derive(Debug, snafu::Snafu)]
pub enum ClientError {
    #[snafu(display("failed to connect to {}: {}", address, source))]
    Connect {
        address: String,
        source: tonic::transport::Error,
    },

    #[snafu(display("scheduling rpc failed: {}", source))]
    Rpc { source: tonic::Status },
}

pub struct SchedulingClient {
    inner: WireClient<Channel>,
}

impl SchedulingClient {
    pub async fn connect(address: impl Into<String>) -> Result<Self, ClientError> {
        let address = address.into();
        let channel = Channel::from_shared(address.clone())
            .map_err(|e| ClientError::Connect {
                address: address.clone(),
                source: e.into(),
            })?
            .connect()
            .await
            .context(ConnectSnafu { address })?;
        Ok(Self {
            inner: WireClient::new(channel),
        })
    }

    pub async fn start_test_session(
        &mut self,
        scenario: String,
        driver: ComponentArg,
        workers: Vec<ComponentArg>,
    ) -> Result<rpc::scheduling::Operation, ClientError> {
        let request = StartTestSessionRequest {
            scenario,
            driver: Some(driver.into()),
            workers: workers.into_iter().map(ComponentSpec::from).collect(),
        };
        let response = self
            .inner
            .start_test_session(request)
            .await
            .context(RpcSnafu)?;
        Ok(response.into_inner())
    }

    pub async fn get_operation(&mut self, name: String) -> Result<rpc::scheduling::Operation, ClientError> {
        let response = self
            .inner
            .get_operation(GetOperationRequest { name })
            .await
            .context(RpcSnafu)?;
        Ok(response.into_inner())
    }
}

impl From<ClientError> for SchedulingError {
    fn from(error: ClientError) -> Self {
        SchedulingError::Cluster {
            message: error.to_string(),
        }
    }
}
