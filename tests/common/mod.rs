//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::{Code, Request, Response, Status};

use rekor_gateway::config::{DispatchMode, GatewayConfig};
use rekor_gateway::rpc::{
    CreateEntryRequest, Empty, EntryBundleRequest, HttpBody, KindVersion,
    PartialEntryBundleRequest, PartialTileRequest, Rekor, TileRequest, TransparencyLogEntry,
};
use rekor_gateway::{GatewayError, Lifecycle};

/// A `Rekor` service whose answers are chosen by the request.
///
/// - `GetTile` with `L = c` fails with gRPC code `c` (succeeds for 0)
/// - `CreateEntry` echoes `x-echo` and `x-forwarded-for` back as response
///   metadata
/// - `GetCheckpoint` waits `delay` before answering and records whether the
///   call's cancellation token fired
#[derive(Default)]
pub struct Scripted {
    pub delay: Duration,
    pub started: Arc<Notify>,
    pub cancelled: Arc<AtomicBool>,
}

impl Scripted {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rekor for Scripted {
    async fn create_entry(
        &self,
        request: Request<CreateEntryRequest>,
    ) -> Result<Response<TransparencyLogEntry>, Status> {
        let mut response = Response::new(TransparencyLogEntry {
            log_index: 7,
            kind_version: Some(KindVersion {
                kind: "hashedrekord".into(),
                version: "0.0.2".into(),
            }),
            ..Default::default()
        });
        for key in ["x-echo", "x-forwarded-for"] {
            if let Some(value) = request.metadata().get(key) {
                response.metadata_mut().insert(key, value.clone());
            }
        }
        Ok(response)
    }

    async fn get_tile(&self, request: Request<TileRequest>) -> Result<Response<HttpBody>, Status> {
        let TileRequest { l, n } = request.into_inner();
        match Code::from_i32(l) {
            Code::Ok => Ok(Response::new(HttpBody::new(
                "application/octet-stream",
                vec![n as u8; 4],
            ))),
            code => {
                let mut status = Status::new(code, format!("scripted {l}"));
                status
                    .metadata_mut()
                    .insert("x-reason", "scripted".parse().unwrap());
                Err(status)
            }
        }
    }

    async fn get_partial_tile(
        &self,
        _: Request<PartialTileRequest>,
    ) -> Result<Response<HttpBody>, Status> {
        Err(Status::unimplemented("partial tiles"))
    }

    async fn get_entry_bundle(
        &self,
        _: Request<EntryBundleRequest>,
    ) -> Result<Response<HttpBody>, Status> {
        Err(Status::unimplemented("entry bundles"))
    }

    async fn get_partial_entry_bundle(
        &self,
        _: Request<PartialEntryBundleRequest>,
    ) -> Result<Response<HttpBody>, Status> {
        Err(Status::unimplemented("entry bundles"))
    }

    async fn get_checkpoint(&self, request: Request<Empty>) -> Result<Response<HttpBody>, Status> {
        if let Some(token) = request.extensions().get::<CancellationToken>().cloned() {
            let flag = Arc::clone(&self.cancelled);
            tokio::spawn(async move {
                token.cancelled().await;
                flag.store(true, Ordering::SeqCst);
            });
        }
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        Ok(Response::new(HttpBody::new(
            "text/plain; charset=utf-8",
            b"scripted\n0\n\n".to_vec(),
        )))
    }
}

/// Loopback, ephemeral ports, short grace period.
pub fn test_config(mode: DispatchMode) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.grpc.host = "127.0.0.1".into();
    config.grpc.port = 0;
    config.http.host = "127.0.0.1".into();
    config.http.port = 0;
    config.gateway.mode = mode;
    config.shutdown.grace_period_secs = 5;
    config
}

/// A running gateway stopped through a oneshot instead of a signal.
pub struct TestGateway {
    pub http_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), GatewayError>>,
}

impl TestGateway {
    pub async fn start<S: Rekor>(mode: DispatchMode, service: Arc<S>) -> Self {
        Self::start_with(test_config(mode), service).await
    }

    pub async fn start_with<S: Rekor>(config: GatewayConfig, service: Arc<S>) -> Self {
        let gateway = Lifecycle::bind(config, service).await.unwrap();
        let http_addr = gateway.http_addr();
        let rpc_addr = gateway.rpc_addr();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(gateway.serve_until(async {
            let _ = stopped.await;
        }));
        Self {
            http_addr,
            rpc_addr,
            stop: Some(stop),
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.http_addr, path)
    }

    /// Request shutdown and wait for both listeners to drain.
    pub async fn stop(mut self) -> Result<(), GatewayError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked")
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
