//! Listener binding.
//!
//! # Responsibilities
//! - Bind both endpoints before anything is served
//! - Report the actual addresses (port 0 resolves here)
//!
//! # Design Decisions
//! - Fail fast: a bind error on either listener is fatal
//! - Listeners are bound before the dispatcher is built, so remote mode can
//!   dial the address the gRPC listener really got

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::net::{bind_tcp, Listener};

/// The two bound sockets, not yet serving.
#[derive(Debug)]
pub struct BoundListeners {
    pub rpc: TcpListener,
    pub http: Listener,
    pub rpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
}

impl BoundListeners {
    pub async fn bind(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let rpc = bind_tcp(&config.grpc.bind_address())
            .await
            .map_err(|source| GatewayError::Bind {
                listener: "grpc",
                source,
            })?;
        let rpc_addr = rpc.local_addr()?;
        tracing::info!(address = %rpc_addr, "gRPC listener bound");

        let http = Listener::bind(&config.http.bind_address(), config.http.max_connections)
            .await
            .map_err(|source| GatewayError::Bind {
                listener: "http",
                source,
            })?;
        let http_addr = http.local_addr()?;

        Ok(Self {
            rpc,
            http,
            rpc_addr,
            http_addr,
        })
    }
}

/// Address a local client should dial to reach `bound`.
pub fn dial_address(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    }
}
