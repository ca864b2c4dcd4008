//! Sysdash kernel - node registry, RPC surface and process runner
//!
//! A sysdash process is either a master (collects registrations and proxies
//! stats) or an agent (also announces itself to a master). Both serve the
//! same RPC endpoints.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod node;
pub mod proxy;
pub mod registration;
pub mod registry;
pub mod rpc;
pub mod runner;
pub mod transport;

pub use auth::Credentials;
pub use config::{load_config, DashConfig, NodeConf};
pub use error::{RegistrationError, RpcError};
pub use models::{NodeInfo, RegisterNodeRequest};
pub use node::{node_key, LocalNode, Node};
pub use proxy::{NodeStatus, RemoteStatsProxy};
pub use registration::{RegistrationClient, RegistrationState, ReregistrationTask};
pub use registry::NodeRegistry;
pub use rpc::{NodeStatusView, NodeView};
pub use runner::Runner;
pub use transport::RpcClient;
