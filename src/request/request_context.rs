use std::sync::Arc;

use crate::cluster::ClusterManager;
use crate::log::LogManager;
use crate::protocol::RequestHeader;

/// Everything a handler needs to service one request.
#[derive(Debug)]
pub struct RequestContext {
    pub client_ip: String,
    pub request_header: RequestHeader,
    pub log_manager: Arc<LogManager>,
    pub cluster: Arc<ClusterManager>,
}
