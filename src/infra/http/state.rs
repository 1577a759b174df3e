use std::sync::Arc;

use crate::application::maintenance::MaintenanceService;
use crate::application::proxy::ProxyService;

#[derive(Clone)]
pub struct HttpState {
    pub proxy: Arc<ProxyService>,
    pub maintenance: Arc<MaintenanceService>,
}
