//! Provider data structure passed to resources

use crate::api::PlatformApplicationApi;
use std::sync::Arc;

#[derive(Clone)]
pub struct AwsProviderData {
    pub sns: Arc<dyn PlatformApplicationApi>,
    pub region: String,
}

impl AwsProviderData {
    pub fn new(sns: Arc<dyn PlatformApplicationApi>, region: impl Into<String>) -> Self {
        Self {
            sns,
            region: region.into(),
        }
    }
}
