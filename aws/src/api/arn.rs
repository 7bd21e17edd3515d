//! Platform application ARNs
//!
//! `arn:<partition>:sns:<region>:<account>:app/<PLATFORM>/<name>`

use super::error::ApiError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformApplicationArn {
    pub partition: String,
    pub region: String,
    pub account: String,
    /// Kept as written; SNS may know platforms this crate does not
    pub platform: String,
    pub name: String,
}

impl PlatformApplicationArn {
    pub fn new(region: &str, account: &str, platform: &str, name: &str) -> Self {
        Self {
            partition: "aws".to_string(),
            region: region.to_string(),
            account: account.to_string(),
            platform: platform.to_string(),
            name: name.to_string(),
        }
    }
}

impl FromStr for PlatformApplicationArn {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::InvalidArn(s.to_string());

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        let &[prefix, partition, service, region, account, resource] = parts.as_slice() else {
            return Err(invalid());
        };
        if prefix != "arn" || service != "sns" || partition.is_empty() || region.is_empty() {
            return Err(invalid());
        }

        let mut resource = resource.splitn(3, '/');
        match (resource.next(), resource.next(), resource.next()) {
            (Some("app"), Some(platform), Some(name)) if !platform.is_empty() && !name.is_empty() => {
                Ok(Self {
                    partition: partition.to_string(),
                    region: region.to_string(),
                    account: account.to_string(),
                    platform: platform.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for PlatformApplicationArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:sns:{}:{}:app/{}/{}",
            self.partition, self.region, self.account, self.platform, self.name
        )
    }
}
