//! Provider block decoding

use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use url::Url;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Decoded `provider "aws"` block
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub profile: Option<String>,
    pub sns_endpoint: Option<Url>,
    pub max_retries: u32,
}

impl ProviderConfig {
    /// Decode and cross-check the block. Shape and types were already
    /// checked against the provider schema.
    pub fn from_dynamic(config: &DynamicValue) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = vec![];

        let region = match config.get_optional_string(&AttributePath::new("region")) {
            Ok(Some(region)) if !region.is_empty() => region,
            _ => {
                diagnostics.push(
                    Diagnostic::error("Missing region", "The \"region\" attribute is required")
                        .with_attribute(AttributePath::new("region")),
                );
                String::new()
            }
        };

        let access_key = optional_string(config, "access_key", &mut diagnostics);
        let secret_key = optional_string(config, "secret_key", &mut diagnostics);
        let profile = optional_string(config, "profile", &mut diagnostics);

        if access_key.is_some() != secret_key.is_some() {
            diagnostics.push(Diagnostic::error(
                "Incomplete static credentials",
                "access_key and secret_key must be set together",
            ));
        }

        let sns_endpoint = optional_string(config, "sns_endpoint", &mut diagnostics).and_then(
            |raw| match Url::parse(&raw) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
                Ok(url) => {
                    diagnostics.push(
                        Diagnostic::error(
                            "Invalid sns_endpoint",
                            format!("unsupported scheme \"{}\", expected http or https", url.scheme()),
                        )
                        .with_attribute(AttributePath::new("sns_endpoint")),
                    );
                    None
                }
                Err(e) => {
                    diagnostics.push(
                        Diagnostic::error("Invalid sns_endpoint", format!("{}: {}", raw, e))
                            .with_attribute(AttributePath::new("sns_endpoint")),
                    );
                    None
                }
            },
        );

        let max_retries = match config.get_optional_number(&AttributePath::new("max_retries")) {
            Ok(Some(n)) if n >= 0.0 && n.fract() == 0.0 => n as u32,
            Ok(None) => DEFAULT_MAX_RETRIES,
            _ => {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid max_retries",
                        "max_retries must be a non-negative whole number",
                    )
                    .with_attribute(AttributePath::new("max_retries")),
                );
                DEFAULT_MAX_RETRIES
            }
        };

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(Self {
            region,
            access_key,
            secret_key,
            profile,
            sns_endpoint,
            max_retries,
        })
    }
}

fn optional_string(
    config: &DynamicValue,
    name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    match config.get_optional_string(&AttributePath::new(name)) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            diagnostics.push(
                Diagnostic::error(format!("Invalid {}", name), e.to_string())
                    .with_attribute(AttributePath::new(name)),
            );
            None
        }
    }
}
