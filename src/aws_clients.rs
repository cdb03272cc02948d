use crate::config::Config;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::Client as S3Client;
use tracing;

// Builds the SDK configuration from the region and optional endpoint override.
// Credentials come from the default provider chain (env vars, profiles, instance role).
pub async fn create_sdk_config(config: &Config) -> SdkConfig {
    let region = Region::new(config.aws_region.clone());
    tracing::info!(sdk_region = %config.aws_region, "Setting SDK region");

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
        .region(region);

    if let Some(endpoint_url) = &config.endpoint_url {
        tracing::info!("Using endpoint override: {}", endpoint_url);
        config_loader = config_loader.endpoint_url(endpoint_url);
    } else {
        tracing::info!("Using default AWS endpoints and credential resolution.");
    }

    config_loader.load().await
}

// Path-style addressing keeps S3-compatible servers (LocalStack, MinIO) working.
pub fn create_s3_client(sdk_config: &SdkConfig, config: &Config) -> S3Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();
    S3Client::from_conf(s3_config)
}
