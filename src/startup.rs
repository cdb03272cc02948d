use aws_sdk_s3::{error::SdkError, Client as S3Client};
use tracing;

/// Confirms the photo bucket is reachable with HeadBucket.
///
/// Only logs: the bucket is provisioned outside the application, and a
/// transient failure here should not keep the gallery from starting.
pub async fn check_bucket(client: &S3Client, bucket_name: &str) {
    match client.head_bucket().bucket(bucket_name).send().await {
        Ok(_) => tracing::info!("Startup: S3 bucket '{}' is reachable.", bucket_name),
        Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => {
            tracing::error!("Startup: S3 bucket '{}' does not exist; uploads will fail.", bucket_name);
        }
        Err(sdk_err) => {
            tracing::warn!("Startup: Could not verify S3 bucket '{}': {}", bucket_name, sdk_err);
        }
    }
}
