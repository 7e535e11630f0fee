//! HTTP-backed provider client.
//!
//! Talks to a REST provisioning API with bearer-token auth. Reads are
//! retried up to `max_retries` times; mutations are sent exactly once.

use std::collections::BTreeMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use provy_core::domain::compute::InstanceLaunchSpec;
use provy_core::domain::identity::{GroupSpec, UserSpec};
use provy_core::domain::network::SubnetTier;
use provy_core::domain::storage::BucketSpec;

use crate::error::CloudError;
use crate::models::{
    AddressAllocation, Bucket, Group, Instance, InternetGateway, NatGateway, RouteTable, Subnet,
    User, Vpc,
};
use crate::provider::CloudProvider;

pub struct HttpCloud {
    http: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    region: String,
    max_retries: u32,
}

impl HttpCloud {
    pub fn new(
        base_url: impl Into<String>,
        api_token: SecretString,
        region: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, CloudError> {
        let http =
            reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            region: region.into(),
            max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CloudError> {
        let mut attempt = 0u32;
        loop {
            let sent = self
                .http
                .get(self.url(path))
                .bearer_auth(self.api_token.expose_secret())
                .send()
                .await;
            match sent {
                Ok(response) => return decode(response).await,
                Err(error) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(path, attempt, error = %error, "provider read failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, CloudError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(self.api_token.expose_secret())
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn post_no_content(&self, path: &str, body: &Value) -> Result<(), CloudError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(self.api_token.expose_secret())
            .json(body)
            .send()
            .await?;
        decode_no_content(response).await
    }

    async fn delete_no_content(&self, path: &str) -> Result<(), CloudError> {
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await?;
        decode_no_content(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    Err(status_error(status, response).await)
}

async fn decode_no_content(response: reqwest::Response) -> Result<(), CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(status_error(status, response).await)
}

async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> CloudError {
    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => CloudError::Authentication(body),
        404 => CloudError::NotFound(body),
        409 => CloudError::Conflict(body),
        400 | 422 => CloudError::InvalidRequest(body),
        _ => CloudError::Api(format!("{status}: {body}")),
    }
}

#[async_trait::async_trait]
impl CloudProvider for HttpCloud {
    fn region(&self) -> &str {
        &self.region
    }

    async fn ping(&self) -> Result<(), CloudError> {
        let response = self
            .http
            .get(self.url("/v1/ping"))
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await?;
        decode_no_content(response).await
    }

    async fn create_vpc(
        &self,
        name: &str,
        cidr: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<Vpc, CloudError> {
        self.post_json("/v1/vpcs", &json!({ "name": name, "cidr": cidr, "tags": tags })).await
    }

    async fn list_vpcs(&self) -> Result<Vec<Vpc>, CloudError> {
        self.get_json("/v1/vpcs").await
    }

    async fn create_subnet(
        &self,
        vpc_id: &str,
        cidr: &str,
        tier: SubnetTier,
    ) -> Result<Subnet, CloudError> {
        self.post_json(
            "/v1/subnets",
            &json!({ "vpc_id": vpc_id, "cidr": cidr, "tier": tier.as_str() }),
        )
        .await
    }

    async fn create_internet_gateway(&self, vpc_id: &str) -> Result<InternetGateway, CloudError> {
        self.post_json("/v1/internet-gateways", &json!({ "vpc_id": vpc_id })).await
    }

    async fn create_route_table(&self, vpc_id: &str) -> Result<RouteTable, CloudError> {
        self.post_json("/v1/route-tables", &json!({ "vpc_id": vpc_id })).await
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination: &str,
        target: &str,
    ) -> Result<(), CloudError> {
        self.post_no_content(
            &format!("/v1/route-tables/{route_table_id}/routes"),
            &json!({ "destination": destination, "target": target }),
        )
        .await
    }

    async fn associate_route_table(
        &self,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<(), CloudError> {
        self.post_no_content(
            &format!("/v1/route-tables/{route_table_id}/associations"),
            &json!({ "subnet_id": subnet_id }),
        )
        .await
    }

    async fn allocate_address(&self) -> Result<AddressAllocation, CloudError> {
        self.post_json("/v1/addresses", &json!({ "domain": "vpc" })).await
    }

    async fn create_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<NatGateway, CloudError> {
        self.post_json(
            "/v1/nat-gateways",
            &json!({ "subnet_id": subnet_id, "allocation_id": allocation_id }),
        )
        .await
    }

    async fn run_instance(&self, spec: &InstanceLaunchSpec) -> Result<Instance, CloudError> {
        self.post_json("/v1/instances", &serde_json::to_value(spec)?).await
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, CloudError> {
        self.get_json("/v1/instances").await
    }

    async fn start_instance(&self, instance_id: &str) -> Result<Instance, CloudError> {
        self.post_json(&format!("/v1/instances/{instance_id}/start"), &json!({})).await
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<Instance, CloudError> {
        self.post_json(&format!("/v1/instances/{instance_id}/stop"), &json!({})).await
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<Instance, CloudError> {
        self.post_json(&format!("/v1/instances/{instance_id}/terminate"), &json!({})).await
    }

    async fn create_bucket(&self, spec: &BucketSpec) -> Result<Bucket, CloudError> {
        self.post_json("/v1/buckets", &serde_json::to_value(spec)?).await
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>, CloudError> {
        self.get_json("/v1/buckets").await
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), CloudError> {
        self.delete_no_content(&format!("/v1/buckets/{name}")).await
    }

    async fn create_user(&self, spec: &UserSpec) -> Result<User, CloudError> {
        self.post_json("/v1/users", &serde_json::to_value(spec)?).await
    }

    async fn list_users(&self) -> Result<Vec<User>, CloudError> {
        self.get_json("/v1/users").await
    }

    async fn delete_user(&self, username: &str) -> Result<(), CloudError> {
        self.delete_no_content(&format!("/v1/users/{username}")).await
    }

    async fn create_group(&self, spec: &GroupSpec) -> Result<Group, CloudError> {
        self.post_json("/v1/groups", &serde_json::to_value(spec)?).await
    }

    async fn add_user_to_group(&self, username: &str, group: &str) -> Result<(), CloudError> {
        self.post_no_content(
            &format!("/v1/groups/{group}/members"),
            &json!({ "username": username }),
        )
        .await
    }

    async fn attach_user_policy(&self, username: &str, policy: &str) -> Result<(), CloudError> {
        self.post_no_content(
            &format!("/v1/users/{username}/policies"),
            &json!({ "policy": policy }),
        )
        .await
    }

    async fn detach_user_policy(&self, username: &str, policy: &str) -> Result<(), CloudError> {
        self.delete_no_content(&format!("/v1/users/{username}/policies/{policy}")).await
    }
}
