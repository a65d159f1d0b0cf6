use async_trait::async_trait;
use ethers_core::types::Bytes as DisplayBytes;
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, str::FromStr};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BytecodeSourceError {
    #[error("contract {0} is unknown")]
    NotFound(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("node returned error: {0}")]
    Rpc(String),
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
}

/// Where the deployed runtime bytecode of a contract comes from.
#[async_trait]
pub trait BytecodeSource: Send + Sync {
    async fn runtime_code(&self, contract: &str) -> Result<Vec<u8>, BytecodeSourceError>;
}

pub fn parse_bytecode(hex: &str) -> Result<Vec<u8>, BytecodeSourceError> {
    DisplayBytes::from_str(hex.trim())
        .map(|bytes| bytes.to_vec())
        .map_err(|err| BytecodeSourceError::InvalidBytecode(err.to_string()))
}

/// Reads code with `eth_getCode` at the latest block.
pub struct JsonRpcBytecodeSource {
    client: reqwest::Client,
    rpc_url: Url,
}

impl JsonRpcBytecodeSource {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[async_trait]
impl BytecodeSource for JsonRpcBytecodeSource {
    #[tracing::instrument(skip(self), err)]
    async fn runtime_code(&self, contract: &str) -> Result<Vec<u8>, BytecodeSourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getCode",
            "params": [contract, "latest"],
        });
        let response: RpcResponse = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| BytecodeSourceError::Request(err.to_string()))?
            .json()
            .await
            .map_err(|err| BytecodeSourceError::Request(err.to_string()))?;

        match response {
            RpcResponse {
                error: Some(error), ..
            } => Err(BytecodeSourceError::Rpc(format!(
                "{} (code {})",
                error.message, error.code
            ))),
            RpcResponse {
                result: Some(code), ..
            } => parse_bytecode(&code),
            _ => Err(BytecodeSourceError::Rpc("empty response".into())),
        }
    }
}

/// Fixed contract to code mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticBytecodeSource {
    codes: HashMap<String, Vec<u8>>,
}

impl StaticBytecodeSource {
    pub fn new(codes: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }
}

#[async_trait]
impl BytecodeSource for StaticBytecodeSource {
    async fn runtime_code(&self, contract: &str) -> Result<Vec<u8>, BytecodeSourceError> {
        self.codes
            .get(contract)
            .cloned()
            .ok_or_else(|| BytecodeSourceError::NotFound(contract.to_string()))
    }
}
