use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::bridge::InferenceBridge;
use crate::error::{BridgeError, ErrorCode, ErrorExt};

use super::command::{Command, MethodCall};

/// Error as reported back across the command boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<BridgeError> for CommandError {
    fn from(error: BridgeError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CommandError {}

pub type CommandResult = std::result::Result<Value, CommandError>;

/// Anything that can answer host commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, call: MethodCall) -> CommandResult;
}

/// Routes named commands to the bridge and shapes their replies
#[derive(Clone)]
pub struct CommandDispatcher {
    bridge: Arc<InferenceBridge>,
}

impl CommandDispatcher {
    pub fn new(bridge: Arc<InferenceBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &InferenceBridge {
        &self.bridge
    }

    async fn execute(&self, command: Command) -> crate::error::Result<Value> {
        let bridge = &self.bridge;
        match command {
            Command::LoadModel { model_path } => {
                bridge.load_model(model_path).await?;
                Ok(Value::Bool(true))
            }
            Command::Generate(request) => Ok(Value::String(bridge.generate(request).await?)),
            Command::StartGeneration(request) => {
                bridge.start_generation(request)?;
                Ok(Value::Null)
            }
            Command::StopGeneration => {
                bridge.stop_generation();
                Ok(Value::Null)
            }
            Command::UnloadModel => {
                bridge.unload_model().await;
                Ok(Value::Null)
            }
            Command::IsModelLoaded => Ok(Value::Bool(bridge.is_model_loaded())),
            Command::GetTotalRam => Ok(json!(bridge.total_ram())),
        }
    }
}

#[async_trait]
impl CommandHandler for CommandDispatcher {
    async fn handle(&self, call: MethodCall) -> CommandResult {
        let result = match Command::parse(&call, &self.bridge.config().generation) {
            Ok(command) => {
                debug!(method = command.name(), "Dispatching command");
                self.execute(command).await
            }
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            if e.is_rejection() {
                debug!(method = %call.method, error = %e, "Command rejected");
            } else {
                warn!(method = %call.method, error = %e, "Command failed");
            }
            CommandError::from(e)
        })
    }
}
