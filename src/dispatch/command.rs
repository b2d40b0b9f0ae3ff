use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::GenerationDefaults;
use crate::error::{BridgeError, Result};
use crate::types::GenerationRequest;

/// A named command with JSON arguments, as received from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// The closed set of commands the bridge understands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadModel { model_path: PathBuf },
    Generate(GenerationRequest),
    StartGeneration(GenerationRequest),
    StopGeneration,
    UnloadModel,
    IsModelLoaded,
    GetTotalRam,
}

impl Command {
    /// Parse a call, filling omitted generation fields from `defaults`.
    ///
    /// Unknown method names are `NotImplemented`; missing or ill-typed
    /// arguments are `InvalidArgument`. Commands without parameters ignore
    /// whatever arguments they were sent.
    pub fn parse(call: &MethodCall, defaults: &GenerationDefaults) -> Result<Self> {
        let args = || Arguments::new(&call.arguments);

        let command = match call.method.as_str() {
            "loadModel" => Command::LoadModel {
                model_path: PathBuf::from(args()?.required_str("modelPath")?),
            },
            "generate" => Command::Generate(args()?.generation_request(defaults)?),
            "startGeneration" => Command::StartGeneration(args()?.generation_request(defaults)?),
            "stopGeneration" => Command::StopGeneration,
            "unloadModel" => Command::UnloadModel,
            "isModelLoaded" => Command::IsModelLoaded,
            "getTotalRam" => Command::GetTotalRam,
            other => {
                return Err(BridgeError::NotImplemented {
                    method: other.to_string(),
                })
            }
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::LoadModel { .. } => "loadModel",
            Command::Generate(_) => "generate",
            Command::StartGeneration(_) => "startGeneration",
            Command::StopGeneration => "stopGeneration",
            Command::UnloadModel => "unloadModel",
            Command::IsModelLoaded => "isModelLoaded",
            Command::GetTotalRam => "getTotalRam",
        }
    }
}

struct Arguments<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> Arguments<'a> {
    fn new(value: &'a Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self { fields: None }),
            Value::Object(fields) => Ok(Self {
                fields: Some(fields),
            }),
            _ => Err(BridgeError::invalid_argument(
                "arguments",
                "expected an object",
            )),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.fields
            .and_then(|f| f.get(name))
            .filter(|v| !v.is_null())
    }

    fn required_str(&self, name: &str) -> Result<&'a str> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(BridgeError::invalid_argument(name, "expected a string")),
            None => Err(BridgeError::invalid_argument(name, "is required")),
        }
    }

    fn optional_count(&self, name: &str) -> Result<Option<usize>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        if let Some(n) = value.as_u64() {
            return usize::try_from(n)
                .map(Some)
                .map_err(|_| BridgeError::invalid_argument(name, "is too large"));
        }
        match value.as_i64() {
            Some(_) => Err(BridgeError::invalid_argument(name, "must be positive")),
            None => Err(BridgeError::invalid_argument(name, "expected an integer")),
        }
    }

    fn optional_number(&self, name: &str) -> Result<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| BridgeError::invalid_argument(name, "expected a number")),
        }
    }

    fn optional_str(&self, name: &str) -> Result<Option<&'a str>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(BridgeError::invalid_argument(name, "expected a string")),
        }
    }

    fn generation_request(&self, defaults: &GenerationDefaults) -> Result<GenerationRequest> {
        let prompt = self.optional_str("prompt")?.unwrap_or_default();
        let mut request = GenerationRequest::with_defaults(prompt, defaults);
        if let Some(max_tokens) = self.optional_count("maxTokens")? {
            request = request.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.optional_number("temperature")? {
            request = request.temperature(temperature);
        }
        if let Some(top_p) = self.optional_number("topP")? {
            request = request.top_p(top_p);
        }
        request.validate()?;
        Ok(request)
    }
}
