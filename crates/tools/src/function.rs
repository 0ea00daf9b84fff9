//! Function tool: an async callable with a declared signature.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use codeact_core::error::ToolError;
use codeact_core::store::RunId;
use codeact_core::tool::{FunctionSignature, Tool, ToolOutput};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

type ToolFuture = BoxFuture<'static, Result<ToolOutput, ToolError>>;

/// Run context injected into context-requiring functions.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub run_id: RunId,
}

#[derive(Clone)]
enum Handler {
    Plain(Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>),
    Contextual(Arc<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>),
}

/// A tool backed by a Rust async closure.
///
/// The signature is what generated code sees; the JSON schema used for
/// native tool calling is derived from its parameter annotations.
pub struct FunctionTool {
    signature: FunctionSignature,
    description: String,
    schema: Value,
    handler: Handler,
}

impl FunctionTool {
    /// Wrap a plain async function.
    pub fn new<F, Fut>(signature: FunctionSignature, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        let handler = Handler::Plain(Arc::new(move |args: Value| -> ToolFuture { Box::pin(f(args)) }));
        Self::build(signature, handler)
    }

    /// Wrap an async function that needs the run context.
    ///
    /// Such tools cannot be called from generated code.
    pub fn with_context<F, Fut>(signature: FunctionSignature, f: F) -> Self
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        let handler = Handler::Contextual(Arc::new(move |ctx: ToolContext, args: Value| -> ToolFuture {
            Box::pin(f(ctx, args))
        }));
        Self::build(signature, handler)
    }

    fn build(signature: FunctionSignature, handler: Handler) -> Self {
        let description = signature
            .doc
            .as_deref()
            .and_then(|d| d.lines().next())
            .map(str::to_string)
            .unwrap_or_else(|| signature.to_string());
        let schema = schema_for(&signature);
        Self {
            signature,
            description,
            schema,
            handler,
        }
    }

    /// Call with the run context supplied.
    pub async fn call_with_context(&self, ctx: ToolContext, arguments: Value) -> Result<ToolOutput, ToolError> {
        self.check_required(&arguments)?;
        match &self.handler {
            Handler::Plain(f) => f(arguments).await,
            Handler::Contextual(f) => f(ctx, arguments).await,
        }
    }

    fn check_required(&self, arguments: &Value) -> Result<(), ToolError> {
        let obj = match arguments {
            Value::Object(map) => map,
            Value::Null if self.signature.params.is_empty() => return Ok(()),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "{} expects an object of arguments, got {other}",
                    self.signature.name
                )));
            }
        };
        for p in self.signature.params.iter().filter(|p| p.default.is_none()) {
            if !obj.contains_key(&p.name) {
                return Err(ToolError::InvalidArguments(format!(
                    "{} is missing required argument '{}'",
                    self.signature.name, p.name
                )));
            }
        }
        Ok(())
    }
}

/// Map a prompt-level annotation to a JSON schema type.
fn json_type(annotation: &str) -> Option<&'static str> {
    let base = annotation
        .split(['[', '|'])
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "int" => Some("integer"),
        "float" => Some("number"),
        "str" => Some("string"),
        "bool" => Some("boolean"),
        "list" | "tuple" | "sequence" => Some("array"),
        "dict" | "mapping" => Some("object"),
        _ => None,
    }
}

fn schema_for(signature: &FunctionSignature) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in &signature.params {
        let mut prop = serde_json::Map::new();
        if let Some(ty) = p.annotation.as_deref().and_then(json_type) {
            prop.insert("type".into(), Value::String(ty.into()));
        }
        properties.insert(p.name.clone(), Value::Object(prop));
        if p.default.is_none() {
            required.push(Value::String(p.name.clone()));
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.signature.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn signature(&self) -> Option<&FunctionSignature> {
        Some(&self.signature)
    }

    fn requires_context(&self) -> bool {
        matches!(self.handler, Handler::Contextual(_))
    }

    async fn call(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        debug!(tool = %self.signature.name, "Calling function tool");
        self.check_required(&arguments)?;
        match &self.handler {
            Handler::Plain(f) => f(arguments).await,
            Handler::Contextual(_) => Err(ToolError::ContextRequired {
                tool_name: self.signature.name.clone(),
            }),
        }
    }
}
