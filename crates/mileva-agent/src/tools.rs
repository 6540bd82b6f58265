//! Tools exposed to the model during a call.

use async_trait::async_trait;
use mileva_voice::{FunctionTool, RunContext, ToolError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const MULTIPLY_NUMBERS: &str = "multiply_numbers";

/// Formats the product sentence the model reads back to the caller.
///
/// The product is computed in `i128`, which holds any product of two `i64`s.
pub fn multiply_numbers(number1: i64, number2: i64) -> String {
    let product = i128::from(number1) * i128::from(number2);
    format!(
        "The product of {} and {} is {}.",
        number1, number2, product
    )
}

#[derive(Deserialize)]
struct MultiplyArgs {
    number1: i64,
    number2: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplyNumbers;

#[async_trait]
impl FunctionTool for MultiplyNumbers {
    fn name(&self) -> &str {
        MULTIPLY_NUMBERS
    }

    fn description(&self) -> &str {
        "Multiply two numbers."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "number1": {
                    "type": "integer",
                    "description": "The first number to multiply."
                },
                "number2": {
                    "type": "integer",
                    "description": "The second number to multiply."
                }
            },
            "required": ["number1", "number2"]
        })
    }

    async fn call(&self, ctx: &RunContext, arguments: Value) -> Result<String, ToolError> {
        let args: MultiplyArgs =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
                tool: MULTIPLY_NUMBERS.to_string(),
                reason: e.to_string(),
            })?;
        debug!(room = %ctx.room, number1 = args.number1, number2 = args.number2, "multiplying");
        Ok(multiply_numbers(args.number1, args.number2))
    }
}
