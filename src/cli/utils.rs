use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": true, "message": message });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data) = data {
                print_value(&data)?;
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": false, "error": message });
            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Plain strings print bare, everything else as pretty JSON
pub fn print_value(value: &Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => println!("{}", s),
        Value::Null => {}
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}
