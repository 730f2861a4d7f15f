use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format. In JSON mode the
/// members of `data` are merged into the top-level object.
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_body(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a list of lines in text mode; JSON mode prints nothing extra
pub fn output_lines(output_format: OutputFormat, lines: &[String]) {
    if output_format == OutputFormat::Text {
        for line in lines {
            println!("  {}", line);
        }
    }
}

fn success_body(message: &str, data: Option<Value>) -> Value {
    let mut response = json!({
        "success": true,
        "message": message
    });

    if let (Some(Value::Object(extra)), Some(obj)) = (data, response.as_object_mut()) {
        obj.extend(extra);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_data_members() {
        let body = success_body("done", Some(json!({ "applied": ["0001_a"] })));
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("done"));
        assert_eq!(body["applied"], json!(["0001_a"]));
    }

    #[test]
    fn ignores_non_object_data() {
        let body = success_body("done", Some(json!([1, 2])));
        assert_eq!(body.as_object().map(|o| o.len()), Some(2));
    }
}
