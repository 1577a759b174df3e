#![deny(clippy::all, clippy::pedantic)]

use std::path::Path;

use serde_json::Value;

use crate::client::CliError;

pub fn render(value: &Value, pretty: bool) -> Result<String, CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.map_err(|e| CliError::Server(format!("failed to render output: {e}")))
}

pub async fn emit(value: &Value, pretty: bool, output: Option<&Path>) -> Result<(), CliError> {
    let out = render(value, pretty)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, out)
                .await
                .map_err(|source| CliError::Output {
                    path: path.display().to_string(),
                    source,
                })?;
            eprintln!("Results written to {}", path.display());
        }
        None => println!("{out}"),
    }
    Ok(())
}
