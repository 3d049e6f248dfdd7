//! `estato health`

use anyhow::Result;
use colored::Colorize;
use estimator_lib::HealthResponse;

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_json, print_warning, OutputFormat};

/// Query the service health endpoint
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get("health").await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            let status = serde_json::to_value(health.status)?
                .as_str()
                .unwrap_or_default()
                .to_string();

            println!("{}", "Service Health".bold());
            println!("{}", "=".repeat(50));
            println!("Endpoint:       {}", client.base_url().as_str().cyan());
            println!("Status:         {}", color_status(&status));
            println!("Model Loaded:   {}", health.model_loaded);
            if let Some(model) = &health.model {
                println!("Trained At:     {}", format_timestamp(&model.trained_at));
                println!("Features:       {}", model.features);
                println!("Trees:          {}", model.trees);
            }
            if let Some(reason) = &health.reason {
                print_warning(reason);
            }
        }
    }

    Ok(())
}
