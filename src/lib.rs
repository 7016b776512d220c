use std::path::Path;

use error::GeneratorError;

/// Error types of both tools
pub mod error;

/// CSV reading shared by both tools
pub mod records;

/// Channel name sanitisation
pub mod slug;

/// Matterbridge gateway naming and rendering
pub mod gateway;

/// Template substitution and output writing
pub mod template;

/// Discord REST API client
pub mod discord;

/// Creating missing Discord channels from a CSV list
pub mod creator;

/// Render a Matterbridge config from a channel CSV and a template.
///
/// The CSV is validated completely before the template is read, and the
/// output is only written when everything succeeded. Returns the number of
/// gateways written.
pub fn generate(
    csv_path: &Path,
    template_path: &Path,
    output_path: &Path,
) -> Result<usize, GeneratorError> {
    let channels = records::read_channels(csv_path)?;
    tracing::info!(rows = channels.len(), csv = %csv_path.display(), "read channel rows");
    let gateway_block = gateway::build_gateway_blocks(&channels)?;
    let template_text = template::read_template(template_path)?;
    let rendered = template::render_config(&template_text, template_path, &gateway_block)?;
    template::write_config(output_path, &rendered)?;
    Ok(channels.len())
}

/// Send diagnostics to stderr, filtered by `RUST_LOG` (default: warnings only).
///
/// Stdout stays reserved for the status lines the tools print.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
