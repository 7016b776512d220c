use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::GeneratorError;

/// Marker in the template that is replaced by the generated gateways.
pub const PLACEHOLDER: &str = "##__GENERATED_GATEWAYS__##";

/// Read the template file.
pub fn read_template(template_path: &Path) -> Result<String, GeneratorError> {
    fs::read_to_string(template_path).map_err(|source| GeneratorError::TemplateRead {
        path: template_path.to_path_buf(),
        source,
    })
}

/// Put `gateway_block` in place of the placeholder.
///
/// The result always ends with exactly one newline, in the template's style
/// (`\r\n` if the template uses it anywhere, `\n` otherwise).
pub fn render_config(
    template_text: &str,
    template_path: &Path,
    gateway_block: &str,
) -> Result<String, GeneratorError> {
    let occurrences = template_text.matches(PLACEHOLDER).count();
    if occurrences == 0 {
        return Err(GeneratorError::PlaceholderMissing {
            placeholder: PLACEHOLDER.to_string(),
            path: template_path.to_path_buf(),
        });
    }
    if occurrences > 1 {
        tracing::warn!(
            occurrences,
            template = %template_path.display(),
            "placeholder appears more than once, only the first is replaced"
        );
    }
    // Keep the template's line endings throughout.
    let newline = if template_text.contains("\r\n") { "\r\n" } else { "\n" };
    let block = if newline == "\r\n" {
        gateway_block.replace('\n', "\r\n")
    } else {
        gateway_block.to_string()
    };
    let mut rendered = template_text
        .replacen(PLACEHOLDER, &block, 1)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    rendered.push_str(newline);
    Ok(rendered)
}

/// Mode of a freshly created config, readable by a service running as another user.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Replace the file at `output_path` with `content`.
///
/// The text goes to a temporary file next to the destination first, so a
/// failed write never leaves a truncated config behind. An existing file keeps
/// its permissions, and a symlink is followed to the file it points at.
pub fn write_config(output_path: &Path, content: &str) -> Result<(), GeneratorError> {
    let to_error = |source: std::io::Error| GeneratorError::OutputWrite {
        path: output_path.to_path_buf(),
        source,
    };
    let target = resolve_symlink(output_path).map_err(to_error)?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(to_error)?;
    file.write_all(content.as_bytes()).map_err(to_error)?;
    let permissions = match fs::metadata(&target) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => new_file_permissions(),
    };
    if let Some(permissions) = permissions {
        file.as_file().set_permissions(permissions).map_err(to_error)?;
    }
    file.persist(&target).map_err(|e| to_error(e.error))?;
    Ok(())
}

/// The file a write to `path` should land in.
fn resolve_symlink(path: &Path) -> std::io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => fs::canonicalize(path).or_else(|_| {
            // Dangling link: write where it points.
            let dest = fs::read_link(path)?;
            Ok(path.parent().map_or(dest.clone(), |parent| parent.join(&dest)))
        }),
        _ => Ok(path.to_path_buf()),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(NEW_FILE_MODE))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
