use std::path::{Path, PathBuf};

pub mod zwo;

pub use zwo::{encode, ZwoExporter};

/// Extension written for every output document
pub const OUTPUT_EXTENSION: &str = "zwo";

/// Output location for a source file: same stem, `.zwo`, inside `output_dir`
pub fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workout".to_string());
    output_dir.join(format!("{}.{}", stem, OUTPUT_EXTENSION))
}
