//! Client script loading for the LiveReload server.
//!
//! The browser-side `livereload.js` comes from the published build artifact of
//! the `livereload-js` npm package. It is read once at startup and then served
//! as an opaque byte payload:
//!
//! - **`embed` feature on**: the script is compiled into the binary via `rust-embed`
//! - **`embed` feature off**: the script is read from disk (by default from
//!   `node_modules/livereload-js/dist/livereload.js`)

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// File name of the client script, also used to derive its MIME type.
pub const SCRIPT_NAME: &str = "livereload.js";

/// Location of the script inside an installed `livereload-js` package.
pub const DEFAULT_SCRIPT_PATH: &str = "node_modules/livereload-js/dist/livereload.js";

/// Embedded client script (only available with `embed` feature).
#[cfg(feature = "embed")]
#[derive(rust_embed::RustEmbed)]
#[folder = "../../node_modules/livereload-js/dist"]
struct Assets;

/// Error loading the client script.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Script file does not exist.
    #[error("Client script not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error while reading the script.
    #[error("Failed to read client script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load the client script.
///
/// An explicit `path` always wins. Without one, the embedded copy is used when
/// the `embed` feature is on, otherwise [`DEFAULT_SCRIPT_PATH`] is read.
///
/// # Errors
///
/// Returns [`AssetError::NotFound`] if the file does not exist and
/// [`AssetError::Io`] if it cannot be read.
pub fn load_client_script(path: Option<&Path>) -> Result<Cow<'static, [u8]>, AssetError> {
    if let Some(path) = path {
        return read_script(path).map(Cow::Owned);
    }

    #[cfg(feature = "embed")]
    {
        Assets::get(SCRIPT_NAME)
            .map(|file| file.data)
            .ok_or_else(|| AssetError::NotFound(PathBuf::from(SCRIPT_NAME)))
    }

    #[cfg(not(feature = "embed"))]
    {
        read_script(Path::new(DEFAULT_SCRIPT_PATH)).map(Cow::Owned)
    }
}

fn read_script(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.to_path_buf())
        } else {
            AssetError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Return the MIME type string for the given file path.
pub fn mime_for(path: &str) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
}
