//! Icon assets registered with the engine

use image::RgbaImage;
use log::warn;

use super::handle::MapHandle;
use crate::error::MapError;

/// Decode icon bytes (PNG) into RGBA pixels
pub fn decode_icon(data: &[u8]) -> Result<RgbaImage, MapError> {
    let img = image::load_from_memory(data)?;
    Ok(img.to_rgba8())
}

/// Decode and register an icon under `name`.
///
/// Returns whether the icon is now available. A failure is logged and left
/// for overlays to handle through their circle fallback.
pub fn register_icon(handle: &MapHandle, name: &str, data: &[u8]) -> bool {
    let image = match decode_icon(data) {
        Ok(image) => image,
        Err(e) => {
            warn!("icon {name} failed to load: {e}");
            return false;
        }
    };

    match handle.with_engine(|engine| {
        if engine.has_image(name) {
            return Ok(());
        }
        engine.add_image(name, image)
    }) {
        Ok(Ok(())) => true,
        Ok(Err(e)) | Err(e) => {
            warn!("icon {name} could not be registered: {e}");
            false
        }
    }
}
