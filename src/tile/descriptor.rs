//! Deep Zoom Image (DZI) descriptors.
//!
//! Two wire formats describe the same pyramid:
//!
//! - the XML `.dzi` file written next to the tiles at generation time
//! - a JSON document rebuilt from the metadata record on request, shaped the
//!   way OpenSeadragon expects an inline tile source
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Image xmlns="http://schemas.microsoft.com/deepzoom/2008" Format="jpeg" Overlap="1" TileSize="256">
//!   <Size Height="600" Width="800"/>
//! </Image>
//! ```

use serde::{Deserialize, Serialize};

use super::record::ImageRecord;

/// XML namespace of Deep Zoom descriptors.
pub const DZI_XMLNS: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// Tile format reported by the JSON descriptor.
///
/// Always "jpeg", whatever encoding the tiles were generated with. Viewers
/// built against this server request tiles without an extension and the tile
/// route resolves the actual file.
pub const DZI_JSON_FORMAT: &str = "jpeg";

/// Generate the DZI XML descriptor for a pyramid.
pub fn generate_dzi_xml(width: u32, height: u32, tile_size: u32, overlap: u32, format: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="{DZI_XMLNS}" Format="{format}" Overlap="{overlap}" TileSize="{tile_size}">
  <Size Height="{height}" Width="{width}"/>
</Image>
"#
    )
}

/// JSON form of a DZI descriptor: `{"Image": {...}}`.
///
/// Numeric attributes are rendered as strings, mirroring XML attribute
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DziDescriptor {
    #[serde(rename = "Image")]
    pub image: DziImage,
}

/// The `Image` element of a DZI descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DziImage {
    #[serde(rename = "xmlns")]
    pub xmlns: String,

    /// Base URL that tile paths `<level>/<col>_<row>` are appended to
    pub url: String,

    pub format: String,
    pub overlap: String,
    pub tile_size: String,
    pub size: DziSize,
}

/// The `Size` element of a DZI descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DziSize {
    pub height: String,
    pub width: String,
}

impl DziDescriptor {
    /// Build the JSON descriptor for a stored image.
    pub fn from_record(record: &ImageRecord) -> Self {
        Self {
            image: DziImage {
                xmlns: DZI_XMLNS.to_string(),
                url: format!("/api/images/{}/tiles/", record.id),
                format: DZI_JSON_FORMAT.to_string(),
                overlap: record.overlap.to_string(),
                tile_size: record.tile_size.to_string(),
                size: DziSize {
                    height: record.height.to_string(),
                    width: record.width.to_string(),
                },
            },
        }
    }
}
