//! Writing the reduced frame: cleaned image with provenance, plus the defect mask.

use std::io::Write;
use std::path::Path;

use fitsio::extension::{build_extension_header, ExtensionType};
use fitsio::header::{serialize_header, Card};
use fitsio::image::{serialize_image_f32, serialize_image_u8};
use fitsio::primary::build_primary_header;
use fitsio::value::Value;
use tempfile::NamedTempFile;

use crate::cosmic_ray::Mask;
use crate::error::{ReductionError, Result};
use crate::fits::{self, comment_card, set_string, value_card, Header};
use crate::frame::Image;

/// `EXTNAME` of the defect mask extension.
pub const MASK_EXTNAME: &str = "COSMICRAY_MASK";

pub const REDUCED_COMMENT: &str = "Reduced science image";
pub const BIASFILE: &str = "BIASFILE";
pub const DARKFILE: &str = "DARKFILE";
pub const FLATFILE: &str = "FLATFILE";
const BIAS_COMMENT: &str = "Bias image used to subtract bias level";
const DARK_COMMENT: &str = "Dark image used to subtract dark current";
const FLAT_COMMENT: &str = "Flat image used for FPN correction";

/// Identifiers of the calibration masters a frame was reduced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub bias: String,
    pub dark: String,
    pub flat: String,
}

impl Provenance {
    /// Identify each master by its path exactly as given.
    pub fn from_paths(bias: &Path, dark: &Path, flat: &Path) -> Self {
        Self {
            bias: bias.display().to_string(),
            dark: dark.display().to_string(),
            flat: flat.display().to_string(),
        }
    }
}

/// Science header plus the reduction comment and the three master identifiers.
///
/// Existing provenance keys are replaced in place; the comment is always appended.
pub fn annotate_header(science: &[Card], provenance: &Provenance) -> Header {
    let mut header = science.to_vec();
    header.push(comment_card(REDUCED_COMMENT));
    set_string(&mut header, BIASFILE, &provenance.bias, BIAS_COMMENT);
    set_string(&mut header, DARKFILE, &provenance.dark, DARK_COMMENT);
    set_string(&mut header, FLATFILE, &provenance.flat, FLAT_COMMENT);
    header
}

/// Assemble the two-HDU output file in memory.
///
/// Structural keywords of the science header are regenerated for the float32 plane.
pub fn encode_reduced(image: &Image, mask: &Mask, header: &[Card]) -> fitsio::Result<Vec<u8>> {
    let (height, width) = image.dim();

    let mut primary = build_primary_header(-32, &[width, height])?;
    primary.push(value_card(
        "EXTEND",
        Value::Logical(true),
        Some("FITS dataset may contain extensions"),
    ));
    for card in header {
        let keyword = card.keyword_str();
        if fits::is_structural(keyword) {
            log::debug!("Dropping {keyword} from the science header");
            continue;
        }
        primary.push(fits::writable_card(card));
    }

    let mut extension = build_extension_header(ExtensionType::Image, 8, &[width, height], 0, 1)?;
    extension.push(value_card(
        "EXTNAME",
        Value::String(MASK_EXTNAME.to_string()),
        Some("Cosmic-ray pixels"),
    ));

    let pixels: Vec<f32> = image.iter().copied().collect();
    let flags: Vec<u8> = mask.iter().map(|&hit| u8::from(hit)).collect();

    let mut bytes = serialize_header(&primary);
    bytes.extend(serialize_image_f32(&pixels));
    bytes.extend(serialize_header(&extension));
    bytes.extend(serialize_image_u8(&flags));
    Ok(bytes)
}

/// Write the reduced frame to `path`, replacing any existing file.
///
/// The file is staged next to `path` and renamed into place, so a failed write leaves
/// any previous output untouched.
pub fn write_reduced(
    path: &Path,
    image: &Image,
    mask: &Mask,
    science_header: &[Card],
    provenance: &Provenance,
) -> Result<()> {
    let write_error = |source| ReductionError::Write {
        path: path.to_path_buf(),
        source,
    };

    let header = annotate_header(science_header, provenance);
    let bytes = encode_reduced(image, mask, &header)
        .map_err(|e| write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(write_error)?;
    staged.write_all(&bytes).map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;
    staged.persist(path).map_err(|e| write_error(e.error))?;

    log::info!("Wrote reduced frame to {}", path.display());
    Ok(())
}
