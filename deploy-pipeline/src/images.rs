//! Cover and hero renditions.

use std::path::{Path, PathBuf};

use deploy_core::{EbookIdentifier, OwnerGroup};
use deploy_tools::{Crop, RasterRequest, Toolchain};

use crate::error::PublishError;
use crate::gate::CoverSources;
use crate::perms;
use crate::writer;

/// Scratch name of the raster cover; the vector cover references it.
pub const SCRATCH_RASTER: &str = "cover.jpg";
pub const SCRATCH_VECTOR: &str = "cover.svg";

/// Every rendition is published in these formats.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "avif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenditionSource {
    Raster,
    Vector,
}

impl RenditionSource {
    fn scratch_name(self) -> &'static str {
        match self {
            RenditionSource::Raster => SCRATCH_RASTER,
            RenditionSource::Vector => SCRATCH_VECTOR,
        }
    }
}

/// One named size (and optional crop) of the cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    pub suffix: &'static str,
    pub source: RenditionSource,
    pub width: u32,
    pub crop: Option<Crop>,
}

impl Rendition {
    /// `<url_safe><suffix>.<extension>`
    pub fn file_name(&self, identifier: &EbookIdentifier, extension: &str) -> String {
        format!("{}{}.{extension}", identifier.url_safe(), self.suffix)
    }
}

pub const RENDITIONS: [Rendition; 4] = [
    Rendition {
        suffix: "-hero",
        source: RenditionSource::Raster,
        width: 1318,
        crop: Some(Crop {
            width: 1318,
            height: 439,
            x: 0,
            y: 659,
        }),
    },
    Rendition {
        suffix: "-hero@2x",
        source: RenditionSource::Raster,
        width: 2636,
        crop: Some(Crop {
            width: 2636,
            height: 860,
            x: 0,
            y: 1318,
        }),
    },
    Rendition {
        suffix: "-cover",
        source: RenditionSource::Vector,
        width: 242,
        crop: None,
    },
    Rendition {
        suffix: "-cover@2x",
        source: RenditionSource::Vector,
        width: 484,
        crop: None,
    },
];

/// All file names generated for `identifier`, in publish order.
pub fn rendition_file_names(identifier: &EbookIdentifier) -> Vec<String> {
    RENDITIONS
        .iter()
        .flat_map(|rendition| {
            IMAGE_EXTENSIONS
                .iter()
                .map(move |ext| rendition.file_name(identifier, ext))
        })
        .collect()
}

fn expect_output(path: &Path) -> Result<(), PublishError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PublishError::MissingArtifact {
            path: path.to_path_buf(),
        })
    }
}

/// Generate every rendition into `scratch`.
///
/// Returns the generated files, already carrying `group` and `g+w`.
pub fn generate(
    toolchain: &dyn Toolchain,
    covers: &CoverSources,
    scratch: &Path,
    identifier: &EbookIdentifier,
    group: &OwnerGroup,
) -> Result<Vec<PathBuf>, PublishError> {
    writer::write_atomic(&scratch.join(SCRATCH_RASTER), &covers.raster)?;
    writer::write_atomic(&scratch.join(SCRATCH_VECTOR), &covers.vector)?;

    let mut generated = Vec::with_capacity(RENDITIONS.len() * IMAGE_EXTENSIONS.len());
    for rendition in &RENDITIONS {
        let input = scratch.join(rendition.source.scratch_name());
        let jpg = scratch.join(rendition.file_name(identifier, "jpg"));
        toolchain.render_raster(&RasterRequest {
            input: &input,
            output: &jpg,
            working_dir: scratch,
            width: rendition.width,
            crop: rendition.crop,
        })?;
        expect_output(&jpg)?;

        let avif = scratch.join(rendition.file_name(identifier, "avif"));
        toolchain.encode_avif(&jpg, &avif)?;
        expect_output(&avif)?;

        tracing::debug!("rendered {}", rendition.file_name(identifier, "{jpg,avif}"));
        generated.push(jpg);
        generated.push(avif);
    }

    for path in &generated {
        perms::share_file(path, group)?;
    }
    Ok(generated)
}
