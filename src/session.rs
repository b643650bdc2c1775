//! Live editing session around the pixelator.
//!
//! Holds the current source, the parameters and the last output. Parameter
//! edits only mark the output stale; the next [`EditingSession::output`]
//! call re-runs the whole pipeline. The pixel-art cell size is cached here
//! and reset whenever a new source is loaded.

use crate::config::PixelatorConfig;
use crate::error::PixelatorError;
use crate::grid::CellSizeCache;
use crate::pipeline::{adapt_to_pixel_art, derive_defaults, PixelatorParameters, Pixelator};
use crate::raster::{OutputImage, RawImage};

#[derive(Debug)]
pub struct EditingSession {
    pixelator: Pixelator,
    source: RawImage,
    name: String,
    params: PixelatorParameters,
    cell_size: CellSizeCache,
    output: Option<OutputImage>,
}

impl EditingSession {
    /// Start editing `source`, with parameters derived from its geometry.
    pub fn new(source: RawImage, name: impl Into<String>, config: PixelatorConfig) -> Self {
        let params = derive_defaults(&source);
        Self {
            pixelator: Pixelator::new(config),
            source,
            name: name.into(),
            params,
            cell_size: CellSizeCache::new(),
            output: None,
        }
    }

    /// Replace the source image; resets parameters and the cell-size cache.
    pub fn load_image(&mut self, source: RawImage, name: impl Into<String>) {
        self.params = derive_defaults(&source);
        self.source = source;
        self.name = name.into();
        self.cell_size.invalidate();
        self.output = None;
    }

    pub fn source(&self) -> &RawImage { &self.source }
    pub fn name(&self) -> &str { &self.name }
    pub fn parameters(&self) -> &PixelatorParameters { &self.params }

    /// Whether the next [`Self::output`] call will re-run the pipeline.
    pub fn is_stale(&self) -> bool {
        self.output.is_none()
    }

    pub fn cell_size(&mut self) -> usize {
        self.cell_size.get_or_detect(&self.source, &self.pixelator.config)
    }

    /// Replace the parameters wholesale.
    pub fn set_parameters(&mut self, params: PixelatorParameters) {
        if params != self.params {
            self.params = params;
            self.output = None;
        }
    }

    /// Edit the parameters in place.
    ///
    /// Switching pixel-art mode on, or changing the tile resolution while it
    /// is on, refits the tile grid to the detected source cells.
    pub fn update(&mut self, edit: impl FnOnce(&mut PixelatorParameters)) {
        let mut next = self.params.clone();
        edit(&mut next);

        let entered_pixel_art = next.pixel_art_mode && !self.params.pixel_art_mode;
        let resolution_changed = next.pixel_art_mode && next.tile_resolution != self.params.tile_resolution;
        if entered_pixel_art || resolution_changed {
            let cell = self.cell_size();
            adapt_to_pixel_art(&mut next, &self.source, cell);
        }
        self.set_parameters(next);
    }

    /// Current output, re-running the pipeline if anything changed.
    pub fn output(&mut self) -> Result<&OutputImage, PixelatorError> {
        let image = match self.output.take() {
            Some(image) => image,
            None => {
                let cell = if self.params.pixel_art_mode { self.cell_size() } else { 1 };
                self.pixelator.process_with_cell_size(&self.source, &self.params, cell)?
            }
        };
        let image: &OutputImage = self.output.insert(image);
        Ok(image)
    }
}
