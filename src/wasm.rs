//! WebAssembly interface for the painting editor.

use crate::config::{PixelatorConfig, TransferConfig};
use crate::pipeline::PixelatorParameters;
use crate::raster::RawImage;
use crate::session::EditingSession;
use crate::transfer::upload_messages;
use wasm_bindgen::prelude::*;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct WasmPixelator {
    session: EditingSession,
    transfer: TransferConfig,
}

#[wasm_bindgen]
impl WasmPixelator {
    /// Start editing an RGBA buffer; parameters are derived from its size.
    #[wasm_bindgen(constructor)]
    pub fn new(image_data: &[u8], width: usize, height: usize, name: String) -> Result<WasmPixelator, JsValue> {
        let source = RawImage::from_rgba_bytes(width, height, image_data).map_err(js_err)?;
        Ok(Self {
            session: EditingSession::new(source, name, PixelatorConfig::default()),
            transfer: TransferConfig::default(),
        })
    }

    pub fn load_image(&mut self, image_data: &[u8], width: usize, height: usize, name: String) -> Result<(), JsValue> {
        let source = RawImage::from_rgba_bytes(width, height, image_data).map_err(js_err)?;
        self.session.load_image(source, name);
        Ok(())
    }

    pub fn set_dither_strength(&mut self, strength: f64) {
        self.session.update(|p| p.dither_strength = strength);
    }

    pub fn set_color_count(&mut self, count: u32) {
        self.session.update(|p| p.color_count = count);
    }

    pub fn set_tile_resolution(&mut self, resolution: u32) {
        self.session.update(|p| p.tile_resolution = resolution);
    }

    pub fn set_tiles(&mut self, wide: u32, high: u32) {
        self.session.update(|p| {
            p.tiles_wide = wide;
            p.tiles_high = high;
        });
    }

    pub fn set_offset(&mut self, x: f64, y: f64) {
        self.session.update(|p| {
            p.offset_x = x;
            p.offset_y = y;
        });
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.session.update(|p| p.zoom = zoom);
    }

    pub fn set_pixel_art_mode(&mut self, enabled: bool) {
        self.session.update(|p| p.pixel_art_mode = enabled);
    }

    pub fn set_max_chunk_size(&mut self, size: usize) {
        self.transfer.max_chunk_size = size;
    }

    pub fn tiles_wide(&self) -> u32 {
        self.session.parameters().tiles_wide
    }

    pub fn tiles_high(&self) -> u32 {
        self.session.parameters().tiles_high
    }

    /// Current parameters as a camelCase JSON object.
    pub fn parameters_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.session.parameters()).map_err(js_err)
    }

    pub fn set_parameters_json(&mut self, json: &str) -> Result<(), JsValue> {
        let params: PixelatorParameters = serde_json::from_str(json).map_err(js_err)?;
        self.session.set_parameters(params);
        Ok(())
    }

    /// Pixelated RGBA output, recomputed only after an edit.
    pub fn process(&mut self) -> Result<WasmPaintingResult, JsValue> {
        let output = self.session.output().map_err(js_err)?;
        Ok(WasmPaintingResult {
            width: output.width() as u32,
            height: output.height() as u32,
            rgba_data: output.to_rgba_bytes(),
        })
    }

    /// Upload messages for the current output, each encoded as JSON.
    pub fn upload_messages(&mut self) -> Result<Vec<JsValue>, JsValue> {
        let params = self.session.parameters().clone();
        let name = self.session.name().to_string();
        let output = self.session.output().map_err(js_err)?;
        let messages = upload_messages(output, &params, &name, &self.transfer).map_err(js_err)?;
        messages
            .iter()
            .map(|m| {
                let json = m.to_json().map_err(js_err)?;
                Ok(JsValue::from_str(&String::from_utf8_lossy(&json)))
            })
            .collect()
    }
}

#[wasm_bindgen]
pub struct WasmPaintingResult {
    width: u32,
    height: u32,
    rgba_data: Vec<u8>,
}

#[wasm_bindgen]
impl WasmPaintingResult {
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn get_rgba_data(&self) -> Vec<u8> {
        self.rgba_data.clone()
    }
}
