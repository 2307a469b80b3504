mod app;
mod host;
mod logging;
mod painter;

use std::cell::RefCell;
use std::rc::Rc;

use screencanvas_protocol::CanvasConfig;
use tracing::info;
use wasm_bindgen::prelude::*;

use crate::app::App;

thread_local! {
    static APP: RefCell<Option<Rc<App>>> = const { RefCell::new(None) };
}

fn mounted() -> Result<Rc<App>, JsError> {
    APP.with(|slot| slot.borrow().clone())
        .ok_or_else(|| JsError::new("canvas is not mounted; call mount() first"))
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// Mount the canvas and wire its controls. `config_json` is an optional
/// JSON object overriding `CanvasConfig` fields. Mounting again replaces the
/// previous instance.
#[wasm_bindgen]
pub fn mount(config_json: Option<String>) -> Result<(), JsError> {
    let config: CanvasConfig = match config_json.as_deref().map(str::trim) {
        Some(json) if !json.is_empty() => serde_json::from_str(json)
            .map_err(|e| JsError::new(&format!("invalid canvas config: {e}")))?,
        _ => CanvasConfig::default(),
    };
    logging::init(&config.log_level);

    let canvas_id = config.canvas_id.clone();
    let app = App::mount(config)
        .map_err(|e| JsError::new(&host::host_failure(e).to_string()))?;
    APP.with(|slot| slot.replace(Some(app)));
    info!(canvas = %canvas_id, "mounted");
    Ok(())
}

/// Start a screen capture, as if the capture button was clicked.
#[wasm_bindgen]
pub fn start_screen_capture() -> Result<(), JsError> {
    let app = mounted()?;
    wasm_bindgen_futures::spawn_local(app.handle_screen_capture_click());
    Ok(())
}

/// Export the configured window of canvas frames as a GIF download.
#[wasm_bindgen]
pub fn export_gif() -> Result<(), JsError> {
    let app = mounted()?;
    wasm_bindgen_futures::spawn_local(app.handle_export_click());
    Ok(())
}

/// Current zoom factor of the mounted canvas.
#[wasm_bindgen]
pub fn current_zoom() -> Result<f64, JsError> {
    Ok(mounted()?.zoom())
}

#[wasm_bindgen]
pub fn calculate_zoom(current_zoom: f64, delta: f64) -> f64 {
    screencanvas_core::calculate_zoom(current_zoom, delta)
}
