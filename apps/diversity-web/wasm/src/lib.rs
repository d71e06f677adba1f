//! Diversity Explorer - browser build
//!
//! Wraps the shared workspace state in a `DiversityApp` class. Requests go
//! through `fetch` with abort signals, and the pattern cache lives in
//! `sessionStorage`.

use wasm_bindgen::prelude::*;

pub mod app;
pub mod fetch;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod timer;

pub use app::DiversityApp;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&"Diversity Explorer WASM initialized".into());
}
