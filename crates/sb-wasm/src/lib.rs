//! WASM bridge for StickyBoard: binds the board session to a canvas element.
//!
//! Compiled via `wasm-pack build --target web`. The same module also serves
//! as the persistence worker (`run_persistence_worker`).

mod app;
mod collab;
mod dom;
mod idb;
mod logger;
mod worker;

use app::App;
use collab::{JsConfirm, JsMessages};
use js_sys::{Function, Promise};
use sb_core::config::BoardConfig;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

pub use worker::run_persistence_worker;

/// A sticky-note board mounted on one canvas element.
///
/// `options` is the JSON form of `BoardConfig` (empty for defaults).
/// `confirm(prompt)` may return a boolean or a promise of one; `message(text,
/// kind)` receives toasts. Both are optional.
#[wasm_bindgen]
pub struct StickyBoard {
    app: Rc<RefCell<App>>,
}

#[wasm_bindgen]
impl StickyBoard {
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlElement,
        options: &str,
        confirm: Option<Function>,
        message: Option<Function>,
    ) -> Result<StickyBoard, JsValue> {
        install_panic_hook();
        let (config, problem) = match BoardConfig::from_json(options) {
            Ok(config) => (config, None),
            Err(err) => (BoardConfig::default(), Some(err)),
        };
        logger::init(config.debug);
        if let Some(err) = problem {
            log::warn!("{err}; using defaults");
        }

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let app = App::create(
            document,
            canvas,
            config,
            JsConfirm::new(confirm),
            JsMessages::new(message),
        )?;
        Ok(StickyBoard { app })
    }

    /// Restore the stored layout (or keep the canvas' own markup) and start
    /// saving changes. Resolves with the number of cards on the board.
    pub fn start(&self) -> Promise {
        let app = Rc::clone(&self.app);
        wasm_bindgen_futures::future_to_promise(async move {
            let cards = App::start(app).await?;
            Ok(JsValue::from(cards as u32))
        })
    }

    /// Ask to restore the default layout; repeated clicks are throttled.
    #[wasm_bindgen(js_name = resetLayout)]
    pub fn reset_layout(&self) -> Result<(), JsValue> {
        self.borrow_mut()?.reset_layout();
        Ok(())
    }

    #[wasm_bindgen(js_name = cardCount)]
    pub fn card_count(&self) -> Result<u32, JsValue> {
        Ok(self.borrow()?.card_count() as u32)
    }

    /// Number of mounted card components. Zero after `destroy`.
    #[wasm_bindgen(js_name = liveComponents)]
    pub fn live_components(&self) -> Result<u32, JsValue> {
        Ok(self.borrow()?.live_components() as u32)
    }

    /// The canvas markup as it would be saved.
    pub fn markup(&self) -> Result<String, JsValue> {
        Ok(self.borrow()?.markup())
    }

    /// Unmount every component and remove every listener.
    pub fn destroy(&self) -> Result<(), JsValue> {
        self.borrow_mut()?.destroy();
        Ok(())
    }
}

impl StickyBoard {
    fn borrow(&self) -> Result<std::cell::Ref<'_, App>, JsValue> {
        self.app
            .try_borrow()
            .map_err(|_| JsValue::from_str("board is busy"))
    }

    fn borrow_mut(&self) -> Result<std::cell::RefMut<'_, App>, JsValue> {
        self.app
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("board is busy"))
    }
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

pub(crate) fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("StickyBoard WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}
