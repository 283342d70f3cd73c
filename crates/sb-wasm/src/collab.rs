//! Confirmation dialog and toast surface backed by optional JS callbacks.

use js_sys::{Function, Promise};
use sb_editor::collab::{ConfirmDialog, MessageKind, MessageSurface};
use std::future::{Future, ready};
use std::pin::Pin;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

/// `confirm(prompt) -> boolean | Promise<boolean>`; falls back to
/// `window.confirm`.
pub(crate) struct JsConfirm {
    callback: Option<Function>,
}

impl JsConfirm {
    pub(crate) fn new(callback: Option<Function>) -> Self {
        Self { callback }
    }
}

impl ConfirmDialog for JsConfirm {
    fn confirm(&self, prompt: &str) -> Pin<Box<dyn Future<Output = bool>>> {
        let Some(callback) = &self.callback else {
            let answer = web_sys::window()
                .and_then(|w| w.confirm_with_message(prompt).ok())
                .unwrap_or(false);
            return Box::pin(ready(answer));
        };
        let returned = match callback.call1(&JsValue::NULL, &JsValue::from_str(prompt)) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("confirm callback threw: {err:?}");
                return Box::pin(ready(false));
            }
        };
        match returned.dyn_into::<Promise>() {
            Ok(promise) => Box::pin(async move {
                JsFuture::from(promise)
                    .await
                    .map(|v| v.is_truthy())
                    .unwrap_or(false)
            }),
            Err(value) => Box::pin(ready(value.is_truthy())),
        }
    }
}

/// `message(text, kind)`; falls back to the log.
#[derive(Clone)]
pub(crate) struct JsMessages {
    callback: Option<Function>,
}

impl JsMessages {
    pub(crate) fn new(callback: Option<Function>) -> Self {
        Self { callback }
    }
}

impl MessageSurface for JsMessages {
    fn message(&self, text: &str, kind: MessageKind) {
        let Some(callback) = &self.callback else {
            sb_editor::collab::LogMessages.message(text, kind);
            return;
        };
        if let Err(err) = callback.call2(
            &JsValue::NULL,
            &JsValue::from_str(text),
            &JsValue::from_str(kind.as_str()),
        ) {
            log::warn!("message callback threw: {err:?}");
        }
    }
}
