use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::flash::{FieldErrors, FlashBag, FlashMessage};

/// A page: the template to render, its title, pending flash output and
/// the data handed to the template. Serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct View {
    pub view: &'static str,
    pub title: String,
    pub messages: Vec<FlashMessage>,
    pub errors: FieldErrors,
    pub data: Map<String, Value>,
}

impl View {
    pub fn make(view: &'static str, title: String) -> Self {
        Self {
            view,
            title,
            messages: Vec::new(),
            errors: FieldErrors::new(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> anyhow::Result<Self> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Attach the session's flashed messages and field errors.
    pub fn with_flash(mut self, bag: FlashBag) -> Self {
        self.messages = bag.messages;
        self.errors = bag.errors;
        self
    }
}

impl IntoResponse for View {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
