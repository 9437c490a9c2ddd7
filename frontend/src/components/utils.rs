use crate::{Model, SelectedFile};
use chrono::{DateTime, Utc};
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_timers::callback::Timeout;
use js_sys::Date;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use web_sys::FileList;
use yew::prelude::*;

pub fn generate_id() -> u64 {
    static ID_COUNTER: AtomicU64 = AtomicU64::new(0);
    let now = Date::now() as u64;
    let count = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    now * 1000 + (count % 1000)
}

// Debounce function to limit button events
pub fn debounce<F>(duration: u32, callback: F) -> Callback<MouseEvent>
where
    F: Fn() + Clone + 'static,
{
    let timeout = Rc::new(RefCell::new(None::<Timeout>));

    Callback::from(move |_| {
        let mut timeout_ref = timeout.borrow_mut();
        if let Some(old_timeout) = timeout_ref.take() {
            old_timeout.cancel();
        }
        let inner_callback = callback.clone();
        *timeout_ref = Some(Timeout::new(duration, move || inner_callback()));
    })
}

/// Splits a browser file list into image files and the names of everything
/// else.
pub fn extract_image_files(file_list: &FileList) -> (Vec<GlooFile>, Vec<String>) {
    let mut images = Vec::new();
    let mut skipped = Vec::new();
    for file in (0..file_list.length()).filter_map(|i| file_list.item(i)) {
        if file.type_().starts_with("image/") {
            images.push(GlooFile::from(file));
        } else {
            skipped.push(file.name());
        }
    }
    (images, skipped)
}

pub fn selected_file(file: GlooFile) -> SelectedFile {
    SelectedFile {
        id: generate_id(),
        preview_url: ObjectUrl::from(file.clone()),
        file,
    }
}

pub fn click_element(id: &str) {
    let element = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(id));
    if let Some(element) = element {
        use wasm_bindgen::JsCast;
        if let Ok(html) = element.dyn_into::<web_sys::HtmlElement>() {
            html.click();
        }
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn render_loading_label(running: bool, idle: &str, busy: &str) -> Html {
    if running {
        html! {
            <>
                <i class="fa-solid fa-spinner fa-spin"></i>
                { format!(" {}", busy) }
            </>
        }
    } else {
        html! { { idle } }
    }
}

pub fn render_empty_state(model: &Model, message: &str) -> Html {
    let hint = if model.session.is_authenticated() {
        None
    } else {
        Some("Sign in to keep your work tied to your account.")
    };
    html! {
        <div class="empty-state">
            <i class="fa-regular fa-images"></i>
            <p>{ message }</p>
            if let Some(hint) = hint {
                <p class="empty-hint">{ hint }</p>
            }
        </div>
    }
}
