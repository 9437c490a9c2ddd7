use crate::api::ApiError;
use crate::browser_storage::BrowserStorage;
use crate::components::utils::{extract_image_files, selected_file};
use crate::{Model, Msg, Page, ToastKind};
use gloo_file::File as GlooFile;
use gloo_timers::callback::Interval;
use shared::{
    ActivityType, NewImage, ProcessingView, SessionProvider, SessionUser, UploadFile,
    UploadResponse, POLL_INTERVAL_MS,
};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use web_sys::{ClipboardEvent, DragEvent, FileList, UrlSearchParams};
use yew::prelude::*;

/// Completes a login redirect of the form `?token=..&name=..&email=..` and
/// strips the query so a reload does not sign in again.
pub fn accept_login_redirect(provider: &mut SessionProvider<BrowserStorage>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let location = window.location();
    let Ok(search) = location.search() else {
        return;
    };
    let Ok(params) = UrlSearchParams::new_with_str(&search) else {
        return;
    };
    let Some(token) = params.get("token").filter(|t| !t.is_empty()) else {
        return;
    };

    let email = params.get("email").unwrap_or_default();
    let name = params
        .get("name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.clone());
    let user = SessionUser {
        id: if email.is_empty() { name.clone() } else { email.clone() },
        email,
        name,
        picture_url: params.get("picture"),
    };
    match provider.sign_in(user, token, params.get("refreshToken")) {
        Ok(()) => log::info!("Signed in from login redirect"),
        Err(e) => log::error!("Could not store session: {}", e),
    }

    let path = location.pathname().unwrap_or_else(|_| "/".to_string());
    if let Ok(history) = window.history() {
        if history
            .replace_state_with_url(&JsValue::NULL, "", Some(&path))
            .is_err()
        {
            log::warn!("Could not strip login parameters from the address bar");
        }
    }
}

pub fn handle_navigate(model: &mut Model, ctx: &Context<Model>, page: Page) -> bool {
    if model.page == page {
        return false;
    }
    model.poller = None;
    model.retouch_target = None;
    model.processing = None;

    match &page {
        Page::Processing(batch_id) => {
            model.processing = Some(ProcessingView::new(batch_id));
            start_polling(model, ctx);
            ctx.link().send_message(Msg::PollTick);
        }
        Page::Integrations => ctx.link().send_message(Msg::LoadIntegrations),
        Page::Upload | Page::Activity => {}
    }
    model.page = page;
    true
}

pub fn start_polling(model: &mut Model, ctx: &Context<Model>) {
    let link = ctx.link().clone();
    model.poller = Some(Interval::new(POLL_INTERVAL_MS, move || {
        link.send_message(Msg::PollTick)
    }));
}

pub fn handle_files_added(model: &mut Model, ctx: &Context<Model>, files: Vec<GlooFile>) -> bool {
    let selected: Vec<_> = files.into_iter().map(selected_file).collect();
    match model.upload.add_images(selected) {
        Ok(added) => {
            log::debug!("Added {} image(s) to the upload", added);
            true
        }
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, e.to_string());
            true
        }
    }
}

pub fn handle_remove_image(model: &mut Model, ctx: &Context<Model>, index: usize) -> bool {
    match model.upload.remove_image(index) {
        Ok(removed) => removed.is_some(),
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, e.to_string());
            true
        }
    }
}

pub fn handle_drop(model: &mut Model, ctx: &Context<Model>, event: DragEvent) -> bool {
    event.prevent_default();
    model.is_dragging = false;

    if let Some(file_list) = event.data_transfer().and_then(|dt| dt.files()) {
        process_file_list(ctx, &file_list);
    }
    true
}

pub fn handle_paste(model: &mut Model, ctx: &Context<Model>, event: ClipboardEvent) -> bool {
    if model.page != Page::Upload {
        return false;
    }
    if let Some(file_list) = event.clipboard_data().and_then(|dt| dt.files()) {
        if file_list.length() > 0 {
            event.prevent_default();
            process_file_list(ctx, &file_list);
            return true;
        }
    }
    false
}

pub fn process_file_list(ctx: &Context<Model>, file_list: &FileList) {
    let (images, skipped) = extract_image_files(file_list);
    for name in skipped {
        log::warn!("Skipping non-image file: {}", name);
        ctx.link().send_message(Msg::Notify(
            ToastKind::Info,
            format!("Skipped non-image file: {}", name),
        ));
    }
    if !images.is_empty() {
        ctx.link().send_message(Msg::FilesAdded(images));
    }
}

pub fn handle_instruction_text(model: &mut Model, ctx: &Context<Model>, text: String) -> bool {
    match model.upload.set_instruction_text(text) {
        Ok(()) => false,
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, e.to_string());
            true
        }
    }
}

pub fn handle_instruction_file(
    model: &mut Model,
    ctx: &Context<Model>,
    file: Option<GlooFile>,
) -> bool {
    let result = match file {
        Some(file) => model.upload.set_instruction_file(selected_file(file)),
        None => model.upload.clear_instruction_file(),
    };
    if let Err(e) = result {
        model.push_toast(ctx, ToastKind::Error, e.to_string());
    }
    true
}

pub fn handle_start_processing(model: &mut Model, ctx: &Context<Model>) -> bool {
    match model.upload.start_processing() {
        Ok(summary) => log::debug!("Summary ready: {}", summary),
        Err(e) => model.push_toast(ctx, ToastKind::Error, e.to_string()),
    }
    true
}

/// Back from the summary to editing.
pub fn handle_edit_upload(model: &mut Model) -> bool {
    let text = model.upload.instruction_text().to_string();
    model.upload.set_instruction_text(text).is_ok()
}

pub fn handle_confirm_upload(model: &mut Model, ctx: &Context<Model>) -> bool {
    let payload = match model.upload.begin_upload() {
        Ok(payload) => payload,
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, e.to_string());
            return true;
        }
    };
    log::info!("Uploading {} image(s)", payload.images.len());

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        let on_progress = link.callback(|(sent, total): (u64, u64)| Msg::UploadProgress(sent, total));
        let result = api.upload(&payload, on_progress).await;
        link.send_message(Msg::UploadFinished(result));
    });
    true
}

pub fn handle_upload_finished(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<UploadResponse, ApiError>,
) -> bool {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            log::error!("Upload failed: {}", e);
            if model.upload.fail().is_err() {
                log::warn!("Upload result arrived with no upload in flight");
            }
            model.push_toast(ctx, ToastKind::Error, format!("Upload failed: {}", e));
            return true;
        }
    };

    let batch_id = match model.upload.complete(&response) {
        Ok(batch_id) => batch_id,
        Err(e) => {
            log::warn!("Ignoring upload response for {}: {}", response.batch_id, e);
            return false;
        }
    };

    // Server URLs arrive with the first results sync.
    let images = model
        .upload
        .images()
        .iter()
        .map(|file| NewImage {
            original_name: file.name(),
            original_url: String::new(),
            size: file.size(),
        })
        .collect();
    let instructions = match model.upload.instruction_file() {
        Some(file) => format!("From file {}", file.name()),
        None => model.upload.instruction_text().trim().to_string(),
    };
    if let Err(e) = model
        .store
        .create_batch_with_images(&batch_id, &instructions, images)
    {
        log::warn!("Batch {} already tracked: {}", batch_id, e);
    }

    let user = model.user();
    model.store.add_log(
        ActivityType::Upload,
        "Uploaded images",
        &format!("{} image(s) uploaded as batch {}", response.image_count, batch_id),
        &user,
    );
    model.push_toast(ctx, ToastKind::Success, response.message.clone());
    model.upload.reset();
    handle_navigate(model, ctx, Page::Processing(batch_id))
}
