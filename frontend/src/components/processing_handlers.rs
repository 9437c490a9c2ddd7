use crate::api::ApiError;
use crate::{Model, Msg, ToastKind};
use shared::{
    ActionKind, Batch, DamConfig, DamUploadRequest, DamUploadResponse, ExportResponse, ExportType,
    ProcessingView, RetouchResponse, StatusResponse,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

pub fn handle_poll_tick(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(view) = model.processing.as_mut() else {
        model.poller = None;
        return false;
    };
    if let Some(batch) = model.store.get_batch(view.batch_id()) {
        if !view.should_poll(batch) {
            model.poller = None;
            return false;
        }
    }
    if view.begin(ActionKind::Refresh).is_err() {
        return false;
    }

    let batch_id = view.batch_id().to_string();
    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        let result = api.get_status(&batch_id).await;
        link.send_message(Msg::StatusLoaded(batch_id, result));
    });
    false
}

fn fetch_results(model: &Model, ctx: &Context<Model>, batch_id: String) {
    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::ResultsLoaded(api.get_results(&batch_id).await));
    });
}

pub fn handle_status_loaded(
    model: &mut Model,
    ctx: &Context<Model>,
    batch_id: String,
    result: Result<StatusResponse, ApiError>,
) -> bool {
    let Some(view) = model.processing.as_mut().filter(|v| v.batch_id() == batch_id) else {
        return false;
    };
    view.finish(ActionKind::Refresh);

    match result {
        Ok(status) => {
            let changed = view.observe_status(status.status);
            let (known, progressed) = match model.store.apply_status(&batch_id, &status) {
                Ok(progressed) => (true, progressed),
                Err(_) => (false, false),
            };
            if progressed {
                log::debug!("Batch {} at {}%", batch_id, status.progress);
            }
            // Results carry per-image URLs; only refetch when the batch moved.
            if ProcessingView::needs_results(changed, known, progressed) {
                fetch_results(model, ctx, batch_id);
            }
            if status.status.is_terminal() {
                log::info!("Batch finished with status {}", status.status);
                model.poller = None;
            }
            true
        }
        Err(ApiError::Server { status: 404, .. }) => {
            model.poller = None;
            model.push_toast(ctx, ToastKind::Error, format!("Batch {} was not found", batch_id));
            true
        }
        Err(e) => {
            log::warn!("Status poll for {} failed: {}", batch_id, e);
            false
        }
    }
}

pub fn handle_results_loaded(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<Batch, ApiError>,
) -> bool {
    match result {
        Ok(batch) => {
            let batch_id = batch.id.clone();
            model.store.sync_batch(batch);
            if let (Some(view), Some(batch)) =
                (model.processing.as_mut(), model.store.get_batch(&batch_id))
            {
                view.prune(batch);
            }
            true
        }
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, format!("Could not load results: {}", e));
            true
        }
    }
}

pub fn handle_select_all(model: &mut Model) -> bool {
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    match model.store.get_batch(view.batch_id()) {
        Some(batch) => {
            view.select_all(batch);
            true
        }
        None => false,
    }
}

pub fn handle_approve_selected(model: &mut Model, ctx: &Context<Model>) -> bool {
    let user = model.user();
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    let approved = view.approve_selected(&mut model.store, &user);
    let message = if approved == 0 {
        (ToastKind::Info, "Nothing to approve: select processed images first".to_string())
    } else {
        (ToastKind::Success, format!("Approved {} image(s)", approved))
    };
    model.push_toast(ctx, message.0, message.1);
    true
}

pub fn handle_delete_selected(model: &mut Model, ctx: &Context<Model>) -> bool {
    let user = model.user();
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    let outcome = view.delete_selected(&mut model.store, &user);
    if outcome.deleted > 0 {
        model.push_toast(
            ctx,
            ToastKind::Success,
            format!("Deleted {} image(s)", outcome.deleted),
        );
    }
    if outcome.locked > 0 {
        model.push_toast(
            ctx,
            ToastKind::Info,
            format!("{} approved image(s) are locked and were kept", outcome.locked),
        );
    }
    true
}

pub fn trigger_download(url: &str) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let Ok(anchor) = document.create_element("a") else {
        return;
    };
    let name = url.rsplit('/').next().unwrap_or("image");
    if anchor.set_attribute("href", url).is_err()
        || anchor.set_attribute("download", name).is_err()
    {
        log::warn!("Could not prepare download of {}", url);
        return;
    }
    if let Ok(anchor) = anchor.dyn_into::<web_sys::HtmlElement>() {
        anchor.click();
    }
}

pub fn handle_download_selected(model: &mut Model, ctx: &Context<Model>) -> bool {
    let user = model.user();
    let Some(view) = model.processing.as_ref() else {
        return false;
    };
    let Some(batch) = model.store.get_batch(view.batch_id()) else {
        return false;
    };
    let targets = view.download_targets(batch);
    if targets.is_empty() {
        model.push_toast(ctx, ToastKind::Info, "No processed images to download".into());
        return true;
    }
    for url in &targets {
        trigger_download(url);
    }
    view.record_export(&mut model.store, ExportType::Download, targets.len(), &user);
    true
}

pub fn handle_submit_retouch(model: &mut Model, ctx: &Context<Model>) -> bool {
    let prompt = model.retouch_prompt.trim().to_string();
    let Some(image_id) = model.retouch_target.clone() else {
        return false;
    };
    if prompt.is_empty() {
        model.push_toast(ctx, ToastKind::Error, "Describe the change you want".into());
        return true;
    }
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    if let Err(e) = view.begin(ActionKind::Retouch) {
        model.push_toast(ctx, ToastKind::Info, e.to_string());
        return true;
    }

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        let result = api.retouch(&image_id, &prompt).await;
        link.send_message(Msg::RetouchDone(image_id, prompt, result));
    });
    true
}

pub fn handle_retouch_done(
    model: &mut Model,
    ctx: &Context<Model>,
    image_id: String,
    prompt: String,
    result: Result<RetouchResponse, ApiError>,
) -> bool {
    let user = model.user();
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    view.finish(ActionKind::Retouch);

    let outcome = result.map_err(|e| e.to_string()).and_then(|response| {
        view.record_retouch(&mut model.store, &image_id, &response, &prompt, &user)
            .map_err(|e| e.to_string())
    });
    match outcome {
        Ok(version) => {
            log::info!("Retouched {} as version {}", image_id, version.id);
            model.retouch_target = None;
            model.retouch_prompt.clear();
            model.push_toast(ctx, ToastKind::Success, "Retouch applied".into());
        }
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("Retouch failed: {}", e)),
    }
    true
}

pub fn handle_export_all(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    let Some(batch) = model.store.get_batch(view.batch_id()) else {
        return false;
    };
    let request = view.export_request(batch);
    if let Err(e) = view.begin(ActionKind::Export) {
        model.push_toast(ctx, ToastKind::Info, e.to_string());
        return true;
    }

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::ExportDone(api.export(&request).await));
    });
    true
}

pub fn handle_export_done(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<ExportResponse, ApiError>,
) -> bool {
    let user = model.user();
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    view.finish(ActionKind::Export);

    match result {
        Ok(response) => {
            for url in response.download_urls.iter().flatten() {
                trigger_download(url);
            }
            view.record_export(&mut model.store, ExportType::Download, response.exported, &user);
            model.push_toast(
                ctx,
                ToastKind::Success,
                format!("Exported {} image(s)", response.exported),
            );
        }
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("Export failed: {}", e)),
    }
    true
}

pub fn handle_send_to_dam(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(connection_id) = model
        .store
        .active_dam_connection()
        .map(|c| c.connection_id.clone())
    else {
        model.push_toast(
            ctx,
            ToastKind::Info,
            "Choose an active DAM connection on the Integrations page".into(),
        );
        return true;
    };
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    let Some(batch) = model.store.get_batch(view.batch_id()) else {
        return false;
    };
    let image_ids: Vec<String> = batch
        .live_images()
        .filter(|img| img.is_processed())
        .filter(|img| view.selected().is_empty() || view.is_selected(&img.id))
        .map(|img| img.id.clone())
        .collect();
    if image_ids.is_empty() {
        model.push_toast(ctx, ToastKind::Info, "No processed images to send".into());
        return true;
    }
    let request = DamUploadRequest {
        image_ids,
        dam_config: DamConfig { connection_id },
        batch_id: batch.id.clone(),
    };
    if let Err(e) = view.begin(ActionKind::SendToDam) {
        model.push_toast(ctx, ToastKind::Info, e.to_string());
        return true;
    }

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::DamSent(api.upload_to_dam(&request).await));
    });
    true
}

pub fn handle_dam_sent(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<DamUploadResponse, ApiError>,
) -> bool {
    let user = model.user();
    let Some(view) = model.processing.as_mut() else {
        return false;
    };
    view.finish(ActionKind::SendToDam);

    match result {
        Ok(response) => {
            view.record_export(&mut model.store, ExportType::Dam, response.uploaded.len(), &user);
            let mut message = format!("Sent {} image(s) to DAM", response.uploaded.len());
            if !response.skipped.is_empty() {
                message.push_str(&format!(", skipped {}", response.skipped.len()));
            }
            model.push_toast(ctx, ToastKind::Success, message);
        }
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("DAM upload failed: {}", e)),
    }
    true
}
