use super::utils::{debounce, render_loading_label};
use crate::{Model, Msg};
use shared::{ActionKind, Batch, Image, ImageStatus, ProcessingView};
use web_sys::HtmlTextAreaElement;
use yew::prelude::*;

pub fn render_processing_page(model: &Model, ctx: &Context<Model>, batch_id: &str) -> Html {
    let (Some(view), Some(batch)) = (model.processing.as_ref(), model.store.get_batch(batch_id))
    else {
        return html! {
            <div class="loading-preview">
                <i class="fa-solid fa-spinner fa-spin fa-2x"></i>
                <p>{ format!("Loading batch {}...", batch_id) }</p>
            </div>
        };
    };

    html! {
        <div class="processing-page">
            { render_batch_header(batch) }
            { render_toolbar(model, ctx, view, batch) }
            <div class="results-grid">
                { for batch.live_images().map(|img| render_image_card(ctx, view, img)) }
            </div>
            { render_retouch_dialog(model, ctx, view) }
        </div>
    }
}

fn render_batch_header(batch: &Batch) -> Html {
    let order = batch.to_order();
    html! {
        <div class="batch-header">
            <h2>{ &batch.name }</h2>
            <p class="batch-instructions">{ &batch.instructions }</p>
            <div class="progress-bar">
                <div class="progress-fill" style={format!("width: {}%;", batch.progress)}></div>
            </div>
            <p class="batch-stats">
                { format!(
                    "{} | {}% | {} of {} processed | {} approved | {} retouched",
                    batch.status,
                    batch.progress,
                    order.processed_count,
                    order.total_images,
                    order.approved_count,
                    order.retouch_count,
                ) }
            </p>
        </div>
    }
}

fn render_toolbar(model: &Model, ctx: &Context<Model>, view: &ProcessingView, batch: &Batch) -> Html {
    let link = ctx.link().clone();
    let selected = view.selected().len();
    let has_dam = model.store.active_dam_connection().is_some();
    let nothing_processed = !batch.live_images().any(Image::is_processed);

    html! {
        <div class="toolbar">
            <span class="selection-count">{ format!("{} selected", selected) }</span>
            <button class="secondary-btn" onclick={link.callback(|_| Msg::SelectAll)}>{"Select all"}</button>
            <button class="secondary-btn" disabled={selected == 0} onclick={link.callback(|_| Msg::ClearSelection)}>
                {"Clear"}
            </button>
            <button class="analyze-btn" disabled={selected == 0} onclick={link.callback(|_| Msg::ApproveSelected)}>
                <i class="fa-solid fa-check"></i>{" Approve"}
            </button>
            <button class="danger-btn" disabled={selected == 0} onclick={link.callback(|_| Msg::DeleteSelected)}>
                <i class="fa-solid fa-trash"></i>{" Delete"}
            </button>
            <button class="secondary-btn" disabled={nothing_processed} onclick={link.callback(|_| Msg::DownloadSelected)}>
                <i class="fa-solid fa-download"></i>{" Download"}
            </button>
            <button
                class="secondary-btn"
                disabled={nothing_processed || view.is_running(ActionKind::Export)}
                onclick={debounce(300, {
                    let link = link.clone();
                    move || link.send_message(Msg::ExportAll)
                })}
            >
                { render_loading_label(view.is_running(ActionKind::Export), "Export all", "Exporting") }
            </button>
            <button
                class="analyze-btn"
                disabled={!has_dam || nothing_processed || view.is_running(ActionKind::SendToDam)}
                title={if has_dam { "Send processed images to the active DAM connection" } else { "No active DAM connection" }}
                onclick={debounce(300, {
                    let link = link.clone();
                    move || link.send_message(Msg::SendToDam)
                })}
            >
                { render_loading_label(view.is_running(ActionKind::SendToDam), "Send to DAM", "Sending") }
            </button>
        </div>
    }
}

fn status_badge(status: ImageStatus) -> Html {
    let class = match status {
        ImageStatus::Pending => "badge pending",
        ImageStatus::Processed => "badge processed",
        ImageStatus::Approved => "badge approved",
        ImageStatus::Amendment => "badge amendment",
        ImageStatus::Deleted => "badge deleted",
    };
    html! { <span class={class}>{ status.to_string() }</span> }
}

fn render_image_card(ctx: &Context<Model>, view: &ProcessingView, image: &Image) -> Html {
    let link = ctx.link();
    let id = image.id.clone();
    let src = image
        .processed_url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| Some(image.original_url.clone()).filter(|u| !u.is_empty()));
    let can_retouch = image.is_processed() && !image.is_locked();
    let selected = view.is_selected(&image.id);

    html! {
        <div class={classes!("result-card", selected.then_some("selected"))} key={image.id.clone()}>
            <label class="select-box">
                <input
                    type="checkbox"
                    checked={selected}
                    onchange={link.callback({
                        let id = id.clone();
                        move |_| Msg::ToggleSelect(id.clone())
                    })}
                />
            </label>
            {
                match src {
                    Some(src) => html! { <img {src} alt={image.original_name.clone()} /> },
                    None => html! { <div class="preview-placeholder preview-placeholder-centered">{"..."}</div> },
                }
            }
            <div class="result-meta">
                <span class="file-name">{ &image.original_name }</span>
                { status_badge(image.status) }
                if let Some(latest) = image.latest_version() {
                    <span class="version-label">
                        { format!("{} of {}", latest.label(), image.versions.len()) }
                    </span>
                }
            </div>
            <button
                class="secondary-btn"
                disabled={!can_retouch}
                onclick={link.callback(move |_| Msg::OpenRetouch(id.clone()))}
            >
                <i class="fa-solid fa-paintbrush"></i>{" Retouch"}
            </button>
        </div>
    }
}

fn render_retouch_dialog(model: &Model, ctx: &Context<Model>, view: &ProcessingView) -> Html {
    let Some(image_id) = model.retouch_target.as_ref() else {
        return html! {};
    };
    let link = ctx.link();
    let running = view.is_running(ActionKind::Retouch);
    let on_input = link.callback(|e: InputEvent| {
        let area: HtmlTextAreaElement = e.target_unchecked_into();
        Msg::RetouchPrompt(area.value())
    });

    html! {
        <div class="modal-backdrop">
            <div class="modal">
                <h3>{ format!("Retouch {}", image_id) }</h3>
                <textarea
                    rows="3"
                    placeholder="e.g. Make the shadow softer"
                    value={model.retouch_prompt.clone()}
                    oninput={on_input}
                    disabled={running}
                />
                <div class="button-container">
                    <button class="secondary-btn" disabled={running} onclick={link.callback(|_| Msg::CloseRetouch)}>
                        {"Cancel"}
                    </button>
                    <button class="analyze-btn" disabled={running} onclick={link.callback(|_| Msg::SubmitRetouch)}>
                        { render_loading_label(running, "Apply", "Retouching") }
                    </button>
                </div>
            </div>
        </div>
    }
}
