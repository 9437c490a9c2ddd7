use super::utils::{click_element, debounce, extract_image_files};
use crate::{Model, Msg, SelectedFile, ToastKind};
use gloo_file::File as GlooFile;
use shared::{format_size, UploadFile, UploadStage};
use web_sys::{DragEvent, HtmlInputElement, HtmlTextAreaElement};
use yew::prelude::*;

pub fn render_upload_page(model: &Model, ctx: &Context<Model>) -> Html {
    match model.upload.stage() {
        UploadStage::Uploading => render_upload_progress(model),
        UploadStage::SummaryShown => render_summary(model, ctx),
        _ => html! {
            <div class="upload-section">
                { render_file_input_area(model, ctx) }
                { render_previews(model, ctx) }
                { render_instructions(model, ctx) }
            </div>
        },
    }
}

fn render_file_input_area(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let handle_change = link.batch_callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let (images, skipped) = input
            .files()
            .as_ref()
            .map(extract_image_files)
            .unwrap_or_default();
        input.set_value("");

        let mut messages: Vec<Msg> = skipped
            .into_iter()
            .map(|name| Msg::Notify(ToastKind::Info, format!("Skipped non-image file: {}", name)))
            .collect();
        if images.is_empty() {
            messages.push(Msg::Notify(ToastKind::Error, "No valid image files selected.".into()));
        } else {
            messages.push(Msg::FilesAdded(images));
        }
        messages
    });

    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });
    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });
    let handle_drop = link.callback(Msg::HandleDrop);

    html! {
        <>
            <input
                type="file"
                id="file-input"
                multiple=true
                accept="image/*"
                style="display: none;"
                onchange={handle_change}
            />
            <div
                id="drop-zone"
                class={classes!("upload-area", model.is_dragging.then_some("drag-over"))}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
                onclick={debounce(300, || click_element("file-input"))}
            >
                <div class="upload-placeholder">
                    <i class="fa-solid fa-cloud-arrow-up"></i>
                    <p>{"Drag & drop images here, paste, or click"}</p>
                    <p class="file-types">{"Supported formats: JPG, PNG, WEBP, GIF"}</p>
                </div>
            </div>
        </>
    }
}

fn render_previews(model: &Model, ctx: &Context<Model>) -> Html {
    let images = model.upload.images();
    if images.is_empty() {
        return html! {};
    }
    let total: u64 = images.iter().map(UploadFile::size).sum();

    html! {
        <div id="preview-container">
            <h2>{ format!("{} image(s), {}", images.len(), format_size(total)) }</h2>
            <div id="image-previews">
                { for images.iter().enumerate().map(|(index, file)| render_preview_item(ctx, index, file)) }
            </div>
        </div>
    }
}

fn render_preview_item(ctx: &Context<Model>, index: usize, file: &SelectedFile) -> Html {
    let name = file.name();
    html! {
        <div class="preview-item" key={file.id.to_string()} title={name.clone()}>
            <img src={file.preview_url.to_string()} alt={name} />
            <button
                class="remove-btn"
                title="Remove this image"
                onclick={ctx.link().callback(move |e: MouseEvent| {
                    e.stop_propagation();
                    Msg::RemoveImage(index)
                })}
            >
                <i class="fa-solid fa-times" style="font-size: 10px;"></i>
            </button>
        </div>
    }
}

fn render_instructions(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let on_text = link.callback(|e: InputEvent| {
        let area: HtmlTextAreaElement = e.target_unchecked_into();
        Msg::InstructionText(area.value())
    });
    let on_file = link.callback(|e: Event| {
        let input: HtmlInputElement = e.target_unchecked_into();
        let file = input.files().and_then(|list| list.item(0)).map(GlooFile::from);
        input.set_value("");
        Msg::InstructionFile(file)
    });
    let ready = model.upload.stage() == UploadStage::InstructionsProvided;

    html! {
        <div class="instructions">
            <label for="instruction-text">{"What should we do with these images?"}</label>
            <textarea
                id="instruction-text"
                rows="4"
                placeholder="e.g. Remove the background and brighten the product"
                value={model.upload.instruction_text().to_string()}
                oninput={on_text}
                disabled={model.upload.instruction_file().is_some()}
            />
            <div class="instruction-file">
                <input
                    type="file"
                    id="instruction-file-input"
                    accept=".txt,.md,.pdf,.doc,.docx"
                    style="display: none;"
                    onchange={on_file}
                />
                {
                    match model.upload.instruction_file() {
                        Some(file) => html! {
                            <span class="attached-file">
                                <i class="fa-solid fa-paperclip"></i>
                                { format!(" {} ({})", file.name(), format_size(file.size())) }
                                <button class="remove-btn" onclick={link.callback(|_| Msg::InstructionFile(None))}>
                                    <i class="fa-solid fa-times"></i>
                                </button>
                            </span>
                        },
                        None => html! {
                            <button class="secondary-btn" onclick={debounce(300, || click_element("instruction-file-input"))}>
                                <i class="fa-solid fa-paperclip"></i>{" Attach instruction file"}
                            </button>
                        },
                    }
                }
            </div>
            <div class="button-container">
                <button
                    class="analyze-btn"
                    disabled={!ready}
                    onclick={link.callback(|_| Msg::StartProcessing)}
                >
                    <i class="fa-solid fa-wand-magic-sparkles"></i>{" Start Processing"}
                </button>
            </div>
        </div>
    }
}

fn render_summary(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    html! {
        <div class="summary-card">
            <h2>{"Ready to process"}</h2>
            <p class="summary-text">{ model.upload.summary().unwrap_or_default() }</p>
            <div class="button-container">
                <button class="secondary-btn" onclick={link.callback(|_| Msg::EditUpload)}>
                    <i class="fa-solid fa-pen"></i>{" Edit"}
                </button>
                <button class="analyze-btn" onclick={link.callback(|_| Msg::ConfirmUpload)}>
                    <i class="fa-solid fa-check"></i>{" Confirm & Upload"}
                </button>
            </div>
        </div>
    }
}

fn render_upload_progress(model: &Model) -> Html {
    let progress = model.upload.progress();
    html! {
        <div class="upload-progress">
            <p>{ format!("Uploading {} image(s)...", model.upload.images().len()) }</p>
            <div class="progress-bar">
                <div class="progress-fill" style={format!("width: {}%;", progress)}></div>
            </div>
            <p class="progress-label">{ format!("{}%", progress) }</p>
        </div>
    }
}
