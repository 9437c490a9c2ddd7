use super::utils::render_loading_label;
use crate::{ConnectDialog, Model, Msg};
use shared::{DamConnection, DamField, DamSystem};
use web_sys::HtmlInputElement;
use yew::prelude::*;

pub fn render_integrations_page(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <div class="integrations-page">
            <h2>{"DAM integrations"}</h2>
            if model.integrations_loading {
                <div class="loading-preview">
                    <i class="fa-solid fa-spinner fa-spin"></i>
                    <p>{"Loading integrations..."}</p>
                </div>
            }
            { render_connections(model, ctx) }
            <div class="system-grid">
                { for model.dam_systems.iter().map(|system| render_system_card(ctx, system)) }
            </div>
            if let Some(dialog) = model.connect_dialog.as_ref() {
                { render_connect_dialog(ctx, dialog) }
            }
        </div>
    }
}

fn render_connections(model: &Model, ctx: &Context<Model>) -> Html {
    let connections = model.store.dam_connections();
    if connections.is_empty() {
        return html! { <p class="empty-hint">{"No connections yet. Pick a system below to connect one."}</p> };
    }
    let active_id = model
        .store
        .active_dam_connection()
        .map(|c| c.connection_id.clone());

    html! {
        <div class="connection-list">
            <h3>{"Connections"}</h3>
            { for connections.iter().map(|c| render_connection_row(ctx, c, active_id.as_deref() == Some(c.connection_id.as_str()))) }
        </div>
    }
}

fn render_connection_row(ctx: &Context<Model>, connection: &DamConnection, is_current: bool) -> Html {
    let link = ctx.link();
    let activate_id = connection.connection_id.clone();
    let remove_id = connection.connection_id.clone();

    html! {
        <div class={classes!("connection-row", is_current.then_some("current"))} key={connection.connection_id.clone()}>
            <span class="connection-name">{ connection.display_name() }</span>
            if !connection.is_active {
                <span class="badge deleted">{"inactive"}</span>
            }
            if is_current {
                <span class="badge approved">{"upload target"}</span>
            } else {
                <button
                    class="secondary-btn"
                    disabled={!connection.is_active}
                    onclick={link.callback(move |_| Msg::SetActiveConnection(activate_id.clone()))}
                >
                    {"Use for uploads"}
                </button>
            }
            <button class="danger-btn" onclick={link.callback(move |_| Msg::RemoveConnection(remove_id.clone()))}>
                <i class="fa-solid fa-trash"></i>
            </button>
        </div>
    }
}

fn render_system_card(ctx: &Context<Model>, system: &DamSystem) -> Html {
    let code = system.system_code;
    html! {
        <div class={classes!("system-card", (!system.is_active).then_some("disabled"))} key={code.to_string()}>
            <h4>{ &system.name }</h4>
            <p>{ &system.description }</p>
            if system.is_active {
                <button class="analyze-btn" onclick={ctx.link().callback(move |_| Msg::OpenConnect(code))}>
                    <i class="fa-solid fa-plug"></i>{" Connect"}
                </button>
            } else {
                <span class="badge pending">{"Coming soon"}</span>
            }
        </div>
    }
}

fn render_field(ctx: &Context<Model>, dialog: &ConnectDialog, field: &DamField) -> Html {
    let key = field.key.clone();
    let oninput = ctx.link().callback(move |e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        Msg::FormInput(key.clone(), input.value())
    });
    let label = if field.required {
        format!("{} *", field.label)
    } else {
        field.label.clone()
    };

    html! {
        <div class="form-field" key={field.key.clone()}>
            <label for={format!("dam-{}", field.key)}>{ label }</label>
            <input
                id={format!("dam-{}", field.key)}
                type={field.kind.input_type()}
                placeholder={field.placeholder.clone().unwrap_or_default()}
                value={dialog.form.value(&field.key).to_string()}
                {oninput}
            />
        </div>
    }
}

fn render_connect_dialog(ctx: &Context<Model>, dialog: &ConnectDialog) -> Html {
    let link = ctx.link();
    let busy = dialog.testing || dialog.saving;
    let can_save = dialog.form.can_save(&dialog.system);

    html! {
        <div class="modal-backdrop">
            <div class="modal">
                <h3>{ format!("Connect {}", dialog.system.name) }</h3>
                { for dialog.system.fields.iter().map(|f| render_field(ctx, dialog, f)) }
                if let Some(result) = dialog.last_test.as_ref() {
                    <p class={if result.success { "test-result success" } else { "test-result error" }}>
                        { &result.message }
                    </p>
                }
                <div class="button-container">
                    <button class="secondary-btn" disabled={busy} onclick={link.callback(|_| Msg::CloseConnect)}>
                        {"Cancel"}
                    </button>
                    <button class="secondary-btn" disabled={busy} onclick={link.callback(|_| Msg::TestConnection)}>
                        { render_loading_label(dialog.testing, "Test connection", "Testing") }
                    </button>
                    <button class="analyze-btn" disabled={busy || !can_save} onclick={link.callback(|_| Msg::SaveConnection)}>
                        { render_loading_label(dialog.saving, "Save", "Saving") }
                    </button>
                </div>
            </div>
        </div>
    }
}
