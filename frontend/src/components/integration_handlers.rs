use crate::api::ApiError;
use crate::{ConnectDialog, Model, Msg, ToastKind};
use shared::{
    ConnectionForm, CreateDamConnectionRequest, DamConnection, DamSystem, DamSystemCode,
    TestConnectionResponse, UpdateConnectionStatusRequest,
};
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

pub fn handle_load(model: &mut Model, ctx: &Context<Model>) -> bool {
    model.integrations_loading = true;

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::SystemsLoaded(api.get_dam_systems(false).await));
        link.send_message(Msg::ConnectionsLoaded(api.get_dam_connections().await));
    });
    true
}

pub fn handle_systems_loaded(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<Vec<DamSystem>, ApiError>,
) -> bool {
    match result {
        Ok(systems) => {
            log::debug!("Loaded {} DAM systems", systems.len());
            model.dam_systems = systems;
        }
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("Could not load DAM systems: {}", e)),
    }
    true
}

pub fn handle_connections_loaded(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<Vec<DamConnection>, ApiError>,
) -> bool {
    model.integrations_loading = false;
    match result {
        Ok(connections) => {
            model.store.replace_dam_connections(connections);
            if model.store.active_dam_connection().is_none() {
                let first_active = model
                    .store
                    .dam_connections()
                    .iter()
                    .find(|c| c.is_active)
                    .map(|c| c.connection_id.clone());
                if let Some(id) = first_active {
                    if let Err(e) = model.store.set_active_dam_connection(&id) {
                        log::warn!("Could not activate connection {}: {}", id, e);
                    }
                }
            }
        }
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("Could not load connections: {}", e)),
    }
    true
}

pub fn handle_open_connect(model: &mut Model, code: DamSystemCode) -> bool {
    let Some(system) = model
        .dam_systems
        .iter()
        .find(|s| s.system_code == code && s.is_active)
    else {
        log::warn!("No active DAM system {}", code);
        return false;
    };
    model.connect_dialog = Some(ConnectDialog {
        system: system.clone(),
        form: ConnectionForm::new(),
        testing: false,
        saving: false,
        last_test: None,
    });
    true
}

pub fn handle_test(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(dialog) = model.connect_dialog.as_mut() else {
        return false;
    };
    let request = match dialog.form.to_request(&dialog.system) {
        Ok(request) => request,
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, e.to_string());
            return true;
        }
    };
    dialog.testing = true;
    dialog.last_test = None;

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        let result = api.test_dam_connection(&request).await;
        link.send_message(Msg::TestDone(request, result));
    });
    true
}

pub fn handle_test_done(
    model: &mut Model,
    ctx: &Context<Model>,
    request: CreateDamConnectionRequest,
    result: Result<TestConnectionResponse, ApiError>,
) -> bool {
    let Some(dialog) = model.connect_dialog.as_mut() else {
        return false;
    };
    dialog.testing = false;

    match result {
        Ok(response) => {
            if response.success {
                dialog.form.mark_tested(request);
            }
            let kind = if response.success {
                ToastKind::Success
            } else {
                ToastKind::Error
            };
            let message = response.message.clone();
            dialog.last_test = Some(response);
            model.push_toast(ctx, kind, message);
        }
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("Connection test failed: {}", e)),
    }
    true
}

pub fn handle_save(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(dialog) = model.connect_dialog.as_mut() else {
        return false;
    };
    if !dialog.form.can_save(&dialog.system) {
        model.push_toast(ctx, ToastKind::Info, "Test the connection before saving".into());
        return true;
    }
    let request = match dialog.form.to_request(&dialog.system) {
        Ok(request) => request,
        Err(e) => {
            model.push_toast(ctx, ToastKind::Error, e.to_string());
            return true;
        }
    };
    dialog.saving = true;

    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        link.send_message(Msg::ConnectionSaved(api.create_dam_connection(&request).await));
    });
    true
}

pub fn handle_saved(
    model: &mut Model,
    ctx: &Context<Model>,
    result: Result<DamConnection, ApiError>,
) -> bool {
    match result {
        Ok(connection) => {
            let name = connection.display_name();
            model.store.add_dam_connection(connection);
            model.connect_dialog = None;
            model.push_toast(ctx, ToastKind::Success, format!("Connected {}", name));
        }
        Err(e) => {
            if let Some(dialog) = model.connect_dialog.as_mut() {
                dialog.saving = false;
            }
            model.push_toast(ctx, ToastKind::Error, format!("Could not save connection: {}", e));
        }
    }
    true
}

pub fn handle_set_active(model: &mut Model, ctx: &Context<Model>, connection_id: String) -> bool {
    if let Err(e) = model.store.set_active_dam_connection(&connection_id) {
        model.push_toast(ctx, ToastKind::Error, e.to_string());
    }
    true
}

pub fn handle_remove(model: &mut Model, ctx: &Context<Model>, connection_id: String) -> bool {
    let request = UpdateConnectionStatusRequest {
        connection_id: connection_id.clone(),
        is_active: false,
        is_deleted: true,
    };
    let api = model.api();
    let link = ctx.link().clone();
    spawn_local(async move {
        let result = api.update_dam_connection_status(&request).await;
        link.send_message(Msg::ConnectionRemoved(connection_id, result));
    });
    false
}

pub fn handle_removed(
    model: &mut Model,
    ctx: &Context<Model>,
    connection_id: String,
    result: Result<(), ApiError>,
) -> bool {
    let outcome = result
        .map_err(|e| e.to_string())
        .and_then(|()| {
            model
                .store
                .remove_dam_connection(&connection_id)
                .map_err(|e| e.to_string())
        });
    match outcome {
        Ok(connection) => model.push_toast(
            ctx,
            ToastKind::Success,
            format!("Removed {}", connection.display_name()),
        ),
        Err(e) => model.push_toast(ctx, ToastKind::Error, format!("Could not remove connection: {}", e)),
    }
    true
}
