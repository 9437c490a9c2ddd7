mod api;
mod browser_storage;
mod components {
    pub mod activity_log;
    pub mod handlers;
    pub mod integration_handlers;
    pub mod integrations;
    pub mod navbar;
    pub mod processing_handlers;
    pub mod processing_view;
    pub mod toasts;
    pub mod upload_section;
    pub mod utils;
}

use api::{ApiClient, ApiError};
use browser_storage::BrowserStorage;
use components::{handlers, integration_handlers, processing_handlers};
use gloo_events::EventListener;
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_timers::callback::{Interval, Timeout};
use shared::{
    Batch, BatchStore, ConnectionForm, CreateDamConnectionRequest, DamConnection, DamSystem,
    DamSystemCode, DamUploadResponse, ExportResponse, ProcessingView,
    RetouchResponse, Session, SessionProvider, StatusResponse, TestConnectionResponse,
    UploadFile, UploadFlow, UploadResponse,
};
use wasm_bindgen::JsCast;
use web_sys::{ClipboardEvent, DragEvent};
use yew::prelude::*;

/// An image or instruction file picked in the browser.
#[derive(Clone)]
pub struct SelectedFile {
    pub id: u64,
    pub file: GlooFile,
    pub preview_url: ObjectUrl,
}

impl UploadFile for SelectedFile {
    fn name(&self) -> String {
        self.file.name()
    }

    fn size(&self) -> u64 {
        self.file.size()
    }

    fn mime_type(&self) -> String {
        self.file.raw_mime_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Upload,
    Processing(String),
    Integrations,
    Activity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
    _dismiss: Timeout,
}

/// The connect dialog of one DAM provider.
pub struct ConnectDialog {
    pub system: DamSystem,
    pub form: ConnectionForm,
    pub testing: bool,
    pub saving: bool,
    pub last_test: Option<TestConnectionResponse>,
}

pub enum Msg {
    Navigate(Page),

    // Session
    SessionChanged(Session),
    StorageChanged,
    SignOut,

    // Toasts
    Notify(ToastKind, String),
    DismissToast(u64),

    // Upload flow
    FilesAdded(Vec<GlooFile>),
    RemoveImage(usize),
    SetDragging(bool),
    HandleDrop(DragEvent),
    HandlePaste(ClipboardEvent),
    InstructionText(String),
    InstructionFile(Option<GlooFile>),
    StartProcessing,
    EditUpload,
    ConfirmUpload,
    UploadProgress(u64, u64),
    UploadFinished(Result<UploadResponse, ApiError>),

    // Processing view
    PollTick,
    StatusLoaded(String, Result<StatusResponse, ApiError>),
    ResultsLoaded(Result<Batch, ApiError>),
    ToggleSelect(String),
    SelectAll,
    ClearSelection,
    ApproveSelected,
    DeleteSelected,
    DownloadSelected,
    OpenRetouch(String),
    CloseRetouch,
    RetouchPrompt(String),
    SubmitRetouch,
    RetouchDone(String, String, Result<RetouchResponse, ApiError>),
    ExportAll,
    ExportDone(Result<ExportResponse, ApiError>),
    SendToDam,
    DamSent(Result<DamUploadResponse, ApiError>),

    // Integrations
    LoadIntegrations,
    SystemsLoaded(Result<Vec<DamSystem>, ApiError>),
    ConnectionsLoaded(Result<Vec<DamConnection>, ApiError>),
    OpenConnect(DamSystemCode),
    CloseConnect,
    FormInput(String, String),
    TestConnection,
    TestDone(CreateDamConnectionRequest, Result<TestConnectionResponse, ApiError>),
    SaveConnection,
    ConnectionSaved(Result<DamConnection, ApiError>),
    SetActiveConnection(String),
    RemoveConnection(String),
    ConnectionRemoved(String, Result<(), ApiError>),
}

pub struct Model {
    pub page: Page,
    pub store: BatchStore,
    pub session: Session,
    pub session_provider: SessionProvider<BrowserStorage>,
    pub toasts: Vec<Toast>,

    pub upload: UploadFlow<SelectedFile>,
    pub is_dragging: bool,

    pub processing: Option<ProcessingView>,
    pub poller: Option<Interval>,
    pub retouch_target: Option<String>,
    pub retouch_prompt: String,

    pub dam_systems: Vec<DamSystem>,
    pub connect_dialog: Option<ConnectDialog>,
    pub integrations_loading: bool,

    _paste_listener: Option<EventListener>,
    _storage_listener: Option<EventListener>,
}

impl Model {
    pub fn api(&self) -> ApiClient {
        ApiClient::new(self.session.auth_token.clone())
    }

    pub fn user(&self) -> String {
        self.session.display_name().to_string()
    }

    pub fn push_toast(&mut self, ctx: &Context<Self>, kind: ToastKind, message: String) {
        let id = components::utils::generate_id();
        let link = ctx.link().clone();
        let dismiss = Timeout::new(4000, move || link.send_message(Msg::DismissToast(id)));
        self.toasts.push(Toast {
            id,
            kind,
            message,
            _dismiss: dismiss,
        });
    }
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let mut session_provider = SessionProvider::load(BrowserStorage);
        let link = ctx.link().clone();
        session_provider.subscribe(move |session| {
            link.send_message(Msg::SessionChanged(session.clone()))
        });
        handlers::accept_login_redirect(&mut session_provider);

        let mut model = Self {
            page: Page::Upload,
            store: BatchStore::new(),
            session: session_provider.session().clone(),
            session_provider,
            toasts: Vec::new(),
            upload: UploadFlow::new(),
            is_dragging: false,
            processing: None,
            poller: None,
            retouch_target: None,
            retouch_prompt: String::new(),
            dam_systems: Vec::new(),
            connect_dialog: None,
            integrations_loading: false,
            _paste_listener: None,
            _storage_listener: None,
        };

        if let Some(window) = web_sys::window() {
            let link = ctx.link().clone();
            model._paste_listener = Some(EventListener::new(&window, "paste", move |event| {
                if let Some(clipboard_event) = event.dyn_ref::<ClipboardEvent>() {
                    link.send_message(Msg::HandlePaste(clipboard_event.clone()));
                }
            }));

            // Fires when another tab changes local storage.
            let link = ctx.link().clone();
            model._storage_listener = Some(EventListener::new(&window, "storage", move |_| {
                link.send_message(Msg::StorageChanged)
            }));
        } else {
            log::error!("No global window; paste and session sync are disabled");
        }

        model
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::Navigate(page) => handlers::handle_navigate(self, ctx, page),

            Msg::SessionChanged(session) => {
                self.session = session;
                true
            }
            Msg::StorageChanged => {
                self.session_provider.reload();
                false
            }
            Msg::SignOut => {
                self.session_provider.sign_out();
                false
            }

            Msg::Notify(kind, message) => {
                self.push_toast(ctx, kind, message);
                true
            }
            Msg::DismissToast(id) => {
                self.toasts.retain(|t| t.id != id);
                true
            }

            Msg::FilesAdded(files) => handlers::handle_files_added(self, ctx, files),
            Msg::RemoveImage(index) => handlers::handle_remove_image(self, ctx, index),
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => handlers::handle_drop(self, ctx, event),
            Msg::HandlePaste(event) => handlers::handle_paste(self, ctx, event),
            Msg::InstructionText(text) => handlers::handle_instruction_text(self, ctx, text),
            Msg::InstructionFile(file) => handlers::handle_instruction_file(self, ctx, file),
            Msg::StartProcessing => handlers::handle_start_processing(self, ctx),
            Msg::EditUpload => handlers::handle_edit_upload(self),
            Msg::ConfirmUpload => handlers::handle_confirm_upload(self, ctx),
            Msg::UploadProgress(sent, total) => {
                self.upload.record_progress(sent, total).is_ok()
            }
            Msg::UploadFinished(result) => handlers::handle_upload_finished(self, ctx, result),

            Msg::PollTick => processing_handlers::handle_poll_tick(self, ctx),
            Msg::StatusLoaded(batch_id, result) => {
                processing_handlers::handle_status_loaded(self, ctx, batch_id, result)
            }
            Msg::ResultsLoaded(result) => {
                processing_handlers::handle_results_loaded(self, ctx, result)
            }
            Msg::ToggleSelect(image_id) => {
                if let Some(view) = self.processing.as_mut() {
                    view.toggle(&image_id);
                }
                true
            }
            Msg::SelectAll => processing_handlers::handle_select_all(self),
            Msg::ClearSelection => {
                if let Some(view) = self.processing.as_mut() {
                    view.clear_selection();
                }
                true
            }
            Msg::ApproveSelected => processing_handlers::handle_approve_selected(self, ctx),
            Msg::DeleteSelected => processing_handlers::handle_delete_selected(self, ctx),
            Msg::DownloadSelected => processing_handlers::handle_download_selected(self, ctx),
            Msg::OpenRetouch(image_id) => {
                self.retouch_target = Some(image_id);
                self.retouch_prompt.clear();
                true
            }
            Msg::CloseRetouch => {
                self.retouch_target = None;
                true
            }
            Msg::RetouchPrompt(prompt) => {
                self.retouch_prompt = prompt;
                false
            }
            Msg::SubmitRetouch => processing_handlers::handle_submit_retouch(self, ctx),
            Msg::RetouchDone(image_id, prompt, result) => {
                processing_handlers::handle_retouch_done(self, ctx, image_id, prompt, result)
            }
            Msg::ExportAll => processing_handlers::handle_export_all(self, ctx),
            Msg::ExportDone(result) => processing_handlers::handle_export_done(self, ctx, result),
            Msg::SendToDam => processing_handlers::handle_send_to_dam(self, ctx),
            Msg::DamSent(result) => processing_handlers::handle_dam_sent(self, ctx, result),

            Msg::LoadIntegrations => integration_handlers::handle_load(self, ctx),
            Msg::SystemsLoaded(result) => {
                integration_handlers::handle_systems_loaded(self, ctx, result)
            }
            Msg::ConnectionsLoaded(result) => {
                integration_handlers::handle_connections_loaded(self, ctx, result)
            }
            Msg::OpenConnect(code) => integration_handlers::handle_open_connect(self, code),
            Msg::CloseConnect => {
                self.connect_dialog = None;
                true
            }
            Msg::FormInput(key, value) => {
                if let Some(dialog) = self.connect_dialog.as_mut() {
                    dialog.form.set(&key, value);
                    dialog.last_test = None;
                }
                true
            }
            Msg::TestConnection => integration_handlers::handle_test(self, ctx),
            Msg::TestDone(request, result) => {
                integration_handlers::handle_test_done(self, ctx, request, result)
            }
            Msg::SaveConnection => integration_handlers::handle_save(self, ctx),
            Msg::ConnectionSaved(result) => integration_handlers::handle_saved(self, ctx, result),
            Msg::SetActiveConnection(id) => {
                integration_handlers::handle_set_active(self, ctx, id)
            }
            Msg::RemoveConnection(id) => integration_handlers::handle_remove(self, ctx, id),
            Msg::ConnectionRemoved(id, result) => {
                integration_handlers::handle_removed(self, ctx, id, result)
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let content = match &self.page {
            Page::Upload => components::upload_section::render_upload_page(self, ctx),
            Page::Processing(batch_id) => {
                components::processing_view::render_processing_page(self, ctx, batch_id)
            }
            Page::Integrations => components::integrations::render_integrations_page(self, ctx),
            Page::Activity => components::activity_log::render_activity_page(self),
        };

        html! {
            <div class="container">
                { components::navbar::render_navbar(self, ctx) }
                <main class="main-content">
                    { content }
                </main>
                { components::toasts::render_toasts(&self.toasts, ctx.link()) }
                <footer class="app-footer">
                    <p>{"Retouch Studio | Fullstack Rust WASM"}</p>
                </footer>
            </div>
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
