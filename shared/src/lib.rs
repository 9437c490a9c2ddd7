pub mod api;
pub mod dam;
pub mod error;
pub mod model;
pub mod processing;
pub mod session;
pub mod store;
pub mod upload;

pub use api::*;
pub use dam::{
    ConnectionForm, CreateDamConnectionRequest, DamConnection, DamField, DamSystem, DamSystemCode,
    FieldKind,
};
pub use error::{ActionError, DamError, SessionError, StoreError, UploadError};
pub use model::*;
pub use processing::{ActionKind, DeleteOutcome, ProcessingView, POLL_INTERVAL_MS};
pub use session::{Session, SessionProvider, SessionStorage, SessionUser};
pub use store::{BatchStore, NewImage};
pub use upload::{format_size, Instructions, UploadFile, UploadFlow, UploadPayload, UploadStage};
