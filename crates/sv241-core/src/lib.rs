// sv241-core: Session logic between sv241-api and the presentation layer.

pub mod config;
pub mod connection;
pub mod edit_buffer;
pub mod error;
pub mod heater;
pub mod log_stream;
pub mod model;
pub mod scheduler;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SessionConfig;
pub use connection::{ConnectionSnapshot, ConnectionState, ConnectionStateMachine};
pub use edit_buffer::{
    ConfigEditBuffer, ConfigField, ConfigSection, FieldValue, Persisted, SaveOutcome, SaveTicket,
};
pub use error::CoreError;
pub use heater::{HeaterConstraintSolver, HeaterSlot, HeaterSolution, ModeSet, SlotOutcome};
pub use log_stream::{AutoScroll, LiveLogStream, LogBuffer, LogLine, LogLineKind, Severity};
pub use model::TelemetrySample;
pub use scheduler::{PollTarget, PollingScheduler};
pub use session::DashboardSession;

// Wire types consumers need without depending on sv241-api directly.
pub use sv241_api::models::{
    DeviceCommand, HeaterMode, HistoryQuery, LiveStatus, PowerStatus, ProxyConfig, RemoteConfig,
    SettingsResponse, StartupState,
};
