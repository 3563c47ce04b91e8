pub mod dispatch;
pub mod engine;
pub mod rules;
pub mod sink;

pub use dispatch::{dispatch_pending, DispatchSummary};
pub use engine::{build_alert, AlertContext, AlertEvent};
pub use rules::AlertEventKind;
pub use sink::{sinks_from_config, AlertSink, StdoutSink, WebhookSink};
