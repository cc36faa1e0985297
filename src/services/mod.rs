pub mod flash_lifecycle;
pub mod notifier;
pub mod payout;
pub mod spike_detector;
pub mod trend_orchestrator;

pub use notifier::{Notification, NotificationBus};
pub use payout::{calculate_payouts, PayoutOutcome};
pub use spike_detector::{SpikeCheck, VelocitySpikeDetector};
pub use trend_orchestrator::{OrchestratorConfig, TrendOrchestrator};
