pub mod controller;
pub mod interrupt;
pub mod session;
pub mod state;
pub mod watchdog;

pub use controller::{TurnConfig, TurnController};
pub use interrupt::PlaybackInterruptMonitor;
pub use session::{RecordingSession, Utterance};
pub use state::{SessionSnapshot, SharedSession, TurnEvent, TurnState};
pub use watchdog::{SilenceConfig, SilenceWatchdog, WatchdogEvent};
