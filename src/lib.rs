// Library exports for the popout window manager

pub mod bus;
pub mod child;
pub mod config;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod host;
pub mod manager;
pub mod message;
pub mod placement;
pub mod reaper;
pub mod registry;
pub mod time;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use child::{is_popout_url, ChildEvent, ChildLayout, OpenerPort, PopoutChild};
pub use config::{ManagerConfig, WindowDefaults};
pub use error::PopoutError;
pub use generation::{Generation, RequestGeneration};
pub use handlers::{LifecycleEvent, SubscriptionId};
pub use host::{HostError, ScreenSize, WindowEvent, WindowHandle, WindowHost};
pub use manager::PopoutManager;
pub use message::{InboundMessage, PopoutMessage};
pub use placement::{OpenOptions, ResolvedOptions, WindowMode};
pub use reaper::StaleWindowReaper;
pub use registry::{WindowId, WindowInfo};
pub use time::{Clock, ManualClock, SystemClock};

// Poisoning is ignored: no critical section leaves the maps half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
