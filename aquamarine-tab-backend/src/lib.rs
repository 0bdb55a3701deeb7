//! Aquamarine backend plugin for the Shift nested-session protocol.
//!
//! Exposes virtual monitors, keyboard/pointer/touch/tablet/switch input, and
//! DMA-BUF frame presentation over a single session socket (`tab_client_*`,
//! see [`sys`]). The present loop runs in one of two mutually exclusive
//! pacing modes — see [`output::PacingMode`] — chosen once at backend
//! startup.
//!
//! The crate never spawns a thread or touches `async`: everything is driven
//! from the host's own event loop via [`backend::Backend::poll_fds`],
//! [`backend::Backend::dispatch_events`], and [`backend::Backend::flush_pending_submits`].

pub mod backend;
pub mod buffer;
pub mod client;
pub mod error;
pub mod format;
pub mod host;
pub mod input;
pub mod mode;
pub mod output;
pub mod pending_submit;
pub mod swapchain;
pub mod sys;

pub use backend::{Allocator, Backend, BackendConfig, BackendError, Capabilities};
pub use buffer::Buffer;
pub use client::{MonitorInfo, SessionClient, SessionEvent, SessionTransport};
pub use error::SessionError;
pub use format::DrmFormat;
pub use host::{IdleScheduler, PresentEvent, ScheduleFrameReason};
pub use input::{DeviceKind, InputEvent, VirtualDevice};
pub use mode::Mode;
pub use output::{CommitError, Output, PacingMode};
