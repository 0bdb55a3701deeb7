//! Root backend: owns the session client, every [`Output`], the Variant-A
//! submit queue, and the lazily created virtual input devices.
//!
//! Single-threaded cooperative model (§5): no background threads, no
//! `tokio`, no locks beyond the `RefCell` needed to let `Backend` be cloned
//! as a cheap handle (`Rc`) while still mutating shared state from plain
//! `&self` methods, matching how the host drives everything from one event
//! loop tick at a time.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::os::fd::RawFd;
use std::rc::Rc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use crate::buffer::Buffer;
use crate::client::{SessionClient, SessionEvent};
use crate::error::SessionError;
use crate::format::{DEFAULT_RENDER_FORMATS, DrmFormat};
use crate::host::{EventSink, IdleScheduler, ScheduleFrameReason};
use crate::input::{DeviceKind, VirtualDevice};
use crate::output::{CommitError, Output, PacingMode};
use crate::pending_submit::PendingSubmitQueue;

/// Host-supplied parameters for bringing up a session connection.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
	pub socket_path: Option<String>,
	pub token: Option<String>,
	/// Overrides pacing-mode resolution; if unset, falls back to
	/// `SHIFT_TAB_PACING` and then the compile-time default.
	pub pacing_mode: Option<PacingMode>,
}

fn resolve_pacing(config: &BackendConfig) -> PacingMode {
	if let Some(mode) = config.pacing_mode {
		return mode;
	}
	match std::env::var("SHIFT_TAB_PACING").as_deref() {
		Ok("frame_done") => PacingMode::FrameDone,
		_ => PacingMode::BufferReleased,
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
	/// The session exposes no hardware cursor plane; cursor pixels must be
	/// composited into the frame buffer by the host.
	pub software_cursor_only: bool,
	pub supports_dmabuf: bool,
}

/// Host allocator handed back from `preferred_allocator`/`get_allocators`
/// (Open Question 4, resolved in DESIGN.md: delegate to the host's primary
/// allocator rather than exposing one of our own).
pub trait Allocator {
	fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum BackendError {
	#[error("unknown monitor id {0:?}")]
	UnknownOutput(String),
	#[error("no active session connection")]
	NoSession,
	#[error(transparent)]
	Commit(#[from] CommitError),
}

#[derive(Default)]
struct BackendEvents {
	new_output: EventSink<String>,
	removed_output: EventSink<String>,
}

struct BackendState {
	client: Option<SessionClient>,
	outputs: HashMap<String, Output>,
	/// Insertion order, since `get_primary` needs a stable "first" output and
	/// `HashMap` doesn't provide one.
	order: Vec<String>,
	pending: PendingSubmitQueue,
	pacing: PacingMode,
	devices: HashMap<DeviceKind, VirtualDevice>,
	primary_allocator: Option<Rc<dyn Allocator>>,
	idle: Rc<dyn IdleScheduler>,
	events: BackendEvents,
	/// Render formats delegated from a peer DRM backend, if the host set one
	/// (§4.6). Takes priority over `DEFAULT_RENDER_FORMATS` when non-empty.
	peer_render_formats: Option<Vec<DrmFormat>>,
}

/// Cheap, cloneable handle (`Rc<RefCell<..>>`) — all mutation happens
/// through `&self` methods, since the host drives the whole backend from a
/// single thread.
#[derive(Clone)]
pub struct Backend(Rc<RefCell<BackendState>>);

impl Backend {
	pub fn start(config: &BackendConfig, idle: Rc<dyn IdleScheduler>) -> Result<Self, SessionError> {
		let client = SessionClient::connect(config.socket_path.as_deref(), config.token.as_deref())?;
		let pacing = resolve_pacing(config);
		Ok(Self(Rc::new(RefCell::new(BackendState {
			client: Some(client),
			outputs: HashMap::new(),
			order: Vec::new(),
			pending: PendingSubmitQueue::default(),
			pacing,
			devices: HashMap::new(),
			primary_allocator: None,
			idle,
			events: BackendEvents::default(),
			peer_render_formats: None,
		}))))
	}

	pub fn r#type(&self) -> &'static str {
		"tab"
	}

	pub fn capabilities(&self) -> Capabilities {
		Capabilities {
			software_cursor_only: true,
			supports_dmabuf: true,
		}
	}

	/// fds the host should register with its own event loop; currently just
	/// the session socket. Fence fds from Variant-A submits are polled
	/// internally by `flush_pending_submits` rather than exposed here.
	pub fn poll_fds(&self) -> Vec<RawFd> {
		self.0
			.borrow()
			.client
			.as_ref()
			.map(|c| vec![c.socket_fd()])
			.unwrap_or_default()
	}

	pub fn drm_fd(&self) -> Option<RawFd> {
		self.0.borrow().client.as_ref().map(|c| c.drm_fd())
	}

	/// Returns the peer DRM backend's render format list verbatim when the
	/// host has set one and it is non-empty, else the fixed default set
	/// (§4.6, `original_source/src/backend/Tab.cpp:104-114`).
	pub fn get_render_formats(&self) -> Vec<DrmFormat> {
		let state = self.0.borrow();
		match &state.peer_render_formats {
			Some(formats) if !formats.is_empty() => formats.clone(),
			_ => DEFAULT_RENDER_FORMATS.to_vec(),
		}
	}

	/// Sets the peer backend this crate should delegate render formats to.
	/// Pass an empty `Vec` to fall back to the default set.
	pub fn set_peer_render_formats(&self, formats: Vec<DrmFormat>) {
		self.0.borrow_mut().peer_render_formats = Some(formats);
	}

	pub fn get_cursor_formats(&self) -> &'static [DrmFormat] {
		&[]
	}

	/// No hardware cursor plane exists on this backend; always declines.
	pub fn set_cursor(&self, _buffer: Option<Buffer>, _hotspot: (i32, i32)) -> bool {
		false
	}

	pub fn set_primary_allocator(&self, allocator: Rc<dyn Allocator>) {
		self.0.borrow_mut().primary_allocator = Some(allocator);
	}

	pub fn preferred_allocator(&self) -> Option<Rc<dyn Allocator>> {
		self.0.borrow().primary_allocator.clone()
	}

	pub fn get_allocators(&self) -> Vec<Rc<dyn Allocator>> {
		self.0.borrow().primary_allocator.clone().into_iter().collect()
	}

	pub fn get_primary(&self) -> Option<String> {
		self.0.borrow().order.first().cloned()
	}

	pub fn on_new_output(&self, listener: impl FnMut(&String) + 'static) {
		self.0.borrow_mut().events.new_output.connect(listener);
	}

	pub fn on_removed_output(&self, listener: impl FnMut(&String) + 'static) {
		self.0.borrow_mut().events.removed_output.connect(listener);
	}

	pub fn with_output<R>(&self, monitor_id: &str, f: impl FnOnce(&mut Output) -> R) -> Option<R> {
		let mut state = self.0.borrow_mut();
		state.outputs.get_mut(monitor_id).map(f)
	}

	pub fn begin_render(&self, monitor_id: &str) -> Result<Buffer, BackendError> {
		let mut state = self.0.borrow_mut();
		let BackendState { client, outputs, .. } = &mut *state;
		let client = client.as_ref().ok_or(BackendError::NoSession)?;
		outputs
			.get_mut(monitor_id)
			.ok_or_else(|| BackendError::UnknownOutput(monitor_id.to_string()))?
			.begin_render(client)
			.ok_or(BackendError::NoSession)
	}

	pub fn commit(&self, monitor_id: &str, acquire_fence_fd: Option<RawFd>) -> Result<(), BackendError> {
		let mut state = self.0.borrow_mut();
		let BackendState {
			client, outputs, pending, ..
		} = &mut *state;
		let client = client.as_ref().ok_or(BackendError::NoSession)?;
		let output = outputs
			.get_mut(monitor_id)
			.ok_or_else(|| BackendError::UnknownOutput(monitor_id.to_string()))?;
		output.commit(client, pending, acquire_fence_fd)?;
		Ok(())
	}

	/// Registers an idle callback for `monitor_id` if one isn't already
	/// pending. The closure only weakly captures backend state, so a
	/// destroyed backend or removed output simply makes it a no-op.
	pub fn schedule_frame(&self, monitor_id: &str, _reason: ScheduleFrameReason) {
		let should_register = {
			let mut state = self.0.borrow_mut();
			match state.outputs.get_mut(monitor_id) {
				Some(output) => output.request_frame(),
				None => return,
			}
		};
		if !should_register {
			return;
		}
		let weak = Rc::downgrade(&self.0);
		let id = monitor_id.to_string();
		let idle = self.0.borrow().idle.clone();
		idle.schedule_idle(Box::new(move || {
			if let Some(state) = weak.upgrade() {
				let mut guard = state.borrow_mut();
				if let Some(output) = guard.outputs.get_mut(&id) {
					output.on_idle_tick();
				}
			}
		}));
	}

	/// Variant A: pushes every fence-ready pending submit to the session.
	pub fn flush_pending_submits(&self) -> usize {
		let mut state = self.0.borrow_mut();
		let BackendState { client, pending, .. } = &mut *state;
		match client {
			Some(client) => pending.flush_ready(client),
			None => 0,
		}
	}

	/// Drains every event currently queued by the session and applies it.
	/// Reads the socket fully before invoking any callback, so a listener
	/// that calls back into the backend never races a half-drained queue.
	pub fn dispatch_events(&self) -> usize {
		let events: Vec<SessionEvent> = {
			let state = self.0.borrow();
			let Some(client) = state.client.as_ref() else {
				return 0;
			};
			client.poll_events();
			std::iter::from_fn(|| client.next_event()).collect()
		};
		let count = events.len();
		let mut touched_devices: HashSet<DeviceKind> = HashSet::new();
		for event in events {
			if let Some(kind) = self.apply_event(event) {
				touched_devices.insert(kind);
			}
		}
		for kind in touched_devices {
			let mut state = self.0.borrow_mut();
			if let Some(device) = state.devices.get_mut(&kind) {
				device.events.frame.emit(&());
			}
		}
		count
	}

	/// Applies one decoded session event, returning the input device kind it
	/// touched (if any) so `dispatch_events` can aggregate a single `frame`
	/// signal per device per batch.
	fn apply_event(&self, event: SessionEvent) -> Option<DeviceKind> {
		match event {
			SessionEvent::BufferReleased {
				monitor_id,
				slot,
				release_fence_fd,
			} => {
				let Some(id) = monitor_id else {
					warn!("buffer-released event carried no monitor id");
					if let Some(fd) = release_fence_fd {
						unsafe { libc::close(fd) };
					}
					return None;
				};
				let reschedule = {
					let mut state = self.0.borrow_mut();
					match state.outputs.get_mut(&id) {
						Some(output) => Some(output.on_buffer_released(slot as u8, release_fence_fd, Instant::now()).1),
						None => {
							if let Some(fd) = release_fence_fd {
								unsafe { libc::close(fd) };
							}
							None
						}
					}
				};
				match reschedule {
					Some(true) => self.schedule_frame(&id, ScheduleFrameReason::Unknown),
					Some(false) => {}
					None => warn!(monitor_id = %id, "buffer-released event for unknown monitor"),
				}
				None
			}
			SessionEvent::FrameDone { monitor_id } => {
				let Some(id) = monitor_id else {
					warn!("frame-done event carried no monitor id");
					return None;
				};
				let reschedule = {
					let mut state = self.0.borrow_mut();
					state.outputs.get_mut(&id).map(|output| output.on_frame_done(Instant::now()).1)
				};
				match reschedule {
					Some(true) => self.schedule_frame(&id, ScheduleFrameReason::Unknown),
					Some(false) => {}
					None => warn!(monitor_id = %id, "frame-done event for unknown monitor"),
				}
				None
			}
			SessionEvent::MonitorAdded(info) => {
				let pacing = self.0.borrow().pacing;
				let id = info.id.clone();
				let output = Output::new(&info, pacing);
				{
					let mut state = self.0.borrow_mut();
					state.outputs.insert(id.clone(), output);
					state.order.push(id.clone());
				}
				self.0.borrow_mut().events.new_output.emit(&id);
				None
			}
			SessionEvent::MonitorRemoved { monitor_id } => {
				let Some(id) = monitor_id else {
					warn!("monitor-removed event carried no monitor id");
					return None;
				};
				let removed = {
					let mut state = self.0.borrow_mut();
					state.order.retain(|existing| existing != &id);
					state.outputs.remove(&id)
				};
				match removed {
					Some(mut output) => {
						output.destroy();
						self.0.borrow_mut().events.removed_output.emit(&id);
					}
					None => warn!(monitor_id = %id, "monitor-removed event for unknown monitor"),
				}
				None
			}
			SessionEvent::Input(input_event) => {
				let kind = input_event.device_kind();
				let mut state = self.0.borrow_mut();
				let is_new = !state.devices.contains_key(&kind);
				let device = state.devices.entry(kind).or_insert_with(|| VirtualDevice::new(kind));
				if is_new {
					device.events.new_device.emit(&());
				}
				device.events.event.emit(&input_event);
				Some(kind)
			}
			SessionEvent::Unknown => {
				debug!("dropped session event of unrecognized kind");
				None
			}
		}
	}

	pub fn devices(&self) -> Vec<DeviceKind> {
		self.0.borrow().devices.keys().copied().collect()
	}

	pub fn output_ids(&self) -> Vec<String> {
		self.0.borrow().order.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::MonitorInfo;

	struct ImmediateIdle;
	impl IdleScheduler for ImmediateIdle {
		fn schedule_idle(&self, callback: Box<dyn FnOnce()>) {
			callback();
		}
	}

	fn state_with_output() -> (Rc<RefCell<BackendState>>, String) {
		let state = Rc::new(RefCell::new(BackendState {
			client: None,
			outputs: HashMap::new(),
			order: Vec::new(),
			pending: PendingSubmitQueue::default(),
			pacing: PacingMode::BufferReleased,
			devices: HashMap::new(),
			primary_allocator: None,
			idle: Rc::new(ImmediateIdle),
			events: BackendEvents::default(),
			peer_render_formats: None,
		}));
		let info = MonitorInfo {
			id: "M1".into(),
			name: "virtual-1".into(),
			width: 1920,
			height: 1080,
			refresh_rate: 60,
		};
		state
			.borrow_mut()
			.outputs
			.insert(info.id.clone(), Output::new(&info, PacingMode::BufferReleased));
		state.borrow_mut().order.push(info.id.clone());
		(state, info.id)
	}

	#[test]
	fn schedule_frame_registers_once_per_cycle() {
		let (state, id) = state_with_output();
		let backend = Backend(state);
		let fired = Rc::new(RefCell::new(false));
		let fired_clone = fired.clone();
		backend.with_output(&id, |o| {
			o.events.frame.connect(move |_| *fired_clone.borrow_mut() = true);
		});
		backend.schedule_frame(&id, ScheduleFrameReason::Unknown);
		assert!(*fired.borrow(), "idle callback should have fired synchronously");
		let still_wants_frame = backend.with_output(&id, |o| o.on_idle_tick()).unwrap();
		assert!(!still_wants_frame, "frame request should be consumed, not re-armed");
	}

	#[test]
	fn get_primary_reflects_insertion_order() {
		let (state, id) = state_with_output();
		let backend = Backend(state);
		assert_eq!(backend.get_primary(), Some(id));
	}

	#[test]
	fn unknown_output_is_reported() {
		let (state, _id) = state_with_output();
		let backend = Backend(state);
		let err = backend.commit("does-not-exist", None).unwrap_err();
		assert!(matches!(err, BackendError::UnknownOutput(_)));
	}

	#[test]
	fn buffer_released_emits_present_and_advances_seq() {
		let (state, id) = state_with_output();
		let backend = Backend(state);
		let seq = Rc::new(RefCell::new(None));
		let seq_clone = seq.clone();
		backend.with_output(&id, |o| {
			o.events.present.connect(move |e| *seq_clone.borrow_mut() = Some(e.seq));
		});
		backend.apply_event(SessionEvent::BufferReleased {
			monitor_id: Some(id.clone()),
			slot: 0,
			release_fence_fd: None,
		});
		assert_eq!(*seq.borrow(), Some(1));
		assert_eq!(backend.with_output(&id, |o| o.present_seq()), Some(1));
	}

	#[test]
	fn buffer_released_reschedules_a_pending_frame() {
		let (state, id) = state_with_output();
		let backend = Backend(state);
		backend.with_output(&id, |o| {
			o.request_frame();
		});
		let frame_fired = Rc::new(RefCell::new(false));
		let frame_fired_clone = frame_fired.clone();
		backend.with_output(&id, |o| {
			o.events.frame.connect(move |_| *frame_fired_clone.borrow_mut() = true);
		});
		backend.apply_event(SessionEvent::BufferReleased {
			monitor_id: Some(id.clone()),
			slot: 0,
			release_fence_fd: None,
		});
		assert!(*frame_fired.borrow(), "a still-wanted frame should be rescheduled on release");
	}

	#[test]
	fn input_event_routes_to_an_existing_device_sink() {
		let (state, _id) = state_with_output();
		let backend = Backend(state);
		let key_event = crate::input::InputEvent::Key {
			device: 0,
			time_usec: 1000,
			key: 30,
			state: crate::input::ButtonState::Pressed,
		};
		let count = backend.dispatch_events();
		assert_eq!(count, 0, "no client is connected in this fixture");

		let new_device_count = Rc::new(RefCell::new(0));
		let event_count = Rc::new(RefCell::new(0));
		{
			let mut s = backend.0.borrow_mut();
			let device = s
				.devices
				.entry(DeviceKind::Keyboard)
				.or_insert_with(|| VirtualDevice::new(DeviceKind::Keyboard));
			let n = new_device_count.clone();
			device.events.new_device.connect(move |_| *n.borrow_mut() += 1);
			let e = event_count.clone();
			device.events.event.connect(move |_| *e.borrow_mut() += 1);
		}
		backend.apply_event(SessionEvent::Input(key_event));
		assert_eq!(*new_device_count.borrow(), 0, "device was pre-registered, so new_device must not refire");
		assert_eq!(*event_count.borrow(), 1);
		assert_eq!(backend.devices(), vec![DeviceKind::Keyboard]);
	}

	#[test]
	fn first_event_for_a_device_kind_creates_it_lazily() {
		let (state, _id) = state_with_output();
		let backend = Backend(state);
		assert!(backend.devices().is_empty());

		let key_event = crate::input::InputEvent::Key {
			device: 0,
			time_usec: 0,
			key: 1,
			state: crate::input::ButtonState::Pressed,
		};
		backend.apply_event(SessionEvent::Input(key_event));
		assert_eq!(backend.devices(), vec![DeviceKind::Keyboard]);
	}

	#[test]
	fn render_formats_delegate_to_a_non_empty_peer_list() {
		let (state, _id) = state_with_output();
		let backend = Backend(state);
		assert_eq!(backend.get_render_formats(), DEFAULT_RENDER_FORMATS.to_vec());

		let peer = vec![DrmFormat {
			fourcc: 0x3231564e,
			modifier: 0,
		}];
		backend.set_peer_render_formats(peer.clone());
		assert_eq!(backend.get_render_formats(), peer);

		backend.set_peer_render_formats(Vec::new());
		assert_eq!(backend.get_render_formats(), DEFAULT_RENDER_FORMATS.to_vec());
	}
}
