//! Safe wrapper around the `tab_client_*` C ABI (see [`crate::sys`]).
use std::ffi::{CStr, CString};
use std::os::raw::c_int;

use crate::error::SessionError;
use crate::input::InputEvent;
use crate::sys;

/// Monitor descriptor as reported by the session. Immutable for the
/// monitor's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
	pub id: String,
	pub name: String,
	pub width: i32,
	pub height: i32,
	pub refresh_rate: i32,
}

/// A single-plane DMA-BUF target returned by `acquire_frame`.
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
	pub width: i32,
	pub height: i32,
	pub slot: u32,
	pub fd: c_int,
	pub stride: c_int,
	pub offset: c_int,
	pub fourcc: c_int,
}

/// Domain-level session event, decoded from [`sys::TabEvent`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
	BufferReleased {
		monitor_id: Option<String>,
		slot: u32,
		release_fence_fd: Option<c_int>,
	},
	FrameDone {
		monitor_id: Option<String>,
	},
	MonitorAdded(MonitorInfo),
	MonitorRemoved {
		monitor_id: Option<String>,
	},
	Input(InputEvent),
	Unknown,
}

fn cstr_to_owned(ptr: *const std::os::raw::c_char) -> Option<String> {
	if ptr.is_null() {
		return None;
	}
	unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(str::to_owned)
}

/// The subset of [`SessionClient`] the present-loop pacing engine actually
/// calls, extracted as a trait so `Swapchain`/`Output`/`PendingSubmitQueue`
/// are unit-testable against an in-process fake instead of a live session
/// socket (mirrors how `tab-client`'s own handle is tested against an
/// in-process event queue rather than a real connection).
pub trait SessionTransport {
	fn acquire_frame(&self, monitor_id: &str) -> Option<FrameTarget>;
	/// Variant A submit.
	fn request_buffer(&self, monitor_id: &str, acquire_fence_fd: Option<c_int>) -> bool;
	/// Variant B submit.
	fn swap_buffers(&self, monitor_id: &str) -> bool;
}

impl SessionTransport for SessionClient {
	fn acquire_frame(&self, monitor_id: &str) -> Option<FrameTarget> {
		SessionClient::acquire_frame(self, monitor_id)
	}

	fn request_buffer(&self, monitor_id: &str, acquire_fence_fd: Option<c_int>) -> bool {
		SessionClient::request_buffer(self, monitor_id, acquire_fence_fd)
	}

	fn swap_buffers(&self, monitor_id: &str) -> bool {
		SessionClient::swap_buffers(self, monitor_id)
	}
}

/// Thin, non-owning-by-default wrapper over a `TabClientHandle*`.
///
/// Owns the handle exclusively: created by [`SessionClient::connect`],
/// closed on drop. Mutated only from the event-loop thread per the
/// concurrency model — it holds no internal locking.
pub struct SessionClient {
	handle: *mut sys::TabClientHandle,
}

// The handle is only ever touched from the single event-loop thread that
// owns the backend; there is no concurrent access to guard against, but the
// type must still be movable across an `Rc`/`Weak` boundary within that
// thread, which doesn't require Send/Sync.
impl SessionClient {
	/// Connects to the session. `token` falls back to `SHIFT_SESSION_TOKEN`
	/// inside the library if `None` is passed and the environment variable
	/// is unset the call simply fails, matching `tab_client_connect`.
	pub fn connect(socket_path: Option<&str>, token: Option<&str>) -> Result<Self, SessionError> {
		let socket_c = socket_path.map(|s| CString::new(s).unwrap_or_default());
		let token_c = token.map(|s| CString::new(s).unwrap_or_default());
		let socket_ptr = socket_c.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());
		let token_ptr = token_c.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());

		let handle = unsafe { sys::tab_client_connect(socket_ptr, token_ptr) };
		if handle.is_null() {
			return Err(SessionError::ConnectFailed);
		}
		Ok(Self { handle })
	}

	pub fn socket_fd(&self) -> c_int {
		unsafe { sys::tab_client_get_socket_fd(self.handle) }
	}

	/// Non-owning; the caller must never close this fd.
	pub fn drm_fd(&self) -> c_int {
		unsafe { sys::tab_client_drm_fd(self.handle) }
	}

	pub fn monitors(&self) -> Vec<String> {
		let count = unsafe { sys::tab_client_get_monitor_count(self.handle) };
		(0..count)
			.filter_map(|i| {
				let raw = unsafe { sys::tab_client_get_monitor_id(self.handle, i) };
				let id = cstr_to_owned(raw);
				if !raw.is_null() {
					unsafe { sys::tab_client_string_free(raw) };
				}
				id
			})
			.collect()
	}

	pub fn monitor_info(&self, monitor_id: &str) -> Option<MonitorInfo> {
		let id_c = CString::new(monitor_id).ok()?;
		let mut raw = unsafe { sys::tab_client_get_monitor_info(self.handle, id_c.as_ptr()) };
		if raw.id.is_null() {
			return None;
		}
		let info = MonitorInfo {
			id: cstr_to_owned(raw.id)?,
			name: cstr_to_owned(raw.name).unwrap_or_default(),
			width: raw.width,
			height: raw.height,
			refresh_rate: raw.refresh_rate,
		};
		unsafe { sys::tab_client_free_monitor_info(&mut raw as *mut _) };
		Some(info)
	}

	/// Drains the kernel socket into the library's internal event queue and
	/// returns how many events are now pending. Does not itself dequeue.
	pub fn poll_events(&self) -> usize {
		unsafe { sys::tab_client_poll_events(self.handle) }
	}

	/// Pops one decoded event, or `None` once the queue is empty.
	pub fn next_event(&self) -> Option<SessionEvent> {
		let mut raw = std::mem::MaybeUninit::<sys::TabEvent>::zeroed();
		let ok = unsafe { sys::tab_client_next_event(self.handle, raw.as_mut_ptr()) };
		if !ok {
			return None;
		}
		let mut raw = unsafe { raw.assume_init() };
		let event = decode_event(&raw);
		unsafe { sys::tab_client_free_event_strings(&mut raw as *mut _) };
		Some(event)
	}

	pub fn acquire_frame(&self, monitor_id: &str) -> Option<FrameTarget> {
		let id_c = CString::new(monitor_id).ok()?;
		let mut target = std::mem::MaybeUninit::<sys::TabFrameTarget>::zeroed();
		let result =
			unsafe { sys::tab_client_acquire_frame(self.handle, id_c.as_ptr(), target.as_mut_ptr()) };
		if result != sys::TabAcquireResult::TAB_ACQUIRE_OK {
			return None;
		}
		let target = unsafe { target.assume_init() };
		Some(FrameTarget {
			width: target.width,
			height: target.height,
			slot: target.buffer_index,
			fd: target.dmabuf.fd,
			stride: target.dmabuf.stride,
			offset: target.dmabuf.offset,
			fourcc: target.dmabuf.fourcc,
		})
	}

	/// Variant A submit. `acquire_fence_fd` of `None` means "no fence".
	pub fn request_buffer(&self, monitor_id: &str, acquire_fence_fd: Option<c_int>) -> bool {
		let Ok(id_c) = CString::new(monitor_id) else {
			return false;
		};
		unsafe {
			sys::tab_client_request_buffer(self.handle, id_c.as_ptr(), acquire_fence_fd.unwrap_or(-1))
		}
	}

	/// Variant B submit.
	pub fn swap_buffers(&self, monitor_id: &str) -> bool {
		let Ok(id_c) = CString::new(monitor_id) else {
			return false;
		};
		unsafe { sys::tab_client_swap_buffers(self.handle, id_c.as_ptr()) }
	}

	pub fn send_ready(&self) -> bool {
		unsafe { sys::tab_client_send_ready(self.handle) }
	}

	pub fn take_error(&self) -> Option<String> {
		let raw = unsafe { sys::tab_client_take_error(self.handle) };
		let msg = cstr_to_owned(raw);
		if !raw.is_null() {
			unsafe { sys::tab_client_string_free(raw) };
		}
		msg
	}
}

impl Drop for SessionClient {
	fn drop(&mut self) {
		unsafe { sys::tab_client_disconnect(self.handle) };
	}
}

fn decode_event(raw: &sys::TabEvent) -> SessionEvent {
	use sys::TabEventType::*;
	match raw.event_type {
		TAB_EVENT_BUFFER_RELEASED => {
			let data = unsafe { raw.data.buffer_released };
			SessionEvent::BufferReleased {
				monitor_id: cstr_to_owned(data.monitor_id),
				slot: data.buffer_index,
				release_fence_fd: (data.release_fence_fd >= 0).then_some(data.release_fence_fd),
			}
		}
		TAB_EVENT_FRAME_DONE => {
			let data = unsafe { raw.data.frame_done };
			SessionEvent::FrameDone {
				monitor_id: cstr_to_owned(data.monitor_id),
			}
		}
		TAB_EVENT_MONITOR_ADDED => {
			let data = unsafe { raw.data.monitor_added };
			match (cstr_to_owned(data.id), cstr_to_owned(data.name)) {
				(Some(id), name) => SessionEvent::MonitorAdded(MonitorInfo {
					id,
					name: name.unwrap_or_default(),
					width: data.width,
					height: data.height,
					refresh_rate: data.refresh_rate,
				}),
				_ => SessionEvent::Unknown,
			}
		}
		TAB_EVENT_MONITOR_REMOVED => {
			let data = unsafe { raw.data.monitor_removed };
			SessionEvent::MonitorRemoved {
				monitor_id: cstr_to_owned(data),
			}
		}
		TAB_EVENT_INPUT => {
			let data = unsafe { raw.data.input };
			SessionEvent::Input(InputEvent::from_raw(&data))
		}
		TAB_EVENT_UNKNOWN => SessionEvent::Unknown,
	}
}

/// In-process [`SessionTransport`] fake, shared by this module's own tests
/// and by `swapchain`/`output`'s, so the pacing engine never needs a live
/// session socket to exercise its state machine.
#[cfg(test)]
pub(crate) mod fake {
	use std::cell::RefCell;
	use std::os::raw::c_int;

	use super::{FrameTarget, SessionTransport};

	#[derive(Default)]
	pub(crate) struct FakeTransport {
		pub(crate) next_target: RefCell<Option<FrameTarget>>,
		pub(crate) request_buffer_result: RefCell<bool>,
		pub(crate) swap_buffers_result: RefCell<bool>,
		pub(crate) requests: RefCell<Vec<(String, Option<c_int>)>>,
	}

	impl SessionTransport for FakeTransport {
		fn acquire_frame(&self, _monitor_id: &str) -> Option<FrameTarget> {
			self.next_target.borrow_mut().take()
		}

		fn request_buffer(&self, monitor_id: &str, acquire_fence_fd: Option<c_int>) -> bool {
			self.requests.borrow_mut().push((monitor_id.to_string(), acquire_fence_fd));
			*self.request_buffer_result.borrow()
		}

		fn swap_buffers(&self, monitor_id: &str) -> bool {
			self.requests.borrow_mut().push((monitor_id.to_string(), None));
			*self.swap_buffers_result.borrow()
		}
	}
}
