//! Raw `tab_client_*` ABI as exported by the Shift session's client library.
//!
//! This module only *declares* the C surface; Shift itself implements and
//! exports it. Field layouts and signatures are kept in lockstep with the
//! real `tab_client.h` — do not reorder struct fields.
#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int};

/// Opaque handle returned by [`tab_client_connect`].
#[repr(C)]
pub struct TabClientHandle {
	_private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabDmabuf {
	pub fd: c_int,
	pub stride: c_int,
	pub offset: c_int,
	pub fourcc: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabFrameTarget {
	pub framebuffer: u32,
	pub texture: u32,
	pub width: i32,
	pub height: i32,
	pub buffer_index: u32,
	pub dmabuf: TabDmabuf,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabMonitorInfo {
	pub id: *mut c_char,
	pub width: i32,
	pub height: i32,
	pub refresh_rate: i32,
	pub name: *mut c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabAcquireResult {
	TAB_ACQUIRE_OK = 0,
	TAB_ACQUIRE_NO_BUFFERS = 1,
	TAB_ACQUIRE_ERROR = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEventType {
	TAB_EVENT_BUFFER_RELEASED = 0,
	TAB_EVENT_MONITOR_ADDED = 1,
	TAB_EVENT_MONITOR_REMOVED = 2,
	TAB_EVENT_FRAME_DONE = 3,
	TAB_EVENT_INPUT = 4,
	TAB_EVENT_UNKNOWN = 255,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabBufferRelease {
	pub monitor_id: *mut c_char,
	pub buffer_index: u32,
	pub release_fence_fd: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabFrameDone {
	pub monitor_id: *mut c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union TabEventData {
	pub buffer_released: TabBufferRelease,
	pub monitor_added: TabMonitorInfo,
	pub monitor_removed: *mut c_char,
	pub frame_done: TabFrameDone,
	pub input: TabInputEvent,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct TabEvent {
	pub event_type: TabEventType,
	pub data: TabEventData,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabInputEventKind {
	TAB_INPUT_KIND_POINTER_MOTION = 0,
	TAB_INPUT_KIND_POINTER_MOTION_ABSOLUTE = 1,
	TAB_INPUT_KIND_POINTER_BUTTON = 2,
	TAB_INPUT_KIND_POINTER_AXIS = 3,
	TAB_INPUT_KIND_KEY = 6,
	TAB_INPUT_KIND_TOUCH_DOWN = 7,
	TAB_INPUT_KIND_TOUCH_UP = 8,
	TAB_INPUT_KIND_TOUCH_MOTION = 9,
	TAB_INPUT_KIND_TOUCH_FRAME = 10,
	TAB_INPUT_KIND_TOUCH_CANCEL = 11,
	TAB_INPUT_KIND_TABLET_TOOL_PROXIMITY = 12,
	TAB_INPUT_KIND_TABLET_TOOL_AXIS = 13,
	TAB_INPUT_KIND_TABLET_TOOL_TIP = 14,
	TAB_INPUT_KIND_TABLET_TOOL_BUTTON = 15,
	TAB_INPUT_KIND_TABLET_PAD_BUTTON = 16,
	TAB_INPUT_KIND_TABLET_PAD_RING = 17,
	TAB_INPUT_KIND_TABLET_PAD_STRIP = 18,
	TAB_INPUT_KIND_SWITCH_TOGGLE = 19,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputPointerMotion {
	pub device: u32,
	pub time_usec: u64,
	pub x: f64,
	pub y: f64,
	pub dx: f64,
	pub dy: f64,
	pub unaccel_dx: f64,
	pub unaccel_dy: f64,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputPointerMotionAbsolute {
	pub device: u32,
	pub time_usec: u64,
	pub x: f64,
	pub y: f64,
	pub x_transformed: f64,
	pub y_transformed: f64,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputPointerButton {
	pub device: u32,
	pub time_usec: u64,
	pub button: u32,
	pub state: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputPointerAxis {
	pub device: u32,
	pub time_usec: u64,
	pub orientation: u32,
	pub delta: f64,
	pub delta_discrete: i32,
	pub source: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputKey {
	pub device: u32,
	pub time_usec: u64,
	pub key: u32,
	pub state: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabTouchContact {
	pub id: i32,
	pub x: f64,
	pub y: f64,
	pub x_transformed: f64,
	pub y_transformed: f64,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTouchDown {
	pub device: u32,
	pub time_usec: u64,
	pub contact: TabTouchContact,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTouchMotion {
	pub device: u32,
	pub time_usec: u64,
	pub contact: TabTouchContact,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTouchUp {
	pub device: u32,
	pub time_usec: u64,
	pub contact_id: i32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTouchFrame {
	pub time_usec: u64,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTouchCancel {
	pub time_usec: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabTabletTool {
	pub serial: u64,
	pub tool_type: u8,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletToolProximity {
	pub device: u32,
	pub time_usec: u64,
	pub in_proximity: bool,
	pub tool: TabTabletTool,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabTabletToolAxes {
	pub x: f64,
	pub y: f64,
	pub pressure: f64,
	pub distance: f64,
	pub tilt_x: f64,
	pub tilt_y: f64,
	pub rotation: f64,
	pub slider: f64,
	pub wheel_delta: f64,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletToolAxis {
	pub device: u32,
	pub time_usec: u64,
	pub tool: TabTabletTool,
	pub axes: TabTabletToolAxes,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletToolTip {
	pub device: u32,
	pub time_usec: u64,
	pub tool: TabTabletTool,
	pub state: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletToolButton {
	pub device: u32,
	pub time_usec: u64,
	pub tool: TabTabletTool,
	pub button: u32,
	pub state: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletPadButton {
	pub device: u32,
	pub time_usec: u64,
	pub button: u32,
	pub state: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletPadRing {
	pub device: u32,
	pub time_usec: u64,
	pub ring: u32,
	pub position: f64,
	pub source: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputTabletPadStrip {
	pub device: u32,
	pub time_usec: u64,
	pub strip: u32,
	pub position: f64,
	pub source: u32,
}
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TabInputSwitchToggle {
	pub device: u32,
	pub time_usec: u64,
	pub switch_type: u32,
	pub state: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union TabInputEventData {
	pub pointer_motion: TabInputPointerMotion,
	pub pointer_motion_absolute: TabInputPointerMotionAbsolute,
	pub pointer_button: TabInputPointerButton,
	pub pointer_axis: TabInputPointerAxis,
	pub key: TabInputKey,
	pub touch_down: TabInputTouchDown,
	pub touch_up: TabInputTouchUp,
	pub touch_motion: TabInputTouchMotion,
	pub touch_frame: TabInputTouchFrame,
	pub touch_cancel: TabInputTouchCancel,
	pub tablet_tool_proximity: TabInputTabletToolProximity,
	pub tablet_tool_axis: TabInputTabletToolAxis,
	pub tablet_tool_tip: TabInputTabletToolTip,
	pub tablet_tool_button: TabInputTabletToolButton,
	pub tablet_pad_button: TabInputTabletPadButton,
	pub tablet_pad_ring: TabInputTabletPadRing,
	pub tablet_pad_strip: TabInputTabletPadStrip,
	pub switch_toggle: TabInputSwitchToggle,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct TabInputEvent {
	pub kind: TabInputEventKind,
	pub data: TabInputEventData,
}

unsafe extern "C" {
	pub fn tab_client_connect(socket_path: *const c_char, token: *const c_char) -> *mut TabClientHandle;
	pub fn tab_client_connect_default(token: *const c_char) -> *mut TabClientHandle;
	pub fn tab_client_disconnect(handle: *mut TabClientHandle);
	pub fn tab_client_string_free(s: *mut c_char);
	pub fn tab_client_take_error(handle: *mut TabClientHandle) -> *mut c_char;

	pub fn tab_client_get_socket_fd(handle: *mut TabClientHandle) -> c_int;
	pub fn tab_client_drm_fd(handle: *mut TabClientHandle) -> c_int;

	pub fn tab_client_get_monitor_count(handle: *mut TabClientHandle) -> usize;
	pub fn tab_client_get_monitor_id(handle: *mut TabClientHandle, index: usize) -> *mut c_char;
	pub fn tab_client_get_monitor_info(
		handle: *mut TabClientHandle,
		monitor_id: *const c_char,
	) -> TabMonitorInfo;
	pub fn tab_client_free_monitor_info(info: *mut TabMonitorInfo);

	pub fn tab_client_poll_events(handle: *mut TabClientHandle) -> usize;
	pub fn tab_client_next_event(handle: *mut TabClientHandle, event: *mut TabEvent) -> bool;
	pub fn tab_client_free_event_strings(event: *mut TabEvent);

	pub fn tab_client_acquire_frame(
		handle: *mut TabClientHandle,
		monitor_id: *const c_char,
		target: *mut TabFrameTarget,
	) -> TabAcquireResult;

	/// Variant A: explicit `BUFFER_RELEASED` pacing with an optional
	/// acquire-fence handed to the session.
	pub fn tab_client_request_buffer(
		handle: *mut TabClientHandle,
		monitor_id: *const c_char,
		acquire_fence_fd: c_int,
	) -> bool;

	/// Variant B: single-outstanding `FRAME_DONE` pacing, no fence forwarded.
	pub fn tab_client_swap_buffers(handle: *mut TabClientHandle, monitor_id: *const c_char) -> bool;

	pub fn tab_client_send_ready(handle: *mut TabClientHandle) -> bool;
}
