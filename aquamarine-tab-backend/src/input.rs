//! Domain-level input events decoded from the session's `TAB_INPUT_KIND_*`
//! union, and the virtual input devices that relay them to the host.
//!
//! Each device kind is a singleton carrying no kernel fd: lazily created on
//! first matching event, then retained for the backend's lifetime. Session
//! times (microseconds) are converted to host times (milliseconds) by
//! integer division at the point of emission. Each device exposes its own
//! signal set (`new_device`, `event`, `frame`) so the host learns about a
//! device exactly once, then receives every event routed to it.

use crate::host::EventSink;
use crate::sys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
	Pressed,
	Released,
}

impl ButtonState {
	fn from_raw(v: u32) -> Self {
		if v == 0 { ButtonState::Pressed } else { ButtonState::Released }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrientation {
	Vertical,
	Horizontal,
}

impl AxisOrientation {
	fn from_raw(v: u32) -> Self {
		if v == 0 {
			AxisOrientation::Vertical
		} else {
			AxisOrientation::Horizontal
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSource {
	Wheel,
	Finger,
	Continuous,
	WheelTilt,
}

impl AxisSource {
	fn from_raw(v: u32) -> Self {
		match v {
			0 => AxisSource::Wheel,
			1 => AxisSource::Finger,
			2 => AxisSource::Continuous,
			_ => AxisSource::WheelTilt,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchType {
	Lid,
	TabletMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
	Enabled,
	Disabled,
}

#[derive(Debug, Clone, Copy)]
pub struct TouchContact {
	pub id: i32,
	pub x: f64,
	pub y: f64,
	pub x_transformed: f64,
	pub y_transformed: f64,
}

/// A tablet tool, instantiated fresh per event (see Open Question 2 in
/// DESIGN.md — a future design may cache by `serial`).
#[derive(Debug, Clone, Copy)]
pub struct TabletTool {
	pub serial: u64,
	pub tool_type: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct TabletToolAxes {
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

/// One decoded input event, with session time already carried in
/// microseconds (conversion to host milliseconds happens at the fan-out
/// boundary so every device can share the same `time_usec / 1000` rule).
#[derive(Debug, Clone, Copy)]
pub enum InputEvent {
	PointerMotion {
		device: u32,
		time_usec: u64,
		dx: f64,
		dy: f64,
		unaccel_dx: f64,
		unaccel_dy: f64,
	},
	PointerMotionAbsolute {
		device: u32,
		time_usec: u64,
		x_transformed: f64,
		y_transformed: f64,
	},
	PointerButton {
		device: u32,
		time_usec: u64,
		button: u32,
		state: ButtonState,
	},
	PointerAxis {
		device: u32,
		time_usec: u64,
		orientation: AxisOrientation,
		delta: f64,
		delta_discrete: i32,
		source: AxisSource,
	},
	Key {
		device: u32,
		time_usec: u64,
		key: u32,
		state: ButtonState,
	},
	TouchDown {
		device: u32,
		time_usec: u64,
		contact: TouchContact,
	},
	TouchMotion {
		device: u32,
		time_usec: u64,
		contact: TouchContact,
	},
	TouchUp {
		device: u32,
		time_usec: u64,
		contact_id: i32,
	},
	TouchFrame {
		time_usec: u64,
	},
	/// Per host convention, a cancel always carries id = -1.
	TouchCancel {
		time_usec: u64,
	},
	TabletToolProximity {
		device: u32,
		time_usec: u64,
		in_proximity: bool,
		tool: TabletTool,
	},
	TabletToolAxis {
		device: u32,
		time_usec: u64,
		tool: TabletTool,
		axes: TabletToolAxes,
	},
	TabletToolTip {
		device: u32,
		time_usec: u64,
		tool: TabletTool,
		down: bool,
	},
	TabletToolButton {
		device: u32,
		time_usec: u64,
		tool: TabletTool,
		button: u32,
		state: ButtonState,
	},
	TabletPadButton {
		device: u32,
		time_usec: u64,
		button: u32,
		state: ButtonState,
	},
	TabletPadRing {
		device: u32,
		time_usec: u64,
		ring: u32,
		position: f64,
		source: AxisSource,
	},
	TabletPadStrip {
		device: u32,
		time_usec: u64,
		strip: u32,
		position: f64,
		source: AxisSource,
	},
	SwitchToggle {
		device: u32,
		time_usec: u64,
		switch: SwitchType,
		state: SwitchState,
	},
}

fn touch_contact(c: &sys::TabTouchContact) -> TouchContact {
	TouchContact {
		id: c.id,
		x: c.x,
		y: c.y,
		x_transformed: c.x_transformed,
		y_transformed: c.y_transformed,
	}
}

fn tablet_tool(t: &sys::TabTabletTool) -> TabletTool {
	TabletTool {
		serial: t.serial,
		tool_type: t.tool_type,
	}
}

impl InputEvent {
	pub(crate) fn from_raw(raw: &sys::TabInputEvent) -> Self {
		use sys::TabInputEventKind::*;
		match raw.kind {
			TAB_INPUT_KIND_POINTER_MOTION => {
				let d = unsafe { raw.data.pointer_motion };
				InputEvent::PointerMotion {
					device: d.device,
					time_usec: d.time_usec,
					dx: d.dx,
					dy: d.dy,
					unaccel_dx: d.unaccel_dx,
					unaccel_dy: d.unaccel_dy,
				}
			}
			TAB_INPUT_KIND_POINTER_MOTION_ABSOLUTE => {
				let d = unsafe { raw.data.pointer_motion_absolute };
				InputEvent::PointerMotionAbsolute {
					device: d.device,
					time_usec: d.time_usec,
					x_transformed: d.x_transformed,
					y_transformed: d.y_transformed,
				}
			}
			TAB_INPUT_KIND_POINTER_BUTTON => {
				let d = unsafe { raw.data.pointer_button };
				InputEvent::PointerButton {
					device: d.device,
					time_usec: d.time_usec,
					button: d.button,
					state: ButtonState::from_raw(d.state),
				}
			}
			TAB_INPUT_KIND_POINTER_AXIS => {
				let d = unsafe { raw.data.pointer_axis };
				InputEvent::PointerAxis {
					device: d.device,
					time_usec: d.time_usec,
					orientation: AxisOrientation::from_raw(d.orientation),
					delta: d.delta,
					delta_discrete: d.delta_discrete,
					source: AxisSource::from_raw(d.source),
				}
			}
			TAB_INPUT_KIND_KEY => {
				let d = unsafe { raw.data.key };
				InputEvent::Key {
					device: d.device,
					time_usec: d.time_usec,
					key: d.key,
					state: ButtonState::from_raw(d.state),
				}
			}
			TAB_INPUT_KIND_TOUCH_DOWN => {
				let d = unsafe { raw.data.touch_down };
				InputEvent::TouchDown {
					device: d.device,
					time_usec: d.time_usec,
					contact: touch_contact(&d.contact),
				}
			}
			TAB_INPUT_KIND_TOUCH_MOTION => {
				let d = unsafe { raw.data.touch_motion };
				InputEvent::TouchMotion {
					device: d.device,
					time_usec: d.time_usec,
					contact: touch_contact(&d.contact),
				}
			}
			TAB_INPUT_KIND_TOUCH_UP => {
				let d = unsafe { raw.data.touch_up };
				InputEvent::TouchUp {
					device: d.device,
					time_usec: d.time_usec,
					contact_id: d.contact_id,
				}
			}
			TAB_INPUT_KIND_TOUCH_FRAME => {
				let d = unsafe { raw.data.touch_frame };
				InputEvent::TouchFrame { time_usec: d.time_usec }
			}
			TAB_INPUT_KIND_TOUCH_CANCEL => {
				let d = unsafe { raw.data.touch_cancel };
				InputEvent::TouchCancel { time_usec: d.time_usec }
			}
			TAB_INPUT_KIND_TABLET_TOOL_PROXIMITY => {
				let d = unsafe { raw.data.tablet_tool_proximity };
				InputEvent::TabletToolProximity {
					device: d.device,
					time_usec: d.time_usec,
					in_proximity: d.in_proximity,
					tool: tablet_tool(&d.tool),
				}
			}
			TAB_INPUT_KIND_TABLET_TOOL_AXIS => {
				let d = unsafe { raw.data.tablet_tool_axis };
				InputEvent::TabletToolAxis {
					device: d.device,
					time_usec: d.time_usec,
					tool: tablet_tool(&d.tool),
					axes: TabletToolAxes {
						x: d.axes.x,
						y: d.axes.y,
						pressure: d.axes.pressure,
						distance: d.axes.distance,
						tilt_x: d.axes.tilt_x,
						tilt_y: d.axes.tilt_y,
						rotation: d.axes.rotation,
						slider: d.axes.slider,
						wheel_delta: d.axes.wheel_delta,
					},
				}
			}
			TAB_INPUT_KIND_TABLET_TOOL_TIP => {
				let d = unsafe { raw.data.tablet_tool_tip };
				InputEvent::TabletToolTip {
					device: d.device,
					time_usec: d.time_usec,
					tool: tablet_tool(&d.tool),
					down: d.state == 0,
				}
			}
			TAB_INPUT_KIND_TABLET_TOOL_BUTTON => {
				let d = unsafe { raw.data.tablet_tool_button };
				InputEvent::TabletToolButton {
					device: d.device,
					time_usec: d.time_usec,
					tool: tablet_tool(&d.tool),
					button: d.button,
					state: ButtonState::from_raw(d.state),
				}
			}
			TAB_INPUT_KIND_TABLET_PAD_BUTTON => {
				let d = unsafe { raw.data.tablet_pad_button };
				InputEvent::TabletPadButton {
					device: d.device,
					time_usec: d.time_usec,
					button: d.button,
					state: ButtonState::from_raw(d.state),
				}
			}
			TAB_INPUT_KIND_TABLET_PAD_RING => {
				let d = unsafe { raw.data.tablet_pad_ring };
				InputEvent::TabletPadRing {
					device: d.device,
					time_usec: d.time_usec,
					ring: d.ring,
					position: d.position,
					source: AxisSource::from_raw(d.source),
				}
			}
			TAB_INPUT_KIND_TABLET_PAD_STRIP => {
				let d = unsafe { raw.data.tablet_pad_strip };
				InputEvent::TabletPadStrip {
					device: d.device,
					time_usec: d.time_usec,
					strip: d.strip,
					position: d.position,
					source: AxisSource::from_raw(d.source),
				}
			}
			TAB_INPUT_KIND_SWITCH_TOGGLE => {
				let d = unsafe { raw.data.switch_toggle };
				InputEvent::SwitchToggle {
					device: d.device,
					time_usec: d.time_usec,
					switch: if d.switch_type == 0 {
						SwitchType::Lid
					} else {
						SwitchType::TabletMode
					},
					state: if d.state == 0 {
						SwitchState::Enabled
					} else {
						SwitchState::Disabled
					},
				}
			}
		}
	}

	/// Host-millisecond timestamp, computed by integer division.
	pub fn time_ms(&self) -> u32 {
		let usec = match *self {
			InputEvent::PointerMotion { time_usec, .. }
			| InputEvent::PointerMotionAbsolute { time_usec, .. }
			| InputEvent::PointerButton { time_usec, .. }
			| InputEvent::PointerAxis { time_usec, .. }
			| InputEvent::Key { time_usec, .. }
			| InputEvent::TouchDown { time_usec, .. }
			| InputEvent::TouchMotion { time_usec, .. }
			| InputEvent::TouchUp { time_usec, .. }
			| InputEvent::TouchFrame { time_usec }
			| InputEvent::TouchCancel { time_usec }
			| InputEvent::TabletToolProximity { time_usec, .. }
			| InputEvent::TabletToolAxis { time_usec, .. }
			| InputEvent::TabletToolTip { time_usec, .. }
			| InputEvent::TabletToolButton { time_usec, .. }
			| InputEvent::TabletPadButton { time_usec, .. }
			| InputEvent::TabletPadRing { time_usec, .. }
			| InputEvent::TabletPadStrip { time_usec, .. }
			| InputEvent::SwitchToggle { time_usec, .. } => time_usec,
		};
		(usec / 1000) as u32
	}
}

/// Which virtual device kind an event should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
	Keyboard,
	Pointer,
	Touch,
	Tablet,
	TabletPad,
	Switch,
}

impl InputEvent {
	pub fn device_kind(&self) -> DeviceKind {
		match self {
			InputEvent::Key { .. } => DeviceKind::Keyboard,
			InputEvent::PointerMotion { .. }
			| InputEvent::PointerMotionAbsolute { .. }
			| InputEvent::PointerButton { .. }
			| InputEvent::PointerAxis { .. } => DeviceKind::Pointer,
			InputEvent::TouchDown { .. }
			| InputEvent::TouchMotion { .. }
			| InputEvent::TouchUp { .. }
			| InputEvent::TouchFrame { .. }
			| InputEvent::TouchCancel { .. } => DeviceKind::Touch,
			InputEvent::TabletToolProximity { .. }
			| InputEvent::TabletToolAxis { .. }
			| InputEvent::TabletToolTip { .. }
			| InputEvent::TabletToolButton { .. } => DeviceKind::Tablet,
			InputEvent::TabletPadButton { .. } | InputEvent::TabletPadRing { .. } | InputEvent::TabletPadStrip { .. } => {
				DeviceKind::TabletPad
			}
			InputEvent::SwitchToggle { .. } => DeviceKind::Switch,
		}
	}
}

/// Per-device signal set. `new_device` fires exactly once, the first time
/// the backend routes an event to a kind it hasn't seen before; `event`
/// fires for every routed event; `frame` fires once per dispatch batch that
/// touched this device, aggregating the per-event dirty flag the way
/// pointer/touch "frame" signals do upstream.
#[derive(Default)]
pub struct DeviceEvents {
	pub new_device: EventSink<()>,
	pub event: EventSink<InputEvent>,
	pub frame: EventSink<()>,
}

/// Virtual device handle. Carries no kernel fd; identity is the
/// `DeviceKind` plus its own signal set.
pub struct VirtualDevice {
	pub kind: DeviceKind,
	pub events: DeviceEvents,
}

impl VirtualDevice {
	pub fn new(kind: DeviceKind) -> Self {
		Self {
			kind,
			events: DeviceEvents::default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn time_conversion_truncates() {
		let ev = InputEvent::Key {
			device: 0,
			time_usec: 1_500_999,
			key: 1,
			state: ButtonState::Pressed,
		};
		assert_eq!(ev.time_ms(), 1500);
	}

	#[test]
	fn axis_orientation_roundtrips() {
		assert_eq!(AxisOrientation::from_raw(0), AxisOrientation::Vertical);
		assert_eq!(AxisOrientation::from_raw(1), AxisOrientation::Horizontal);
	}

	#[test]
	fn device_kind_routes_by_variant() {
		let key = InputEvent::Key {
			device: 0,
			time_usec: 0,
			key: 1,
			state: ButtonState::Pressed,
		};
		assert_eq!(key.device_kind(), DeviceKind::Keyboard);
		let sw = InputEvent::SwitchToggle {
			device: 0,
			time_usec: 0,
			switch: SwitchType::Lid,
			state: SwitchState::Enabled,
		};
		assert_eq!(sw.device_kind(), DeviceKind::Switch);
	}
}
