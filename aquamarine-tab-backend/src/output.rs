//! Per-monitor output: owns the swapchain and implements the commit/present
//! contract (§4.2): `commit`, `test`, `scheduleFrame`, `destroy`,
//! `getRenderFormats`.
//!
//! `Output` itself never touches the idle scheduler or the session client
//! directly except through the handles the backend hands it on each call —
//! per the ownership model, the backend exclusively owns outputs and the
//! session client, so the frame-scheduling idle closure is built and
//! registered in [`crate::backend`], keyed by `monitor_id` rather than by a
//! weak pointer back into this struct (an index-pair substitute for the
//! weak-reference pattern, as allowed by the Design Notes).

use std::os::fd::RawFd;
use std::time::Instant;

use thiserror::Error;

use crate::buffer::Buffer;
use crate::client::{MonitorInfo, SessionTransport};
use crate::format::{DEFAULT_RENDER_FORMATS, DrmFormat};
use crate::host::{EventSink, PresentEvent};
use crate::mode::Mode;
use crate::pending_submit::{PendingSubmit, PendingSubmitQueue};
use crate::swapchain::{Swapchain, SwapchainOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingMode {
	/// Variant A: explicit `BUFFER_RELEASED` + acquire-fence gating.
	BufferReleased,
	/// Variant B: single-outstanding `FRAME_DONE` gating.
	FrameDone,
}

#[derive(Debug, Error)]
pub enum CommitError {
	#[error("output is destroyed")]
	Destroyed,
	#[error("no pending acquire to commit (call begin_render first)")]
	NoPendingAcquire,
	#[error("a frame is already in flight under FRAME_DONE pacing")]
	FrameInFlight,
	#[error("session rejected the submission")]
	SessionRejected,
}

#[derive(Default)]
pub struct OutputEvents {
	pub commit: EventSink<()>,
	pub frame: EventSink<()>,
	pub present: EventSink<PresentEvent>,
	pub destroy: EventSink<()>,
}

pub struct Output {
	pub monitor_id: String,
	pub display_name: String,
	pub physical_size: (i32, i32),
	pub mode: Mode,
	swapchain: Swapchain,
	pacing: PacingMode,
	last_present: Option<Instant>,
	present_seq: u32,
	needs_frame: bool,
	frame_event_scheduled: bool,
	awaiting_frame_done: bool,
	destroyed: bool,
	pub events: OutputEvents,
}

impl Output {
	pub fn new(info: &MonitorInfo, pacing: PacingMode) -> Self {
		let swapchain_options = SwapchainOptions {
			width: info.width,
			height: info.height,
			..SwapchainOptions::default()
		};
		Self {
			monitor_id: info.id.clone(),
			display_name: info.name.clone(),
			physical_size: (info.width, info.height),
			mode: Mode::from_monitor_info(info),
			swapchain: Swapchain::new(&info.id, swapchain_options),
			pacing,
			last_present: None,
			present_seq: 0,
			needs_frame: false,
			frame_event_scheduled: false,
			awaiting_frame_done: false,
			destroyed: false,
			events: OutputEvents::default(),
		}
	}

	pub fn refresh_interval_ns(&self) -> i64 {
		1_000_000_000_000i64 / self.mode.refresh_mhz as i64
	}

	pub fn last_present(&self) -> Option<Instant> {
		self.last_present
	}

	pub fn present_seq(&self) -> u32 {
		self.present_seq
	}

	pub fn is_destroyed(&self) -> bool {
		self.destroyed
	}

	pub fn get_render_formats(&self) -> &'static [DrmFormat] {
		&DEFAULT_RENDER_FORMATS
	}

	/// Dry-run precondition check with the same gating as `commit`, without
	/// mutating any state. Used by hosts that want to probe before rendering.
	pub fn test(&self) -> bool {
		!self.destroyed
			&& self.swapchain.has_available_buffer()
			&& (self.pacing != PacingMode::FrameDone || !self.awaiting_frame_done)
	}

	/// Acquires a session buffer for the caller to render into. The returned
	/// [`Buffer`] must be followed by `commit` or `rollback` before the next
	/// `begin_render` call — the swapchain allows at most one pending
	/// acquire at a time.
	pub fn begin_render(&mut self, client: &dyn SessionTransport) -> Option<Buffer> {
		if self.destroyed {
			return None;
		}
		self.swapchain.next(client).map(|(buffer, _age)| buffer)
	}

	/// Abandons the last `begin_render` acquire without presenting it.
	pub fn rollback(&mut self) {
		self.swapchain.rollback();
	}

	/// Submits the pending acquire per the active pacing mode.
	pub fn commit(
		&mut self,
		client: &dyn SessionTransport,
		pending: &mut PendingSubmitQueue,
		acquire_fence_fd: Option<RawFd>,
	) -> Result<(), CommitError> {
		if self.destroyed {
			return Err(CommitError::Destroyed);
		}
		if self.pacing == PacingMode::FrameDone && self.awaiting_frame_done {
			return Err(CommitError::FrameInFlight);
		}
		let Some(slot) = self.swapchain.take_pending() else {
			return Err(CommitError::NoPendingAcquire);
		};
		self.swapchain.mark_busy(slot);

		match self.pacing {
			PacingMode::BufferReleased => {
				pending.push(PendingSubmit::new(self.monitor_id.clone(), slot, acquire_fence_fd));
			}
			PacingMode::FrameDone => {
				// Variant B forwards no fence to the session; the caller is
				// expected to have already waited on it before committing.
				if let Some(fd) = acquire_fence_fd {
					unsafe { libc::close(fd) };
				}
				if !client.swap_buffers(&self.monitor_id) {
					self.swapchain.release(slot);
					return Err(CommitError::SessionRejected);
				}
				self.awaiting_frame_done = true;
			}
		}

		self.events.commit.emit(&());
		Ok(())
	}

	/// Marks that a frame should be produced. Returns `true` the first time
	/// this is called since the last idle dispatch, telling the caller
	/// (the backend) to actually register an idle callback.
	pub fn request_frame(&mut self) -> bool {
		self.needs_frame = true;
		if self.destroyed || self.frame_event_scheduled {
			return false;
		}
		self.frame_event_scheduled = true;
		true
	}

	/// Called by the backend from inside the idle callback. Always clears
	/// `frame_event_scheduled` (this idle slot is consumed either way). Only
	/// clears `needs_frame` and emits `frame` if the commit preconditions
	/// actually hold right now — otherwise the request stays pending and is
	/// retried from `on_buffer_released`/`on_frame_done` once a slot frees
	/// up or the in-flight frame completes. Returns whether it emitted.
	pub fn on_idle_tick(&mut self) -> bool {
		self.frame_event_scheduled = false;
		if !self.needs_frame || !self.test() {
			return false;
		}
		self.needs_frame = false;
		self.events.frame.emit(&());
		true
	}

	fn emit_present(&mut self, when: Instant) -> PresentEvent {
		self.present_seq = self.present_seq.wrapping_add(1);
		let event = PresentEvent {
			presented: true,
			seq: self.present_seq,
			when,
			refresh_ns: self.refresh_interval_ns(),
			vsync: true,
		};
		self.events.present.emit(&event);
		event
	}

	/// Variant A: a buffer came back from the session. Frees its slot, the
	/// release fence (if any) signals the host's prior render is fully
	/// retired so it is safe to close immediately, records the present
	/// timestamp, and increments `present_seq` — a `BUFFER_RELEASED` event
	/// *is* this variant's present confirmation. Returns the emitted event
	/// plus whether the caller should re-arm frame scheduling (a frame was
	/// still wanted and a slot is now free to satisfy it).
	pub fn on_buffer_released(&mut self, slot: u8, release_fence_fd: Option<RawFd>, when: Instant) -> (PresentEvent, bool) {
		self.swapchain.release(slot);
		if let Some(fd) = release_fence_fd {
			unsafe { libc::close(fd) };
		}
		let event = self.emit_present(when);
		let reschedule = self.needs_frame && self.test();
		(event, reschedule)
	}

	/// Variant B: the previously committed frame has been displayed. Returns
	/// the emitted event plus whether the caller should re-arm frame
	/// scheduling.
	pub fn on_frame_done(&mut self, when: Instant) -> (PresentEvent, bool) {
		self.awaiting_frame_done = false;
		let event = self.emit_present(when);
		let reschedule = self.needs_frame && self.test();
		(event, reschedule)
	}

	pub fn destroy(&mut self) {
		if self.destroyed {
			return;
		}
		self.destroyed = true;
		self.events.destroy.emit(&());
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn monitor() -> MonitorInfo {
		MonitorInfo {
			id: "M1".into(),
			name: "virtual-1".into(),
			width: 1920,
			height: 1080,
			refresh_rate: 60,
		}
	}

	#[test]
	fn test_fails_once_destroyed() {
		let mut out = Output::new(&monitor(), PacingMode::BufferReleased);
		assert!(out.test());
		out.destroy();
		assert!(!out.test());
	}

	use crate::client::FrameTarget;
	use crate::client::fake::FakeTransport;

	fn target(slot: u32) -> FrameTarget {
		FrameTarget {
			width: 1920,
			height: 1080,
			slot,
			fd: -1,
			stride: 1920 * 4,
			offset: 0,
			fourcc: crate::buffer::FOURCC_ARGB8888,
		}
	}

	#[test]
	fn commit_without_begin_render_is_rejected() {
		let mut out = Output::new(&monitor(), PacingMode::BufferReleased);
		let transport = FakeTransport::default();
		let mut pending = PendingSubmitQueue::default();
		let err = out.commit(&transport, &mut pending, None).unwrap_err();
		assert!(matches!(err, CommitError::NoPendingAcquire));
	}

	#[test]
	fn commit_under_buffer_released_enqueues_a_pending_submit() {
		let mut out = Output::new(&monitor(), PacingMode::BufferReleased);
		let transport = FakeTransport::default();
		*transport.next_target.borrow_mut() = Some(target(0));
		let buffer = out.begin_render(&transport).expect("fake supplied a target");
		std::mem::forget(buffer);

		let mut pending = PendingSubmitQueue::default();
		out.commit(&transport, &mut pending, None).unwrap();
		assert_eq!(pending.len(), 1);
		assert_eq!(out.present_seq(), 0, "commit submits; present_seq only advances on release");

		let (event, _reschedule) = out.on_buffer_released(0, None, Instant::now());
		assert_eq!(out.present_seq(), 1);
		assert_eq!(event.seq, 1);
	}

	#[test]
	fn commit_under_frame_done_blocks_a_second_commit_until_frame_done() {
		let mut out = Output::new(&monitor(), PacingMode::FrameDone);
		let transport = FakeTransport::default();
		*transport.swap_buffers_result.borrow_mut() = true;

		*transport.next_target.borrow_mut() = Some(target(0));
		let buffer = out.begin_render(&transport).unwrap();
		std::mem::forget(buffer);
		let mut pending = PendingSubmitQueue::default();
		out.commit(&transport, &mut pending, None).unwrap();
		assert!(pending.is_empty(), "variant B never uses the submit queue");

		*transport.next_target.borrow_mut() = Some(target(1));
		let buffer = out.begin_render(&transport).unwrap();
		std::mem::forget(buffer);
		let err = out.commit(&transport, &mut pending, None).unwrap_err();
		assert!(matches!(err, CommitError::FrameInFlight));

		out.on_frame_done(Instant::now());
		out.commit(&transport, &mut pending, None).unwrap();
	}

	#[test]
	fn request_frame_only_signals_registration_once() {
		let mut out = Output::new(&monitor(), PacingMode::BufferReleased);
		assert!(out.request_frame());
		assert!(!out.request_frame(), "already scheduled, no second registration");
		assert!(out.on_idle_tick());
		assert!(out.request_frame(), "flags cleared, registration needed again");
	}

	#[test]
	fn frame_done_clears_awaiting_flag() {
		let mut out = Output::new(&monitor(), PacingMode::FrameDone);
		out.awaiting_frame_done = true;
		let (event, _reschedule) = out.on_frame_done(Instant::now());
		assert!(!out.awaiting_frame_done);
		assert!(event.presented);
		assert_eq!(event.seq, 1);
		assert_eq!(event.refresh_ns, 1_000_000_000_000 / 60_000);
	}

	#[test]
	fn destroy_is_idempotent() {
		let mut out = Output::new(&monitor(), PacingMode::BufferReleased);
		out.destroy();
		out.destroy();
		assert!(out.is_destroyed());
	}
}
