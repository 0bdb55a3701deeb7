//! Per-output swapchain: tracks two slots and drives the
//! acquire/pending/busy/released transitions described in §4.1.
//!
//! Separating *acquire* (`pending`) from *commit* (`mark_busy`) makes
//! rolled-back acquires and `test()` safe: a rolled-back acquire leaves both
//! slots free, while a committed acquire cannot be re-acquired until a
//! release arrives.

use tracing::warn;

use crate::buffer::{Buffer, FOURCC_ARGB8888, SlotIndex};
use crate::client::SessionTransport;

/// Fixed by the session contract (spec §1 Non-goals: "arbitrary buffer-slot
/// counts").
pub const SLOT_COUNT: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct SwapchainOptions {
	pub width: i32,
	pub height: i32,
	pub format: i32,
}

impl Default for SwapchainOptions {
	fn default() -> Self {
		Self {
			width: 0,
			height: 0,
			format: FOURCC_ARGB8888,
		}
	}
}

/// Per-output swapchain. Holds a non-owning reference to the session client
/// and the monitor id it was created for.
pub struct Swapchain {
	monitor_id: String,
	options: SwapchainOptions,
	busy: [bool; SLOT_COUNT],
	pending: Option<SlotIndex>,
}

impl Swapchain {
	pub fn new(monitor_id: impl Into<String>, options: SwapchainOptions) -> Self {
		Self {
			monitor_id: monitor_id.into(),
			options,
			busy: [false; SLOT_COUNT],
			pending: None,
		}
	}

	/// Replaces stored options. Always succeeds; no slot-state effects.
	pub fn reconfigure(&mut self, options: SwapchainOptions) {
		self.options = options;
	}

	pub fn options(&self) -> SwapchainOptions {
		self.options
	}

	/// Attempts to obtain a new session frame target. Returns `None` if the
	/// session isn't connected, refused the request, reported an
	/// out-of-range slot, or the reported slot is already busy. On success
	/// stores `pending = Some(slot)` with buffer age 0 and never marks the
	/// slot busy.
	pub fn next(&mut self, client: &dyn SessionTransport) -> Option<(Buffer, u8)> {
		let target = client.acquire_frame(&self.monitor_id)?;
		let slot = target.slot;
		if slot as usize >= SLOT_COUNT {
			warn!(monitor_id = %self.monitor_id, slot, "session reported out-of-range slot index");
			return None;
		}
		if self.busy[slot as usize] {
			warn!(monitor_id = %self.monitor_id, slot, "session handed back an already-busy slot");
			return None;
		}
		self.pending = Some(slot as SlotIndex);
		Some((Buffer::from_target(target), 0))
	}

	/// Clears `pending` without touching `busy`.
	pub fn rollback(&mut self) {
		self.pending = None;
	}

	/// Returns and clears `pending`.
	pub fn take_pending(&mut self) -> Option<SlotIndex> {
		self.pending.take()
	}

	/// `free -> busy`. Rejects out-of-range indices (no-op, returns false).
	pub fn mark_busy(&mut self, slot: SlotIndex) -> bool {
		if slot as usize >= SLOT_COUNT {
			return false;
		}
		self.busy[slot as usize] = true;
		true
	}

	/// `busy -> free`. Rejects out-of-range indices (no-op, returns false).
	pub fn release(&mut self, slot: SlotIndex) -> bool {
		if slot as usize >= SLOT_COUNT {
			return false;
		}
		self.busy[slot as usize] = false;
		true
	}

	pub fn has_available_buffer(&self) -> bool {
		self.busy.iter().any(|busy| !busy)
	}

	pub fn busy_count(&self) -> usize {
		self.busy.iter().filter(|b| **b).count()
	}

	pub fn pending(&self) -> Option<SlotIndex> {
		self.pending
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn both_slots_free_at_construction() {
		let sc = Swapchain::new("M1", SwapchainOptions::default());
		assert_eq!(sc.busy_count(), 0);
		assert!(sc.has_available_buffer());
	}

	#[test]
	fn rollback_leaves_slots_untouched() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		sc.mark_busy(0);
		assert!(sc.busy_count() == 1);
		sc.rollback();
		assert_eq!(sc.busy_count(), 1, "rollback must not touch busy[]");
	}

	#[test]
	fn mark_busy_then_release_cycle() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		assert!(sc.mark_busy(0));
		assert_eq!(sc.busy_count(), 1);
		assert!(sc.release(0));
		assert_eq!(sc.busy_count(), 0);
	}

	#[test]
	fn out_of_range_slot_rejected() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		assert!(!sc.mark_busy(2));
		assert!(!sc.release(5));
		assert_eq!(sc.busy_count(), 0);
	}

	#[test]
	fn reconfigure_preserves_slot_state() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		sc.mark_busy(0);
		sc.reconfigure(SwapchainOptions {
			width: 3840,
			height: 2160,
			format: FOURCC_ARGB8888,
		});
		assert_eq!(sc.busy_count(), 1);
		assert_eq!(sc.options().width, 3840);
	}

	#[test]
	fn take_pending_clears_it() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		sc.pending = Some(1);
		assert_eq!(sc.take_pending(), Some(1));
		assert_eq!(sc.take_pending(), None);
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
			fourcc: FOURCC_ARGB8888,
		}
	}

	#[test]
	fn next_sets_pending_without_marking_busy() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		let transport = FakeTransport::default();
		*transport.next_target.borrow_mut() = Some(target(0));
		let (buffer, age) = sc.next(&transport).expect("fake reported a target");
		assert_eq!(age, 0);
		assert_eq!(buffer.slot, 0);
		assert_eq!(sc.pending(), Some(0));
		assert_eq!(sc.busy_count(), 0);
		std::mem::forget(buffer);
	}

	#[test]
	fn next_rejects_already_busy_slot() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		sc.mark_busy(0);
		let transport = FakeTransport::default();
		*transport.next_target.borrow_mut() = Some(target(0));
		assert!(sc.next(&transport).is_none());
		assert_eq!(sc.pending(), None);
	}

	#[test]
	fn next_rejects_out_of_range_slot() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		let transport = FakeTransport::default();
		*transport.next_target.borrow_mut() = Some(target(7));
		assert!(sc.next(&transport).is_none());
	}

	#[test]
	fn next_returns_none_when_session_has_no_target() {
		let mut sc = Swapchain::new("M1", SwapchainOptions::default());
		let transport = FakeTransport::default();
		assert!(sc.next(&transport).is_none());
	}
}
