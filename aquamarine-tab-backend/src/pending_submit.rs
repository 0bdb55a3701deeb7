//! Fence-gated submit queue for pacing Variant A (`BUFFER_RELEASED` +
//! acquire-fence gating).
//!
//! Each committed frame enqueues a [`PendingSubmit`] carrying the render's
//! acquire-fence fd. `flush_ready` is polled (zero-timeout, non-blocking)
//! from the backend's main pump; an entry submits once its fence signals
//! and otherwise blocks every later entry *for the same monitor* — other
//! monitors' entries are unaffected, since the FIFO ordering is per-monitor.

use std::collections::{HashSet, VecDeque};
use std::os::fd::{BorrowedFd, RawFd};

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, warn};

use crate::buffer::SlotIndex;
use crate::client::SessionTransport;

/// One frame awaiting submission. Owns `acquire_fence_fd` until consumed by
/// a successful (or attempted) `request_buffer` call, or dropped early.
pub struct PendingSubmit {
	monitor_id: String,
	#[allow(dead_code)] // carried for diagnostics; the session tracks slot state itself
	slot: SlotIndex,
	acquire_fence_fd: Option<RawFd>,
	consumed: bool,
}

impl PendingSubmit {
	pub fn new(monitor_id: impl Into<String>, slot: SlotIndex, acquire_fence_fd: Option<RawFd>) -> Self {
		Self {
			monitor_id: monitor_id.into(),
			slot,
			acquire_fence_fd,
			consumed: false,
		}
	}

	/// `true` if there is no fence to wait on, or the fence fd reports
	/// readable/error/hangup on a zero-timeout poll.
	fn fence_ready(&self) -> bool {
		let Some(fd) = self.acquire_fence_fd else {
			return true;
		};
		let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
		let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP)];
		match poll(&mut fds, PollTimeout::ZERO) {
			Ok(0) => false,
			Ok(_) => fds[0]
				.revents()
				.is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP)),
			Err(err) => {
				warn!(%err, monitor_id = %self.monitor_id, "poll on acquire fence failed; treating as not ready");
				false
			}
		}
	}
}

impl Drop for PendingSubmit {
	fn drop(&mut self) {
		if !self.consumed {
			if let Some(fd) = self.acquire_fence_fd {
				unsafe { libc::close(fd) };
			}
		}
	}
}

#[derive(Default)]
pub struct PendingSubmitQueue {
	queue: VecDeque<PendingSubmit>,
}

impl PendingSubmitQueue {
	pub fn push(&mut self, submit: PendingSubmit) {
		self.queue.push_back(submit);
	}

	pub fn len(&self) -> usize {
		self.queue.len()
	}

	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	/// Drains every entry whose fence is ready, in FIFO order, skipping (but
	/// preserving) entries behind a not-yet-ready same-monitor predecessor.
	/// Returns how many were submitted.
	pub fn flush_ready(&mut self, client: &dyn SessionTransport) -> usize {
		let mut blocked_monitors: HashSet<String> = HashSet::new();
		let mut submitted = 0;
		let mut remaining = VecDeque::with_capacity(self.queue.len());

		while let Some(mut entry) = self.queue.pop_front() {
			if blocked_monitors.contains(&entry.monitor_id) {
				remaining.push_back(entry);
				continue;
			}
			if !entry.fence_ready() {
				blocked_monitors.insert(entry.monitor_id.clone());
				remaining.push_back(entry);
				continue;
			}
			let fence = entry.acquire_fence_fd;
			let accepted = client.request_buffer(&entry.monitor_id, fence);
			// The session takes ownership of the fence fd on the call,
			// whether or not it accepted the submission.
			entry.consumed = true;
			if !accepted {
				debug!(monitor_id = %entry.monitor_id, "request_buffer rejected by session");
			}
			submitted += 1;
		}

		self.queue = remaining;
		submitted
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fenceless_submit_is_always_ready() {
		let submit = PendingSubmit::new("M1", 0, None);
		assert!(submit.fence_ready());
	}

	#[test]
	fn queue_len_tracks_pushes() {
		let mut q = PendingSubmitQueue::default();
		assert!(q.is_empty());
		q.push(PendingSubmit::new("M1", 0, None));
		q.push(PendingSubmit::new("M2", 1, None));
		assert_eq!(q.len(), 2);
	}
}
