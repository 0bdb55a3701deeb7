//! Virtual buffer: a single-plane DMA-BUF descriptor wrapping one session
//! frame target.

use crate::client::FrameTarget;

/// DRM fourcc for `XRGB8888`.
pub const FOURCC_XRGB8888: i32 = 0x3432_5258;
/// DRM fourcc for `ARGB8888`.
pub const FOURCC_ARGB8888: i32 = 0x3432_3241;
/// DRM "implicit modifier" sentinel (`DRM_FORMAT_MOD_INVALID`).
pub const MODIFIER_INVALID: u64 = 0x00ff_ffff_ffff_ffff;

/// Which slot this buffer came from; kept so release/recycling code doesn't
/// have to thread the index through separately.
pub type SlotIndex = u8;

/// A single-plane DMA-BUF handle. Ownership policy (Open Question 1,
/// resolved in DESIGN.md): the buffer closes its fd on drop. The host keeps
/// it alive via a shared reference while rendering, so `Drop` only runs
/// once, after the longest-lived holder releases it.
#[derive(Debug)]
pub struct Buffer {
	fd: i32,
	pub stride: i32,
	pub offset: i32,
	pub fourcc: i32,
	pub width: i32,
	pub height: i32,
	pub slot: SlotIndex,
}

impl Buffer {
	pub(crate) fn from_target(target: FrameTarget) -> Self {
		Self {
			fd: target.fd,
			stride: target.stride,
			offset: target.offset,
			fourcc: target.fourcc,
			width: target.width,
			height: target.height,
			slot: target.slot as SlotIndex,
		}
	}

	/// `true` iff the descriptor is usable — the contract is `fd >= 0`.
	pub fn is_valid(&self) -> bool {
		self.fd >= 0
	}

	pub fn fd(&self) -> i32 {
		self.fd
	}

	pub fn size(&self) -> (i32, i32) {
		(self.width, self.height)
	}
}

impl Drop for Buffer {
	fn drop(&mut self) {
		if self.fd >= 0 {
			unsafe { libc::close(self.fd) };
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn target(slot: u32, fd: i32) -> FrameTarget {
		FrameTarget {
			width: 1920,
			height: 1080,
			slot,
			fd,
			stride: 1920 * 4,
			offset: 0,
			fourcc: FOURCC_ARGB8888,
		}
	}

	#[test]
	fn valid_iff_fd_nonnegative() {
		let buf = Buffer::from_target(target(0, -1));
		assert!(!buf.is_valid());
		std::mem::forget(buf); // no real fd to close
	}

	#[test]
	fn size_matches_target() {
		let buf = Buffer::from_target(target(1, -1));
		assert_eq!(buf.size(), (1920, 1080));
		assert_eq!(buf.slot, 1);
		std::mem::forget(buf);
	}
}
