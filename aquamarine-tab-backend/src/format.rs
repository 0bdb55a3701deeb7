//! Default render/cursor format advertisement.
//!
//! The session backend has no DRM plane of its own to interrogate, so per
//! Open Question 4 in DESIGN.md it advertises a fixed two-entry format list
//! with the implicit modifier, and otherwise defers to a peer DRM backend's
//! format set when the host supplies one (see [`crate::backend::Backend::get_render_formats`]).

use crate::buffer::{FOURCC_ARGB8888, FOURCC_XRGB8888, MODIFIER_INVALID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrmFormat {
	pub fourcc: i32,
	pub modifier: u64,
}

pub const DEFAULT_RENDER_FORMATS: [DrmFormat; 2] = [
	DrmFormat {
		fourcc: FOURCC_XRGB8888,
		modifier: MODIFIER_INVALID,
	},
	DrmFormat {
		fourcc: FOURCC_ARGB8888,
		modifier: MODIFIER_INVALID,
	},
];

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_formats_carry_implicit_modifier() {
		assert_eq!(DEFAULT_RENDER_FORMATS.len(), 2);
		assert!(DEFAULT_RENDER_FORMATS.iter().all(|f| f.modifier == MODIFIER_INVALID));
	}
}
