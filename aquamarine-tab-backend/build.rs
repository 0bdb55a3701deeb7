fn main() {
	// The Shift session ships `libtab_client.so`; we only declare its ABI
	// (see src/sys.rs) and link against whatever copy the host environment
	// provides.
	println!("cargo:rustc-link-lib=dylib=tab_client");
}
