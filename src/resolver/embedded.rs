//! Embedded tool bytes, compiled into the binary via `include_bytes!`.
//!
//! No tools are bundled in this build; the table is empty, so the Embedded
//! strategy always falls through to PATH lookup. A real distribution adds
//! entries here (`include_bytes!("../../vendor/rustfmt-x86_64")`) keyed by
//! the same executable name used in a [`crate::registry::ToolDescriptor`].
#[must_use]
pub fn lookup(_executable: &str) -> Option<&'static [u8]> {
    None
}
