use std::io;

use super::Body;

/// Anything a handler or a client can hand over as the body of a message.
///
/// Every body ends up as a [`Body`] before it is written; the trait only adds what the writer
/// needs to know up front to pick a framing.
pub trait HttpBody: Into<Body> {
    /// Length in bytes, when known before the body is written.
    fn len(&self) -> Option<u64>;

    fn into_bytes(self) -> io::Result<Vec<u8>> {
        Body::into_bytes(self.into())
    }
}

impl HttpBody for Body {
    fn len(&self) -> Option<u64> {
        Body::len(self)
    }
}

impl HttpBody for () {
    fn len(&self) -> Option<u64> {
        Some(0)
    }
}

macro_rules! in_memory_body {
    ($($ty:ty),*) => {
        $(
            impl HttpBody for $ty {
                fn len(&self) -> Option<u64> {
                    Some(AsRef::<[u8]>::as_ref(self).len() as u64)
                }
            }
        )*
    };
}

in_memory_body!(&'static [u8], &str, String, Vec<u8>);
