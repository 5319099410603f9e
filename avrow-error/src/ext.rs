use crate::{AvrowResult, ErrString};

/// Extension trait for [`AvrowResult`]
pub trait SerdeResultExt<T>: private::Sealed {
    /// Wrap a failure in the umbrella [`AvrowError::Serde`](crate::AvrowError::Serde) variant
    /// reported to host engines.
    fn serde_context<M: Into<ErrString>>(self, msg: M) -> AvrowResult<T>;
}

mod private {
    use crate::AvrowResult;

    pub trait Sealed {}

    impl<T> Sealed for AvrowResult<T> {}
}

impl<T> SerdeResultExt<T> for AvrowResult<T> {
    fn serde_context<M: Into<ErrString>>(self, msg: M) -> AvrowResult<T> {
        self.map_err(|e| e.into_serde(msg))
    }
}
