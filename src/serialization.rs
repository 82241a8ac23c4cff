//! Serialization of fitted parameters.
//!
//! Parameter representations hold plain numerical data (`Vec<f64>`, maps of
//! feature names) and never solver state, so a persisted artifact reloads
//! into exactly the object that was saved.

use std::error::Error;
use std::path::Path;

/// A parameter representation that can be serialized to and from bytes.
pub trait SerializableParams: Sized {
    /// The error type returned during (de)serialization.
    type Error: Error + Send + Sync + 'static;

    /// Serialize the parameters into a byte buffer.
    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error>;

    /// Deserialize the parameters from a byte buffer.
    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;

    /// Write the serialized parameters to `path`.
    fn write_to<P: AsRef<Path>>(&self, path: P) -> crate::Result<()>
    where
        crate::PipelineError: From<Self::Error>,
    {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read parameters previously written with [`SerializableParams::write_to`].
    fn read_from<P: AsRef<Path>>(path: P) -> crate::Result<Self>
    where
        crate::PipelineError: From<Self::Error>,
    {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes)?)
    }
}

impl<T> SerializableParams for T
where
    T: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    type Error = bincode::Error;

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize(bytes)
    }
}
