/// Failure modes surfaced by an [`RfmDriver`](crate::RfmDriver) implementation.
///
/// The core treats every call to the driver as fallible and never interprets
/// the cause beyond logging it; the taxonomy below exists so callers at the
/// lifecycle layer can distinguish "the device could not be opened" from
/// "a runtime transfer failed" without parsing strings.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to open device '{path}'")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("driver handle is closed")]
    Closed,

    #[error("DMA region is not mapped")]
    DmaNotMapped,

    #[error("offset {offset} + len {len} exceeds backing region of {region_len} bytes")]
    OutOfBounds {
        offset: u32,
        len: usize,
        region_len: usize,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
