use thiserror::Error;

/// The uploaded roster could not be read as CSV.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("roster has no header line")]
    MissingHeader,
}

/// The QR payload does not fit into a symbol.
#[derive(Error, Debug)]
#[error("QR encoding failed: {0}")]
pub struct EncodingError(#[from] pub qrcode::types::QrError);

/// Failure to produce one certificate. Scoped to a single row.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("template image: {0}")]
    Image(String),

    #[error("font: {0}")]
    Font(String),

    #[error(transparent)]
    Qr(#[from] EncodingError),

    #[error("PDF rendering: {0}")]
    Pdf(String),

    #[error("registration id {0:?} cannot be used in a file name")]
    RegistrationId(String),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for RenderError {
    fn from(e: image::ImageError) -> Self {
        RenderError::Image(e.to_string())
    }
}

/// Failure to deliver a certificate by mail. Never leaves the notifier.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid address {0:?}")]
    Address(String),

    #[error("could not build message: {0}")]
    Message(String),

    #[error("transport: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Errors that abort a whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not create scratch directory: {0}")]
    Scratch(std::io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
