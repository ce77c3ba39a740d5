use std::error::Error;

use http::StatusCode;

use crate::fs::FsError;

#[derive(Debug)]
pub enum DavError {
    XmlWriteError,  // error generating xml
    InvalidPath,    // error parsing path
    UnknownDavMethod,
    Status(StatusCode),
    FsError(FsError),
}

impl Error for DavError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DavError::FsError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for DavError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DavError::FsError(_) => write!(f, "storage backend error"),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl From<FsError> for DavError {
    fn from(e: FsError) -> Self {
        DavError::FsError(e)
    }
}

impl From<StatusCode> for DavError {
    fn from(e: StatusCode) -> Self {
        DavError::Status(e)
    }
}

impl From<xml::writer::Error> for DavError {
    fn from(_e: xml::writer::Error) -> Self {
        DavError::XmlWriteError
    }
}

// Map backend error kinds to WebDAV status codes.
pub(crate) fn fserror_to_status(e: FsError) -> StatusCode {
    match e {
        FsError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        FsError::GeneralFailure => StatusCode::INTERNAL_SERVER_ERROR,
        FsError::Exists => StatusCode::PRECONDITION_FAILED,
        FsError::NotFound => StatusCode::NOT_FOUND,
        FsError::Forbidden => StatusCode::FORBIDDEN,
        FsError::NotADirectory => StatusCode::CONFLICT,
        FsError::IsADirectory => StatusCode::CONFLICT,
        FsError::NotEmpty => StatusCode::CONFLICT,
        FsError::InsufficientStorage => StatusCode::INSUFFICIENT_STORAGE,
    }
}

impl DavError {
    pub(crate) fn statuscode(&self) -> StatusCode {
        match self {
            DavError::XmlWriteError => StatusCode::INTERNAL_SERVER_ERROR,
            DavError::InvalidPath => StatusCode::BAD_REQUEST,
            DavError::UnknownDavMethod => StatusCode::NOT_IMPLEMENTED,
            DavError::Status(e) => *e,
            DavError::FsError(e) => fserror_to_status(*e),
        }
    }
}
