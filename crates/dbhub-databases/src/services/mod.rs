mod identity;
mod metadata;
mod pipeline;
mod resolver;
mod upload;

pub use identity::{IdentityProvider, SessionIdentityProvider, SESSION_COOKIE};
pub use metadata::{DatabaseSummary, MetadataStore, NewVersion, SeaOrmMetadataStore, StoredObject};
pub use pipeline::{
    CsvExport, DatabaseTarget, DatabaseViewService, Download, ObjectLocation, PageData,
    VisOptions, VisPageData,
};
pub use resolver::ObjectResolver;
pub use upload::{UploadRequest, UploadService, SQLITE_CONTENT_TYPE};
