pub mod google;
pub mod mailer;
pub mod payments;
pub mod storage;
pub mod textgen;

pub use google::{GoogleClient, GoogleError, GoogleIdentity};
pub use mailer::{MailError, Mailer};
pub use payments::{Invoice, InvoiceRequest, PaymentsClient, PaymentsError};
pub use storage::{StorageClient, StorageError};
pub use textgen::{TextGenClient, TextGenError};
