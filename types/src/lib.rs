pub mod frame;
pub mod query;
pub mod response;

pub use frame::{Base64EncodedImage, RawFrame};
pub use query::OutgoingQuery;
pub use response::{AudioPayload, DeliveryMode, IncomingResponse, ResponseFrame};
