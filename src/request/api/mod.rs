mod fetch;
mod metadata;
mod produce;
mod topics;

pub use fetch::FetchRequestHandler;
pub use metadata::MetadataRequestHandler;
pub use produce::ProduceRequestHandler;
pub use topics::TopicsRequestHandler;
